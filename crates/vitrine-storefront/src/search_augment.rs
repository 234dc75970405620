#![forbid(unsafe_code)]

//! Article suggestions for predictive search.
//!
//! The predictive-search dropdown re-renders its results host on every
//! keystroke. When the article list comes back empty, [`ArticleAugmenter`]
//! asks the host's [`ArticleSource`] for matching articles and renders them
//! as list items.
//!
//! # Invariants
//!
//! 1. A list that already has items is never touched.
//! 2. At most one fetch per `(root, term)` until 50ms after the previous one
//!    for that term completed.
//! 3. A failed fetch leaves the list exactly as it was.

use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use serde::Deserialize;
use tracing::{debug, warn};
use vitrine_core::clock::{TimerId, TimerQueue};
use vitrine_core::dom::{Document, ElementId, Mutation, WriteOrigin};
use vitrine_core::selector::Selector;

use crate::error::StorefrontError;

/// Articles requested per term.
pub const MAX_ARTICLES: usize = 6;
/// Quiet period after the last results render before populating.
pub const DEBOUNCE: Duration = Duration::from_millis(60);
/// How long a term stays guarded after its fetch completes.
pub const GUARD_RELEASE: Duration = Duration::from_millis(50);
/// Delay before re-attaching after a section reload.
pub const REATTACH_DELAY: Duration = Duration::from_millis(50);

const SUGGEST_PATH: &str = "/search/suggest.json";
const LIST_ID: &str = "predictive-search-results-articles-list";

// ---------------------------------------------------------------------------
// Suggest endpoint
// ---------------------------------------------------------------------------

/// One suggested article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub url: String,
}

#[derive(Deserialize)]
struct RawArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl From<RawArticle> for Article {
    fn from(raw: RawArticle) -> Self {
        Self {
            title: raw.title.unwrap_or_default(),
            url: raw.url.filter(|u| !u.is_empty()).unwrap_or_else(|| "#".to_string()),
        }
    }
}

#[derive(Deserialize, Default)]
struct SuggestBody {
    #[serde(default)]
    resources: Option<SuggestResources>,
}

#[derive(Deserialize, Default)]
struct SuggestResources {
    #[serde(default)]
    results: Option<SuggestResults>,
}

#[derive(Deserialize, Default)]
struct SuggestResults {
    #[serde(default)]
    articles: Option<Vec<RawArticle>>,
}

/// Request path and query for articles matching `term`.
#[must_use]
pub fn suggest_url(term: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("q", term)
        .append_pair("resources[type]", "article")
        .append_pair("resources[limit]", &MAX_ARTICLES.to_string())
        .finish();
    format!("{SUGGEST_PATH}?{query}")
}

/// Articles from a suggest response body. A body without the articles path
/// yields an empty list.
pub fn parse_suggest_response(body: &str) -> Result<Vec<Article>, StorefrontError> {
    let parsed: SuggestBody = serde_json::from_str(body)?;
    Ok(parsed
        .resources
        .and_then(|r| r.results)
        .and_then(|r| r.articles)
        .unwrap_or_default()
        .into_iter()
        .map(Article::from)
        .collect())
}

/// Host side of the suggest endpoint.
pub trait ArticleSource {
    /// Articles matching `term`. Implementations typically request
    /// [`suggest_url`] and decode with [`parse_suggest_response`].
    fn fetch(&mut self, term: &str) -> Result<Vec<Article>, StorefrontError>;
}

// ---------------------------------------------------------------------------
// Augmenter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Task {
    Populate(ElementId),
    Release { root: ElementId, term: String },
    Reattach,
}

/// What a populate pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Populated {
    /// Rendered this many articles.
    Rendered(usize),
    /// Nothing to do (no term, no list, list already filled, or guarded).
    Skipped,
    /// The source failed; the list was left untouched.
    Failed,
}

/// Fills empty article lists in predictive-search dropdowns.
pub struct ArticleAugmenter<S> {
    source: S,
    roots: Selector,
    hosts: Selector,
    input: Selector,
    /// predictive-search root -> results host.
    attached: AHashMap<ElementId, ElementId>,
    debounce: AHashMap<ElementId, TimerId>,
    guarded: AHashSet<(ElementId, String)>,
    timers: TimerQueue<Task>,
}

impl<S: ArticleSource> ArticleAugmenter<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            roots: parse_static("predictive-search"),
            hosts: parse_static("[data-predictive-search]"),
            input: parse_static(r#"input[type="search"]"#),
            attached: AHashMap::new(),
            debounce: AHashMap::new(),
            guarded: AHashSet::new(),
            timers: TimerQueue::new(),
        }
    }

    /// The article source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Attach to every predictive-search root that has a results host and
    /// schedule a first populate for each new one. Returns the number of
    /// newly attached roots.
    pub fn attach_all(&mut self, doc: &Document, now: Duration) -> usize {
        self.attached
            .retain(|&root, &mut host| doc.is_connected(root) && doc.contains(root, host));
        let mut attached = 0;
        for root in doc.query_all(doc.root(), &self.roots) {
            if self.attached.contains_key(&root) {
                continue;
            }
            let Some(host) = doc.query(root, &self.hosts) else {
                continue;
            };
            self.attached.insert(root, host);
            self.schedule_populate(root, now);
            attached += 1;
        }
        debug!(attached, total = self.attached.len(), "predictive search attached");
        attached
    }

    /// Re-attach shortly after a section reload.
    pub fn on_section_load(&mut self, now: Duration) {
        self.timers.schedule(now + REATTACH_DELAY, Task::Reattach);
    }

    /// Debounce a populate for every root whose results host changed.
    pub fn on_mutations(&mut self, doc: &Document, mutations: &[Mutation], now: Duration) {
        let touched: AHashSet<ElementId> = mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::ChildList { parent, .. } => Some(*parent),
                Mutation::Attribute { .. } => None,
            })
            .filter_map(|parent| {
                self.attached
                    .iter()
                    .find(|&(_, &host)| doc.contains(host, parent))
                    .map(|(&root, _)| root)
            })
            .collect();
        for root in touched {
            self.schedule_populate(root, now);
        }
    }

    /// Run tasks due at `now`.
    pub fn poll(&mut self, doc: &mut Document, now: Duration) -> Vec<Populated> {
        let mut outcomes = Vec::new();
        while let Some((id, _, task)) = self.timers.pop_due(now) {
            match task {
                Task::Populate(root) => {
                    if self.debounce.get(&root) == Some(&id) {
                        self.debounce.remove(&root);
                    }
                    outcomes.push(self.populate(doc, root, now));
                }
                Task::Release { root, term } => {
                    self.guarded.remove(&(root, term));
                }
                Task::Reattach => {
                    self.attach_all(doc, now);
                }
            }
        }
        outcomes
    }

    /// Earliest pending task.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Whether a fetch for `term` under `root` is in flight or still inside
    /// its release window.
    #[must_use]
    pub fn is_guarded(&self, root: ElementId, term: &str) -> bool {
        self.guarded.contains(&(root, term.to_string()))
    }

    fn schedule_populate(&mut self, root: ElementId, now: Duration) {
        if let Some(previous) = self.debounce.remove(&root) {
            self.timers.cancel(previous);
        }
        let id = self.timers.schedule(now + DEBOUNCE, Task::Populate(root));
        self.debounce.insert(root, id);
    }

    fn populate(&mut self, doc: &mut Document, root: ElementId, now: Duration) -> Populated {
        let Some(&host) = self.attached.get(&root) else {
            return Populated::Skipped;
        };
        if !doc.is_connected(host) {
            return Populated::Skipped;
        }
        let term = doc
            .query(root, &self.input)
            .and_then(|input| doc.attribute(input, "value"))
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if term.is_empty() {
            return Populated::Skipped;
        }
        let Some(list) = doc
            .query(host, &parse_static(&format!("#{LIST_ID}")))
            .filter(|&list| doc.children(list).is_empty())
        else {
            return Populated::Skipped;
        };
        let key = (root, term);
        if !self.guarded.insert(key.clone()) {
            return Populated::Skipped;
        }

        let outcome = match self.source.fetch(&key.1) {
            Ok(mut articles) => {
                articles.truncate(MAX_ARTICLES);
                doc.clear_children(list);
                for (idx, article) in articles.iter().enumerate() {
                    render_article(doc, list, idx, article);
                }
                debug!(%root, term = %key.1, count = articles.len(), "articles rendered");
                Populated::Rendered(articles.len())
            }
            Err(err) => {
                warn!(%root, term = %key.1, error = %err, "article augment failed");
                Populated::Failed
            }
        };
        self.timers.schedule(
            now + GUARD_RELEASE,
            Task::Release {
                root: key.0,
                term: key.1,
            },
        );
        outcome
    }
}

fn render_article(doc: &mut Document, list: ElementId, idx: usize, article: &Article) {
    let set = |doc: &mut Document, el, name, value: &str| {
        doc.set_attribute_as(el, name, value, WriteOrigin::Controller);
    };
    let li = doc.create_element("li");
    set(doc, li, "id", &format!("predictive-search-option-article-augment-{}", idx + 1));
    set(doc, li, "class", "predictive-search__list-item");
    set(doc, li, "role", "option");
    set(doc, li, "aria-selected", "false");

    let link = doc.append_new(li, "a");
    set(doc, link, "href", &article.url);
    set(doc, link, "class", "predictive-search__item link link--text");
    set(doc, link, "tabindex", "-1");

    let content = doc.append_new(link, "div");
    set(
        doc,
        content,
        "class",
        "predictive-search__item-content predictive-search__item-content--centered",
    );
    let heading = doc.append_new(content, "p");
    set(doc, heading, "class", "predictive-search__item-heading h5");
    doc.set_text(heading, &article.title);

    doc.append_child(list, li);
}

fn parse_static(source: &str) -> Selector {
    Selector::parse(source).unwrap_or_else(|err| unreachable!("built-in selector: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn suggest_url_encodes_term() {
        assert_eq!(
            suggest_url("rose & oud"),
            "/search/suggest.json?q=rose+%26+oud&resources%5Btype%5D=article&resources%5Blimit%5D=6"
        );
    }

    #[test]
    fn parses_articles_with_defaults() {
        let body = r#"{"resources":{"results":{"articles":[
            {"title":"Care guide","url":"/blogs/news/care"},
            {"title":null},
            {"url":""}
        ]}}}"#;
        assert_eq!(
            parse_suggest_response(body).unwrap(),
            vec![
                Article {
                    title: "Care guide".into(),
                    url: "/blogs/news/care".into()
                },
                Article {
                    title: String::new(),
                    url: "#".into()
                },
                Article {
                    title: String::new(),
                    url: "#".into()
                },
            ]
        );
    }

    #[test]
    fn missing_articles_path_is_empty() {
        assert_eq!(parse_suggest_response(r#"{"resources":{}}"#).unwrap(), vec![]);
        assert_eq!(parse_suggest_response("{}").unwrap(), vec![]);
        assert!(matches!(
            parse_suggest_response("not json"),
            Err(StorefrontError::Decode(_))
        ));
    }
}
