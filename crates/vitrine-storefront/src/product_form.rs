#![forbid(unsafe_code)]

//! Add-to-cart form submission.
//!
//! A `product-form` element wraps the form that adds a variant to the cart.
//! [`ProductForm`] finds that form (possibly injected later), tracks the busy
//! state of the submit button while a request is in flight, and renders the
//! outcome: error message, sold-out swap, or a cart refresh.
//!
//! Requests are asynchronous from the controller's point of view:
//! [`ProductForm::request_submit`] hands a [`CartAddRequest`] to the host's
//! [`CartClient`], and the host reports the answer through
//! [`ProductForm::complete`].
//!
//! # Invariants
//!
//! 1. At most one request in flight (`aria-disabled="true"` on the button).
//! 2. Each misconfiguration warning is emitted at most once per element.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | No form after 10s | One warning, element stays inert |
//! | No `[name="id"]` or submit button | One warning, element stays inert |
//! | Request or decode failure | Logged, busy state cleared |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vitrine_core::dom::{Document, ElementId, Mutation, WriteOrigin};
use vitrine_core::selector::Selector;

use crate::error::StorefrontError;

/// How long to wait for a form injected after the element connects.
pub const FORM_WAIT: Duration = Duration::from_secs(10);

const BUSY_ATTR: &str = "aria-disabled";
const LOADING_CLASS: &str = "loading";
const HIDDEN_CLASS: &str = "hidden";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of an add-to-cart request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartAddRequest {
    /// Variant id.
    pub id: String,
    pub quantity: u32,
}

/// Cart endpoint answer. A truthy `status` marks a rejection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CartResponse {
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

impl CartResponse {
    pub fn from_json(body: &str) -> Result<Self, StorefrontError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Whether the cart rejected the add.
    #[must_use]
    pub fn is_error(&self) -> bool {
        use serde_json::Value;
        match &self.status {
            None | Some(Value::Null | Value::Bool(false)) => false,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

/// Host transport for add-to-cart requests.
pub trait CartClient {
    /// Start the request. The answer comes back through
    /// [`ProductForm::complete`].
    fn submit(&mut self, request: CartAddRequest) -> Result<(), StorefrontError>;
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Cart UI that renders a successful add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartSurface {
    Notification(ElementId),
    Drawer(ElementId),
}

impl CartSurface {
    #[must_use]
    pub const fn element(self) -> ElementId {
        match self {
            Self::Notification(el) | Self::Drawer(el) => el,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bound {
    form: ElementId,
    variant_input: ElementId,
    submit: ElementId,
    submit_text: ElementId,
    cart: Option<CartSurface>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    WaitingForForm { deadline: Duration },
    Ready(Bound),
    Inert,
}

/// Result of [`ProductForm::request_submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(CartAddRequest),
    /// A request is already in flight.
    Busy,
    /// The element never bound.
    NotReady,
    /// The client refused the request; busy state already cleared.
    NotSent,
}

/// Result of [`ProductForm::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompleteOutcome {
    /// Added; the cart surface should render the response.
    Added(CartSurface),
    /// Added, but there is no cart surface on the page.
    RedirectToCart,
    /// The cart rejected the add.
    Rejected { description: Option<String> },
    /// Rejected and the button now shows its sold-out message.
    SoldOut,
    /// Transport or decode failure.
    Failed,
    /// No request was in flight.
    Ignored,
}

/// One `product-form` element.
#[derive(Debug, Clone)]
pub struct ProductForm {
    element: ElementId,
    phase: Phase,
    warned: bool,
    hide_errors: bool,
    error: bool,
    in_flight: bool,
}

impl ProductForm {
    /// Bind `element`, or start waiting for its form.
    pub fn connect(doc: &mut Document, element: ElementId, now: Duration) -> Self {
        let mut this = Self {
            element,
            phase: Phase::WaitingForForm {
                deadline: now + FORM_WAIT,
            },
            warned: false,
            hide_errors: doc.attribute(element, "data-hide-errors") == Some("true"),
            error: false,
            in_flight: false,
        };
        this.ensure_init(doc);
        this
    }

    #[must_use]
    pub const fn element(&self) -> ElementId {
        self.element
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.phase, Phase::Ready(_))
    }

    #[must_use]
    pub const fn is_waiting(&self) -> bool {
        matches!(self.phase, Phase::WaitingForForm { .. })
    }

    /// The bound form.
    #[must_use]
    pub const fn form(&self) -> Option<ElementId> {
        match self.phase {
            Phase::Ready(bound) => Some(bound.form),
            _ => None,
        }
    }

    /// The located cart surface.
    #[must_use]
    pub const fn cart(&self) -> Option<CartSurface> {
        match self.phase {
            Phase::Ready(bound) => bound.cart,
            _ => None,
        }
    }

    /// Deadline of the late-form watch.
    #[must_use]
    pub const fn next_deadline(&self) -> Option<Duration> {
        match self.phase {
            Phase::WaitingForForm { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Retry binding when the subtree changed while waiting for a form.
    pub fn on_mutations(&mut self, doc: &mut Document, mutations: &[Mutation]) -> bool {
        if !self.is_waiting() {
            return false;
        }
        let touched = mutations.iter().any(|m| match m {
            Mutation::ChildList { parent, .. } => doc.contains(self.element, *parent),
            Mutation::Attribute { .. } => false,
        });
        touched && self.ensure_init(doc)
    }

    /// Give up waiting once the deadline passed.
    pub fn poll(&mut self, now: Duration) {
        if let Phase::WaitingForForm { deadline } = self.phase
            && now >= deadline
        {
            self.phase = Phase::Inert;
            self.warn_once("no form inside product-form after waiting; skipping");
        }
    }

    /// Forget the binding (element removed from the page).
    pub fn disconnect(&mut self) {
        self.phase = Phase::Inert;
        self.in_flight = false;
    }

    /// The variant currently selected.
    #[must_use]
    pub fn variant_id<'d>(&self, doc: &'d Document) -> Option<&'d str> {
        match self.phase {
            Phase::Ready(bound) => doc.attribute(bound.variant_input, "value"),
            _ => None,
        }
    }

    /// Submit the form unless a request is already in flight.
    pub fn request_submit(
        &mut self,
        doc: &mut Document,
        client: &mut dyn CartClient,
    ) -> SubmitOutcome {
        let Phase::Ready(bound) = self.phase else {
            return SubmitOutcome::NotReady;
        };
        if doc.attribute(bound.submit, BUSY_ATTR) == Some("true") {
            return SubmitOutcome::Busy;
        }

        self.show_error(doc, None);
        doc.set_attribute_as(bound.submit, BUSY_ATTR, "true", WriteOrigin::Controller);
        doc.toggle_class_as(bound.submit, LOADING_CLASS, true, WriteOrigin::Controller);
        if let Some(spinner) = self.find(doc, ".loading__spinner") {
            doc.toggle_class_as(spinner, HIDDEN_CLASS, false, WriteOrigin::Controller);
        }

        let request = CartAddRequest {
            id: doc
                .attribute(bound.variant_input, "value")
                .unwrap_or_default()
                .to_string(),
            quantity: Selector::parse(r#"[name="quantity"]"#)
                .ok()
                .and_then(|sel| doc.query(bound.form, &sel))
                .and_then(|q| doc.attribute(q, "value"))
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(1),
        };
        self.in_flight = true;
        debug!(element = %self.element, variant = %request.id, "cart add submitted");
        if let Err(err) = client.submit(request.clone()) {
            self.complete(doc, Err(err));
            return SubmitOutcome::NotSent;
        }
        SubmitOutcome::Submitted(request)
    }

    /// Render the answer to the in-flight request.
    pub fn complete(
        &mut self,
        doc: &mut Document,
        response: Result<CartResponse, StorefrontError>,
    ) -> CompleteOutcome {
        let Phase::Ready(bound) = self.phase else {
            return CompleteOutcome::Ignored;
        };
        if !std::mem::take(&mut self.in_flight) {
            return CompleteOutcome::Ignored;
        }

        let outcome = match response {
            Err(err) => {
                warn!(element = %self.element, error = %err, "cart add failed");
                CompleteOutcome::Failed
            }
            Ok(response) if response.is_error() => {
                debug!(
                    element = %self.element,
                    message = response.message.as_deref().unwrap_or_default(),
                    "cart add rejected"
                );
                self.show_error(doc, response.description.as_deref());
                match self.sold_out_message(doc, bound.submit) {
                    Some(sold_out) => {
                        doc.toggle_class_as(bound.submit_text, HIDDEN_CLASS, true, WriteOrigin::Controller);
                        doc.toggle_class_as(sold_out, HIDDEN_CLASS, false, WriteOrigin::Controller);
                        self.error = true;
                        CompleteOutcome::SoldOut
                    }
                    None => CompleteOutcome::Rejected {
                        description: response.description,
                    },
                }
            }
            Ok(_) => match bound.cart {
                None => CompleteOutcome::RedirectToCart,
                Some(cart) => {
                    self.error = false;
                    doc.toggle_class_as(cart.element(), "is-empty", false, WriteOrigin::Controller);
                    CompleteOutcome::Added(cart)
                }
            },
        };

        doc.toggle_class_as(bound.submit, LOADING_CLASS, false, WriteOrigin::Controller);
        if !self.error {
            doc.remove_attribute_as(bound.submit, BUSY_ATTR, WriteOrigin::Controller);
        }
        if let Some(spinner) = self.find(doc, ".loading__spinner") {
            doc.toggle_class_as(spinner, HIDDEN_CLASS, true, WriteOrigin::Controller);
        }
        outcome
    }

    /// Disable or re-enable the submit button, optionally replacing its label.
    pub fn toggle_submit_button(&self, doc: &mut Document, disable: bool, text: Option<&str>) {
        let Phase::Ready(bound) = self.phase else {
            return;
        };
        if disable {
            doc.set_attribute_as(bound.submit, "disabled", "disabled", WriteOrigin::Controller);
        } else {
            doc.remove_attribute_as(bound.submit, "disabled", WriteOrigin::Controller);
        }
        if let Some(text) = text {
            doc.set_text(bound.submit_text, text);
        }
    }

    // -----------------------------------------------------------------------

    fn ensure_init(&mut self, doc: &mut Document) -> bool {
        if !self.is_waiting() {
            return false;
        }
        let Some(form) = self.find_form(doc) else {
            return false;
        };
        let Some(variant_input) = query(doc, form, r#"[name="id"]"#) else {
            self.phase = Phase::Inert;
            self.warn_once("missing input[name=\"id\"] inside form; element will no-op");
            return false;
        };
        doc.remove_attribute_as(variant_input, "disabled", WriteOrigin::Controller);

        let Some(submit) = self.find(doc, r#"[type="submit"]"#) else {
            self.phase = Phase::Inert;
            self.warn_once("missing submit button; element will no-op");
            return false;
        };
        let submit_text = query(doc, submit, "span").unwrap_or(submit);

        let body = doc.root();
        let drawer = query(doc, body, "cart-drawer");
        let cart = query(doc, body, "cart-notification")
            .map(CartSurface::Notification)
            .or(drawer.map(CartSurface::Drawer));
        if drawer.is_some() {
            doc.set_attribute_as(submit, "aria-haspopup", "dialog", WriteOrigin::Controller);
        }

        self.phase = Phase::Ready(Bound {
            form,
            variant_input,
            submit,
            submit_text,
            cart,
        });
        debug!(element = %self.element, %form, "product form bound");
        true
    }

    fn find_form(&self, doc: &Document) -> Option<ElementId> {
        query(doc, self.element, r#"form[action*="/cart/add"]"#)
            .or_else(|| query(doc, self.element, "form"))
            .or_else(|| (doc.tag(self.element) == "form").then_some(self.element))
    }

    fn find(&self, doc: &Document, selector: &str) -> Option<ElementId> {
        query(doc, self.element, selector)
    }

    fn sold_out_message(&self, doc: &Document, submit: ElementId) -> Option<ElementId> {
        query(doc, submit, ".sold-out-message")
    }

    fn show_error(&self, doc: &mut Document, message: Option<&str>) {
        if self.hide_errors {
            return;
        }
        let Some(wrapper) = self.find(doc, ".product-form__error-message-wrapper") else {
            return;
        };
        doc.toggle_attribute_as(wrapper, "hidden", message.is_none(), WriteOrigin::Controller);
        if let Some(message) = message
            && let Some(text) = query(doc, wrapper, ".product-form__error-message")
        {
            doc.set_text(text, message);
        }
    }

    fn warn_once(&mut self, message: &'static str) {
        if !std::mem::replace(&mut self.warned, true) {
            warn!(element = %self.element, "{message}");
        }
    }
}

fn query(doc: &Document, scope: ElementId, selector: &str) -> Option<ElementId> {
    Selector::parse(selector)
        .ok()
        .and_then(|sel| doc.query(scope, &sel))
}
