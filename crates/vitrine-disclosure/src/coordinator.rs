#![forbid(unsafe_code)]

//! Mutual exclusion within a sibling group.
//!
//! The coordinator only sees the [`Disclosure`] capability, so any widget that
//! can be opened and force-closed can join a group.

use crate::turn::Turn;

/// Per-instance capability used by the coordinator and external callers.
pub trait Disclosure {
    /// Request the expanded state. No-op when already expanded.
    fn open(&mut self, turn: &mut Turn<'_>);

    /// Request the collapsed state. With `force`, runs even when the instance
    /// is already collapsed or collapsing.
    fn close(&mut self, turn: &mut Turn<'_>, force: bool);

    /// Whether the instance is opening or open.
    fn is_expanded(&self) -> bool;
}

/// Closes every other member of a group before one opens.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiblingCoordinator;

impl SiblingCoordinator {
    /// Force-close every disclosure in `siblings`, synchronously.
    ///
    /// `siblings` is already narrowed to one group minus the requester; the
    /// runtime passes [`Registry::siblings_mut(group, except)`](crate::Registry::siblings_mut).
    /// Returns how many were logically expanded before the call.
    pub fn close_others<'a, I, D>(siblings: I, turn: &mut Turn<'_>) -> usize
    where
        I: IntoIterator<Item = &'a mut D>,
        D: Disclosure + ?Sized + 'a,
    {
        let mut collapsed = 0;
        for sibling in siblings {
            if sibling.is_expanded() {
                collapsed += 1;
            }
            sibling.close(turn, true);
        }
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vitrine_core::animation::UnsupportedPlatform;
    use vitrine_core::clock::TimerQueue;
    use vitrine_core::dom::Document;

    #[derive(Default)]
    struct Probe {
        expanded: bool,
        forced: u32,
    }

    impl Disclosure for Probe {
        fn open(&mut self, _turn: &mut Turn<'_>) {
            self.expanded = true;
        }

        fn close(&mut self, _turn: &mut Turn<'_>, force: bool) {
            if force {
                self.forced += 1;
            }
            self.expanded = false;
        }

        fn is_expanded(&self) -> bool {
            self.expanded
        }
    }

    #[test]
    fn force_closes_every_sibling() {
        let mut doc = Document::new();
        let mut platform = UnsupportedPlatform;
        let mut timers = TimerQueue::new();
        let mut turn = Turn {
            doc: &mut doc,
            platform: &mut platform,
            timers: &mut timers,
            now: Duration::ZERO,
        };
        let mut probes = vec![
            Probe {
                expanded: true,
                ..Probe::default()
            },
            Probe::default(),
        ];
        let collapsed = SiblingCoordinator::close_others(probes.iter_mut(), &mut turn);
        assert_eq!(collapsed, 1);
        assert!(probes.iter().all(|p| !p.is_expanded()));
        assert!(probes.iter().all(|p| p.forced == 1));
    }
}
