//! Integration tests for transitions played on the simulated platform.

use std::time::Duration;

use vitrine_core::animation::*;
use vitrine_core::dom::Document;

const MS_350: Duration = Duration::from_millis(350);

fn panel_timing() -> Timing {
    Timing {
        duration: MS_350,
        easing: Easing::PANEL,
    }
}

fn opening() -> Keyframes {
    Keyframes::new(Frame::hidden(-16.0), Frame::SHOWN)
}

#[test]
fn transition_tracks_many_small_ticks() {
    let mut t = Transition::new(opening(), MS_350, Easing::PANEL);
    for _ in 0..350 {
        t.tick(Duration::from_millis(1));
    }
    assert!(t.is_complete(), "350x1ms should complete a 350ms transition");
    assert_eq!(t.frame(), Frame::SHOWN);
}

#[test]
fn eased_frames_move_monotonically_toward_target() {
    let mut t = Transition::new(opening(), MS_350, Easing::PANEL);
    let mut prev = t.frame();
    for _ in 0..35 {
        t.tick(Duration::from_millis(10));
        let frame = t.frame();
        assert!(frame.opacity >= prev.opacity - 1e-4, "{frame:?} after {prev:?}");
        assert!(frame.offset_y >= prev.offset_y - 1e-3, "{frame:?} after {prev:?}");
        prev = frame;
    }
}

#[test]
fn platform_samples_follow_the_transition() {
    let mut doc = Document::new();
    let panel = doc.append_new(doc.root(), "div");
    let mut platform = SimulatedPlatform::new();
    let start = Duration::from_millis(40);
    let id = platform.play(panel, opening(), panel_timing(), start).unwrap();
    assert_eq!(platform.target_of(id), Some(panel));

    let mut reference = Transition::new(opening(), MS_350, Easing::PANEL);
    reference.tick(Duration::from_millis(100));
    assert_eq!(platform.sample(id, start + Duration::from_millis(100)), Some(reference.frame()));
    assert_eq!(platform.sample(id, start + MS_350 * 2), Some(Frame::SHOWN));
}

#[test]
fn notifications_drain_in_due_order() {
    let mut doc = Document::new();
    let a = doc.append_new(doc.root(), "div");
    let b = doc.append_new(doc.root(), "div");
    let mut platform = SimulatedPlatform::new();
    let late = platform.play(a, opening(), panel_timing(), Duration::from_millis(50)).unwrap();
    let early = platform.play(b, opening(), panel_timing(), Duration::ZERO).unwrap();
    assert_eq!(platform.next_notification(), Some(MS_350));
    assert_eq!(platform.take_notifications(Duration::from_secs(1)), vec![early, late]);
}

#[test]
fn finish_suppresses_notification() {
    let mut doc = Document::new();
    let panel = doc.append_new(doc.root(), "div");
    let mut platform = SimulatedPlatform::new().with_stale_notifications();
    let id = platform.play(panel, opening(), panel_timing(), Duration::ZERO).unwrap();
    platform.finish(id);
    assert!(platform.take_notifications(Duration::from_secs(1)).is_empty());
    assert_eq!(platform.played(), 1);
}
