use crate::runtime::curve::search;
use crate::runtime::test_support::assert_approx;
use crate::{BEZIER, CurveFrames, STEPPED};

fn two_keys(from: f32, to: f32) -> CurveFrames {
    let mut frames = CurveFrames::new(2, 0, 1);
    frames.set_frame(0, 0.0, &[from]);
    frames.set_frame(1, 1.0, &[to]);
    frames
}

#[test]
fn search_returns_last_key_at_or_before_time() {
    let frames = [0.0, 10.0, 0.5, 20.0, 1.0, 30.0];
    assert_eq!(search(&frames, 2, -1.0), 0);
    assert_eq!(search(&frames, 2, 0.0), 0);
    assert_eq!(search(&frames, 2, 0.49), 0);
    assert_eq!(search(&frames, 2, 0.5), 2);
    assert_eq!(search(&frames, 2, 0.75), 2);
    assert_eq!(search(&frames, 2, 1.0), 4);
    assert_eq!(search(&frames, 2, 7.0), 4);
    assert_eq!(search(&[], 2, 1.0), 0);
}

#[test]
fn last_frame_is_stepped_and_duration_is_last_key() {
    let frames = two_keys(0.0, 10.0);
    assert_eq!(frames.curves()[1], STEPPED);
    assert_eq!(frames.frame_count(), 2);
    assert_eq!(frames.frame_entries(), 2);
    assert_approx(frames.duration(), 1.0, 0.0);
    assert_approx(frames.value(5.0), 10.0, 0.0);
}

#[test]
fn linear_and_stepped_segments() {
    let mut frames = two_keys(0.0, 10.0);
    assert_approx(frames.value(0.25), 2.5, 1e-6);
    frames.set_stepped(0);
    assert_approx(frames.value(0.99), 0.0, 0.0);
    frames.set_linear(0);
    assert_approx(frames.value(0.5), 5.0, 1e-6);
}

#[test]
fn bezier_with_linear_handles_matches_linear() {
    let mut frames = CurveFrames::new(2, 1, 1);
    frames.set_frame(0, 0.0, &[0.0]);
    frames.set_frame(1, 1.0, &[10.0]);
    // Handles on the straight line between the keys.
    frames.set_bezier(0, 0, 0, 0.0, 0.0, 1.0 / 3.0, 10.0 / 3.0, 2.0 / 3.0, 20.0 / 3.0, 1.0, 10.0);
    assert!(frames.curves()[0] >= BEZIER);
    for step in 0..=10 {
        let t = step as f32 / 10.0;
        assert_approx(frames.value(t), t * 10.0, 1e-3);
    }
}

#[test]
fn ease_in_bezier_starts_slow_and_ends_at_key() {
    let mut frames = CurveFrames::new(2, 1, 1);
    frames.set_frame(0, 0.0, &[0.0]);
    frames.set_frame(1, 1.0, &[1.0]);
    frames.set_bezier(0, 0, 0, 0.0, 0.0, 0.75, 0.0, 1.0, 1.0, 1.0, 1.0);
    let early = frames.value(0.25);
    assert!(early < 0.25, "ease-in should lag linear, got {early}");
    assert_approx(frames.value(1.0), 1.0, 1e-6);
    let mut last = 0.0;
    for step in 1..=20 {
        let value = frames.value(step as f32 / 20.0);
        assert!(value >= last - 1e-6, "curve must be monotonic");
        last = value;
    }
}

#[test]
fn percent_bezier_maps_time_to_blend_fraction() {
    let mut frames = CurveFrames::new(2, 1, 0);
    frames.set_frame(0, 0.0, &[]);
    frames.set_frame(1, 2.0, &[]);
    assert_approx(frames.percent(1.0, 0), 0.5, 1e-6);
    frames.set_percent_bezier(0, 0, 0.0, 2.0 / 3.0, 1.0 / 3.0, 4.0 / 3.0, 2.0 / 3.0, 2.0);
    assert_approx(frames.percent(1.0, 0), 0.5, 1e-3);
    assert_approx(frames.percent(2.0, 0), 1.0, 1e-3);
}

#[test]
fn sample_two_values_interpolates_independently() {
    let mut frames = CurveFrames::new(2, 0, 2);
    frames.set_frame(0, 0.0, &[0.0, 100.0]);
    frames.set_frame(1, 2.0, &[10.0, 0.0]);
    let (index, [x, y]) = frames.sample::<2>(0.5);
    assert_eq!(index, 0);
    assert_approx(x, 2.5, 1e-6);
    assert_approx(y, 75.0, 1e-4);
}
