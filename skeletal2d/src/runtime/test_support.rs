//! Hand-built skeleton data shared by the runtime tests.

use crate::{
    Animation, BoneData, BoneProperty, BoneTimeline, SkeletonData, SlotData, Timeline,
};
use std::sync::Arc;

pub(crate) fn assert_approx(actual: f32, expected: f32, epsilon: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= epsilon,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

pub(crate) fn bone(name: &str, parent: Option<usize>, x: f32, y: f32, rotation: f32) -> BoneData {
    let mut data = BoneData::new(name, parent);
    data.x = x;
    data.y = y;
    data.rotation = rotation;
    data
}

/// `root` at the origin with no slots.
pub(crate) fn root_only() -> SkeletonData {
    SkeletonData {
        bones: vec![BoneData::new("root", None)],
        ..SkeletonData::default()
    }
}

/// `root` -> `upper` (length 10) -> `lower` (length 10, at the end of `upper`), plus a free
/// `target` bone under root and one slot on `lower`.
pub(crate) fn arm() -> SkeletonData {
    let mut upper = bone("upper", Some(0), 0.0, 0.0, 0.0);
    upper.length = 10.0;
    let mut lower = bone("lower", Some(1), 10.0, 0.0, 0.0);
    lower.length = 10.0;
    SkeletonData {
        bones: vec![
            BoneData::new("root", None),
            upper,
            lower,
            bone("target", Some(0), 15.0, 0.0, 0.0),
        ],
        slots: vec![SlotData::new("hand", 2)],
        ..SkeletonData::default()
    }
}

/// Linear keys of a single-value bone timeline.
pub(crate) fn bone_keys(property: BoneProperty, bone: usize, keys: &[(f32, f32)]) -> Timeline {
    let mut timeline = BoneTimeline::new(property, bone, keys.len(), 0);
    for (frame, &(time, value)) in keys.iter().enumerate() {
        timeline.frames.set_frame(frame, time, &[value]);
    }
    timeline.into()
}

/// Linear keys of a two-value bone timeline (translate, scale, shear).
pub(crate) fn bone_keys2(
    property: BoneProperty,
    bone: usize,
    keys: &[(f32, f32, f32)],
) -> Timeline {
    let mut timeline = BoneTimeline::new(property, bone, keys.len(), 0);
    for (frame, &(time, x, y)) in keys.iter().enumerate() {
        timeline.frames.set_frame(frame, time, &[x, y]);
    }
    timeline.into()
}

pub(crate) fn animation(name: &str, timelines: Vec<Timeline>) -> Arc<Animation> {
    Arc::new(Animation::from_timelines(name, timelines))
}
