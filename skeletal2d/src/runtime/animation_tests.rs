use crate::runtime::test_support::{animation, assert_approx, bone_keys, root_only};
use crate::{
    Animation, BoneProperty, Event, EventData, EventTimeline, MixBlend, MixDirection, Property,
    PropertyId, Skeleton,
};
use std::sync::Arc;

fn spin() -> Arc<Animation> {
    animation(
        "spin",
        vec![bone_keys(
            BoneProperty::Rotate,
            0,
            &[(0.0, 0.0), (1.0, 90.0), (2.0, 180.0)],
        )],
    )
}

#[test]
fn duration_comes_from_the_last_key() {
    assert_approx(spin().duration, 2.0, 0.0);
    assert_approx(Animation::from_timelines("empty", Vec::new()).duration, 0.0, 0.0);
    assert_approx(Animation::new("padded", Vec::new(), 3.0).duration, 3.0, 0.0);
}

#[test]
fn has_timeline_checks_property_ids() {
    let spin = spin();
    assert!(spin.has_timeline(&[PropertyId::new(Property::Rotate, 0)]));
    assert!(!spin.has_timeline(&[PropertyId::new(Property::Rotate, 1)]));
    assert!(!spin.has_timeline(&[PropertyId::new(Property::X, 0)]));
    assert_eq!(spin.timelines().len(), 1);
}

#[test]
fn looping_wraps_time_into_duration() {
    let spin = spin();
    let mut skeleton = Skeleton::new(Arc::new(root_only()));
    spin.apply(
        &mut skeleton,
        -1.0,
        2.5,
        true,
        None,
        1.0,
        MixBlend::Setup,
        MixDirection::In,
    );
    assert_approx(skeleton.bones[0].rotation, 45.0, 1e-4);

    spin.apply(
        &mut skeleton,
        -1.0,
        2.5,
        false,
        None,
        1.0,
        MixBlend::Setup,
        MixDirection::In,
    );
    assert_approx(skeleton.bones[0].rotation, 180.0, 1e-4);
}

#[test]
fn looped_events_fire_across_the_wrap() {
    let data = EventData::new("footstep");
    let events = EventTimeline::new(vec![Event::new(0, &data, 0.25), Event::new(0, &data, 0.75)]);
    let walk = Animation::new("walk", vec![events.into()], 1.0);
    let mut skeleton = Skeleton::new(Arc::new(root_only()));

    let mut fired = Vec::new();
    walk.apply(
        &mut skeleton,
        0.9,
        1.3,
        true,
        Some(&mut fired),
        1.0,
        MixBlend::Replace,
        MixDirection::In,
    );
    assert_eq!(fired.len(), 1);
    assert_approx(fired[0].time, 0.25, 0.0);
    assert_eq!(fired[0].name, "footstep");
}

#[test]
fn applying_the_same_time_twice_is_idempotent() {
    let spin = spin();
    let mut skeleton = Skeleton::new(Arc::new(root_only()));
    for _ in 0..2 {
        spin.apply(
            &mut skeleton,
            -1.0,
            0.5,
            false,
            None,
            1.0,
            MixBlend::Replace,
            MixDirection::In,
        );
    }
    assert_approx(skeleton.bones[0].rotation, 45.0, 1e-4);
}
