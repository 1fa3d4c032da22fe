use crate::runtime::test_support::{arm, assert_approx};
use crate::{
    IkConstraintData, IkConstraintTimeline, MixBlend, MixDirection, Skeleton, SkeletonData,
    Timeline,
};
use std::sync::Arc;

fn with_ik(target: (f32, f32), configure: impl FnOnce(&mut IkConstraintData)) -> Skeleton {
    let mut data: SkeletonData = arm();
    data.bones[3].x = target.0;
    data.bones[3].y = target.1;
    let mut ik = IkConstraintData::new("reach", vec![1, 2], 3);
    configure(&mut ik);
    data.ik_constraints.push(ik);
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    skeleton
}

/// World position of the tip of `lower`.
fn tip(skeleton: &Skeleton) -> (f32, f32) {
    skeleton.bones[2].local_to_world(10.0, 0.0)
}

#[test]
fn one_bone_ik_aims_at_the_target() {
    let skeleton = with_ik((0.0, 10.0), |ik| ik.bones = vec![1]);
    assert_approx(skeleton.bones[1].world_rotation_x(), 90.0, 1e-3);
    assert_approx(skeleton.bones[1].arotation, 90.0, 1e-3);
}

#[test]
fn one_bone_stretch_scales_toward_the_target() {
    let skeleton = with_ik((15.0, 0.0), |ik| {
        ik.bones = vec![1];
        ik.stretch = true;
    });
    assert_approx(skeleton.bones[1].ascale_x, 1.5, 1e-4);
    // The child is updated after the constraint, so it follows the stretched parent.
    assert_approx(skeleton.bones[2].world_x, 15.0, 1e-3);

    let half = with_ik((15.0, 0.0), |ik| {
        ik.bones = vec![1];
        ik.stretch = true;
        ik.mix = 0.5;
    });
    assert_approx(half.bones[1].ascale_x, 1.25, 1e-4);
}

#[test]
fn compress_only_shrinks() {
    let far = with_ik((15.0, 0.0), |ik| {
        ik.bones = vec![1];
        ik.compress = true;
    });
    assert_approx(far.bones[1].ascale_x, 1.0, 1e-6);
    let near = with_ik((5.0, 0.0), |ik| {
        ik.bones = vec![1];
        ik.compress = true;
    });
    assert_approx(near.bones[1].ascale_x, 0.5, 1e-4);
}

#[test]
fn two_bone_ik_reaches_a_reachable_target() {
    for bend in [1, -1] {
        let skeleton = with_ik((10.0, 10.0), |ik| ik.bend_direction = bend);
        let (x, y) = tip(&skeleton);
        assert_approx(x, 10.0, 1e-3);
        assert_approx(y, 10.0, 1e-3);
    }
}

#[test]
fn bend_direction_picks_the_elbow_side() {
    let up = with_ik((10.0, 10.0), |ik| ik.bend_direction = 1);
    assert_approx(up.bones[1].world_rotation_x(), 0.0, 1e-3);
    assert_approx(up.bones[2].world_rotation_x(), 90.0, 1e-3);

    let down = with_ik((10.0, 10.0), |ik| ik.bend_direction = -1);
    assert_approx(down.bones[1].world_rotation_x(), 90.0, 1e-3);
    assert_approx(down.bones[2].world_rotation_x(), 0.0, 1e-3);
}

#[test]
fn two_bone_ik_straightens_toward_an_unreachable_target() {
    let skeleton = with_ik((30.0, 0.0), |_| {});
    let (x, y) = tip(&skeleton);
    assert_approx(x, 20.0, 1e-3);
    assert_approx(y, 0.0, 1e-3);

    let stretched = with_ik((30.0, 0.0), |ik| ik.stretch = true);
    assert_approx(stretched.bones[1].ascale_x, 1.5, 1e-4);
    let (x, _) = tip(&stretched);
    assert_approx(x, 30.0, 1e-3);
}

#[test]
fn zero_mix_leaves_the_pose_alone() {
    let skeleton = with_ik((10.0, 10.0), |ik| ik.mix = 0.0);
    let (x, y) = tip(&skeleton);
    assert_approx(x, 20.0, 1e-4);
    assert_approx(y, 0.0, 1e-4);
}

#[test]
fn ik_timeline_keys_mix_and_flags() {
    let mut skeleton = with_ik((10.0, 10.0), |_| {});
    let mut timeline = IkConstraintTimeline::new(0, 2, 0);
    timeline.set_frame(0, 0.0, 0.0, 0.0, -1, false, true);
    timeline.set_frame(1, 1.0, 1.0, 4.0, 1, true, false);
    let timeline: Timeline = timeline.into();

    timeline.apply(
        &mut skeleton,
        -1.0,
        0.5,
        None,
        1.0,
        MixBlend::Setup,
        MixDirection::In,
    );
    let constraint = &skeleton.ik_constraints[0];
    assert_approx(constraint.mix, 0.5, 1e-6);
    assert_approx(constraint.softness, 2.0, 1e-6);
    assert_eq!(constraint.bend_direction, -1);
    assert!(constraint.stretch);
    assert!(!constraint.compress);

    timeline.apply(
        &mut skeleton,
        -1.0,
        0.5,
        None,
        1.0,
        MixBlend::Setup,
        MixDirection::Out,
    );
    // Mixing out keeps the setup flags.
    let constraint = &skeleton.ik_constraints[0];
    assert_eq!(constraint.bend_direction, 1);
    assert!(!constraint.stretch);
}
