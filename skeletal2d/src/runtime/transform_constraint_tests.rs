use crate::runtime::test_support::{assert_approx, bone};
use crate::{
    BoneData, MixBlend, MixDirection, Skeleton, SkeletonData, Timeline, TransformConstraintData,
    TransformConstraintTimeline,
};
use std::sync::Arc;

/// `follower` at the origin rotated 30 degrees, `leader` at (10, 5) rotated 45 with x scale 2.
fn rig(configure: impl FnOnce(&mut TransformConstraintData)) -> Skeleton {
    let mut leader = bone("leader", Some(0), 10.0, 5.0, 45.0);
    leader.scale_x = 2.0;
    let mut constraint = TransformConstraintData::new("follow", vec![1], 2);
    configure(&mut constraint);
    let data = SkeletonData {
        bones: vec![
            BoneData::new("root", None),
            bone("follower", Some(0), 0.0, 0.0, 30.0),
            leader,
        ],
        transform_constraints: vec![constraint],
        ..SkeletonData::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    skeleton
}

#[test]
fn absolute_world_copies_the_target() {
    let skeleton = rig(|_| {});
    let follower = &skeleton.bones[1];
    assert_approx(follower.world_x, 10.0, 1e-4);
    assert_approx(follower.world_y, 5.0, 1e-4);
    assert_approx(follower.world_rotation_x(), 45.0, 1e-3);
    assert_approx(follower.world_scale_x(), 2.0, 1e-4);
    assert_approx(follower.world_scale_y(), 1.0, 1e-4);
    // Applied values are recomputed from the constrained world transform.
    assert_approx(follower.arotation, 45.0, 1e-3);
    assert_approx(follower.ax, 10.0, 1e-4);
}

#[test]
fn constraint_state_survives_repeated_updates() {
    let mut skeleton = rig(|_| {});
    skeleton.update_world_transform();
    let constraint = &skeleton.transform_constraints[0];
    assert_eq!(constraint.bones, vec![1]);
    assert_eq!(constraint.target, 2);
    assert_approx(constraint.mix_rotate, 1.0, 0.0);
    assert_approx(skeleton.bones[1].world_x, 10.0, 1e-4);
    assert_approx(skeleton.bones[1].world_rotation_x(), 45.0, 1e-3);
}

#[test]
fn partial_mixes_blend_each_channel_independently() {
    let skeleton = rig(|c| {
        c.mix_rotate = 0.5;
        c.mix_x = 0.0;
        c.mix_y = 0.0;
        c.mix_scale_x = 0.0;
        c.mix_scale_y = 0.0;
        c.mix_shear_y = 0.0;
    });
    let follower = &skeleton.bones[1];
    assert_approx(follower.world_rotation_x(), 37.5, 1e-3);
    assert_approx(follower.world_x, 0.0, 1e-5);
    assert_approx(follower.world_scale_x(), 1.0, 1e-4);
}

#[test]
fn rotation_offset_is_added() {
    let skeleton = rig(|c| c.offset_rotation = 10.0);
    assert_approx(skeleton.bones[1].world_rotation_x(), 55.0, 1e-3);
}

#[test]
fn absolute_local_copies_local_values() {
    let skeleton = rig(|c| {
        c.local = true;
        c.offset_x = 1.0;
    });
    let follower = &skeleton.bones[1];
    assert_approx(follower.arotation, 45.0, 1e-3);
    assert_approx(follower.ax, 11.0, 1e-4);
    assert_approx(follower.ay, 5.0, 1e-4);
    assert_approx(follower.ascale_x, 2.0, 1e-4);
}

#[test]
fn relative_local_adds_target_values() {
    let skeleton = rig(|c| {
        c.local = true;
        c.relative = true;
    });
    let follower = &skeleton.bones[1];
    assert_approx(follower.arotation, 75.0, 1e-3);
    assert_approx(follower.ax, 10.0, 1e-4);
    assert_approx(follower.ascale_x, 2.0, 1e-4);
}

#[test]
fn relative_world_adds_target_rotation() {
    let skeleton = rig(|c| {
        c.relative = true;
        c.mix_x = 0.0;
        c.mix_y = 0.0;
        c.mix_scale_x = 0.0;
        c.mix_scale_y = 0.0;
        c.mix_shear_y = 0.0;
    });
    assert_approx(skeleton.bones[1].world_rotation_x(), 75.0, 1e-3);
}

#[test]
fn inert_constraint_leaves_bones_alone() {
    let skeleton = rig(|c| {
        c.mix_rotate = 0.0;
        c.mix_x = 0.0;
        c.mix_y = 0.0;
        c.mix_scale_x = 0.0;
        c.mix_scale_y = 0.0;
        c.mix_shear_y = 0.0;
    });
    assert_approx(skeleton.bones[1].world_rotation_x(), 30.0, 1e-3);
}

#[test]
fn timeline_keys_the_mixes() {
    let mut skeleton = rig(|_| {});
    let mut timeline = TransformConstraintTimeline::new(0, 2, 0);
    timeline.frames.set_frame(0, 0.0, &[0.0; 6]);
    timeline.frames.set_frame(1, 1.0, &[1.0, 0.5, 0.5, 0.0, 0.0, 0.0]);
    let timeline: Timeline = timeline.into();
    timeline.apply(
        &mut skeleton,
        -1.0,
        0.5,
        None,
        1.0,
        MixBlend::Replace,
        MixDirection::In,
    );
    let constraint = &skeleton.transform_constraints[0];
    assert_approx(constraint.mix_rotate, 0.5, 1e-6);
    assert_approx(constraint.mix_x, 0.25, 1e-6);
    assert_approx(constraint.mix_scale_x, 0.0, 0.0);

    skeleton.set_bones_to_setup_pose();
    assert_approx(skeleton.transform_constraints[0].mix_rotate, 1.0, 0.0);
}
