use crate::runtime::test_support::{assert_approx, bone};
use crate::{
    Attachment, BoneData, MeshVertices, MixBlend, MixDirection, PathAttachment,
    PathConstraintData, PathConstraintProperty, PathConstraintTimeline, PositionMode, Skeleton,
    SkeletonData, SkinData, SlotData, Timeline,
};
use std::sync::Arc;

/// Straight path from (0, 0) up to (0, 100) with evenly spaced handles.
fn vertical_path() -> Attachment {
    let third = 100.0 / 3.0;
    let vertices = vec![
        [0.0, -10.0],
        [0.0, 0.0],
        [0.0, third],
        [0.0, third * 2.0],
        [0.0, 100.0],
        [0.0, 110.0],
    ];
    Attachment::Path(PathAttachment::new(
        "rail",
        MeshVertices::Unweighted(vertices),
        vec![100.0],
    ))
}

/// `root` holding the path slot, `first` (length 10) at (20, 0) and `second` (length 10) at
/// the end of `first`.
fn rig(with_path: bool, configure: impl FnOnce(&mut PathConstraintData)) -> Skeleton {
    rig_with(with_path.then(vertical_path), configure)
}

fn rig_with(path: Option<Attachment>, configure: impl FnOnce(&mut PathConstraintData)) -> Skeleton {
    let mut first = bone("first", Some(0), 20.0, 0.0, 0.0);
    first.length = 10.0;
    let mut second = bone("second", Some(1), 10.0, 0.0, 0.0);
    second.length = 10.0;
    let mut slot = SlotData::new("path", 0);
    let mut skin = SkinData::new("default");
    if let Some(path) = path {
        slot.attachment_name = Some("rail".to_string());
        skin.set_attachment(0, "rail", path);
    }
    let mut constraint = PathConstraintData::new("follow", vec![1], 0);
    configure(&mut constraint);
    let data = SkeletonData {
        bones: vec![BoneData::new("root", None), first, second],
        slots: vec![slot],
        skins: vec![skin],
        default_skin: Some(0),
        path_constraints: vec![constraint],
        ..SkeletonData::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    skeleton
}

#[test]
fn percent_position_places_the_bone_along_the_path() {
    let skeleton = rig(true, |c| c.position = 0.5);
    let first = &skeleton.bones[1];
    assert_approx(first.world_x, 0.0, 0.05);
    assert_approx(first.world_y, 50.0, 0.05);
    assert_approx(first.world_rotation_x(), 90.0, 0.1);
}

#[test]
fn constraint_state_survives_repeated_updates() {
    let mut skeleton = rig(true, |c| c.position = 0.5);
    skeleton.update_world_transform();
    let constraint = &skeleton.path_constraints[0];
    assert_eq!(constraint.bones, vec![1]);
    assert_approx(constraint.position, 0.5, 0.0);
    assert_approx(skeleton.bones[1].world_y, 50.0, 0.05);
}

#[test]
fn fixed_position_is_a_distance() {
    let skeleton = rig(true, |c| {
        c.position_mode = PositionMode::Fixed;
        c.position = 25.0;
    });
    assert_approx(skeleton.bones[1].world_y, 25.0, 0.05);
}

#[test]
fn length_spacing_chains_bones() {
    let skeleton = rig(true, |c| c.bones = vec![1, 2]);
    let (first, second) = (&skeleton.bones[1], &skeleton.bones[2]);
    assert_approx(first.world_x, 0.0, 0.05);
    assert_approx(first.world_y, 0.0, 0.05);
    assert_approx(second.world_x, 0.0, 0.05);
    assert_approx(second.world_y, 10.0, 0.05);
    assert_approx(second.world_rotation_x(), 90.0, 0.1);
}

#[test]
fn translate_mixes_blend_toward_the_path() {
    let skeleton = rig(true, |c| {
        c.position = 0.5;
        c.mix_rotate = 0.0;
        c.mix_x = 0.5;
        c.mix_y = 0.5;
    });
    let first = &skeleton.bones[1];
    assert_approx(first.world_x, 10.0, 0.05);
    assert_approx(first.world_y, 25.0, 0.05);
    assert_approx(first.world_rotation_x(), 0.0, 1e-3);
}

#[test]
fn missing_path_attachment_leaves_bones_alone() {
    let skeleton = rig(false, |c| c.position = 0.5);
    let first = &skeleton.bones[1];
    assert_approx(first.world_x, 20.0, 1e-5);
    assert_approx(first.world_y, 0.0, 1e-5);
}

#[test]
fn closed_path_without_vertices_leaves_bones_alone() {
    for vertices in [vec![], vec![[0.0, 0.0]]] {
        let mut path = PathAttachment::new("rail", MeshVertices::Unweighted(vertices), vec![]);
        path.closed = true;
        path.constant_speed = true;
        let skeleton = rig_with(Some(Attachment::Path(path)), |c| c.position = 0.5);
        let first = &skeleton.bones[1];
        assert_approx(first.world_x, 20.0, 1e-5);
        assert_approx(first.world_y, 0.0, 1e-5);
    }
}

#[test]
fn open_path_shorter_than_a_curve_leaves_bones_alone() {
    let vertices = vec![[0.0, 0.0], [0.0, 10.0], [0.0, 20.0]];
    let path = PathAttachment::new("rail", MeshVertices::Unweighted(vertices), vec![]);
    let skeleton = rig_with(Some(Attachment::Path(path)), |c| c.position = 0.5);
    assert_approx(skeleton.bones[1].world_x, 20.0, 1e-5);
    assert_approx(skeleton.bones[1].world_y, 0.0, 1e-5);
}

#[test]
fn timeline_keys_position() {
    let mut skeleton = rig(true, |_| {});
    let mut timeline = PathConstraintTimeline::new(PathConstraintProperty::Position, 0, 1, 0);
    timeline.frames.set_frame(0, 0.0, &[0.25]);
    let timeline: Timeline = timeline.into();
    timeline.apply(
        &mut skeleton,
        -1.0,
        0.0,
        None,
        1.0,
        MixBlend::Replace,
        MixDirection::In,
    );
    assert_approx(skeleton.path_constraints[0].position, 0.25, 0.0);

    skeleton.update_world_transform();
    assert_approx(skeleton.bones[1].world_y, 25.0, 0.05);
}
