use crate::runtime::test_support::{arm, assert_approx, bone, root_only};
use crate::{
    Attachment, Error, IkConstraintData, RegionAttachment, Skeleton, SkeletonData, SkinData,
    SlotData, TransformMode, UpdateCacheItem,
};
use std::sync::Arc;

/// Root rotated and scaled, with a single child at x = 5 using `mode`.
fn inherit(root_rotation: f32, root_scale_x: f32, mode: TransformMode) -> Skeleton {
    let mut root = bone("root", None, 0.0, 0.0, root_rotation);
    root.scale_x = root_scale_x;
    let mut child = bone("child", Some(0), 5.0, 0.0, 0.0);
    child.transform_mode = mode;
    let mut skeleton = Skeleton::new(Arc::new(SkeletonData {
        bones: vec![root, child],
        ..SkeletonData::default()
    }));
    skeleton.update_world_transform();
    skeleton
}

fn determinant(skeleton: &Skeleton, index: usize) -> f32 {
    let b = &skeleton.bones[index];
    b.a * b.d - b.b * b.c
}

#[test]
fn normal_mode_composes_parent_transform() {
    let mut data = arm();
    data.bones[1].rotation = 90.0;
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    let lower = &skeleton.bones[2];
    assert_approx(lower.world_x, 0.0, 1e-4);
    assert_approx(lower.world_y, 10.0, 1e-4);
    assert_approx(lower.world_rotation_x(), 90.0, 1e-3);
}

#[test]
fn skeleton_position_and_scale_apply_to_the_root() {
    let mut skeleton = Skeleton::new(Arc::new(arm()));
    skeleton.x = 100.0;
    skeleton.y = 50.0;
    skeleton.scale_x = -1.0;
    skeleton.update_world_transform();
    let lower = &skeleton.bones[2];
    assert_approx(lower.world_x, 90.0, 1e-4);
    assert_approx(lower.world_y, 50.0, 1e-4);
}

#[test]
fn only_translation_ignores_parent_rotation_and_scale() {
    let skeleton = inherit(90.0, 2.0, TransformMode::OnlyTranslation);
    let child = &skeleton.bones[1];
    assert_approx(child.world_x, 0.0, 1e-4);
    assert_approx(child.world_y, 10.0, 1e-4);
    assert_approx(child.a, 1.0, 1e-5);
    assert_approx(child.c, 0.0, 1e-5);
    assert_approx(child.d, 1.0, 1e-5);
}

#[test]
fn no_rotation_or_reflection_keeps_world_rotation() {
    let skeleton = inherit(90.0, 1.0, TransformMode::NoRotationOrReflection);
    let child = &skeleton.bones[1];
    assert_approx(child.world_rotation_x(), 0.0, 1e-3);
    assert_approx(child.world_y, 5.0, 1e-4);
}

#[test]
fn no_scale_keeps_parent_rotation_but_not_scale() {
    let skeleton = inherit(90.0, 3.0, TransformMode::NoScale);
    let child = &skeleton.bones[1];
    assert_approx(child.world_rotation_x(), 90.0, 1e-3);
    assert_approx(child.world_scale_x(), 1.0, 1e-4);
    assert_approx(child.world_scale_y(), 1.0, 1e-4);
    assert_approx(child.world_y, 15.0, 1e-4);

    let normal = inherit(90.0, 3.0, TransformMode::Normal);
    assert_approx(normal.bones[1].world_scale_x(), 3.0, 1e-4);
}

#[test]
fn reflection_is_inherited_only_by_no_scale() {
    let keeps = inherit(0.0, -1.0, TransformMode::NoScale);
    assert!(determinant(&keeps, 1) < 0.0);
    let drops = inherit(0.0, -1.0, TransformMode::NoScaleOrReflection);
    assert!(determinant(&drops, 1) > 0.0);
}

#[test]
fn two_bone_ik_runs_after_its_bones_and_resorts_children() {
    let mut data = arm();
    data.ik_constraints
        .push(IkConstraintData::new("reach", vec![1, 2], 3));
    let skeleton = Skeleton::new(Arc::new(data));
    assert_eq!(
        skeleton.update_cache_items(),
        &[
            UpdateCacheItem::Bone(0),
            UpdateCacheItem::Bone(3),
            UpdateCacheItem::Bone(1),
            UpdateCacheItem::Bone(2),
            UpdateCacheItem::Ik(0),
        ]
    );
}

#[test]
fn one_bone_ik_updates_children_after_the_constraint() {
    let mut data = arm();
    data.ik_constraints
        .push(IkConstraintData::new("aim", vec![1], 3));
    let skeleton = Skeleton::new(Arc::new(data));
    assert_eq!(
        skeleton.update_cache_items(),
        &[
            UpdateCacheItem::Bone(0),
            UpdateCacheItem::Bone(3),
            UpdateCacheItem::Bone(1),
            UpdateCacheItem::Ik(0),
            UpdateCacheItem::Bone(2),
        ]
    );
}

#[test]
fn constraints_are_sorted_by_order() {
    let mut data = arm();
    let mut late = IkConstraintData::new("late", vec![2], 3);
    late.order = 5;
    let mut early = IkConstraintData::new("early", vec![1], 3);
    early.order = 1;
    data.ik_constraints = vec![late, early];
    let skeleton = Skeleton::new(Arc::new(data));
    let constraints: Vec<_> = skeleton
        .update_cache_items()
        .iter()
        .filter(|item| matches!(item, UpdateCacheItem::Ik(_)))
        .collect();
    assert_eq!(constraints, [&UpdateCacheItem::Ik(1), &UpdateCacheItem::Ik(0)]);
}

#[test]
fn skin_required_bones_activate_with_their_skin() {
    let mut data = arm();
    let mut extra = bone("extra", Some(2), 10.0, 0.0, 0.0);
    extra.skin_required = true;
    data.bones.push(extra);
    let mut skin = SkinData::new("armored");
    skin.bones.push(4);
    data.skins.push(skin);

    let mut skeleton = Skeleton::new(Arc::new(data));
    assert!(!skeleton.bones[4].active);
    assert!(!skeleton.update_cache_items().contains(&UpdateCacheItem::Bone(4)));

    skeleton.set_skin(Some("armored")).expect("skin exists");
    assert!(skeleton.bones[4].active);
    assert!(skeleton.update_cache_items().contains(&UpdateCacheItem::Bone(4)));

    skeleton.set_skin(None).expect("clearing the skin");
    assert!(!skeleton.bones[4].active);
}

#[test]
fn set_skin_swaps_displayed_attachments() {
    let mut data = arm();
    data.slots[0].attachment_name = Some("hat".to_string());
    for (name, width) in [("small", 4.0), ("large", 8.0)] {
        let mut skin = SkinData::new(name);
        let hat = RegionAttachment::new("hat", 0.0, 0.0, 0.0, 1.0, 1.0, width, width);
        skin.set_attachment(0, "hat", Attachment::Region(hat));
        data.skins.push(skin);
    }
    let mut skeleton = Skeleton::new(Arc::new(data));
    assert!(skeleton.slots[0].attachment().is_none());

    let width = |skeleton: &Skeleton| match skeleton.slots[0].attachment().map(|a| a.as_ref()) {
        Some(Attachment::Region(region)) => Some(region.width),
        _ => None,
    };
    skeleton.set_skin(Some("small")).expect("skin exists");
    assert_eq!(width(&skeleton), Some(4.0));
    skeleton.set_skin(Some("large")).expect("skin exists");
    assert_eq!(width(&skeleton), Some(8.0));
}

#[test]
fn lookups_report_unknown_names() {
    let mut skeleton = Skeleton::new(Arc::new(arm()));
    assert!(matches!(
        skeleton.set_skin(Some("missing")),
        Err(Error::UnknownSkin { .. })
    ));
    assert!(matches!(
        skeleton.set_attachment("nope", None),
        Err(Error::UnknownSlot { .. })
    ));
    assert!(matches!(
        skeleton.set_attachment("hand", Some("glove")),
        Err(Error::UnknownAttachment { .. })
    ));
    assert!(skeleton.set_attachment("hand", None).is_ok());
}

#[test]
fn set_to_setup_pose_restores_bones_and_draw_order() {
    let mut data = arm();
    data.slots.push(SlotData::new("shield", 1));
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.bones[1].rotation = 45.0;
    skeleton.bones[2].scale_x = 3.0;
    skeleton.draw_order = vec![1, 0];
    skeleton.set_to_setup_pose();
    assert_approx(skeleton.bones[1].rotation, 0.0, 0.0);
    assert_approx(skeleton.bones[2].scale_x, 1.0, 0.0);
    assert_eq!(skeleton.draw_order, vec![0, 1]);
}

#[test]
fn bounds_cover_region_corners() {
    let mut data = arm();
    data.slots[0].attachment_name = Some("box".to_string());
    let mut skin = SkinData::new("default");
    let region = RegionAttachment::new("box", 0.0, 0.0, 0.0, 1.0, 1.0, 10.0, 10.0);
    skin.set_attachment(0, "box", Attachment::Region(region));
    data.skins.push(skin);
    data.default_skin = Some(0);

    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    let bounds = skeleton.bounds(&mut Vec::new()).expect("region is visible");
    assert_approx(bounds.x, 5.0, 1e-4);
    assert_approx(bounds.y, -5.0, 1e-4);
    assert_approx(bounds.width, 10.0, 1e-4);
    assert_approx(bounds.height, 10.0, 1e-4);

    let empty = Skeleton::new(Arc::new(root_only()));
    assert!(empty.bounds(&mut Vec::new()).is_none());
}

#[test]
fn validate_rejects_bad_references() {
    let mut data = arm();
    assert!(data.validate().is_ok());
    data.bones[1].parent = Some(2);
    assert!(matches!(
        data.validate(),
        Err(Error::InvalidBoneParent { .. })
    ));

    let mut data = arm();
    let mut a = IkConstraintData::new("a", vec![1], 3);
    a.order = 2;
    let mut b = IkConstraintData::new("b", vec![2], 3);
    b.order = 2;
    data.ik_constraints = vec![a, b];
    assert!(matches!(
        data.validate(),
        Err(Error::DuplicateConstraintOrder { order: 2 })
    ));
}
