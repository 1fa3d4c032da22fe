use crate::runtime::test_support::{arm, assert_approx};
use crate::{Attachment, PointAttachment, PoseSnapshot, Skeleton, SkinData, SlotData};
use std::sync::Arc;

fn rig() -> Skeleton {
    let mut data = arm();
    data.slots[0].attachment_name = Some("tip".to_string());
    data.slots.push(SlotData::new("shield", 1));
    let mut skin = SkinData::new("default");
    skin.set_attachment(0, "tip", Attachment::Point(PointAttachment::new("tip", 0.0, 0.0, 0.0)));
    data.skins.push(skin);
    data.default_skin = Some(0);
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    skeleton
}

#[test]
fn capture_lists_bones_and_slots_in_draw_order() {
    let mut skeleton = rig();
    skeleton.draw_order = vec![1, 0];
    let pose = PoseSnapshot::capture(&skeleton);

    let names: Vec<_> = pose.bones.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["root", "upper", "lower", "target"]);
    let lower = pose.bone("lower").expect("bone exists");
    assert!(lower.active);
    for (&actual, expected) in lower.world.iter().zip([1.0, 0.0, 0.0, 1.0, 10.0, 0.0]) {
        assert_approx(actual, expected, 1e-5);
    }

    assert_eq!(pose.slots[0].name, "shield");
    assert_eq!(pose.slots[0].attachment, None);
    assert_eq!(pose.slots[1].name, "hand");
    assert_eq!(pose.slots[1].attachment.as_deref(), Some("tip"));
    assert_eq!(pose.slots[1].bone, 2);
    assert_eq!(pose.slots[1].sequence_index, -1);
    assert_eq!(pose.color, [1.0; 4]);
}

#[test]
fn max_world_delta_compares_world_transforms() {
    let mut skeleton = rig();
    let before = PoseSnapshot::capture(&skeleton);
    assert_approx(before.max_world_delta(&before), 0.0, 0.0);

    skeleton.bones[1].rotation = 90.0;
    skeleton.update_world_transform();
    let after = PoseSnapshot::capture(&skeleton);
    // `lower` moves from (10, 0) to (0, 10).
    assert_approx(before.max_world_delta(&after), 10.0, 1e-4);

    let mut partial = after.clone();
    partial.bones.truncate(1);
    assert_approx(partial.max_world_delta(&after), 0.0, 0.0);
}

#[cfg(feature = "serde")]
#[test]
fn snapshot_serializes_to_json() {
    let pose = PoseSnapshot::capture(&rig());
    let json = serde_json::to_string(&pose).expect("serializable");
    let back: PoseSnapshot = serde_json::from_str(&json).expect("deserializable");
    assert_eq!(back, pose);
}
