use crate::runtime::test_support::{arm, assert_approx, bone_keys, bone_keys2, root_only};
use crate::runtime::timeline::sequence_index;
use crate::{
    Attachment, AttachmentTimeline, BoneProperty, ColorTimeline, DeformTimeline,
    DrawOrderTimeline, Event, EventData, EventTimeline, MeshAttachment, MeshVertices, MixBlend,
    MixDirection, Property, PropertyId, RegionAttachment, Sequence, SequenceKey, SequenceMode,
    SequenceTimeline, Skeleton, SkinData, SlotColorProperty, SlotData, Timeline,
    VertexWeight,
};
use std::sync::Arc;

fn apply(timeline: &Timeline, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
    timeline.apply(skeleton, -1.0, time, None, alpha, blend, MixDirection::In);
}

fn region(name: &str) -> Attachment {
    Attachment::Region(RegionAttachment::new(name, 0.0, 0.0, 0.0, 1.0, 1.0, 10.0, 10.0))
}

/// `arm` with a default skin holding `attachments` on the `hand` slot; the first one is the
/// setup attachment.
fn with_skin(attachments: Vec<(&str, Attachment)>) -> Skeleton {
    let mut data = arm();
    let mut skin = SkinData::new("default");
    data.slots[0].attachment_name = attachments.first().map(|(name, _)| name.to_string());
    for (name, attachment) in attachments {
        skin.set_attachment(0, name, attachment);
    }
    data.skins.push(skin);
    data.default_skin = Some(0);
    Skeleton::new(Arc::new(data))
}

#[test]
fn rotate_keys_take_the_shorter_arc() {
    let mut skeleton = Skeleton::new(Arc::new(root_only()));
    let timeline = bone_keys(BoneProperty::Rotate, 0, &[(0.0, 170.0), (1.0, -170.0)]);
    apply(&timeline, &mut skeleton, 0.5, 1.0, MixBlend::Setup);
    assert_approx(skeleton.bones[0].rotation, 180.0, 1e-3);
    apply(&timeline, &mut skeleton, 0.75, 1.0, MixBlend::Setup);
    assert_approx(skeleton.bones[0].rotation, 185.0, 1e-3);
}

#[test]
fn rotate_add_blend_accumulates() {
    let mut skeleton = Skeleton::new(Arc::new(root_only()));
    skeleton.bones[0].rotation = 10.0;
    let timeline = bone_keys(BoneProperty::Rotate, 0, &[(0.0, 30.0)]);
    apply(&timeline, &mut skeleton, 0.0, 0.5, MixBlend::Add);
    assert_approx(skeleton.bones[0].rotation, 25.0, 1e-5);
}

#[test]
fn translate_before_first_key_depends_on_blend() {
    let timeline = bone_keys2(BoneProperty::Translate, 0, &[(0.5, 10.0, 10.0)]);
    let data = Arc::new(root_only());

    let mut skeleton = Skeleton::new(data.clone());
    skeleton.bones[0].x = 8.0;
    apply(&timeline, &mut skeleton, 0.1, 0.5, MixBlend::First);
    assert_approx(skeleton.bones[0].x, 4.0, 1e-5);

    skeleton.bones[0].x = 8.0;
    apply(&timeline, &mut skeleton, 0.1, 0.5, MixBlend::Replace);
    assert_approx(skeleton.bones[0].x, 8.0, 0.0);

    apply(&timeline, &mut skeleton, 0.1, 0.5, MixBlend::Setup);
    assert_approx(skeleton.bones[0].x, 0.0, 0.0);
}

#[test]
fn translate_replace_mixes_from_current_pose() {
    let mut skeleton = Skeleton::new(Arc::new(root_only()));
    let timeline = bone_keys2(
        BoneProperty::Translate,
        0,
        &[(0.0, 0.0, 0.0), (1.0, 10.0, 20.0)],
    );
    apply(&timeline, &mut skeleton, 0.5, 0.5, MixBlend::Replace);
    assert_approx(skeleton.bones[0].x, 2.5, 1e-5);
    assert_approx(skeleton.bones[0].y, 5.0, 1e-5);
}

#[test]
fn scale_keys_multiply_setup_scale() {
    let mut data = root_only();
    data.bones[0].scale_x = 2.0;
    let mut skeleton = Skeleton::new(Arc::new(data));
    let timeline = bone_keys2(BoneProperty::Scale, 0, &[(0.0, 1.5, 1.0)]);
    apply(&timeline, &mut skeleton, 0.0, 1.0, MixBlend::Replace);
    assert_approx(skeleton.bones[0].scale_x, 3.0, 1e-6);
    assert_approx(skeleton.bones[0].scale_y, 1.0, 1e-6);
}

#[test]
fn scale_mixing_out_keeps_the_current_sign() {
    let mut skeleton = Skeleton::new(Arc::new(root_only()));
    skeleton.bones[0].scale_x = -1.0;
    let timeline = bone_keys(BoneProperty::ScaleX, 0, &[(0.0, 2.0)]);
    timeline.apply(
        &mut skeleton,
        -1.0,
        0.0,
        None,
        0.5,
        MixBlend::Replace,
        MixDirection::Out,
    );
    assert_approx(skeleton.bones[0].scale_x, -1.5, 1e-6);
}

#[test]
fn color_keys_are_clamped() {
    let mut skeleton = Skeleton::new(Arc::new(arm()));
    let mut timeline = ColorTimeline::new(SlotColorProperty::Rgba, 0, 1, 0);
    timeline.frames.set_frame(0, 0.0, &[2.0, -1.0, 0.5, 1.0]);
    apply(&timeline.into(), &mut skeleton, 0.0, 1.0, MixBlend::Replace);
    assert_eq!(skeleton.slots[0].color, [1.0, 0.0, 0.5, 1.0]);
}

#[test]
fn alpha_key_mixes_from_setup() {
    let mut skeleton = Skeleton::new(Arc::new(arm()));
    skeleton.slots[0].color[3] = 0.2;
    let mut timeline = ColorTimeline::new(SlotColorProperty::Alpha, 0, 1, 0);
    timeline.frames.set_frame(0, 0.0, &[0.0]);
    apply(&timeline.into(), &mut skeleton, 0.0, 0.5, MixBlend::Setup);
    assert_approx(skeleton.slots[0].color[3], 0.5, 1e-6);
    assert_approx(skeleton.slots[0].color[0], 1.0, 0.0);
}

#[test]
fn attachment_keys_are_stepped_and_mixing_out_restores_setup() {
    let mut skeleton = with_skin(vec![("a", region("a")), ("b", region("b"))]);
    let mut timeline = AttachmentTimeline::new(0, 2);
    timeline.set_frame(0, 0.0, Some("b"));
    timeline.set_frame(1, 1.0, None);
    let timeline: Timeline = timeline.into();
    let shown = |skeleton: &Skeleton| skeleton.slots[0].attachment().map(|a| a.name().to_string());

    assert_eq!(shown(&skeleton).as_deref(), Some("a"));
    apply(&timeline, &mut skeleton, 0.5, 1.0, MixBlend::Replace);
    assert_eq!(shown(&skeleton).as_deref(), Some("b"));
    apply(&timeline, &mut skeleton, 1.5, 1.0, MixBlend::Replace);
    assert_eq!(shown(&skeleton), None);

    timeline.apply(&mut skeleton, -1.0, 0.5, None, 1.0, MixBlend::Setup, MixDirection::Out);
    assert_eq!(shown(&skeleton).as_deref(), Some("a"));
}

#[test]
fn unweighted_deform_keys_are_absolute_positions() {
    let mesh = MeshAttachment::new(
        "mesh",
        MeshVertices::Unweighted(vec![[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]]),
    );
    let mut timeline = DeformTimeline::new(0, &mesh.vertex_data, 2, 0);
    timeline.set_frame(0, 0.0, vec![0.0, 0.0, 20.0, 0.0, 0.0, 10.0]);
    timeline.set_frame(1, 1.0, vec![0.0, 0.0, 30.0, 0.0, 0.0, 10.0]);
    let mut skeleton = with_skin(vec![("mesh", Attachment::Mesh(mesh))]);

    apply(&timeline.into(), &mut skeleton, 0.5, 0.5, MixBlend::Replace);
    let deform = &skeleton.slots[0].deform;
    assert_eq!(deform.len(), 6);
    // Empty deform mixes from the setup positions: 10 + (25 - 10) * 0.5.
    assert_approx(deform[2], 17.5, 1e-5);
    assert_approx(deform[5], 10.0, 1e-5);
}

#[test]
fn weighted_deform_keys_are_offsets() {
    let weights = vec![vec![VertexWeight {
        bone: 2,
        x: 5.0,
        y: 5.0,
        weight: 1.0,
    }]];
    let mesh = MeshAttachment::new("mesh", MeshVertices::Weighted(weights));
    let mut timeline = DeformTimeline::new(0, &mesh.vertex_data, 1, 0);
    timeline.set_frame(0, 0.0, vec![1.0, 2.0]);
    let mut skeleton = with_skin(vec![("mesh", Attachment::Mesh(mesh))]);

    apply(&timeline.into(), &mut skeleton, 0.0, 0.5, MixBlend::Setup);
    assert_eq!(skeleton.slots[0].deform, vec![0.5, 1.0]);
}

#[test]
fn deform_ignores_other_attachments() {
    let other = MeshAttachment::new("other", MeshVertices::Unweighted(vec![[0.0, 0.0]]));
    let mut timeline = DeformTimeline::new(0, &other.vertex_data, 1, 0);
    timeline.set_frame(0, 0.0, vec![3.0, 3.0]);
    let mesh = MeshAttachment::new("mesh", MeshVertices::Unweighted(vec![[1.0, 1.0]]));
    let mut skeleton = with_skin(vec![("mesh", Attachment::Mesh(mesh))]);

    apply(&timeline.into(), &mut skeleton, 0.0, 1.0, MixBlend::Replace);
    assert!(skeleton.slots[0].deform.is_empty());
}

#[test]
fn linked_mesh_shares_parent_deform_keys() {
    let parent = MeshAttachment::new("parent", MeshVertices::Unweighted(vec![[1.0, 1.0]]));
    let linked = MeshAttachment::new_linked("linked", &parent);
    let mut timeline = DeformTimeline::new(0, &parent.vertex_data, 1, 0);
    timeline.set_frame(0, 0.0, vec![4.0, 4.0]);
    let mut skeleton = with_skin(vec![("linked", Attachment::Mesh(linked))]);

    apply(&timeline.into(), &mut skeleton, 0.0, 1.0, MixBlend::Replace);
    assert_eq!(skeleton.slots[0].deform, vec![4.0, 4.0]);
}

#[test]
fn draw_order_keys_permute_and_restore() {
    let mut data = root_only();
    data.slots = (0..3).map(|i| SlotData::new(format!("s{i}"), 0)).collect();
    let mut skeleton = Skeleton::new(Arc::new(data));
    let mut timeline = DrawOrderTimeline::new(3);
    timeline.set_frame(0, 0.0, Some(vec![2, 0, 1]));
    timeline.set_frame(1, 1.0, None);
    timeline.set_frame(2, 2.0, Some(vec![0, 1]));
    let timeline: Timeline = timeline.into();

    apply(&timeline, &mut skeleton, 0.5, 1.0, MixBlend::Replace);
    assert_eq!(skeleton.draw_order, vec![2, 0, 1]);
    apply(&timeline, &mut skeleton, 1.0, 1.0, MixBlend::Replace);
    assert_eq!(skeleton.draw_order, vec![0, 1, 2]);

    skeleton.draw_order = vec![1, 2, 0];
    // A key with the wrong slot count is ignored.
    apply(&timeline, &mut skeleton, 2.5, 1.0, MixBlend::Replace);
    assert_eq!(skeleton.draw_order, vec![1, 2, 0]);
}

#[test]
fn draw_order_keys_that_are_not_permutations_are_ignored() {
    let mut data = root_only();
    data.slots = (0..3).map(|i| SlotData::new(format!("s{i}"), 0)).collect();
    let mut skeleton = Skeleton::new(Arc::new(data));
    let mut timeline = DrawOrderTimeline::new(3);
    timeline.set_frame(0, 0.0, Some(vec![2, 2, 0]));
    timeline.set_frame(1, 1.0, Some(vec![0, 1, 3]));
    timeline.set_frame(2, 2.0, Some(vec![1, 0, 2]));
    let timeline: Timeline = timeline.into();

    apply(&timeline, &mut skeleton, 0.5, 1.0, MixBlend::Replace);
    assert_eq!(skeleton.draw_order, vec![0, 1, 2]);
    apply(&timeline, &mut skeleton, 1.5, 1.0, MixBlend::Replace);
    assert_eq!(skeleton.draw_order, vec![0, 1, 2]);
    apply(&timeline, &mut skeleton, 2.0, 1.0, MixBlend::Replace);
    assert_eq!(skeleton.draw_order, vec![1, 0, 2]);
}

#[test]
fn events_fire_in_half_open_interval_and_wrap() {
    let data = EventData::new("step");
    let timeline: Timeline =
        EventTimeline::new(vec![Event::new(0, &data, 0.2), Event::new(0, &data, 0.8)]).into();
    let mut skeleton = Skeleton::new(Arc::new(root_only()));
    let mut fire = |last: f32, time: f32| {
        let mut events = Vec::new();
        timeline.apply(
            &mut skeleton,
            last,
            time,
            Some(&mut events),
            1.0,
            MixBlend::Replace,
            MixDirection::In,
        );
        events.iter().map(|e| e.time).collect::<Vec<_>>()
    };

    assert_eq!(fire(0.0, 0.2), vec![0.2]);
    assert_eq!(fire(0.2, 0.5), Vec::<f32>::new());
    assert_eq!(fire(0.5, 1.0), vec![0.8]);
    assert_eq!(fire(0.5, 0.3), vec![0.8, 0.2]);
}

#[test]
fn sequence_modes_pick_regions() {
    let key = |mode| SequenceKey {
        mode,
        index: 0,
        delay: 0.1,
    };
    assert_eq!(sequence_index(key(SequenceMode::Hold), 0.55, 4), 0);
    assert_eq!(sequence_index(key(SequenceMode::Loop), 0.55, 4), 1);
    assert_eq!(sequence_index(key(SequenceMode::Once), 0.55, 4), 3);
    assert_eq!(sequence_index(key(SequenceMode::Pingpong), 0.35, 4), 3);
    assert_eq!(sequence_index(key(SequenceMode::Pingpong), 0.55, 4), 1);
    assert_eq!(sequence_index(key(SequenceMode::OnceReverse), 0.15, 4), 2);
    assert_eq!(sequence_index(key(SequenceMode::OnceReverse), 0.55, 4), 0);
    assert_eq!(sequence_index(key(SequenceMode::LoopReverse), 0.55, 4), 2);
}

#[test]
fn sequence_timeline_sets_slot_index() {
    let mut attachment = RegionAttachment::new("run", 0.0, 0.0, 0.0, 1.0, 1.0, 4.0, 4.0);
    let sequence = Sequence::new(4);
    let mut timeline = SequenceTimeline::new(0, &sequence, 1);
    timeline.set_frame(
        0,
        0.5,
        SequenceKey {
            mode: SequenceMode::Loop,
            index: 0,
            delay: 0.1,
        },
    );
    attachment.sequence = Some(sequence);
    let mut skeleton = with_skin(vec![("run", Attachment::Region(attachment))]);
    let timeline: Timeline = timeline.into();

    apply(&timeline, &mut skeleton, 0.75, 1.0, MixBlend::Replace);
    assert_eq!(skeleton.slots[0].sequence_index, 2);
    apply(&timeline, &mut skeleton, 0.25, 1.0, MixBlend::First);
    assert_eq!(skeleton.slots[0].sequence_index, -1);
}

#[test]
fn property_ids_identify_targets() {
    let rotate = bone_keys(BoneProperty::Rotate, 3, &[(0.0, 0.0)]);
    assert_eq!(rotate.property_ids(), vec![PropertyId::new(Property::Rotate, 3)]);
    let translate = bone_keys2(BoneProperty::Translate, 1, &[(0.0, 0.0, 0.0)]);
    assert_eq!(
        translate.property_ids(),
        vec![
            PropertyId::new(Property::X, 1),
            PropertyId::new(Property::Y, 1)
        ]
    );
    let color: Timeline = ColorTimeline::new(SlotColorProperty::Rgba2, 2, 1, 0).into();
    assert_eq!(color.property_ids().len(), 3);
}
