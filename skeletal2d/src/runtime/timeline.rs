use crate::runtime::curve::{CurveFrames, CurveKind, search};
use crate::runtime::math::{signum, wrap_degrees};
use crate::{
    Bone, BoneData, Event, MixBlend, MixDirection, Sequence, SequenceMode, Skeleton, VertexData,
};

/// Kind of property a timeline writes. Combined with a target index it identifies what two
/// animations would fight over when mixed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Property {
    Rotate,
    X,
    Y,
    ScaleX,
    ScaleY,
    ShearX,
    ShearY,
    Rgb,
    Alpha,
    Rgb2,
    Attachment,
    Deform,
    Event,
    DrawOrder,
    IkConstraint,
    TransformConstraint,
    PathConstraintPosition,
    PathConstraintSpacing,
    PathConstraintMix,
    Sequence,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PropertyId {
    pub property: Property,
    /// Bone, slot or constraint index. 0 for skeleton-wide properties.
    pub target: usize,
    /// Deform attachment id or sequence id, else 0.
    pub detail: u32,
}

impl PropertyId {
    pub const fn new(property: Property, target: usize) -> Self {
        Self {
            property,
            target,
            detail: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BoneProperty {
    Rotate,
    Translate,
    TranslateX,
    TranslateY,
    Scale,
    ScaleX,
    ScaleY,
    Shear,
    ShearX,
    ShearY,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Channel {
    Rotation,
    X,
    Y,
    ScaleX,
    ScaleY,
    ShearX,
    ShearY,
}

impl Channel {
    fn get(self, bone: &Bone) -> f32 {
        match self {
            Channel::Rotation => bone.rotation,
            Channel::X => bone.x,
            Channel::Y => bone.y,
            Channel::ScaleX => bone.scale_x,
            Channel::ScaleY => bone.scale_y,
            Channel::ShearX => bone.shear_x,
            Channel::ShearY => bone.shear_y,
        }
    }

    fn field(self, bone: &mut Bone) -> &mut f32 {
        match self {
            Channel::Rotation => &mut bone.rotation,
            Channel::X => &mut bone.x,
            Channel::Y => &mut bone.y,
            Channel::ScaleX => &mut bone.scale_x,
            Channel::ScaleY => &mut bone.scale_y,
            Channel::ShearX => &mut bone.shear_x,
            Channel::ShearY => &mut bone.shear_y,
        }
    }

    fn setup(self, data: &BoneData) -> f32 {
        match self {
            Channel::Rotation => data.rotation,
            Channel::X => data.x,
            Channel::Y => data.y,
            Channel::ScaleX => data.scale_x,
            Channel::ScaleY => data.scale_y,
            Channel::ShearX => data.shear_x,
            Channel::ShearY => data.shear_y,
        }
    }
}

impl BoneProperty {
    fn channels(self) -> &'static [Channel] {
        match self {
            BoneProperty::Rotate => &[Channel::Rotation],
            BoneProperty::Translate => &[Channel::X, Channel::Y],
            BoneProperty::TranslateX => &[Channel::X],
            BoneProperty::TranslateY => &[Channel::Y],
            BoneProperty::Scale => &[Channel::ScaleX, Channel::ScaleY],
            BoneProperty::ScaleX => &[Channel::ScaleX],
            BoneProperty::ScaleY => &[Channel::ScaleY],
            BoneProperty::Shear => &[Channel::ShearX, Channel::ShearY],
            BoneProperty::ShearX => &[Channel::ShearX],
            BoneProperty::ShearY => &[Channel::ShearY],
        }
    }

    fn property(channel: Channel) -> Property {
        match channel {
            Channel::Rotation => Property::Rotate,
            Channel::X => Property::X,
            Channel::Y => Property::Y,
            Channel::ScaleX => Property::ScaleX,
            Channel::ScaleY => Property::ScaleY,
            Channel::ShearX => Property::ShearX,
            Channel::ShearY => Property::ShearY,
        }
    }
}

/// Keys one or two local transform channels of a bone. Rotate keys are degrees, translate and
/// shear keys are offsets from the setup pose, scale keys multiply the setup scale.
#[derive(Clone, Debug)]
pub struct BoneTimeline {
    pub property: BoneProperty,
    pub bone_index: usize,
    pub frames: CurveFrames,
}

impl BoneTimeline {
    pub fn new(
        property: BoneProperty,
        bone_index: usize,
        frame_count: usize,
        bezier_count: usize,
    ) -> Self {
        let values = property.channels().len();
        Self {
            property,
            bone_index,
            frames: CurveFrames::new(frame_count, bezier_count, values),
        }
    }

    /// Rotation at `time`, following the shorter arc between consecutive keys.
    pub(crate) fn rotation_at(&self, time: f32) -> f32 {
        let frames = self.frames.frames();
        let i = self.frames.search(time);
        match self.frames.curve_kind(i / 2) {
            CurveKind::Stepped => frames[i + 1],
            CurveKind::Linear => {
                let (time1, value1) = (frames[i], frames[i + 1]);
                let (time2, value2) = (frames[i + 2], frames[i + 3]);
                value1 + wrap_degrees(value2 - value1) * (time - time1) / (time2 - time1)
            }
            CurveKind::Bezier(curve) => {
                let raw = self.frames.bezier_value(time, i, 1, curve);
                let (value1, value2) = (frames[i + 1], frames[i + 3]);
                if value2 == value1 {
                    raw
                } else {
                    value1 + (raw - value1) / (value2 - value1) * wrap_degrees(value2 - value1)
                }
            }
        }
    }

    fn sample(&self, time: f32) -> [f32; 2] {
        if self.property == BoneProperty::Rotate {
            return [self.rotation_at(time), 0.0];
        }
        match self.property.channels().len() {
            1 => {
                let (_, [value]) = self.frames.sample::<1>(time);
                [value, 0.0]
            }
            _ => self.frames.sample::<2>(time).1,
        }
    }

    pub(crate) fn apply(
        &self,
        skeleton: &mut Skeleton,
        time: f32,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        let Some(bone) = skeleton.bones.get_mut(self.bone_index) else {
            return;
        };
        if !bone.active || self.frames.is_empty() {
            return;
        }
        let setup = &skeleton.data.bones[bone.data_index()];
        let channels = self.property.channels();

        if time < self.frames.first_time() {
            for &channel in channels {
                let rest = channel.setup(setup);
                let value = channel.field(bone);
                match blend {
                    MixBlend::Setup => *value = rest,
                    MixBlend::First => *value += (rest - *value) * alpha,
                    MixBlend::Replace | MixBlend::Add => {}
                }
            }
            return;
        }

        let sampled = self.sample(time);
        for (&channel, &key) in channels.iter().zip(&sampled) {
            let rest = channel.setup(setup);
            match channel {
                Channel::Rotation => {
                    let value = channel.field(bone);
                    match blend {
                        MixBlend::Setup => *value = rest + key * alpha,
                        MixBlend::First | MixBlend::Replace => {
                            *value += wrap_degrees(key + rest - *value) * alpha;
                        }
                        MixBlend::Add => *value += key * alpha,
                    }
                }
                Channel::ScaleX | Channel::ScaleY => {
                    let current = channel.get(bone);
                    *channel.field(bone) =
                        blend_scale(current, rest, key * rest, alpha, blend, direction);
                }
                Channel::X | Channel::Y | Channel::ShearX | Channel::ShearY => {
                    let value = channel.field(bone);
                    match blend {
                        MixBlend::Setup => *value = rest + key * alpha,
                        MixBlend::First | MixBlend::Replace => {
                            *value += (rest + key - *value) * alpha;
                        }
                        MixBlend::Add => *value += key * alpha,
                    }
                }
            }
        }
    }
}

/// Scale mixing keeps the sign (flip) of the pose being mixed from while interpolating the
/// magnitude.
fn blend_scale(
    current: f32,
    setup: f32,
    target: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) -> f32 {
    if alpha == 1.0 {
        return match blend {
            MixBlend::Add => current + target - setup,
            _ => target,
        };
    }
    match (blend, direction) {
        (MixBlend::Add, _) => current + (target - setup) * alpha,
        (MixBlend::Setup, MixDirection::Out) => {
            setup + (target.abs() * signum(setup) - setup) * alpha
        }
        (MixBlend::First | MixBlend::Replace, MixDirection::Out) => {
            current + (target.abs() * signum(current) - current) * alpha
        }
        (MixBlend::Setup, MixDirection::In) => {
            let from = setup.abs() * signum(target);
            from + (target - from) * alpha
        }
        (MixBlend::First | MixBlend::Replace, MixDirection::In) => {
            let from = current.abs() * signum(target);
            from + (target - from) * alpha
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SlotColorProperty {
    /// Light color.
    Rgba,
    Rgb,
    Alpha,
    /// Light color plus dark rgb for two color tinting.
    Rgba2,
    Rgb2,
}

impl SlotColorProperty {
    /// Light channels written, and whether dark rgb follows them.
    fn layout(self) -> (&'static [usize], bool) {
        match self {
            SlotColorProperty::Rgba => (&[0, 1, 2, 3], false),
            SlotColorProperty::Rgb => (&[0, 1, 2], false),
            SlotColorProperty::Alpha => (&[3], false),
            SlotColorProperty::Rgba2 => (&[0, 1, 2, 3], true),
            SlotColorProperty::Rgb2 => (&[0, 1, 2], true),
        }
    }

    fn values(self) -> usize {
        let (light, dark) = self.layout();
        light.len() + if dark { 3 } else { 0 }
    }
}

#[derive(Clone, Debug)]
pub struct ColorTimeline {
    pub property: SlotColorProperty,
    pub slot_index: usize,
    pub frames: CurveFrames,
}

impl ColorTimeline {
    pub fn new(
        property: SlotColorProperty,
        slot_index: usize,
        frame_count: usize,
        bezier_count: usize,
    ) -> Self {
        Self {
            property,
            slot_index,
            frames: CurveFrames::new(frame_count, bezier_count, property.values()),
        }
    }

    fn sample(&self, time: f32) -> [f32; 7] {
        let mut out = [0.0; 7];
        match self.property {
            SlotColorProperty::Rgba => out[..4].copy_from_slice(&self.frames.sample::<4>(time).1),
            SlotColorProperty::Rgb => out[..3].copy_from_slice(&self.frames.sample::<3>(time).1),
            SlotColorProperty::Alpha => out[0] = self.frames.value(time),
            SlotColorProperty::Rgba2 => out.copy_from_slice(&self.frames.sample::<7>(time).1),
            SlotColorProperty::Rgb2 => out[..6].copy_from_slice(&self.frames.sample::<6>(time).1),
        }
        out
    }

    fn apply(&self, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
        let Some(slot) = skeleton.slots.get_mut(self.slot_index) else {
            return;
        };
        if !skeleton.bones.get(slot.bone).is_some_and(|b| b.active) || self.frames.is_empty() {
            return;
        }
        let setup = &skeleton.data.slots[slot.data_index()];
        let (light, has_dark) = self.property.layout();
        let setup_dark = setup.dark_color.unwrap_or([0.0; 3]);

        if time < self.frames.first_time() {
            match blend {
                MixBlend::Setup => {
                    for &c in light {
                        slot.color[c] = setup.color[c];
                    }
                    if let (true, Some(dark)) = (has_dark, slot.dark_color.as_mut()) {
                        *dark = setup_dark;
                    }
                }
                MixBlend::First => {
                    for &c in light {
                        slot.color[c] += (setup.color[c] - slot.color[c]) * alpha;
                    }
                    if let (true, Some(dark)) = (has_dark, slot.dark_color.as_mut()) {
                        for (d, s) in dark.iter_mut().zip(setup_dark) {
                            *d += (s - *d) * alpha;
                        }
                    }
                }
                MixBlend::Replace | MixBlend::Add => {}
            }
            clamp_colors(&mut slot.color, slot.dark_color.as_mut());
            return;
        }

        let values = self.sample(time);
        let dark_values = &values[light.len()..light.len() + 3];
        if alpha == 1.0 {
            for (k, &c) in light.iter().enumerate() {
                slot.color[c] = values[k];
            }
            if let (true, Some(dark)) = (has_dark, slot.dark_color.as_mut()) {
                dark.copy_from_slice(dark_values);
            }
        } else {
            if blend == MixBlend::Setup {
                for &c in light {
                    slot.color[c] = setup.color[c];
                }
                if let (true, Some(dark)) = (has_dark, slot.dark_color.as_mut()) {
                    *dark = setup_dark;
                }
            }
            for (k, &c) in light.iter().enumerate() {
                slot.color[c] += (values[k] - slot.color[c]) * alpha;
            }
            if let (true, Some(dark)) = (has_dark, slot.dark_color.as_mut()) {
                for (d, v) in dark.iter_mut().zip(dark_values) {
                    *d += (v - *d) * alpha;
                }
            }
        }
        clamp_colors(&mut slot.color, slot.dark_color.as_mut());
    }
}

fn clamp_colors(light: &mut [f32; 4], dark: Option<&mut [f32; 3]>) {
    for c in light.iter_mut() {
        *c = c.clamp(0.0, 1.0);
    }
    if let Some(dark) = dark {
        for c in dark.iter_mut() {
            *c = c.clamp(0.0, 1.0);
        }
    }
}

/// Stepped attachment changes. `None` clears the slot.
#[derive(Clone, Debug)]
pub struct AttachmentTimeline {
    pub slot_index: usize,
    pub frames: Vec<f32>,
    pub attachment_names: Vec<Option<String>>,
}

impl AttachmentTimeline {
    pub fn new(slot_index: usize, frame_count: usize) -> Self {
        Self {
            slot_index,
            frames: vec![0.0; frame_count],
            attachment_names: vec![None; frame_count],
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, attachment_name: Option<&str>) {
        self.frames[frame] = time;
        self.attachment_names[frame] = attachment_name.map(str::to_string);
    }

    /// Name keyed at `time`, or `None` when `time` precedes the first key.
    pub(crate) fn name_at(&self, time: f32) -> Option<Option<&str>> {
        if self.frames.first().is_none_or(|&first| time < first) {
            return None;
        }
        let frame = search(&self.frames, 1, time);
        Some(self.attachment_names[frame].as_deref())
    }

    fn apply(&self, skeleton: &mut Skeleton, time: f32, blend: MixBlend, direction: MixDirection) {
        if !slot_bone_active(skeleton, self.slot_index) {
            return;
        }
        let setup_name =
            |skeleton: &Skeleton| skeleton.data.slots[self.slot_index].attachment_name.clone();
        if direction == MixDirection::Out {
            if blend == MixBlend::Setup {
                let name = setup_name(skeleton);
                set_slot_attachment(skeleton, self.slot_index, name.as_deref());
            }
            return;
        }
        match self.name_at(time) {
            Some(name) => set_slot_attachment(skeleton, self.slot_index, name),
            None => {
                if matches!(blend, MixBlend::Setup | MixBlend::First) {
                    let name = setup_name(skeleton);
                    set_slot_attachment(skeleton, self.slot_index, name.as_deref());
                }
            }
        }
    }
}

pub(crate) fn slot_bone_active(skeleton: &Skeleton, slot_index: usize) -> bool {
    skeleton
        .slots
        .get(slot_index)
        .and_then(|slot| skeleton.bones.get(slot.bone))
        .is_some_and(|bone| bone.active)
}

/// Resolves `name` through the skins and shows it on the slot.
pub(crate) fn set_slot_attachment(skeleton: &mut Skeleton, slot_index: usize, name: Option<&str>) {
    let attachment = name.and_then(|name| {
        let found = skeleton.attachment(slot_index, name);
        if found.is_none() {
            log::warn!("attachment '{name}' not found for slot {slot_index}");
        }
        found
    });
    if let Some(slot) = skeleton.slots.get_mut(slot_index) {
        slot.set_attachment(attachment);
    }
}

/// Vertex keys for one vertex attachment. Keys of unweighted attachments are absolute local
/// positions; keys of weighted attachments are offsets added to each bone influence.
#[derive(Clone, Debug)]
pub struct DeformTimeline {
    pub slot_index: usize,
    /// [`VertexData::timeline_attachment`] of the keyed attachment.
    pub attachment: u32,
    pub frames: CurveFrames,
    pub vertices: Vec<Vec<f32>>,
}

impl DeformTimeline {
    pub fn new(
        slot_index: usize,
        attachment: &VertexData,
        frame_count: usize,
        bezier_count: usize,
    ) -> Self {
        Self {
            slot_index,
            attachment: attachment.timeline_attachment,
            frames: CurveFrames::new(frame_count, bezier_count, 0),
            vertices: vec![Vec::new(); frame_count],
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, vertices: Vec<f32>) {
        self.frames.set_frame(frame, time, &[]);
        self.vertices[frame] = vertices;
    }

    fn apply(&self, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
        if !slot_bone_active(skeleton, self.slot_index) || self.frames.is_empty() {
            return;
        }
        let slot = &mut skeleton.slots[self.slot_index];
        let Some(attachment) = slot.attachment().cloned() else {
            return;
        };
        let Some(vertex_data) = attachment.vertex_data() else {
            return;
        };
        if vertex_data.timeline_attachment != self.attachment {
            return;
        }
        let Some(vertex_count) = self.vertices.first().map(Vec::len) else {
            return;
        };
        // Unweighted keys are absolute, so blending needs the rest positions.
        let setup = vertex_data.setup_positions();
        let setup_at = |i: usize| setup.and_then(|s| s.get(i).copied()).unwrap_or(0.0);
        let blend = if slot.deform.is_empty() {
            MixBlend::Setup
        } else {
            blend
        };
        let deform = &mut slot.deform;

        if time < self.frames.first_time() {
            match blend {
                MixBlend::Setup => deform.clear(),
                MixBlend::First => {
                    if alpha == 1.0 {
                        deform.clear();
                        return;
                    }
                    deform.resize(vertex_count, 0.0);
                    if setup.is_some() {
                        for (i, d) in deform.iter_mut().enumerate() {
                            *d += (setup_at(i) - *d) * alpha;
                        }
                    } else {
                        let keep = 1.0 - alpha;
                        for d in deform.iter_mut() {
                            *d *= keep;
                        }
                    }
                }
                MixBlend::Replace | MixBlend::Add => {}
            }
            return;
        }

        deform.resize(vertex_count, 0.0);
        let frame_count = self.frames.frame_count();
        let frame = self.frames.search(time);
        let (key, percent) = if frame + 1 >= frame_count {
            (&self.vertices[frame_count - 1], None)
        } else {
            (&self.vertices[frame], Some(self.frames.percent(time, frame)))
        };
        let next = percent.map(|p| (&self.vertices[frame + 1], p));
        let value_at = |i: usize| {
            let prev = key.get(i).copied().unwrap_or(0.0);
            match next {
                Some((next, p)) => prev + (next.get(i).copied().unwrap_or(0.0) - prev) * p,
                None => prev,
            }
        };
        let weighted = setup.is_none();

        if alpha == 1.0 {
            for (i, d) in deform.iter_mut().enumerate() {
                let v = value_at(i);
                *d = match blend {
                    MixBlend::Add if weighted => *d + v,
                    MixBlend::Add => *d + v - setup_at(i),
                    _ => v,
                };
            }
            return;
        }
        for (i, d) in deform.iter_mut().enumerate() {
            let v = value_at(i);
            *d = match blend {
                MixBlend::Setup if weighted => v * alpha,
                MixBlend::Setup => setup_at(i) + (v - setup_at(i)) * alpha,
                MixBlend::First | MixBlend::Replace => *d + (v - *d) * alpha,
                MixBlend::Add if weighted => *d + v * alpha,
                MixBlend::Add => *d + (v - setup_at(i)) * alpha,
            };
        }
    }
}

/// Draw order keys. `None` restores the setup order; otherwise entry `i` is the slot drawn at
/// position `i`.
#[derive(Clone, Debug)]
pub struct DrawOrderTimeline {
    pub frames: Vec<f32>,
    pub draw_orders: Vec<Option<Vec<usize>>>,
}

impl DrawOrderTimeline {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frames: vec![0.0; frame_count],
            draw_orders: vec![None; frame_count],
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, draw_order: Option<Vec<usize>>) {
        self.frames[frame] = time;
        self.draw_orders[frame] = draw_order;
    }

    pub(crate) fn apply(
        &self,
        skeleton: &mut Skeleton,
        time: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        let reset = |skeleton: &mut Skeleton| {
            let count = skeleton.slots.len();
            skeleton.draw_order.clear();
            skeleton.draw_order.extend(0..count);
        };
        if direction == MixDirection::Out {
            if blend == MixBlend::Setup {
                reset(skeleton);
            }
            return;
        }
        if self.frames.first().is_none_or(|&first| time < first) {
            if matches!(blend, MixBlend::Setup | MixBlend::First) {
                reset(skeleton);
            }
            return;
        }
        match &self.draw_orders[search(&self.frames, 1, time)] {
            None => reset(skeleton),
            Some(order) if is_permutation(order, skeleton.slots.len()) => {
                skeleton.draw_order.clear();
                skeleton.draw_order.extend_from_slice(order);
            }
            Some(order) => {
                log::warn!(
                    "draw order key {order:?} is not a permutation of {} slots",
                    skeleton.slots.len()
                );
            }
        }
    }
}

/// True when `order` lists every index below `count` exactly once.
fn is_permutation(order: &[usize], count: usize) -> bool {
    if order.len() != count {
        return false;
    }
    let mut seen = vec![false; count];
    order
        .iter()
        .all(|&slot| slot < count && !std::mem::replace(&mut seen[slot], true))
}

#[derive(Clone, Debug)]
pub struct EventTimeline {
    pub frames: Vec<f32>,
    pub events: Vec<Event>,
}

impl EventTimeline {
    /// `events` must be sorted by time.
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            frames: events.iter().map(|e| e.time).collect(),
            events,
        }
    }

    /// Collects events keyed in `(last_time, time]`. When `last_time > time` the animation
    /// wrapped: events after `last_time` fire first, then those from the start.
    pub(crate) fn collect(&self, last_time: f32, time: f32, fired: &mut Vec<Event>) {
        let Some(&last_key) = self.frames.last() else {
            return;
        };
        let mut last_time = last_time;
        if last_time > time {
            self.collect(last_time, f32::MAX, fired);
            last_time = -1.0;
        } else if last_time >= last_key {
            return;
        }
        if time < self.frames[0] {
            return;
        }
        let mut i = if last_time < self.frames[0] {
            0
        } else {
            let mut i = search(&self.frames, 1, last_time) + 1;
            let frame_time = self.frames[i];
            while i > 0 && self.frames[i - 1] == frame_time {
                i -= 1;
            }
            i
        };
        while i < self.frames.len() && time >= self.frames[i] {
            fired.push(self.events[i].clone());
            i += 1;
        }
    }
}

#[derive(Clone, Debug)]
pub struct IkConstraintTimeline {
    pub constraint_index: usize,
    /// `time, mix, softness, bend_direction, compress, stretch`; only mix and softness
    /// interpolate.
    pub frames: CurveFrames,
}

impl IkConstraintTimeline {
    pub fn new(constraint_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            constraint_index,
            frames: CurveFrames::new(frame_count, bezier_count, 5),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_frame(
        &mut self,
        frame: usize,
        time: f32,
        mix: f32,
        softness: f32,
        bend_direction: i32,
        compress: bool,
        stretch: bool,
    ) {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        self.frames.set_frame(
            frame,
            time,
            &[mix, softness, bend_direction as f32, flag(compress), flag(stretch)],
        );
    }

    fn apply(
        &self,
        skeleton: &mut Skeleton,
        time: f32,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        let Some(constraint) = skeleton.ik_constraints.get_mut(self.constraint_index) else {
            return;
        };
        if !constraint.active || self.frames.is_empty() {
            return;
        }
        let data = &skeleton.data.ik_constraints[constraint.data_index()];

        if time < self.frames.first_time() {
            match blend {
                MixBlend::Setup => constraint.set_to_setup_pose(data),
                MixBlend::First => {
                    constraint.mix += (data.mix - constraint.mix) * alpha;
                    constraint.softness += (data.softness - constraint.softness) * alpha;
                    constraint.bend_direction = data.bend_direction;
                    constraint.compress = data.compress;
                    constraint.stretch = data.stretch;
                }
                MixBlend::Replace | MixBlend::Add => {}
            }
            return;
        }

        let (i, [mix, softness]) = self.frames.sample::<2>(time);
        let key = &self.frames.frames()[i..i + 6];
        let keyed = (key[3] as i32, key[4] != 0.0, key[5] != 0.0);
        if blend == MixBlend::Setup {
            constraint.mix = data.mix + (mix - data.mix) * alpha;
            constraint.softness = data.softness + (softness - data.softness) * alpha;
            let (bend, compress, stretch) = if direction == MixDirection::Out {
                (data.bend_direction, data.compress, data.stretch)
            } else {
                keyed
            };
            constraint.bend_direction = bend;
            constraint.compress = compress;
            constraint.stretch = stretch;
        } else {
            constraint.mix += (mix - constraint.mix) * alpha;
            constraint.softness += (softness - constraint.softness) * alpha;
            if direction == MixDirection::In {
                (constraint.bend_direction, constraint.compress, constraint.stretch) = keyed;
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct TransformConstraintTimeline {
    pub constraint_index: usize,
    /// `time, rotate, x, y, scale_x, scale_y, shear_y` mixes.
    pub frames: CurveFrames,
}

impl TransformConstraintTimeline {
    pub fn new(constraint_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            constraint_index,
            frames: CurveFrames::new(frame_count, bezier_count, 6),
        }
    }

    fn apply(&self, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
        let Some(constraint) = skeleton.transform_constraints.get_mut(self.constraint_index)
        else {
            return;
        };
        if !constraint.active || self.frames.is_empty() {
            return;
        }
        let data = &skeleton.data.transform_constraints[constraint.data_index()];
        let setup = [
            data.mix_rotate,
            data.mix_x,
            data.mix_y,
            data.mix_scale_x,
            data.mix_scale_y,
            data.mix_shear_y,
        ];
        let mut mixes = [
            &mut constraint.mix_rotate,
            &mut constraint.mix_x,
            &mut constraint.mix_y,
            &mut constraint.mix_scale_x,
            &mut constraint.mix_scale_y,
            &mut constraint.mix_shear_y,
        ];
        if time < self.frames.first_time() {
            blend_before_first(&mut mixes, &setup, alpha, blend);
            return;
        }
        let (_, keyed) = self.frames.sample::<6>(time);
        blend_mixes(&mut mixes, &setup, &keyed, alpha, blend);
    }
}

fn blend_before_first(values: &mut [&mut f32], setup: &[f32], alpha: f32, blend: MixBlend) {
    for (value, &rest) in values.iter_mut().zip(setup) {
        match blend {
            MixBlend::Setup => **value = rest,
            MixBlend::First => **value += (rest - **value) * alpha,
            MixBlend::Replace | MixBlend::Add => {}
        }
    }
}

fn blend_mixes(values: &mut [&mut f32], setup: &[f32], keyed: &[f32], alpha: f32, blend: MixBlend) {
    for ((value, &rest), &key) in values.iter_mut().zip(setup).zip(keyed) {
        if blend == MixBlend::Setup {
            **value = rest + (key - rest) * alpha;
        } else {
            **value += (key - **value) * alpha;
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PathConstraintProperty {
    Position,
    Spacing,
    /// `rotate, x, y` mixes.
    Mix,
}

#[derive(Clone, Debug)]
pub struct PathConstraintTimeline {
    pub property: PathConstraintProperty,
    pub constraint_index: usize,
    pub frames: CurveFrames,
}

impl PathConstraintTimeline {
    pub fn new(
        property: PathConstraintProperty,
        constraint_index: usize,
        frame_count: usize,
        bezier_count: usize,
    ) -> Self {
        let values = match property {
            PathConstraintProperty::Mix => 3,
            PathConstraintProperty::Position | PathConstraintProperty::Spacing => 1,
        };
        Self {
            property,
            constraint_index,
            frames: CurveFrames::new(frame_count, bezier_count, values),
        }
    }

    fn apply(&self, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
        let Some(constraint) = skeleton.path_constraints.get_mut(self.constraint_index) else {
            return;
        };
        if !constraint.active || self.frames.is_empty() {
            return;
        }
        let data = &skeleton.data.path_constraints[constraint.data_index()];
        let (mut values, setup): (Vec<&mut f32>, Vec<f32>) = match self.property {
            PathConstraintProperty::Position => {
                (vec![&mut constraint.position], vec![data.position])
            }
            PathConstraintProperty::Spacing => (vec![&mut constraint.spacing], vec![data.spacing]),
            PathConstraintProperty::Mix => (
                vec![
                    &mut constraint.mix_rotate,
                    &mut constraint.mix_x,
                    &mut constraint.mix_y,
                ],
                vec![data.mix_rotate, data.mix_x, data.mix_y],
            ),
        };
        if time < self.frames.first_time() {
            blend_before_first(&mut values, &setup, alpha, blend);
            return;
        }
        match self.property {
            PathConstraintProperty::Mix => {
                let (_, keyed) = self.frames.sample::<3>(time);
                blend_mixes(&mut values, &setup, &keyed, alpha, blend);
            }
            PathConstraintProperty::Position | PathConstraintProperty::Spacing => {
                let keyed = [self.frames.value(time)];
                blend_mixes(&mut values, &setup, &keyed, alpha, blend);
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SequenceKey {
    pub mode: SequenceMode,
    pub index: i32,
    /// Seconds per region.
    pub delay: f32,
}

/// Picks the region shown by a sequence attachment.
#[derive(Clone, Debug)]
pub struct SequenceTimeline {
    pub slot_index: usize,
    pub sequence_id: u32,
    pub frames: Vec<f32>,
    pub keys: Vec<SequenceKey>,
}

impl SequenceTimeline {
    pub fn new(slot_index: usize, sequence: &Sequence, frame_count: usize) -> Self {
        Self {
            slot_index,
            sequence_id: sequence.id(),
            frames: vec![0.0; frame_count],
            keys: vec![
                SequenceKey {
                    mode: SequenceMode::Hold,
                    index: 0,
                    delay: 0.0,
                };
                frame_count
            ],
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, key: SequenceKey) {
        self.frames[frame] = time;
        self.keys[frame] = key;
    }

    fn apply(&self, skeleton: &mut Skeleton, time: f32, blend: MixBlend) {
        if !slot_bone_active(skeleton, self.slot_index) {
            return;
        }
        let slot = &mut skeleton.slots[self.slot_index];
        let Some(sequence) = slot.attachment().and_then(|a| a.sequence()) else {
            return;
        };
        if sequence.id() != self.sequence_id {
            return;
        }
        let count = sequence.region_count as i32;
        if self.frames.first().is_none_or(|&first| time < first) {
            if matches!(blend, MixBlend::Setup | MixBlend::First) {
                slot.sequence_index = -1;
            }
            return;
        }
        let frame = search(&self.frames, 1, time);
        let key = self.keys[frame];
        slot.sequence_index = sequence_index(key, time - self.frames[frame], count);
    }
}

/// Region index for a key that started `elapsed` seconds ago.
pub(crate) fn sequence_index(key: SequenceKey, elapsed: f32, count: i32) -> i32 {
    let mut index = key.index;
    if key.mode == SequenceMode::Hold || count <= 0 {
        return index;
    }
    if key.delay > 0.0 {
        index += (elapsed / key.delay + 0.00001) as i32;
    }
    let pingpong = (count << 1) - 2;
    match key.mode {
        SequenceMode::Hold => {}
        SequenceMode::Once => index = index.min(count - 1),
        SequenceMode::Loop => index %= count,
        SequenceMode::Pingpong => {
            index = if pingpong == 0 { 0 } else { index % pingpong };
            if index >= count {
                index = pingpong - index;
            }
        }
        SequenceMode::OnceReverse => index = (count - 1 - index).max(0),
        SequenceMode::LoopReverse => index = count - 1 - (index % count),
        SequenceMode::PingpongReverse => {
            index = if pingpong == 0 {
                0
            } else {
                (index + count - 1) % pingpong
            };
            if index >= count {
                index = pingpong - index;
            }
        }
    }
    index
}

/// Every keyed property an animation can carry.
#[derive(Clone, Debug)]
pub enum Timeline {
    Bone(BoneTimeline),
    Color(ColorTimeline),
    Attachment(AttachmentTimeline),
    Deform(DeformTimeline),
    DrawOrder(DrawOrderTimeline),
    Event(EventTimeline),
    IkConstraint(IkConstraintTimeline),
    TransformConstraint(TransformConstraintTimeline),
    PathConstraint(PathConstraintTimeline),
    Sequence(SequenceTimeline),
}

impl Timeline {
    pub fn property_ids(&self) -> Vec<PropertyId> {
        match self {
            Timeline::Bone(t) => t
                .property
                .channels()
                .iter()
                .map(|&c| PropertyId::new(BoneProperty::property(c), t.bone_index))
                .collect(),
            Timeline::Color(t) => {
                let slot = t.slot_index;
                let ids: &[Property] = match t.property {
                    SlotColorProperty::Rgba => &[Property::Rgb, Property::Alpha],
                    SlotColorProperty::Rgb => &[Property::Rgb],
                    SlotColorProperty::Alpha => &[Property::Alpha],
                    SlotColorProperty::Rgba2 => &[Property::Rgb, Property::Alpha, Property::Rgb2],
                    SlotColorProperty::Rgb2 => &[Property::Rgb, Property::Rgb2],
                };
                ids.iter().map(|&p| PropertyId::new(p, slot)).collect()
            }
            Timeline::Attachment(t) => vec![PropertyId::new(Property::Attachment, t.slot_index)],
            Timeline::Deform(t) => vec![PropertyId {
                property: Property::Deform,
                target: t.slot_index,
                detail: t.attachment,
            }],
            Timeline::DrawOrder(_) => vec![PropertyId::new(Property::DrawOrder, 0)],
            Timeline::Event(_) => vec![PropertyId::new(Property::Event, 0)],
            Timeline::IkConstraint(t) => {
                vec![PropertyId::new(Property::IkConstraint, t.constraint_index)]
            }
            Timeline::TransformConstraint(t) => {
                vec![PropertyId::new(Property::TransformConstraint, t.constraint_index)]
            }
            Timeline::PathConstraint(t) => {
                let property = match t.property {
                    PathConstraintProperty::Position => Property::PathConstraintPosition,
                    PathConstraintProperty::Spacing => Property::PathConstraintSpacing,
                    PathConstraintProperty::Mix => Property::PathConstraintMix,
                };
                vec![PropertyId::new(property, t.constraint_index)]
            }
            Timeline::Sequence(t) => vec![PropertyId {
                property: Property::Sequence,
                target: t.slot_index,
                detail: t.sequence_id,
            }],
        }
    }

    /// Time of the last key.
    pub fn duration(&self) -> f32 {
        let last = |frames: &[f32]| frames.last().copied().unwrap_or(0.0);
        match self {
            Timeline::Bone(t) => t.frames.duration(),
            Timeline::Color(t) => t.frames.duration(),
            Timeline::Attachment(t) => last(&t.frames),
            Timeline::Deform(t) => t.frames.duration(),
            Timeline::DrawOrder(t) => last(&t.frames),
            Timeline::Event(t) => last(&t.frames),
            Timeline::IkConstraint(t) => t.frames.duration(),
            Timeline::TransformConstraint(t) => t.frames.duration(),
            Timeline::PathConstraint(t) => t.frames.duration(),
            Timeline::Sequence(t) => last(&t.frames),
        }
    }

    pub(crate) fn as_rotate(&self) -> Option<&BoneTimeline> {
        match self {
            Timeline::Bone(t) if t.property == BoneProperty::Rotate => Some(t),
            _ => None,
        }
    }

    /// Poses `skeleton` at `time`. `events` receives event keys in `(last_time, time]`.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        last_time: f32,
        time: f32,
        events: Option<&mut Vec<Event>>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        match self {
            Timeline::Bone(t) => t.apply(skeleton, time, alpha, blend, direction),
            Timeline::Color(t) => t.apply(skeleton, time, alpha, blend),
            Timeline::Attachment(t) => t.apply(skeleton, time, blend, direction),
            Timeline::Deform(t) => t.apply(skeleton, time, alpha, blend),
            Timeline::DrawOrder(t) => t.apply(skeleton, time, blend, direction),
            Timeline::Event(t) => {
                if let Some(events) = events {
                    t.collect(last_time, time, events);
                }
            }
            Timeline::IkConstraint(t) => t.apply(skeleton, time, alpha, blend, direction),
            Timeline::TransformConstraint(t) => t.apply(skeleton, time, alpha, blend),
            Timeline::PathConstraint(t) => t.apply(skeleton, time, alpha, blend),
            Timeline::Sequence(t) => t.apply(skeleton, time, blend),
        }
    }
}

macro_rules! impl_from_timeline {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(impl From<$ty> for Timeline {
            fn from(timeline: $ty) -> Self {
                Timeline::$variant(timeline)
            }
        })*
    };
}

impl_from_timeline! {
    Bone => BoneTimeline,
    Color => ColorTimeline,
    Attachment => AttachmentTimeline,
    Deform => DeformTimeline,
    DrawOrder => DrawOrderTimeline,
    Event => EventTimeline,
    IkConstraint => IkConstraintTimeline,
    TransformConstraint => TransformConstraintTimeline,
    PathConstraint => PathConstraintTimeline,
    Sequence => SequenceTimeline,
}
