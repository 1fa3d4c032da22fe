use crate::{Animation, Attachment, Error};
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoneData {
    pub name: String,
    /// Index of the parent bone. Parents are always declared before their children.
    pub parent: Option<usize>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
    pub transform_mode: TransformMode,
    /// Only active when the current skin lists this bone.
    pub skin_required: bool,
}

impl BoneData {
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            length: 0.0,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            transform_mode: TransformMode::Normal,
            skin_required: false,
        }
    }
}

/// How a bone inherits its parent's world transform.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TransformMode {
    #[default]
    Normal,
    OnlyTranslation,
    NoRotationOrReflection,
    NoScale,
    NoScaleOrReflection,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotData {
    pub name: String,
    pub bone: usize,
    pub attachment_name: Option<String>,
    pub color: [f32; 4],
    /// Present when the slot uses two color tinting.
    pub dark_color: Option<[f32; 3]>,
    pub blend_mode: BlendMode,
}

impl SlotData {
    pub fn new(name: impl Into<String>, bone: usize) -> Self {
        Self {
            name: name.into(),
            bone,
            attachment_name: None,
            color: [1.0; 4],
            dark_color: None,
            blend_mode: BlendMode::Normal,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IkConstraintData {
    pub name: String,
    pub order: usize,
    pub skin_required: bool,
    /// One or two bones, parent first.
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix: f32,
    pub softness: f32,
    pub bend_direction: i32,
    pub compress: bool,
    pub stretch: bool,
    pub uniform: bool,
}

impl IkConstraintData {
    pub fn new(name: impl Into<String>, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones,
            target,
            mix: 1.0,
            softness: 0.0,
            bend_direction: 1,
            compress: false,
            stretch: false,
            uniform: false,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransformConstraintData {
    pub name: String,
    pub order: usize,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    pub target: usize,
    /// Copy local transforms instead of world transforms.
    pub local: bool,
    /// Add the target's transform instead of replacing.
    pub relative: bool,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub mix_scale_x: f32,
    pub mix_scale_y: f32,
    pub mix_shear_y: f32,
    pub offset_rotation: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub offset_scale_x: f32,
    pub offset_scale_y: f32,
    pub offset_shear_y: f32,
}

impl TransformConstraintData {
    pub fn new(name: impl Into<String>, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones,
            target,
            local: false,
            relative: false,
            mix_rotate: 1.0,
            mix_x: 1.0,
            mix_y: 1.0,
            mix_scale_x: 1.0,
            mix_scale_y: 1.0,
            mix_shear_y: 1.0,
            offset_rotation: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            offset_scale_x: 0.0,
            offset_scale_y: 0.0,
            offset_shear_y: 0.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PositionMode {
    Fixed,
    #[default]
    Percent,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpacingMode {
    #[default]
    Length,
    Fixed,
    Percent,
    Proportional,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RotateMode {
    #[default]
    Tangent,
    Chain,
    ChainScale,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathConstraintData {
    pub name: String,
    pub order: usize,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    /// Slot whose path attachment is followed.
    pub target: usize,
    pub position_mode: PositionMode,
    pub spacing_mode: SpacingMode,
    pub rotate_mode: RotateMode,
    pub offset_rotation: f32,
    pub position: f32,
    pub spacing: f32,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
}

impl PathConstraintData {
    pub fn new(name: impl Into<String>, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones,
            target,
            position_mode: PositionMode::Percent,
            spacing_mode: SpacingMode::Length,
            rotate_mode: RotateMode::Tangent,
            offset_rotation: 0.0,
            position: 0.0,
            spacing: 0.0,
            mix_rotate: 1.0,
            mix_x: 1.0,
            mix_y: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SkinData {
    pub name: String,
    /// Per slot index, attachment name to attachment.
    pub attachments: Vec<HashMap<String, Arc<Attachment>>>,
    pub bones: Vec<usize>,
    pub ik_constraints: Vec<usize>,
    pub transform_constraints: Vec<usize>,
    pub path_constraints: Vec<usize>,
}

impl SkinData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn set_attachment(
        &mut self,
        slot_index: usize,
        name: impl Into<String>,
        attachment: Attachment,
    ) {
        if self.attachments.len() <= slot_index {
            self.attachments.resize_with(slot_index + 1, HashMap::new);
        }
        self.attachments[slot_index].insert(name.into(), Arc::new(attachment));
    }

    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<&Arc<Attachment>> {
        self.attachments.get(slot_index)?.get(name)
    }

    /// Iterates `(slot_index, name, attachment)` for every entry of this skin.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &str, &Arc<Attachment>)> {
        self.attachments.iter().enumerate().flat_map(|(slot, map)| {
            map.iter()
                .map(move |(name, attachment)| (slot, name.as_str(), attachment))
        })
    }
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventData {
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: String,
    pub audio_path: Option<String>,
    pub volume: f32,
    pub balance: f32,
}

impl EventData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume: 1.0,
            ..Self::default()
        }
    }
}

/// A keyed event instance. Values start from the [`EventData`] defaults and may be overridden
/// per key.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    pub data_index: usize,
    pub name: String,
    pub time: f32,
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: String,
    pub volume: f32,
    pub balance: f32,
}

impl Event {
    pub fn new(data_index: usize, data: &EventData, time: f32) -> Self {
        Self {
            data_index,
            name: data.name.clone(),
            time,
            int_value: data.int_value,
            float_value: data.float_value,
            string_value: data.string_value.clone(),
            volume: data.volume,
            balance: data.balance,
        }
    }
}

/// Immutable skeleton definition shared by every [`crate::Skeleton`] built from it.
#[derive(Clone, Debug, Default)]
pub struct SkeletonData {
    pub name: Option<String>,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub skins: Vec<SkinData>,
    pub default_skin: Option<usize>,
    pub events: Vec<EventData>,
    pub animations: Vec<Arc<Animation>>,
    pub ik_constraints: Vec<IkConstraintData>,
    pub transform_constraints: Vec<TransformConstraintData>,
    pub path_constraints: Vec<PathConstraintData>,
}

impl SkeletonData {
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    pub fn find_skin(&self, name: &str) -> Option<usize> {
        self.skins.iter().position(|s| s.name == name)
    }

    pub fn find_event(&self, name: &str) -> Option<usize> {
        self.events.iter().position(|e| e.name == name)
    }

    pub fn find_animation(&self, name: &str) -> Option<&Arc<Animation>> {
        self.animations.iter().find(|a| a.name == name)
    }

    pub fn find_ik_constraint(&self, name: &str) -> Option<usize> {
        self.ik_constraints.iter().position(|c| c.name == name)
    }

    pub fn find_transform_constraint(&self, name: &str) -> Option<usize> {
        self.transform_constraints
            .iter()
            .position(|c| c.name == name)
    }

    pub fn find_path_constraint(&self, name: &str) -> Option<usize> {
        self.path_constraints.iter().position(|c| c.name == name)
    }

    pub fn default_skin(&self) -> Option<&SkinData> {
        self.skins.get(self.default_skin?)
    }

    /// Checks every cross reference a loader is expected to have resolved.
    pub fn validate(&self) -> Result<(), Error> {
        let bone_count = self.bones.len();
        for (index, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= index {
                    return Err(Error::InvalidBoneParent {
                        bone: bone.name.clone(),
                        parent,
                    });
                }
            }
        }

        for slot in &self.slots {
            check_index("slot", &slot.name, "bone", slot.bone, bone_count)?;
        }

        let mut orders = Vec::new();
        for ik in &self.ik_constraints {
            if ik.bones.is_empty() || ik.bones.len() > 2 {
                return Err(Error::InvalidConstraintBones {
                    kind: "ik constraint",
                    name: ik.name.clone(),
                    expected: "1 or 2",
                    found: ik.bones.len(),
                });
            }
            check_index("ik constraint", &ik.name, "target bone", ik.target, bone_count)?;
            for &bone in &ik.bones {
                check_index("ik constraint", &ik.name, "bone", bone, bone_count)?;
            }
            if let [parent, child] = ik.bones[..] {
                if self.bones[child].parent != Some(parent) {
                    return Err(Error::InvalidValue {
                        message: format!(
                            "ik constraint '{}' child bone must be a direct child of its parent bone",
                            ik.name
                        ),
                    });
                }
            }
            orders.push(ik.order);
        }
        for tc in &self.transform_constraints {
            check_index("transform constraint", &tc.name, "target bone", tc.target, bone_count)?;
            for &bone in &tc.bones {
                check_index("transform constraint", &tc.name, "bone", bone, bone_count)?;
            }
            orders.push(tc.order);
        }
        for pc in &self.path_constraints {
            check_index("path constraint", &pc.name, "target slot", pc.target, self.slots.len())?;
            for &bone in &pc.bones {
                check_index("path constraint", &pc.name, "bone", bone, bone_count)?;
            }
            orders.push(pc.order);
        }
        orders.sort_unstable();
        if let Some(pair) = orders.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::DuplicateConstraintOrder { order: pair[0] });
        }

        for skin in &self.skins {
            if skin.attachments.len() > self.slots.len() {
                return Err(Error::InvalidReference {
                    kind: "skin",
                    name: skin.name.clone(),
                    reference: "slot",
                    index: skin.attachments.len() - 1,
                });
            }
            for &bone in &skin.bones {
                check_index("skin", &skin.name, "bone", bone, bone_count)?;
            }
            for &c in &skin.ik_constraints {
                check_index("skin", &skin.name, "ik constraint", c, self.ik_constraints.len())?;
            }
            for &c in &skin.transform_constraints {
                check_index(
                    "skin",
                    &skin.name,
                    "transform constraint",
                    c,
                    self.transform_constraints.len(),
                )?;
            }
            for &c in &skin.path_constraints {
                check_index("skin", &skin.name, "path constraint", c, self.path_constraints.len())?;
            }
        }
        if let Some(default_skin) = self.default_skin {
            check_index("skeleton", "default skin", "skin", default_skin, self.skins.len())?;
        }
        Ok(())
    }
}

fn check_index(
    kind: &'static str,
    name: &str,
    reference: &'static str,
    index: usize,
    len: usize,
) -> Result<(), Error> {
    if index < len {
        return Ok(());
    }
    Err(Error::InvalidReference {
        kind,
        name: name.to_string(),
        reference,
        index,
    })
}
