use crate::{BlendMode, Skeleton};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BonePose {
    pub name: String,
    pub active: bool,
    /// World affine `[a, b, c, d, world_x, world_y]`.
    pub world: [f32; 6],
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotPose {
    pub name: String,
    pub bone: usize,
    pub attachment: Option<String>,
    pub color: [f32; 4],
    pub dark_color: Option<[f32; 3]>,
    pub blend_mode: BlendMode,
    pub sequence_index: i32,
    pub deform_len: usize,
}

/// Read-only capture of what a renderer needs from a posed skeleton: bone world transforms and
/// slots in draw order.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoseSnapshot {
    pub bones: Vec<BonePose>,
    pub slots: Vec<SlotPose>,
    pub color: [f32; 4],
}

impl PoseSnapshot {
    pub fn capture(skeleton: &Skeleton) -> Self {
        let data = &skeleton.data;
        let bones = skeleton
            .bones
            .iter()
            .map(|bone| BonePose {
                name: data
                    .bones
                    .get(bone.data_index())
                    .map(|b| b.name.clone())
                    .unwrap_or_default(),
                active: bone.active,
                world: [bone.a, bone.b, bone.c, bone.d, bone.world_x, bone.world_y],
            })
            .collect();

        let slots = skeleton
            .draw_order
            .iter()
            .filter_map(|&index| {
                let slot = skeleton.slots.get(index)?;
                let slot_data = data.slots.get(slot.data_index())?;
                Some(SlotPose {
                    name: slot_data.name.clone(),
                    bone: slot.bone,
                    attachment: slot.attachment().map(|a| a.name().to_string()),
                    color: slot.color,
                    dark_color: slot.dark_color,
                    blend_mode: slot_data.blend_mode,
                    sequence_index: slot.sequence_index,
                    deform_len: slot.deform.len(),
                })
            })
            .collect();

        Self {
            bones,
            slots,
            color: skeleton.color,
        }
    }

    /// Largest absolute difference between matching bone world transform components. Bones
    /// present in only one snapshot are ignored.
    pub fn max_world_delta(&self, other: &PoseSnapshot) -> f32 {
        self.bones
            .iter()
            .zip(&other.bones)
            .flat_map(|(a, b)| a.world.iter().zip(&b.world).map(|(x, y)| (x - y).abs()))
            .fold(0.0, f32::max)
    }

    pub fn bone(&self, name: &str) -> Option<&BonePose> {
        self.bones.iter().find(|bone| bone.name == name)
    }
}
