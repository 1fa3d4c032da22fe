use crate::runtime::math::{DEG_RAD, PI, wrap_degrees, wrap_radians};
use crate::{Skeleton, TransformConstraintData};

#[derive(Clone, Debug, Default)]
pub struct TransformConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub mix_scale_x: f32,
    pub mix_scale_y: f32,
    pub mix_shear_y: f32,
    pub active: bool,
}

impl TransformConstraint {
    pub(crate) fn new(data_index: usize, data: &TransformConstraintData) -> Self {
        let mut constraint = Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            mix_rotate: 0.0,
            mix_x: 0.0,
            mix_y: 0.0,
            mix_scale_x: 0.0,
            mix_scale_y: 0.0,
            mix_shear_y: 0.0,
            active: false,
        };
        constraint.set_to_setup_pose(data);
        constraint
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &TransformConstraintData) {
        self.mix_rotate = data.mix_rotate;
        self.mix_x = data.mix_x;
        self.mix_y = data.mix_y;
        self.mix_scale_x = data.mix_scale_x;
        self.mix_scale_y = data.mix_scale_y;
        self.mix_shear_y = data.mix_shear_y;
    }

    fn is_inert(&self) -> bool {
        self.mix_rotate == 0.0
            && self.mix_x == 0.0
            && self.mix_y == 0.0
            && self.mix_scale_x == 0.0
            && self.mix_scale_y == 0.0
            && self.mix_shear_y == 0.0
    }
}

impl Skeleton {
    pub(crate) fn apply_transform_constraint(&mut self, index: usize) {
        let Some(constraint) = self.transform_constraints.get(index) else {
            return;
        };
        if constraint.is_inert() || self.bones.get(constraint.target).is_none() {
            return;
        }
        // Moved out while it is applied and put back afterwards.
        let constraint = std::mem::take(&mut self.transform_constraints[index]);
        let data = self.data.clone();
        let data = &data.transform_constraints[constraint.data_index];
        match (data.local, data.relative) {
            (false, false) => self.transform_absolute_world(&constraint, data),
            (false, true) => self.transform_relative_world(&constraint, data),
            (true, false) => self.transform_absolute_local(&constraint, data),
            (true, true) => self.transform_relative_local(&constraint, data),
        }
        self.transform_constraints[index] = constraint;
    }

    fn transform_absolute_world(&mut self, c: &TransformConstraint, data: &TransformConstraintData) {
        let target = &self.bones[c.target];
        let (ta, tb, tc, td) = (target.a, target.b, target.c, target.d);
        let (offset_x, offset_y) = target.local_to_world(data.offset_x, data.offset_y);
        let reflect = if ta * td - tb * tc > 0.0 { DEG_RAD } else { -DEG_RAD };
        let offset_rotation = data.offset_rotation * reflect;
        let offset_shear_y = data.offset_shear_y * reflect;
        let translate = c.mix_x != 0.0 || c.mix_y != 0.0;

        for &bone_index in &c.bones {
            let Some(bone) = self.bones.get_mut(bone_index) else {
                continue;
            };
            if c.mix_rotate != 0.0 {
                let r = wrap_radians(tc.atan2(ta) - bone.c.atan2(bone.a) + offset_rotation);
                rotate_affine(&mut bone.a, &mut bone.b, &mut bone.c, &mut bone.d, r * c.mix_rotate);
            }
            if translate {
                bone.world_x += (offset_x - bone.world_x) * c.mix_x;
                bone.world_y += (offset_y - bone.world_y) * c.mix_y;
            }
            if c.mix_scale_x != 0.0 {
                let mut s = (bone.a * bone.a + bone.c * bone.c).sqrt();
                if s != 0.0 {
                    s = (s + ((ta * ta + tc * tc).sqrt() - s + data.offset_scale_x) * c.mix_scale_x)
                        / s;
                }
                bone.a *= s;
                bone.c *= s;
            }
            if c.mix_scale_y != 0.0 {
                let mut s = (bone.b * bone.b + bone.d * bone.d).sqrt();
                if s != 0.0 {
                    s = (s + ((tb * tb + td * td).sqrt() - s + data.offset_scale_y) * c.mix_scale_y)
                        / s;
                }
                bone.b *= s;
                bone.d *= s;
            }
            if c.mix_shear_y > 0.0 {
                let by = bone.d.atan2(bone.b);
                let r = wrap_radians(td.atan2(tb) - tc.atan2(ta) - (by - bone.c.atan2(bone.a)));
                let r = by + (r + offset_shear_y) * c.mix_shear_y;
                let s = (bone.b * bone.b + bone.d * bone.d).sqrt();
                bone.b = r.cos() * s;
                bone.d = r.sin() * s;
            }
            self.update_applied_transform(bone_index);
        }
    }

    fn transform_relative_world(&mut self, c: &TransformConstraint, data: &TransformConstraintData) {
        let target = &self.bones[c.target];
        let (ta, tb, tc, td) = (target.a, target.b, target.c, target.d);
        let (offset_x, offset_y) = target.local_to_world(data.offset_x, data.offset_y);
        let reflect = if ta * td - tb * tc > 0.0 { DEG_RAD } else { -DEG_RAD };
        let offset_rotation = data.offset_rotation * reflect;
        let offset_shear_y = data.offset_shear_y * reflect;
        let translate = c.mix_x != 0.0 || c.mix_y != 0.0;

        for &bone_index in &c.bones {
            let Some(bone) = self.bones.get_mut(bone_index) else {
                continue;
            };
            if c.mix_rotate != 0.0 {
                let r = wrap_radians(tc.atan2(ta) + offset_rotation);
                rotate_affine(&mut bone.a, &mut bone.b, &mut bone.c, &mut bone.d, r * c.mix_rotate);
            }
            if translate {
                bone.world_x += offset_x * c.mix_x;
                bone.world_y += offset_y * c.mix_y;
            }
            if c.mix_scale_x != 0.0 {
                let s = ((ta * ta + tc * tc).sqrt() - 1.0 + data.offset_scale_x) * c.mix_scale_x
                    + 1.0;
                bone.a *= s;
                bone.c *= s;
            }
            if c.mix_scale_y != 0.0 {
                let s = ((tb * tb + td * td).sqrt() - 1.0 + data.offset_scale_y) * c.mix_scale_y
                    + 1.0;
                bone.b *= s;
                bone.d *= s;
            }
            if c.mix_shear_y > 0.0 {
                let r = wrap_radians(td.atan2(tb) - tc.atan2(ta));
                let r = bone.d.atan2(bone.b) + (r - PI / 2.0 + offset_shear_y) * c.mix_shear_y;
                let s = (bone.b * bone.b + bone.d * bone.d).sqrt();
                bone.b = r.cos() * s;
                bone.d = r.sin() * s;
            }
            self.update_applied_transform(bone_index);
        }
    }

    fn transform_absolute_local(&mut self, c: &TransformConstraint, data: &TransformConstraintData) {
        let target = &self.bones[c.target];
        let (t_rotation, t_x, t_y) = (target.arotation, target.ax, target.ay);
        let (t_scale_x, t_scale_y, t_shear_y) = (target.ascale_x, target.ascale_y, target.ashear_y);

        for &bone_index in &c.bones {
            let Some(bone) = self.bones.get(bone_index) else {
                continue;
            };
            let mut rotation = bone.arotation;
            if c.mix_rotate != 0.0 {
                rotation +=
                    wrap_degrees(t_rotation - rotation + data.offset_rotation) * c.mix_rotate;
            }
            let x = bone.ax + (t_x - bone.ax + data.offset_x) * c.mix_x;
            let y = bone.ay + (t_y - bone.ay + data.offset_y) * c.mix_y;
            let mut scale_x = bone.ascale_x;
            if c.mix_scale_x != 0.0 && scale_x != 0.0 {
                scale_x += (t_scale_x - scale_x + data.offset_scale_x) * c.mix_scale_x;
            }
            let mut scale_y = bone.ascale_y;
            if c.mix_scale_y != 0.0 && scale_y != 0.0 {
                scale_y += (t_scale_y - scale_y + data.offset_scale_y) * c.mix_scale_y;
            }
            let mut shear_y = bone.ashear_y;
            if c.mix_shear_y != 0.0 {
                shear_y += wrap_degrees(t_shear_y - shear_y + data.offset_shear_y) * c.mix_shear_y;
            }
            let shear_x = bone.ashear_x;
            self.update_world_transform_with(
                bone_index, x, y, rotation, scale_x, scale_y, shear_x, shear_y,
            );
        }
    }

    fn transform_relative_local(&mut self, c: &TransformConstraint, data: &TransformConstraintData) {
        let target = &self.bones[c.target];
        let (t_rotation, t_x, t_y) = (target.arotation, target.ax, target.ay);
        let (t_scale_x, t_scale_y, t_shear_y) = (target.ascale_x, target.ascale_y, target.ashear_y);

        for &bone_index in &c.bones {
            let Some(bone) = self.bones.get(bone_index) else {
                continue;
            };
            let rotation = bone.arotation + (t_rotation + data.offset_rotation) * c.mix_rotate;
            let x = bone.ax + (t_x + data.offset_x) * c.mix_x;
            let y = bone.ay + (t_y + data.offset_y) * c.mix_y;
            let scale_x =
                bone.ascale_x * ((t_scale_x - 1.0 + data.offset_scale_x) * c.mix_scale_x + 1.0);
            let scale_y =
                bone.ascale_y * ((t_scale_y - 1.0 + data.offset_scale_y) * c.mix_scale_y + 1.0);
            let shear_y = bone.ashear_y + (t_shear_y + data.offset_shear_y) * c.mix_shear_y;
            let shear_x = bone.ashear_x;
            self.update_world_transform_with(
                bone_index, x, y, rotation, scale_x, scale_y, shear_x, shear_y,
            );
        }
    }
}

/// Pre-multiplies a 2x2 affine by a rotation of `radians`.
pub(crate) fn rotate_affine(a: &mut f32, b: &mut f32, c: &mut f32, d: &mut f32, radians: f32) {
    let (sin, cos) = radians.sin_cos();
    let (a0, b0, c0, d0) = (*a, *b, *c, *d);
    *a = cos * a0 - sin * c0;
    *b = cos * b0 - sin * d0;
    *c = sin * a0 + cos * c0;
    *d = sin * b0 + cos * d0;
}
