use crate::runtime::math::{PI, RAD_DEG, signum, wrap_degrees};
use crate::{IkConstraintData, Skeleton, TransformMode};

/// Runtime state of an IK constraint. Timelines write the mix values.
#[derive(Clone, Debug)]
pub struct IkConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix: f32,
    pub softness: f32,
    pub bend_direction: i32,
    pub compress: bool,
    pub stretch: bool,
    pub active: bool,
}

impl IkConstraint {
    pub(crate) fn new(data_index: usize, data: &IkConstraintData) -> Self {
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            mix: data.mix,
            softness: data.softness,
            bend_direction: data.bend_direction,
            compress: data.compress,
            stretch: data.stretch,
            active: false,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &IkConstraintData) {
        self.mix = data.mix;
        self.softness = data.softness;
        self.bend_direction = data.bend_direction;
        self.compress = data.compress;
        self.stretch = data.stretch;
    }
}

impl Skeleton {
    pub(crate) fn apply_ik_constraint(&mut self, index: usize) {
        let Some(constraint) = self.ik_constraints.get(index) else {
            return;
        };
        if constraint.mix == 0.0 {
            return;
        }
        let Some(target) = self.bones.get(constraint.target) else {
            log::warn!("ik constraint {index} targets missing bone {}", constraint.target);
            return;
        };
        let (target_x, target_y) = (target.world_x, target.world_y);
        let uniform = self.data.ik_constraints[constraint.data_index].uniform;
        let IkConstraint {
            compress,
            stretch,
            bend_direction,
            softness,
            mix,
            ..
        } = *constraint;
        match *constraint.bones.as_slice() {
            [bone] => self.apply_ik1(bone, target_x, target_y, compress, stretch, uniform, mix),
            [parent, child] => self.apply_ik2(
                parent,
                child,
                target_x,
                target_y,
                bend_direction,
                stretch,
                uniform,
                softness,
                mix,
            ),
            _ => {}
        }
    }

    /// Rotates one bone toward a world point. With `compress`/`stretch` the bone's x scale is
    /// adjusted so its tip reaches the point.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_ik1(
        &mut self,
        bone_index: usize,
        target_x: f32,
        target_y: f32,
        compress: bool,
        stretch: bool,
        uniform: bool,
        alpha: f32,
    ) {
        let Some(bone) = self.bones.get(bone_index) else {
            return;
        };
        let bone_data = &self.data.bones[bone.data_index()];
        let mode = bone_data.transform_mode;
        let length = bone_data.length;
        let (pa, mut pb, pc, mut pd, pwx, pwy) = self.parent_frame(bone_index);

        let mut rotation_ik = -bone.ashear_x - bone.arotation;
        let (mut tx, mut ty);
        match mode {
            TransformMode::OnlyTranslation => {
                tx = (target_x - bone.world_x) * signum(self.scale_x);
                ty = (target_y - bone.world_y) * signum(self.scale_y);
            }
            _ => {
                if mode == TransformMode::NoRotationOrReflection {
                    let s = (pa * pd - pb * pc).abs() / (pa * pa + pc * pc).max(0.0001);
                    let sa = pa / self.scale_x;
                    let sc = pc / self.scale_y;
                    pb = -sc * s * self.scale_x;
                    pd = sa * s * self.scale_y;
                    rotation_ik += sc.atan2(sa) * RAD_DEG;
                }
                let x = target_x - pwx;
                let y = target_y - pwy;
                let det = pa * pd - pb * pc;
                if det.abs() <= 0.0001 {
                    tx = 0.0;
                    ty = 0.0;
                } else {
                    tx = (x * pd - y * pb) / det - bone.ax;
                    ty = (y * pa - x * pc) / det - bone.ay;
                }
            }
        }

        rotation_ik += ty.atan2(tx) * RAD_DEG;
        if bone.ascale_x < 0.0 {
            rotation_ik += 180.0;
        }
        let rotation_ik = wrap_degrees(rotation_ik);

        let (mut sx, mut sy) = (bone.ascale_x, bone.ascale_y);
        if compress || stretch {
            if matches!(
                mode,
                TransformMode::NoScale | TransformMode::NoScaleOrReflection
            ) {
                tx = target_x - bone.world_x;
                ty = target_y - bone.world_y;
            }
            let b = length * sx;
            if b > 0.0001 {
                let dd = (tx * tx + ty * ty).sqrt();
                if (compress && dd < b) || (stretch && dd > b) {
                    let s = (dd / b - 1.0) * alpha + 1.0;
                    sx *= s;
                    if uniform {
                        sy *= s;
                    }
                }
            }
        }

        let (ax, ay) = (bone.ax, bone.ay);
        let rotation = bone.arotation + rotation_ik * alpha;
        let (shear_x, shear_y) = (bone.ashear_x, bone.ashear_y);
        self.update_world_transform_with(bone_index, ax, ay, rotation, sx, sy, shear_x, shear_y);
    }

    /// Bends a parent/child pair so the child's tip reaches a world point. `child` must be a
    /// direct child of `parent`.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_ik2(
        &mut self,
        parent_index: usize,
        child_index: usize,
        target_x: f32,
        target_y: f32,
        bend_direction: i32,
        stretch: bool,
        uniform: bool,
        softness: f32,
        alpha: f32,
    ) {
        let (Some(parent), Some(child)) = (self.bones.get(parent_index), self.bones.get(child_index))
        else {
            return;
        };
        let bend = bend_direction as f32;
        let (px, py) = (parent.ax, parent.ay);
        let (mut psx, mut psy) = (parent.ascale_x, parent.ascale_y);
        let (mut sx, mut sy) = (psx, psy);
        let mut csx = child.ascale_x;

        let (os1, mut s2) = if psx < 0.0 {
            psx = -psx;
            (180.0, -1.0)
        } else {
            (0.0, 1.0)
        };
        if psy < 0.0 {
            psy = -psy;
            s2 = -s2;
        }
        let os2 = if csx < 0.0 {
            csx = -csx;
            180.0
        } else {
            0.0
        };

        let cx = child.ax;
        let uniform_scale = (psx - psy).abs() <= 0.0001;
        let (cy, cwx, cwy) = if !uniform_scale || stretch {
            (0.0, parent.a * cx + parent.world_x, parent.c * cx + parent.world_y)
        } else {
            let cy = child.ay;
            (
                cy,
                parent.a * cx + parent.b * cy + parent.world_x,
                parent.c * cx + parent.d * cy + parent.world_y,
            )
        };
        let child_length = self.data.bones[child.data_index()].length;
        let (c_ascale_x, c_ascale_y) = (child.ascale_x, child.ascale_y);
        let (c_shear_x, c_shear_y) = (child.ashear_x, child.ashear_y);
        let c_rotation = child.arotation;
        let p_rotation = parent.arotation;

        let (a, b, c, d, ppx, ppy) = self.parent_frame(parent_index);
        let det = a * d - b * c;
        let id = if det.abs() <= 0.0001 { 0.0 } else { 1.0 / det };
        let (x, y) = (cwx - ppx, cwy - ppy);
        let dx = (x * d - y * b) * id - px;
        let dy = (y * a - x * c) * id - py;
        let l1 = (dx * dx + dy * dy).sqrt();
        let mut l2 = child_length * csx;

        if l1 < 0.0001 {
            self.apply_ik1(parent_index, target_x, target_y, false, stretch, false, alpha);
            self.update_world_transform_with(
                child_index,
                cx,
                cy,
                0.0,
                c_ascale_x,
                c_ascale_y,
                c_shear_x,
                c_shear_y,
            );
            return;
        }

        let (x, y) = (target_x - ppx, target_y - ppy);
        let mut tx = (x * d - y * b) * id - px;
        let mut ty = (y * a - x * c) * id - py;
        let mut dd = tx * tx + ty * ty;

        if softness != 0.0 {
            let softness = softness * psx * (csx + 1.0) * 0.5;
            let td = dd.sqrt();
            let sd = td - l1 - l2 * psx + softness;
            if sd > 0.0 {
                let p = (sd / (softness * 2.0)).min(1.0) - 1.0;
                let p = (sd - softness * (1.0 - p * p)) / td;
                tx -= p * tx;
                ty -= p * ty;
                dd = tx * tx + ty * ty;
            }
        }

        let (a1, a2) = if uniform_scale {
            l2 *= psx;
            let mut cos = (dd - l1 * l1 - l2 * l2) / (2.0 * l1 * l2);
            let a2 = if cos < -1.0 {
                cos = -1.0;
                PI * bend
            } else if cos > 1.0 {
                cos = 1.0;
                if stretch {
                    let s = (dd.sqrt() / (l1 + l2) - 1.0) * alpha + 1.0;
                    sx *= s;
                    if uniform {
                        sy *= s;
                    }
                }
                0.0
            } else {
                cos.acos() * bend
            };
            let adj = l1 + l2 * cos;
            let opp = l2 * a2.sin();
            ((ty * adj - tx * opp).atan2(tx * adj + ty * opp), a2)
        } else {
            solve_ellipse(l1, l2 * psx, l2 * psy, psx, psy, tx, ty, dd, bend)
        };

        let os = cy.atan2(cx) * s2;
        let a1 = wrap_degrees((a1 - os) * RAD_DEG + os1 - p_rotation);
        self.update_world_transform_with(
            parent_index,
            px,
            py,
            p_rotation + a1 * alpha,
            sx,
            sy,
            0.0,
            0.0,
        );
        let a2 = wrap_degrees(((a2 + os) * RAD_DEG - c_shear_x) * s2 + os2 - c_rotation);
        self.update_world_transform_with(
            child_index,
            cx,
            cy,
            c_rotation + a2 * alpha,
            c_ascale_x,
            c_ascale_y,
            c_shear_x,
            c_shear_y,
        );
    }
}

/// Two-bone solve when the parent scale is non-uniform: the child's reach is an ellipse.
/// Returns the parent and child angles in radians.
#[allow(clippy::too_many_arguments)]
fn solve_ellipse(
    l1: f32,
    a: f32,
    b: f32,
    psx: f32,
    psy: f32,
    tx: f32,
    ty: f32,
    dd: f32,
    bend: f32,
) -> (f32, f32) {
    let aa = a * a;
    let bb = b * b;
    let ta = ty.atan2(tx);
    let c = bb * l1 * l1 + aa * dd - aa * bb;
    let c1 = -2.0 * bb * l1;
    let c2 = bb - aa;
    let d = c1 * c1 - 4.0 * c2 * c;
    if d >= 0.0 {
        let mut q = d.sqrt();
        if c1 < 0.0 {
            q = -q;
        }
        q = -(c1 + q) * 0.5;
        let r0 = q / c2;
        let r1 = c / q;
        let r = if r0.abs() < r1.abs() { r0 } else { r1 };
        if r.is_finite() && r * r <= dd {
            let y = (dd - r * r).sqrt() * bend;
            return (ta - y.atan2(r), (y / psy).atan2((r - l1) / psx));
        }
    }

    let (mut min_angle, mut min_x, mut min_y) = (PI, l1 - a, 0.0);
    let mut min_dist = min_x * min_x;
    let (mut max_angle, mut max_x, mut max_y) = (0.0, l1 + a, 0.0);
    let mut max_dist = max_x * max_x;
    let c = -a * l1 / (aa - bb);
    if (-1.0..=1.0).contains(&c) {
        let angle = c.acos();
        let x = a * angle.cos() + l1;
        let y = b * angle.sin();
        let dist = x * x + y * y;
        if dist < min_dist {
            min_angle = angle;
            min_dist = dist;
            min_x = x;
            min_y = y;
        }
        if dist > max_dist {
            max_angle = angle;
            max_dist = dist;
            max_x = x;
            max_y = y;
        }
    }
    if dd <= (min_dist + max_dist) * 0.5 {
        (ta - (min_y * bend).atan2(min_x), min_angle * bend)
    } else {
        (ta - (max_y * bend).atan2(max_x), max_angle * bend)
    }
}
