//! Path constraint: positions and rotates bones along a cubic bezier path attachment.
//!
//! Spaces between bones are computed first, then each space is mapped to a point on the path
//! (`x, y, tangent` triples) and the bones are moved onto those points.

use crate::runtime::math::{DEG_RAD, wrap_radians};
use crate::runtime::transform_constraint::rotate_affine;
use crate::{
    Attachment, PathAttachment, PathConstraintData, PositionMode, RotateMode, Skeleton,
    SpacingMode,
};
use std::sync::Arc;

const EPSILON: f32 = 0.00001;

#[derive(Clone, Debug, Default)]
pub struct PathConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    /// Slot whose path attachment is followed.
    pub target: usize,
    pub position: f32,
    pub spacing: f32,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub active: bool,
}

impl PathConstraint {
    pub(crate) fn new(data_index: usize, data: &PathConstraintData) -> Self {
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            position: data.position,
            spacing: data.spacing,
            mix_rotate: data.mix_rotate,
            mix_x: data.mix_x,
            mix_y: data.mix_y,
            active: false,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &PathConstraintData) {
        self.position = data.position;
        self.spacing = data.spacing;
        self.mix_rotate = data.mix_rotate;
        self.mix_x = data.mix_x;
        self.mix_y = data.mix_y;
    }
}

/// Buffers reused between frames.
#[derive(Clone, Debug, Default)]
pub(crate) struct PathScratch {
    spaces: Vec<f32>,
    lengths: Vec<f32>,
    positions: Vec<f32>,
    world: Vec<f32>,
    curves: Vec<f32>,
    segments: [f32; 10],
}

/// Before/after the ends of an open path, or the index of the curve currently cached in
/// `world`/`segments`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum CachedCurve {
    None,
    Before,
    After,
    Curve(usize),
}

impl Skeleton {
    pub(crate) fn apply_path_constraint(&mut self, index: usize) {
        let Some(constraint) = self.path_constraints.get(index) else {
            return;
        };
        if constraint.bones.is_empty()
            || (constraint.mix_rotate == 0.0 && constraint.mix_x == 0.0 && constraint.mix_y == 0.0)
        {
            return;
        }
        let Some(attachment) = self.slots.get(constraint.target).and_then(|s| s.attachment())
        else {
            return;
        };
        let attachment: Arc<Attachment> = attachment.clone();
        let Attachment::Path(path) = attachment.as_ref() else {
            return;
        };
        let constraint = std::mem::take(&mut self.path_constraints[index]);
        let data = self.data.clone();
        let data = &data.path_constraints[constraint.data_index];

        let mut scratch = std::mem::take(&mut self.path_scratch);
        let tangents = data.rotate_mode == RotateMode::Tangent;
        let scale = data.rotate_mode == RotateMode::ChainScale;
        let spaces_count = if tangents {
            constraint.bones.len()
        } else {
            constraint.bones.len() + 1
        };
        self.compute_path_spaces(&constraint, data, scale, spaces_count, &mut scratch);
        if self.compute_path_positions(path, &constraint, data, spaces_count, tangents, &mut scratch)
        {
            self.place_path_bones(&constraint, data, tangents, scale, &scratch);
        }
        self.path_scratch = scratch;
        self.path_constraints[index] = constraint;
    }

    fn compute_path_spaces(
        &self,
        c: &PathConstraint,
        data: &PathConstraintData,
        scale: bool,
        spaces_count: usize,
        scratch: &mut PathScratch,
    ) {
        let PathScratch { spaces, lengths, .. } = scratch;
        spaces.clear();
        spaces.resize(spaces_count, 0.0);
        lengths.clear();
        if scale {
            lengths.resize(c.bones.len(), 0.0);
        }

        let bone_length = |bone_index: usize| {
            let bone = &self.bones[bone_index];
            let setup = self.data.bones[bone.data_index()].length;
            let (x, y) = (setup * bone.a, setup * bone.c);
            (setup, (x * x + y * y).sqrt())
        };

        match data.spacing_mode {
            SpacingMode::Percent => {
                if scale {
                    for (i, &bone) in c.bones.iter().enumerate().take(spaces_count - 1) {
                        let (setup, length) = bone_length(bone);
                        lengths[i] = if setup < EPSILON { 0.0 } else { length };
                    }
                }
                spaces[1..].fill(c.spacing);
            }
            SpacingMode::Proportional => {
                let mut sum = 0.0;
                for (i, &bone) in c.bones.iter().enumerate().take(spaces_count - 1) {
                    let (setup, length) = bone_length(bone);
                    if setup < EPSILON {
                        spaces[i + 1] = c.spacing;
                    } else {
                        if scale {
                            lengths[i] = length;
                        }
                        spaces[i + 1] = length;
                        sum += length;
                    }
                }
                if sum > 0.0 {
                    let factor = spaces_count as f32 / sum * c.spacing;
                    for space in &mut spaces[1..] {
                        *space *= factor;
                    }
                }
            }
            SpacingMode::Length | SpacingMode::Fixed => {
                let by_length = data.spacing_mode == SpacingMode::Length;
                for (i, &bone) in c.bones.iter().enumerate().take(spaces_count - 1) {
                    let (setup, length) = bone_length(bone);
                    if setup < EPSILON {
                        spaces[i + 1] = c.spacing;
                    } else {
                        if scale {
                            lengths[i] = length;
                        }
                        let space = if by_length { setup + c.spacing } else { c.spacing };
                        spaces[i + 1] = space * length / setup;
                    }
                }
            }
        }
    }

    fn path_world_vertices(
        &self,
        path: &PathAttachment,
        slot_index: usize,
        start: usize,
        count: usize,
        out: &mut [f32],
        offset: usize,
    ) {
        let Some(slot) = self.slots.get(slot_index) else {
            return;
        };
        path.vertex_data
            .compute_world_vertices(&self.bones, slot, start, count, out, offset, 2);
    }

    /// Fills `scratch.positions` with x, y and tangent triples. Returns false when the path has
    /// too few vertices to form a curve.
    fn compute_path_positions(
        &self,
        path: &PathAttachment,
        c: &PathConstraint,
        data: &PathConstraintData,
        spaces_count: usize,
        tangents: bool,
        scratch: &mut PathScratch,
    ) -> bool {
        let PathScratch {
            spaces,
            positions,
            world,
            curves,
            segments,
            ..
        } = scratch;
        positions.clear();
        positions.resize(spaces_count * 3 + 2, 0.0);

        let closed = path.closed;
        let mut vertices_length = path.vertex_data.world_vertices_length();
        let mut curve_count = vertices_length / 6;
        let mut position = c.position;
        let mut cached = CachedCurve::None;

        let multiplier = |path_length: f32| match data.spacing_mode {
            SpacingMode::Percent => path_length,
            SpacingMode::Proportional => path_length / spaces_count as f32,
            SpacingMode::Length | SpacingMode::Fixed => 1.0,
        };

        if !path.constant_speed {
            let reduce = if closed { 1 } else { 2 };
            let Some(last_curve) = curve_count.checked_sub(reduce) else {
                return false;
            };
            let lengths = &path.lengths;
            let Some(&path_length) = lengths.get(last_curve) else {
                return false;
            };
            if data.position_mode == PositionMode::Percent {
                position *= path_length;
            }
            let multiplier = multiplier(path_length);
            world.clear();
            world.resize(8, 0.0);
            let mut curve = 0;
            for (i, &space) in spaces.iter().enumerate() {
                let o = i * 3;
                let space = space * multiplier;
                position += space;
                let mut p = position;
                if closed {
                    p = p.rem_euclid(path_length);
                    curve = 0;
                } else if p < 0.0 {
                    if cached != CachedCurve::Before {
                        cached = CachedCurve::Before;
                        self.path_world_vertices(path, c.target, 2, 4, world, 0);
                    }
                    add_before_position(p, world, 0, positions, o);
                    continue;
                } else if p > path_length {
                    if cached != CachedCurve::After {
                        cached = CachedCurve::After;
                        self.path_world_vertices(path, c.target, vertices_length - 6, 4, world, 0);
                    }
                    add_after_position(p - path_length, world, 0, positions, o);
                    continue;
                }

                let (found, t) = locate(lengths, last_curve + 1, curve, p);
                curve = found;
                if cached != CachedCurve::Curve(curve) {
                    cached = CachedCurve::Curve(curve);
                    if closed && curve == last_curve {
                        self.path_world_vertices(path, c.target, vertices_length - 4, 4, world, 0);
                        self.path_world_vertices(path, c.target, 0, 4, world, 4);
                    } else {
                        self.path_world_vertices(path, c.target, curve * 6 + 2, 8, world, 0);
                    }
                }
                let w: [f32; 8] = [
                    world[0], world[1], world[2], world[3], world[4], world[5], world[6], world[7],
                ];
                add_curve_position(t, &w, positions, o, tangents || (i > 0 && space == 0.0));
            }
            return true;
        }

        if closed {
            vertices_length += 2;
            if vertices_length < 4 {
                return false;
            }
            world.clear();
            world.resize(vertices_length, 0.0);
            self.path_world_vertices(path, c.target, 2, vertices_length - 4, world, 0);
            self.path_world_vertices(path, c.target, 0, 2, world, vertices_length - 4);
            world[vertices_length - 2] = world[0];
            world[vertices_length - 1] = world[1];
        } else {
            let Some(count) = curve_count.checked_sub(1) else {
                return false;
            };
            curve_count = count;
            vertices_length -= 4;
            world.clear();
            world.resize(vertices_length, 0.0);
            self.path_world_vertices(path, c.target, 2, vertices_length, world, 0);
        }
        if curve_count == 0 {
            return false;
        }

        curves.clear();
        let mut path_length = 0.0;
        for i in 0..curve_count {
            let w = i * 6;
            path_length += curve_length_coarse(&world[w..w + 8]);
            curves.push(path_length);
        }

        if data.position_mode == PositionMode::Percent {
            position *= path_length;
        }
        let multiplier = multiplier(path_length);

        let mut curve = 0;
        let mut segment = 0;
        let mut curve_length = 0.0;
        for (i, &space) in spaces.iter().enumerate() {
            let o = i * 3;
            let space = space * multiplier;
            position += space;
            let mut p = position;
            if closed {
                p = p.rem_euclid(path_length);
                curve = 0;
            } else if p < 0.0 {
                add_before_position(p, world, 0, positions, o);
                continue;
            } else if p > path_length {
                add_after_position(p - path_length, world, vertices_length - 4, positions, o);
                continue;
            }

            let (found, t) = locate(curves, curve_count, curve, p);
            curve = found;
            let w = curve * 6;
            let points: [f32; 8] = [
                world[w],
                world[w + 1],
                world[w + 2],
                world[w + 3],
                world[w + 4],
                world[w + 5],
                world[w + 6],
                world[w + 7],
            ];
            if cached != CachedCurve::Curve(curve) {
                cached = CachedCurve::Curve(curve);
                curve_length = sample_segments(&points, segments);
                segment = 0;
            }

            // Arc length to segment index plus fraction, then back to a curve parameter.
            let (found, fraction) = locate(&segments[..], segments.len(), segment, t * curve_length);
            segment = found;
            add_curve_position(
                (segment as f32 + fraction) * 0.1,
                &points,
                positions,
                o,
                tangents || (i > 0 && space == 0.0),
            );
        }
        true
    }

    fn place_path_bones(
        &mut self,
        c: &PathConstraint,
        data: &PathConstraintData,
        tangents: bool,
        scale: bool,
        scratch: &PathScratch,
    ) {
        let positions = &scratch.positions;
        let (Some(&first_x), Some(&first_y)) = (positions.first(), positions.get(1)) else {
            return;
        };
        let (mut bone_x, mut bone_y) = (first_x, first_y);
        let mut offset_rotation = data.offset_rotation;
        let tip = if offset_rotation == 0.0 {
            data.rotate_mode == RotateMode::Chain
        } else {
            if let Some(bone) = self.slots.get(c.target).and_then(|s| self.bones.get(s.bone)) {
                let reflect = bone.a * bone.d - bone.b * bone.c > 0.0;
                offset_rotation *= if reflect { DEG_RAD } else { -DEG_RAD };
            }
            false
        };

        for (i, &bone_index) in c.bones.iter().enumerate() {
            let p = 3 + i * 3;
            let Some(bone) = self.bones.get_mut(bone_index) else {
                continue;
            };
            let length = self.data.bones[bone.data_index()].length;
            bone.world_x += (bone_x - bone.world_x) * c.mix_x;
            bone.world_y += (bone_y - bone.world_y) * c.mix_y;
            let (x, y) = (positions[p], positions[p + 1]);
            let (dx, dy) = (x - bone_x, y - bone_y);
            if scale {
                let target_length = scratch.lengths[i];
                if target_length != 0.0 {
                    let s = ((dx * dx + dy * dy).sqrt() / target_length - 1.0) * c.mix_rotate + 1.0;
                    bone.a *= s;
                    bone.c *= s;
                }
            }
            bone_x = x;
            bone_y = y;
            if c.mix_rotate > 0.0 {
                let (a, c0) = (bone.a, bone.c);
                let mut r = if tangents {
                    positions[p - 1]
                } else if scratch.spaces[i + 1] == 0.0 {
                    positions[p + 2]
                } else {
                    dy.atan2(dx)
                };
                r -= c0.atan2(a);
                if tip {
                    let (sin, cos) = r.sin_cos();
                    bone_x += (length * (cos * a - sin * c0) - dx) * c.mix_rotate;
                    bone_y += (length * (sin * a + cos * c0) - dy) * c.mix_rotate;
                } else {
                    r += offset_rotation;
                }
                let r = wrap_radians(r) * c.mix_rotate;
                rotate_affine(&mut bone.a, &mut bone.b, &mut bone.c, &mut bone.d, r);
            }
            self.update_applied_transform(bone_index);
        }
    }
}

/// Finds the entry of cumulative `lengths` containing `p`, starting at `from`, and returns it
/// with the fraction of `p` inside that entry.
fn locate(lengths: &[f32], count: usize, from: usize, p: f32) -> (usize, f32) {
    let last = count.saturating_sub(1);
    let mut i = from.min(last);
    while i < last && p > lengths[i] {
        i += 1;
    }
    let fraction = if i == 0 {
        if lengths[0] > 0.0 { p / lengths[0] } else { 0.0 }
    } else {
        let prev = lengths[i - 1];
        let span = lengths[i] - prev;
        if span > 0.0 { (p - prev) / span } else { 0.0 }
    };
    (i, fraction)
}

/// Length of one curve from 4 forward-differenced steps.
fn curve_length_coarse(w: &[f32]) -> f32 {
    let (x1, y1, cx1, cy1, cx2, cy2, x2, y2) = (w[0], w[1], w[2], w[3], w[4], w[5], w[6], w[7]);
    let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.1875;
    let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.1875;
    let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.09375;
    let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.09375;
    let mut ddfx = tmpx * 2.0 + dddfx;
    let mut ddfy = tmpy * 2.0 + dddfy;
    let mut dfx = (cx1 - x1) * 0.75 + tmpx + dddfx * 0.166_666_67;
    let mut dfy = (cy1 - y1) * 0.75 + tmpy + dddfy * 0.166_666_67;
    let mut length = dfx.hypot(dfy);
    dfx += ddfx;
    dfy += ddfy;
    ddfx += dddfx;
    ddfy += dddfy;
    length += dfx.hypot(dfy);
    dfx += ddfx;
    dfy += ddfy;
    length += dfx.hypot(dfy);
    dfx += ddfx + dddfx;
    dfy += ddfy + dddfy;
    length + dfx.hypot(dfy)
}

/// Fills `segments` with the cumulative arc length at 10 evenly spaced parameter steps and
/// returns the total.
fn sample_segments(w: &[f32; 8], segments: &mut [f32; 10]) -> f32 {
    let [x1, y1, cx1, cy1, cx2, cy2, x2, y2] = *w;
    let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.03;
    let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.03;
    let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.006;
    let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.006;
    let mut ddfx = tmpx * 2.0 + dddfx;
    let mut ddfy = tmpy * 2.0 + dddfy;
    let mut dfx = (cx1 - x1) * 0.3 + tmpx + dddfx * 0.166_666_67;
    let mut dfy = (cy1 - y1) * 0.3 + tmpy + dddfy * 0.166_666_67;
    let mut length = dfx.hypot(dfy);
    segments[0] = length;
    for segment in &mut segments[1..8] {
        dfx += ddfx;
        dfy += ddfy;
        ddfx += dddfx;
        ddfy += dddfy;
        length += dfx.hypot(dfy);
        *segment = length;
    }
    dfx += ddfx;
    dfy += ddfy;
    length += dfx.hypot(dfy);
    segments[8] = length;
    dfx += ddfx + dddfx;
    dfy += ddfy + dddfy;
    length += dfx.hypot(dfy);
    segments[9] = length;
    length
}

fn add_before_position(p: f32, temp: &[f32], i: usize, out: &mut [f32], o: usize) {
    let (x1, y1) = (temp[i], temp[i + 1]);
    let r = (temp[i + 3] - y1).atan2(temp[i + 2] - x1);
    out[o] = x1 + p * r.cos();
    out[o + 1] = y1 + p * r.sin();
    out[o + 2] = r;
}

fn add_after_position(p: f32, temp: &[f32], i: usize, out: &mut [f32], o: usize) {
    let (x1, y1) = (temp[i + 2], temp[i + 3]);
    let r = (y1 - temp[i + 1]).atan2(x1 - temp[i]);
    out[o] = x1 + p * r.cos();
    out[o + 1] = y1 + p * r.sin();
    out[o + 2] = r;
}

/// Writes the point at parameter `p` of a cubic bezier and, when requested, its tangent angle.
fn add_curve_position(p: f32, w: &[f32; 8], out: &mut [f32], o: usize, tangents: bool) {
    let [x1, y1, cx1, cy1, cx2, cy2, x2, y2] = *w;
    if p == 0.0 || p.is_nan() {
        out[o] = x1;
        out[o + 1] = y1;
        out[o + 2] = (cy1 - y1).atan2(cx1 - x1);
        return;
    }
    let tt = p * p;
    let ttt = tt * p;
    let u = 1.0 - p;
    let uu = u * u;
    let uuu = uu * u;
    let ut = u * p;
    let ut3 = ut * 3.0;
    let uut3 = u * ut3;
    let utt3 = ut3 * p;
    let x = x1 * uuu + cx1 * uut3 + cx2 * utt3 + x2 * ttt;
    let y = y1 * uuu + cy1 * uut3 + cy2 * utt3 + y2 * ttt;
    out[o] = x;
    out[o + 1] = y;
    if tangents {
        out[o + 2] = if p < 0.001 {
            (cy1 - y1).atan2(cx1 - x1)
        } else {
            (y - (y1 * uu + cy1 * ut * 2.0 + cy2 * tt)).atan2(x - (x1 * uu + cx1 * ut * 2.0 + cx2 * tt))
        };
    }
}
