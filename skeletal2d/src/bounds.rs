use crate::{Attachment, BoundingBoxAttachment, Skeleton};
use std::sync::Arc;

/// World-space polygons of the bounding box attachments a skeleton currently shows, for hit
/// detection.
#[derive(Clone, Debug, Default)]
pub struct SkeletonBounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
    bounding_boxes: Vec<Arc<Attachment>>,
    polygons: Vec<Vec<f32>>,
    spare: Vec<Vec<f32>>,
}

impl SkeletonBounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the polygons from the skeleton's current world transforms. With `update_aabb`
    /// false the AABB is left unbounded so every AABB query passes.
    pub fn update(&mut self, skeleton: &Skeleton, update_aabb: bool) {
        self.bounding_boxes.clear();
        self.spare.append(&mut self.polygons);

        for slot in &skeleton.slots {
            if !skeleton.bones.get(slot.bone).is_some_and(|bone| bone.active) {
                continue;
            }
            let Some(attachment) = slot.attachment() else {
                continue;
            };
            let Attachment::BoundingBox(bounding_box) = attachment.as_ref() else {
                continue;
            };
            let mut polygon = self.spare.pop().unwrap_or_default();
            let count = bounding_box.vertex_data.world_vertices_length();
            polygon.clear();
            polygon.resize(count, 0.0);
            bounding_box.vertex_data.compute_world_vertices(
                &skeleton.bones,
                slot,
                0,
                count,
                &mut polygon,
                0,
                2,
            );
            self.bounding_boxes.push(attachment.clone());
            self.polygons.push(polygon);
        }

        if update_aabb {
            self.compute_aabb();
        } else {
            self.min_x = f32::MIN;
            self.min_y = f32::MIN;
            self.max_x = f32::MAX;
            self.max_y = f32::MAX;
        }
    }

    fn compute_aabb(&mut self) {
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for point in self.polygons.iter().flat_map(|p| p.chunks_exact(2)) {
            min_x = min_x.min(point[0]);
            min_y = min_y.min(point[1]);
            max_x = max_x.max(point[0]);
            max_y = max_y.max(point[1]);
        }
        self.min_x = min_x;
        self.min_y = min_y;
        self.max_x = max_x;
        self.max_y = max_y;
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn polygons(&self) -> &[Vec<f32>] {
        &self.polygons
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn bounding_box(&self, index: usize) -> Option<&BoundingBoxAttachment> {
        match self.bounding_boxes.get(index)?.as_ref() {
            Attachment::BoundingBox(bounding_box) => Some(bounding_box),
            _ => None,
        }
    }

    /// Polygon collected for the bounding box with the given attachment name.
    pub fn polygon(&self, name: &str) -> Option<&[f32]> {
        let index = self.bounding_boxes.iter().position(|a| a.name() == name)?;
        self.polygons.get(index).map(Vec::as_slice)
    }

    pub fn aabb_contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn aabb_intersects_segment(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> bool {
        let (min_x, min_y, max_x, max_y) = (self.min_x, self.min_y, self.max_x, self.max_y);
        if (x1 <= min_x && x2 <= min_x)
            || (y1 <= min_y && y2 <= min_y)
            || (x1 >= max_x && x2 >= max_x)
            || (y1 >= max_y && y2 >= max_y)
        {
            return false;
        }
        let m = (y2 - y1) / (x2 - x1);
        let y = m * (min_x - x1) + y1;
        if y > min_y && y < max_y {
            return true;
        }
        let y = m * (max_x - x1) + y1;
        if y > min_y && y < max_y {
            return true;
        }
        let x = (min_y - y1) / m + x1;
        if x > min_x && x < max_x {
            return true;
        }
        let x = (max_y - y1) / m + x1;
        x > min_x && x < max_x
    }

    pub fn aabb_intersects_skeleton(&self, other: &SkeletonBounds) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// First bounding box containing the point. Test [`aabb_contains_point`] first to skip
    /// the polygons cheaply.
    ///
    /// [`aabb_contains_point`]: Self::aabb_contains_point
    pub fn contains_point(&self, x: f32, y: f32) -> Option<&BoundingBoxAttachment> {
        let index = self
            .polygons
            .iter()
            .position(|polygon| polygon_contains_point(polygon, x, y))?;
        self.bounding_box(index)
    }

    /// First bounding box crossed by the segment.
    pub fn intersects_segment(
        &self,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    ) -> Option<&BoundingBoxAttachment> {
        let index = self
            .polygons
            .iter()
            .position(|polygon| polygon_intersects_segment(polygon, x1, y1, x2, y2))?;
        self.bounding_box(index)
    }
}

/// Even-odd point in polygon test. `polygon` is flat `[x0, y0, x1, y1, ...]`.
pub fn polygon_contains_point(polygon: &[f32], x: f32, y: f32) -> bool {
    let n = polygon.len() & !1;
    if n < 6 {
        return false;
    }
    let mut inside = false;
    let mut prev = n - 2;
    for i in (0..n).step_by(2) {
        let (vx, vy) = (polygon[i], polygon[i + 1]);
        let (px, py) = (polygon[prev], polygon[prev + 1]);
        if ((vy < y && py >= y) || (py < y && vy >= y)) && vx + (y - vy) / (py - vy) * (px - vx) < x
        {
            inside = !inside;
        }
        prev = i;
    }
    inside
}

pub fn polygon_intersects_segment(polygon: &[f32], x1: f32, y1: f32, x2: f32, y2: f32) -> bool {
    let n = polygon.len() & !1;
    if n < 4 {
        return false;
    }
    let between = |v: f32, a: f32, b: f32| (v >= a && v <= b) || (v >= b && v <= a);
    let (width12, height12) = (x1 - x2, y1 - y2);
    let det1 = x1 * y2 - y1 * x2;
    let (mut x3, mut y3) = (polygon[n - 2], polygon[n - 1]);
    for point in polygon[..n].chunks_exact(2) {
        let (x4, y4) = (point[0], point[1]);
        let det2 = x3 * y4 - y3 * x4;
        let (width34, height34) = (x3 - x4, y3 - y4);
        let det3 = width12 * height34 - height12 * width34;
        let x = (det1 * width34 - width12 * det2) / det3;
        if between(x, x3, x4) && between(x, x1, x2) {
            let y = (det1 * height34 - height12 * det2) / det3;
            if between(y, y3, y4) && between(y, y1, y2) {
                return true;
            }
        }
        x3 = x4;
        y3 = y4;
    }
    false
}
