use crate::ids::{next_sequence_id, next_vertex_attachment_id};
use crate::runtime::math::{cos_deg, sin_deg, RAD_DEG};
use crate::{Bone, Slot};

/// The closed set of attachment kinds a slot can display.
#[derive(Clone, Debug)]
pub enum Attachment {
    Region(RegionAttachment),
    Mesh(MeshAttachment),
    BoundingBox(BoundingBoxAttachment),
    Path(PathAttachment),
    Point(PointAttachment),
    Clipping(ClippingAttachment),
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Self::Region(a) => &a.name,
            Self::Mesh(a) => &a.name,
            Self::BoundingBox(a) => &a.name,
            Self::Path(a) => &a.name,
            Self::Point(a) => &a.name,
            Self::Clipping(a) => &a.name,
        }
    }

    /// Vertex data for the kinds that can be deformed.
    pub fn vertex_data(&self) -> Option<&VertexData> {
        match self {
            Self::Mesh(a) => Some(&a.vertex_data),
            Self::BoundingBox(a) => Some(&a.vertex_data),
            Self::Path(a) => Some(&a.vertex_data),
            Self::Clipping(a) => Some(&a.vertex_data),
            Self::Region(_) | Self::Point(_) => None,
        }
    }

    pub fn sequence(&self) -> Option<&Sequence> {
        match self {
            Self::Region(a) => a.sequence.as_ref(),
            Self::Mesh(a) => a.sequence.as_ref(),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexWeight {
    pub bone: usize,
    pub x: f32,
    pub y: f32,
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MeshVertices {
    /// Positions in the slot bone's space.
    Unweighted(Vec<[f32; 2]>),
    /// Per vertex, the bones influencing it with bone-space positions.
    Weighted(Vec<Vec<VertexWeight>>),
}

/// Vertices shared by every deformable attachment kind.
#[derive(Clone, Debug)]
pub struct VertexData {
    id: u32,
    pub vertices: MeshVertices,
    /// Deform timelines keyed to this id also apply to the attachment (linked meshes share their
    /// parent's id here).
    pub timeline_attachment: u32,
}

impl VertexData {
    pub fn new(vertices: MeshVertices) -> Self {
        let id = next_vertex_attachment_id();
        Self {
            id,
            vertices,
            timeline_attachment: id,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_weighted(&self) -> bool {
        matches!(self.vertices, MeshVertices::Weighted(_))
    }

    pub fn vertex_count(&self) -> usize {
        match &self.vertices {
            MeshVertices::Unweighted(v) => v.len(),
            MeshVertices::Weighted(v) => v.len(),
        }
    }

    /// Number of floats written by [`Self::compute_world_vertices`] for all vertices.
    pub fn world_vertices_length(&self) -> usize {
        self.vertex_count() * 2
    }

    /// Length of a deform buffer for this attachment: one offset pair per vertex when
    /// unweighted, one per bone influence when weighted.
    pub fn deform_len(&self) -> usize {
        match &self.vertices {
            MeshVertices::Unweighted(v) => v.len() * 2,
            MeshVertices::Weighted(v) => v.iter().map(Vec::len).sum::<usize>() * 2,
        }
    }

    /// Flat rest positions of an unweighted attachment.
    pub(crate) fn setup_positions(&self) -> Option<&[f32]> {
        match &self.vertices {
            MeshVertices::Unweighted(v) => Some(v.as_flattened()),
            MeshVertices::Weighted(_) => None,
        }
    }

    /// Transforms `count` floats of vertices starting at float index `start` into world space.
    /// The slot's deform buffer is used when non-empty.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_world_vertices(
        &self,
        bones: &[Bone],
        slot: &Slot,
        start: usize,
        count: usize,
        out: &mut [f32],
        offset: usize,
        stride: usize,
    ) {
        let first = start / 2;
        let vertex_count = count / 2;
        let deform = &slot.deform;
        match &self.vertices {
            MeshVertices::Unweighted(vertices) => {
                let Some(bone) = bones.get(slot.bone) else {
                    return;
                };
                let flat = vertices.as_flattened();
                let source = if deform.len() == flat.len() {
                    &deform[..]
                } else {
                    flat
                };
                for i in 0..vertex_count {
                    let v = (first + i) * 2;
                    let (Some(&vx), Some(&vy)) = (source.get(v), source.get(v + 1)) else {
                        break;
                    };
                    let w = offset + i * stride;
                    out[w] = vx * bone.a + vy * bone.b + bone.world_x;
                    out[w + 1] = vx * bone.c + vy * bone.d + bone.world_y;
                }
            }
            MeshVertices::Weighted(vertices) => {
                let mut f = vertices.iter().take(first).map(Vec::len).sum::<usize>() * 2;
                let use_deform = !deform.is_empty() && deform.len() == self.deform_len();
                for (i, weights) in vertices.iter().skip(first).take(vertex_count).enumerate() {
                    let (mut wx, mut wy) = (0.0, 0.0);
                    for weight in weights {
                        let Some(bone) = bones.get(weight.bone) else {
                            f += 2;
                            continue;
                        };
                        let (mut vx, mut vy) = (weight.x, weight.y);
                        if use_deform {
                            vx += deform[f];
                            vy += deform[f + 1];
                        }
                        wx += (vx * bone.a + vy * bone.b + bone.world_x) * weight.weight;
                        wy += (vx * bone.c + vy * bone.d + bone.world_y) * weight.weight;
                        f += 2;
                    }
                    let w = offset + i * stride;
                    out[w] = wx;
                    out[w + 1] = wy;
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SequenceMode {
    Hold,
    Once,
    Loop,
    Pingpong,
    OnceReverse,
    LoopReverse,
    PingpongReverse,
}

/// Frame-by-frame image sequence of a region or mesh.
#[derive(Clone, Debug)]
pub struct Sequence {
    id: u32,
    pub region_count: usize,
    pub start: i32,
    pub digits: usize,
    /// Index shown when the slot has no sequence index of its own.
    pub setup_index: usize,
}

impl Sequence {
    pub fn new(region_count: usize) -> Self {
        Self {
            id: next_sequence_id(),
            region_count,
            start: 0,
            digits: 0,
            setup_index: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Region index displayed for `slot`, clamped to the available regions.
    pub fn resolve_index(&self, slot: &Slot) -> usize {
        let index = usize::try_from(slot.sequence_index).unwrap_or(self.setup_index);
        index.min(self.region_count.saturating_sub(1))
    }

    /// Image path of region `index`: base `run_`, start 1, 3 digits and index 6 give `run_007`.
    pub fn path(&self, base_path: &str, index: usize) -> String {
        let frame = self.start + index as i32;
        format!("{base_path}{frame:0width$}", width = self.digits)
    }
}

#[derive(Clone, Debug)]
pub struct RegionAttachment {
    pub name: String,
    pub path: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub width: f32,
    pub height: f32,
    pub color: [f32; 4],
    pub sequence: Option<Sequence>,
    offsets: [f32; 8],
}

impl RegionAttachment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        x: f32,
        y: f32,
        rotation: f32,
        scale_x: f32,
        scale_y: f32,
        width: f32,
        height: f32,
    ) -> Self {
        let name = name.into();
        let mut region = Self {
            path: name.clone(),
            name,
            x,
            y,
            rotation,
            scale_x,
            scale_y,
            width,
            height,
            color: [1.0; 4],
            sequence: None,
            offsets: [0.0; 8],
        };
        region.update_offsets();
        region
    }

    /// Recomputes the bone-space corners after the placement fields changed.
    pub fn update_offsets(&mut self) {
        let local_x = -self.width / 2.0 * self.scale_x;
        let local_y = -self.height / 2.0 * self.scale_y;
        let local_x2 = local_x + self.width * self.scale_x;
        let local_y2 = local_y + self.height * self.scale_y;
        let (cos, sin) = (cos_deg(self.rotation), sin_deg(self.rotation));
        let corner = |lx: f32, ly: f32| {
            [
                lx * cos - ly * sin + self.x,
                lx * sin + ly * cos + self.y,
            ]
        };
        // Bottom left, upper left, upper right, bottom right.
        let corners = [
            corner(local_x, local_y),
            corner(local_x, local_y2),
            corner(local_x2, local_y2),
            corner(local_x2, local_y),
        ];
        self.offsets = [
            corners[0][0],
            corners[0][1],
            corners[1][0],
            corners[1][1],
            corners[2][0],
            corners[2][1],
            corners[3][0],
            corners[3][1],
        ];
    }

    pub fn offsets(&self) -> &[f32; 8] {
        &self.offsets
    }

    /// Writes the four world corners to `out`.
    pub fn compute_world_vertices(&self, bone: &Bone, out: &mut [f32], offset: usize, stride: usize) {
        for (i, corner) in self.offsets.chunks_exact(2).enumerate() {
            let w = offset + i * stride;
            out[w] = corner[0] * bone.a + corner[1] * bone.b + bone.world_x;
            out[w + 1] = corner[0] * bone.c + corner[1] * bone.d + bone.world_y;
        }
    }
}

#[derive(Clone, Debug)]
pub struct MeshAttachment {
    pub name: String,
    pub path: String,
    pub vertex_data: VertexData,
    pub uvs: Vec<f32>,
    pub triangles: Vec<u16>,
    pub hull_length: usize,
    pub width: f32,
    pub height: f32,
    pub color: [f32; 4],
    pub sequence: Option<Sequence>,
}

impl MeshAttachment {
    pub fn new(name: impl Into<String>, vertices: MeshVertices) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            vertex_data: VertexData::new(vertices),
            uvs: Vec::new(),
            triangles: Vec::new(),
            hull_length: 0,
            width: 0.0,
            height: 0.0,
            color: [1.0; 4],
            sequence: None,
        }
    }

    /// A mesh sharing `parent`'s geometry and deform timelines.
    pub fn new_linked(name: impl Into<String>, parent: &MeshAttachment) -> Self {
        let mut linked = Self::new(name, parent.vertex_data.vertices.clone());
        linked.vertex_data.timeline_attachment = parent.vertex_data.timeline_attachment;
        linked.uvs = parent.uvs.clone();
        linked.triangles = parent.triangles.clone();
        linked.hull_length = parent.hull_length;
        linked.width = parent.width;
        linked.height = parent.height;
        linked
    }
}

#[derive(Clone, Debug)]
pub struct BoundingBoxAttachment {
    pub name: String,
    pub vertex_data: VertexData,
    pub color: [f32; 4],
}

impl BoundingBoxAttachment {
    pub fn new(name: impl Into<String>, vertices: MeshVertices) -> Self {
        Self {
            name: name.into(),
            vertex_data: VertexData::new(vertices),
            color: [1.0; 4],
        }
    }
}

/// Cubic bezier spline. Vertices are laid out as `in-handle, point, out-handle` triples.
#[derive(Clone, Debug)]
pub struct PathAttachment {
    pub name: String,
    pub vertex_data: VertexData,
    /// Cumulative length at the end of each curve, used for non constant speed paths.
    pub lengths: Vec<f32>,
    pub closed: bool,
    pub constant_speed: bool,
}

impl PathAttachment {
    pub fn new(name: impl Into<String>, vertices: MeshVertices, lengths: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            vertex_data: VertexData::new(vertices),
            lengths,
            closed: false,
            constant_speed: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PointAttachment {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

impl PointAttachment {
    pub fn new(name: impl Into<String>, x: f32, y: f32, rotation: f32) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            rotation,
        }
    }

    pub fn compute_world_position(&self, bone: &Bone) -> (f32, f32) {
        bone.local_to_world(self.x, self.y)
    }

    pub fn compute_world_rotation(&self, bone: &Bone) -> f32 {
        let (cos, sin) = (cos_deg(self.rotation), sin_deg(self.rotation));
        let x = cos * bone.a + sin * bone.b;
        let y = cos * bone.c + sin * bone.d;
        y.atan2(x) * RAD_DEG
    }
}

#[derive(Clone, Debug)]
pub struct ClippingAttachment {
    pub name: String,
    pub vertex_data: VertexData,
    /// Last slot clipped by this attachment.
    pub end_slot: Option<usize>,
}

impl ClippingAttachment {
    pub fn new(name: impl Into<String>, vertices: MeshVertices, end_slot: Option<usize>) -> Self {
        Self {
            name: name.into(),
            vertex_data: VertexData::new(vertices),
            end_slot,
        }
    }
}
