use crate::BoneData;
use crate::runtime::math::{RAD_DEG, atan2_deg, cos_deg, sin_deg};

/// Runtime node of the skeleton hierarchy.
///
/// Three transforms live side by side: the local pose written by timelines, the applied pose
/// the update pass actually composed (constraints may rewrite it), and the world affine.
#[derive(Clone, Debug)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,
    pub active: bool,

    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,

    pub ax: f32,
    pub ay: f32,
    pub arotation: f32,
    pub ascale_x: f32,
    pub ascale_y: f32,
    pub ashear_x: f32,
    pub ashear_y: f32,

    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,
}

impl Bone {
    pub(crate) fn new(data_index: usize, data: &BoneData) -> Self {
        let mut bone = Self {
            data_index,
            parent: data.parent,
            active: !data.skin_required,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            ax: 0.0,
            ay: 0.0,
            arotation: 0.0,
            ascale_x: 1.0,
            ascale_y: 1.0,
            ashear_x: 0.0,
            ashear_y: 0.0,
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            world_x: 0.0,
            world_y: 0.0,
        };
        bone.set_to_setup_pose(data);
        bone
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub fn set_to_setup_pose(&mut self, data: &BoneData) {
        self.x = data.x;
        self.y = data.y;
        self.rotation = data.rotation;
        self.scale_x = data.scale_x;
        self.scale_y = data.scale_y;
        self.shear_x = data.shear_x;
        self.shear_y = data.shear_y;
    }

    pub(crate) fn reset_applied(&mut self) {
        self.ax = self.x;
        self.ay = self.y;
        self.arotation = self.rotation;
        self.ascale_x = self.scale_x;
        self.ascale_y = self.scale_y;
        self.ashear_x = self.shear_x;
        self.ashear_y = self.shear_y;
    }

    pub fn world_rotation_x(&self) -> f32 {
        atan2_deg(self.c, self.a)
    }

    pub fn world_rotation_y(&self) -> f32 {
        atan2_deg(self.d, self.b)
    }

    pub fn world_scale_x(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }

    pub fn world_scale_y(&self) -> f32 {
        (self.b * self.b + self.d * self.d).sqrt()
    }

    pub fn world_to_local(&self, world_x: f32, world_y: f32) -> (f32, f32) {
        let inv_det = 1.0 / (self.a * self.d - self.b * self.c);
        let x = world_x - self.world_x;
        let y = world_y - self.world_y;
        (
            x * self.d * inv_det - y * self.b * inv_det,
            y * self.a * inv_det - x * self.c * inv_det,
        )
    }

    pub fn local_to_world(&self, local_x: f32, local_y: f32) -> (f32, f32) {
        (
            local_x * self.a + local_y * self.b + self.world_x,
            local_x * self.c + local_y * self.d + self.world_y,
        )
    }

    pub fn world_to_local_rotation(&self, world_rotation: f32) -> f32 {
        let (sin, cos) = (sin_deg(world_rotation), cos_deg(world_rotation));
        (self.a * sin - self.c * cos).atan2(self.d * cos - self.b * sin) * RAD_DEG
            + self.rotation
            - self.shear_x
    }

    pub fn local_to_world_rotation(&self, local_rotation: f32) -> f32 {
        let local_rotation = local_rotation - (self.rotation - self.shear_x);
        let (sin, cos) = (sin_deg(local_rotation), cos_deg(local_rotation));
        (cos * self.c + sin * self.d).atan2(cos * self.a + sin * self.b) * RAD_DEG
    }

    /// Rotates the world affine in place. Call [`crate::Skeleton::update_applied_transform`]
    /// afterwards when later constraints read the applied pose.
    pub fn rotate_world(&mut self, degrees: f32) {
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        let (cos, sin) = (cos_deg(degrees), sin_deg(degrees));
        self.a = cos * a - sin * c;
        self.b = cos * b - sin * d;
        self.c = sin * a + cos * c;
        self.d = sin * b + cos * d;
    }
}

#[cfg(feature = "glam")]
impl Bone {
    /// World transform as a glam affine (columns `(a, c)`, `(b, d)`, translation).
    pub fn world_affine(&self) -> glam::Affine2 {
        glam::Affine2::from_cols(
            glam::Vec2::new(self.a, self.c),
            glam::Vec2::new(self.b, self.d),
            glam::Vec2::new(self.world_x, self.world_y),
        )
    }

    pub fn local_to_world_vec(&self, local: glam::Vec2) -> glam::Vec2 {
        self.world_affine().transform_point2(local)
    }
}
