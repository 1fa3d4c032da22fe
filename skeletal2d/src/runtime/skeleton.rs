use crate::runtime::math::{RAD_DEG, cos_deg, sin_deg};
use crate::runtime::path_constraint::PathScratch;
use crate::{
    Attachment, Bone, Error, IkConstraint, PathConstraint, SkeletonData, SkinData, Slot,
    TransformConstraint, TransformMode,
};
use std::sync::Arc;

/// One step of the per-frame update pass.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateCacheItem {
    Bone(usize),
    Ik(usize),
    Transform(usize),
    Path(usize),
}

/// Axis-aligned bounds of the visible attachments.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Per-instance pose built from shared [`SkeletonData`].
#[derive(Clone, Debug)]
pub struct Skeleton {
    pub data: Arc<SkeletonData>,
    pub bones: Vec<Bone>,
    bone_children: Vec<Vec<usize>>,
    pub slots: Vec<Slot>,
    /// Slot indices in render order.
    pub draw_order: Vec<usize>,
    pub ik_constraints: Vec<IkConstraint>,
    pub transform_constraints: Vec<TransformConstraint>,
    pub path_constraints: Vec<PathConstraint>,
    skin: Option<usize>,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    update_cache: Vec<UpdateCacheItem>,
    pub(crate) path_scratch: PathScratch,
}

impl Skeleton {
    pub fn new(data: Arc<SkeletonData>) -> Self {
        let bones: Vec<Bone> = data
            .bones
            .iter()
            .enumerate()
            .map(|(i, bone)| Bone::new(i, bone))
            .collect();

        let mut bone_children = vec![Vec::new(); bones.len()];
        for (i, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent_index() {
                if let Some(children) = bone_children.get_mut(parent) {
                    children.push(i);
                }
            }
        }

        let slots = data
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| Slot::new(i, slot))
            .collect::<Vec<_>>();
        let draw_order = (0..slots.len()).collect();

        let ik_constraints = data
            .ik_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| IkConstraint::new(i, c))
            .collect();
        let transform_constraints = data
            .transform_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| TransformConstraint::new(i, c))
            .collect();
        let path_constraints = data
            .path_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| PathConstraint::new(i, c))
            .collect();

        let mut skeleton = Self {
            data,
            bones,
            bone_children,
            slots,
            draw_order,
            ik_constraints,
            transform_constraints,
            path_constraints,
            skin: None,
            color: [1.0; 4],
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            update_cache: Vec::new(),
            path_scratch: PathScratch::default(),
        };
        skeleton.set_slots_to_setup_pose();
        skeleton.update_cache();
        skeleton
    }

    pub fn bone_children(&self, bone_index: usize) -> &[usize] {
        self.bone_children
            .get(bone_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn update_cache_items(&self) -> &[UpdateCacheItem] {
        &self.update_cache
    }

    pub fn root_bone(&self) -> Option<&Bone> {
        self.bones.first()
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.data.find_bone(name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.data.find_slot(name)
    }

    pub fn find_ik_constraint(&self, name: &str) -> Option<usize> {
        self.data.find_ik_constraint(name)
    }

    pub fn find_transform_constraint(&self, name: &str) -> Option<usize> {
        self.data.find_transform_constraint(name)
    }

    pub fn find_path_constraint(&self, name: &str) -> Option<usize> {
        self.data.find_path_constraint(name)
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.get(self.find_bone(name)?)
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.get(self.find_slot(name)?)
    }

    pub fn skin(&self) -> Option<&SkinData> {
        self.data.skins.get(self.skin?)
    }

    pub fn skin_index(&self) -> Option<usize> {
        self.skin
    }

    /// Switches skins by name; `None` removes the skin.
    pub fn set_skin(&mut self, name: Option<&str>) -> Result<(), Error> {
        let index = match name {
            Some(name) => Some(self.data.find_skin(name).ok_or_else(|| Error::UnknownSkin {
                name: name.to_string(),
            })?),
            None => None,
        };
        self.set_skin_index(index);
        Ok(())
    }

    /// Attachments of the old skin that are still displayed are replaced by same-named entries
    /// of the new skin. Without an old skin, slots pick up their setup attachment from the new
    /// skin. Rebuilds the update cache.
    pub fn set_skin_index(&mut self, index: Option<usize>) {
        if index == self.skin {
            return;
        }
        let data = self.data.clone();
        if let Some(new_skin) = index.and_then(|i| data.skins.get(i)) {
            match self.skin.and_then(|i| data.skins.get(i)) {
                Some(old_skin) => {
                    for (slot_index, name, attachment) in old_skin.entries() {
                        let Some(slot) = self.slots.get_mut(slot_index) else {
                            continue;
                        };
                        let displayed = slot
                            .attachment()
                            .is_some_and(|current| Arc::ptr_eq(current, attachment));
                        if !displayed {
                            continue;
                        }
                        if let Some(replacement) = new_skin.attachment(slot_index, name) {
                            slot.set_attachment(Some(replacement.clone()));
                        }
                    }
                }
                None => {
                    for (slot_index, slot) in self.slots.iter_mut().enumerate() {
                        let Some(name) = data.slots[slot_index].attachment_name.as_deref() else {
                            continue;
                        };
                        if let Some(attachment) = new_skin.attachment(slot_index, name) {
                            slot.set_attachment(Some(attachment.clone()));
                        }
                    }
                }
            }
        }
        log::debug!(
            "skin changed from {:?} to {:?}",
            self.skin.and_then(|i| data.skins.get(i)).map(|s| &s.name),
            index.and_then(|i| data.skins.get(i)).map(|s| &s.name)
        );
        self.skin = index;
        self.update_cache();
    }

    /// Looks an attachment up in the current skin, then in the default skin.
    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<Arc<Attachment>> {
        if let Some(found) = self.skin().and_then(|s| s.attachment(slot_index, name)) {
            return Some(found.clone());
        }
        self.data
            .default_skin()
            .and_then(|s| s.attachment(slot_index, name))
            .cloned()
    }

    /// Sets a slot's attachment by name. `None` clears it.
    pub fn set_attachment(
        &mut self,
        slot_name: &str,
        attachment_name: Option<&str>,
    ) -> Result<(), Error> {
        let slot_index = self.find_slot(slot_name).ok_or_else(|| Error::UnknownSlot {
            name: slot_name.to_string(),
        })?;
        let attachment = match attachment_name {
            Some(name) => Some(self.attachment(slot_index, name).ok_or_else(|| {
                Error::UnknownAttachment {
                    slot: slot_name.to_string(),
                    attachment: name.to_string(),
                }
            })?),
            None => None,
        };
        self.slots[slot_index].set_attachment(attachment);
        Ok(())
    }

    pub fn set_to_setup_pose(&mut self) {
        self.set_bones_to_setup_pose();
        self.set_slots_to_setup_pose();
    }

    /// Resets bones and constraint mixes.
    pub fn set_bones_to_setup_pose(&mut self) {
        let data = &self.data;
        for bone in &mut self.bones {
            bone.set_to_setup_pose(&data.bones[bone.data_index()]);
        }
        for c in &mut self.ik_constraints {
            c.set_to_setup_pose(&data.ik_constraints[c.data_index()]);
        }
        for c in &mut self.transform_constraints {
            c.set_to_setup_pose(&data.transform_constraints[c.data_index()]);
        }
        for c in &mut self.path_constraints {
            c.set_to_setup_pose(&data.path_constraints[c.data_index()]);
        }
    }

    /// Resets draw order, slot colors and attachments.
    pub fn set_slots_to_setup_pose(&mut self) {
        self.draw_order.clear();
        self.draw_order.extend(0..self.slots.len());
        for slot_index in 0..self.slots.len() {
            self.set_slot_to_setup_pose(slot_index);
        }
    }

    pub(crate) fn set_slot_to_setup_pose(&mut self, slot_index: usize) {
        let data = self.data.clone();
        let slot_data = &data.slots[slot_index];
        let attachment = slot_data
            .attachment_name
            .as_deref()
            .and_then(|name| self.attachment(slot_index, name));
        let slot = &mut self.slots[slot_index];
        slot.set_to_setup_color(slot_data);
        slot.set_attachment(None);
        slot.set_attachment(attachment);
    }

    /// Rebuilds the ordered list of bones and constraints walked by
    /// [`Self::update_world_transform`]. Runs automatically when the skin changes.
    pub fn update_cache(&mut self) {
        let data = self.data.clone();
        let skin = self.skin.and_then(|i| data.skins.get(i));

        for (bone, bone_data) in self.bones.iter_mut().zip(&data.bones) {
            bone.active = !bone_data.skin_required;
        }
        if let Some(skin) = skin {
            for &bone_index in &skin.bones {
                let mut current = Some(bone_index);
                while let Some(i) = current {
                    let Some(bone) = self.bones.get_mut(i) else {
                        break;
                    };
                    bone.active = true;
                    current = bone.parent_index();
                }
            }
        }

        let bone_active = |bones: &[Bone], i: usize| bones.get(i).is_some_and(|b| b.active);
        let in_skin = |required: bool, list: fn(&SkinData) -> &Vec<usize>, index: usize| {
            !required || skin.is_some_and(|s| list(s).contains(&index))
        };
        for (i, c) in self.ik_constraints.iter_mut().enumerate() {
            let d = &data.ik_constraints[c.data_index()];
            c.active = bone_active(&self.bones, c.target)
                && in_skin(d.skin_required, |s| &s.ik_constraints, i);
        }
        for (i, c) in self.transform_constraints.iter_mut().enumerate() {
            let d = &data.transform_constraints[c.data_index()];
            c.active = bone_active(&self.bones, c.target)
                && in_skin(d.skin_required, |s| &s.transform_constraints, i);
        }
        for (i, c) in self.path_constraints.iter_mut().enumerate() {
            let d = &data.path_constraints[c.data_index()];
            let slot_bone = self.slots.get(c.target).map(|s| s.bone);
            c.active = slot_bone.is_some_and(|b| bone_active(&self.bones, b))
                && in_skin(d.skin_required, |s| &s.path_constraints, i);
        }

        let mut ordered = Vec::with_capacity(
            self.ik_constraints.len()
                + self.transform_constraints.len()
                + self.path_constraints.len(),
        );
        ordered.extend(
            data.ik_constraints
                .iter()
                .enumerate()
                .map(|(i, c)| (c.order, UpdateCacheItem::Ik(i))),
        );
        ordered.extend(
            data.transform_constraints
                .iter()
                .enumerate()
                .map(|(i, c)| (c.order, UpdateCacheItem::Transform(i))),
        );
        ordered.extend(
            data.path_constraints
                .iter()
                .enumerate()
                .map(|(i, c)| (c.order, UpdateCacheItem::Path(i))),
        );
        ordered.sort_by_key(|(order, _)| *order);

        let mut builder = CacheBuilder::new(self, skin);
        for (_, item) in ordered {
            match item {
                UpdateCacheItem::Ik(i) => builder.sort_ik(i),
                UpdateCacheItem::Transform(i) => builder.sort_transform(i),
                UpdateCacheItem::Path(i) => builder.sort_path(i),
                UpdateCacheItem::Bone(_) => {}
            }
        }
        for i in 0..self.bones.len() {
            builder.sort_bone(i);
        }
        let cache = builder.cache;
        log::debug!(
            "update cache rebuilt: {} items for {} bones",
            cache.len(),
            self.bones.len()
        );
        self.update_cache = cache;
    }

    /// Computes world transforms for every active bone and runs the constraints in cache
    /// order.
    pub fn update_world_transform(&mut self) {
        for bone in &mut self.bones {
            bone.reset_applied();
        }
        let cache = std::mem::take(&mut self.update_cache);
        for item in &cache {
            match *item {
                UpdateCacheItem::Bone(i) => self.update_bone(i),
                UpdateCacheItem::Ik(i) => self.apply_ik_constraint(i),
                UpdateCacheItem::Transform(i) => self.apply_transform_constraint(i),
                UpdateCacheItem::Path(i) => self.apply_path_constraint(i),
            }
        }
        self.update_cache = cache;
    }

    fn update_bone(&mut self, index: usize) {
        let Some(bone) = self.bones.get(index) else {
            return;
        };
        let (x, y, rotation) = (bone.ax, bone.ay, bone.arotation);
        let (scale_x, scale_y) = (bone.ascale_x, bone.ascale_y);
        let (shear_x, shear_y) = (bone.ashear_x, bone.ashear_y);
        self.update_world_transform_with(index, x, y, rotation, scale_x, scale_y, shear_x, shear_y);
    }

    /// Stores the given values as the bone's applied pose and composes its world transform
    /// from its parent's.
    #[allow(clippy::too_many_arguments)]
    pub fn update_world_transform_with(
        &mut self,
        index: usize,
        x: f32,
        y: f32,
        rotation: f32,
        scale_x: f32,
        scale_y: f32,
        shear_x: f32,
        shear_y: f32,
    ) {
        let Some(bone) = self.bones.get(index) else {
            return;
        };
        let mode = self.data.bones[bone.data_index()].transform_mode;
        let parent = bone
            .parent_index()
            .and_then(|p| self.bones.get(p))
            .map(|p| (p.a, p.b, p.c, p.d, p.world_x, p.world_y));
        let (sx, sy) = (self.scale_x, self.scale_y);
        let (skeleton_x, skeleton_y) = (self.x, self.y);

        let bone = &mut self.bones[index];
        bone.ax = x;
        bone.ay = y;
        bone.arotation = rotation;
        bone.ascale_x = scale_x;
        bone.ascale_y = scale_y;
        bone.ashear_x = shear_x;
        bone.ashear_y = shear_y;

        let Some((mut pa, mut pb, mut pc, mut pd, pwx, pwy)) = parent else {
            let rotation_y = rotation + 90.0 + shear_y;
            bone.a = cos_deg(rotation + shear_x) * scale_x * sx;
            bone.b = cos_deg(rotation_y) * scale_y * sx;
            bone.c = sin_deg(rotation + shear_x) * scale_x * sy;
            bone.d = sin_deg(rotation_y) * scale_y * sy;
            bone.world_x = x * sx + skeleton_x;
            bone.world_y = y * sy + skeleton_y;
            return;
        };

        bone.world_x = pa * x + pb * y + pwx;
        bone.world_y = pc * x + pd * y + pwy;

        match mode {
            TransformMode::Normal => {
                let rotation_y = rotation + 90.0 + shear_y;
                let la = cos_deg(rotation + shear_x) * scale_x;
                let lb = cos_deg(rotation_y) * scale_y;
                let lc = sin_deg(rotation + shear_x) * scale_x;
                let ld = sin_deg(rotation_y) * scale_y;
                bone.a = pa * la + pb * lc;
                bone.b = pa * lb + pb * ld;
                bone.c = pc * la + pd * lc;
                bone.d = pc * lb + pd * ld;
                return;
            }
            TransformMode::OnlyTranslation => {
                let rotation_y = rotation + 90.0 + shear_y;
                bone.a = cos_deg(rotation + shear_x) * scale_x;
                bone.b = cos_deg(rotation_y) * scale_y;
                bone.c = sin_deg(rotation + shear_x) * scale_x;
                bone.d = sin_deg(rotation_y) * scale_y;
            }
            TransformMode::NoRotationOrReflection => {
                let mut s = pa * pa + pc * pc;
                let prx;
                if s > 0.0001 {
                    s = (pa * pd - pb * pc).abs() / s;
                    pa /= sx;
                    pc /= sy;
                    pb = pc * s;
                    pd = pa * s;
                    prx = pc.atan2(pa) * RAD_DEG;
                } else {
                    pa = 0.0;
                    pc = 0.0;
                    prx = 90.0 - pd.atan2(pb) * RAD_DEG;
                }
                let rx = rotation + shear_x - prx;
                let ry = rotation + shear_y - prx + 90.0;
                let la = cos_deg(rx) * scale_x;
                let lb = cos_deg(ry) * scale_y;
                let lc = sin_deg(rx) * scale_x;
                let ld = sin_deg(ry) * scale_y;
                bone.a = pa * la - pb * lc;
                bone.b = pa * lb - pb * ld;
                bone.c = pc * la + pd * lc;
                bone.d = pc * lb + pd * ld;
            }
            TransformMode::NoScale | TransformMode::NoScaleOrReflection => {
                let (cos, sin) = (cos_deg(rotation), sin_deg(rotation));
                let mut za = (pa * cos + pb * sin) / sx;
                let mut zc = (pc * cos + pd * sin) / sy;
                let mut s = (za * za + zc * zc).sqrt();
                if s > 0.00001 {
                    s = 1.0 / s;
                }
                za *= s;
                zc *= s;
                s = (za * za + zc * zc).sqrt();
                if mode == TransformMode::NoScale
                    && ((pa * pd - pb * pc < 0.0) != ((sx < 0.0) != (sy < 0.0)))
                {
                    s = -s;
                }
                let r = std::f32::consts::FRAC_PI_2 + zc.atan2(za);
                let zb = r.cos() * s;
                let zd = r.sin() * s;
                let la = cos_deg(shear_x) * scale_x;
                let lb = cos_deg(90.0 + shear_y) * scale_y;
                let lc = sin_deg(shear_x) * scale_x;
                let ld = sin_deg(90.0 + shear_y) * scale_y;
                bone.a = za * la + zb * lc;
                bone.b = za * lb + zb * ld;
                bone.c = zc * la + zd * lc;
                bone.d = zc * lb + zd * ld;
            }
        }
        bone.a *= sx;
        bone.b *= sx;
        bone.c *= sy;
        bone.d *= sy;
    }

    /// Recomputes a bone's applied pose from its world transform, after a constraint rewrote
    /// the world transform directly.
    pub fn update_applied_transform(&mut self, index: usize) {
        let Some(bone) = self.bones.get(index) else {
            return;
        };
        let parent = bone
            .parent_index()
            .and_then(|p| self.bones.get(p))
            .map(|p| (p.a, p.b, p.c, p.d, p.world_x, p.world_y));
        let (skeleton_x, skeleton_y) = (self.x, self.y);
        let bone = &mut self.bones[index];

        let Some((pa, pb, pc, pd, pwx, pwy)) = parent else {
            bone.ax = bone.world_x - skeleton_x;
            bone.ay = bone.world_y - skeleton_y;
            bone.arotation = bone.c.atan2(bone.a) * RAD_DEG;
            bone.ascale_x = (bone.a * bone.a + bone.c * bone.c).sqrt();
            bone.ascale_y = (bone.b * bone.b + bone.d * bone.d).sqrt();
            bone.ashear_x = 0.0;
            bone.ashear_y = (bone.a * bone.b + bone.c * bone.d)
                .atan2(bone.a * bone.d - bone.b * bone.c)
                * RAD_DEG;
            return;
        };

        let pid = 1.0 / (pa * pd - pb * pc);
        let dx = bone.world_x - pwx;
        let dy = bone.world_y - pwy;
        bone.ax = dx * pd * pid - dy * pb * pid;
        bone.ay = dy * pa * pid - dx * pc * pid;
        let ia = pid * pd;
        let id = pid * pa;
        let ib = pid * pb;
        let ic = pid * pc;
        let ra = ia * bone.a - ib * bone.c;
        let rb = ia * bone.b - ib * bone.d;
        let rc = id * bone.c - ic * bone.a;
        let rd = id * bone.d - ic * bone.b;
        bone.ashear_x = 0.0;
        bone.ascale_x = (ra * ra + rc * rc).sqrt();
        if bone.ascale_x > 0.0001 {
            let det = ra * rd - rb * rc;
            bone.ascale_y = det / bone.ascale_x;
            bone.ashear_y = (ra * rb + rc * rd).atan2(det) * RAD_DEG;
            bone.arotation = rc.atan2(ra) * RAD_DEG;
        } else {
            bone.ascale_x = 0.0;
            bone.ascale_y = (rb * rb + rd * rd).sqrt();
            bone.ashear_y = 0.0;
            bone.arotation = 90.0 - rd.atan2(rb) * RAD_DEG;
        }
    }

    /// Parent world affine of `index`, or the skeleton's root frame for root bones.
    pub(crate) fn parent_frame(&self, index: usize) -> (f32, f32, f32, f32, f32, f32) {
        match self.bones[index].parent_index().and_then(|p| self.bones.get(p)) {
            Some(p) => (p.a, p.b, p.c, p.d, p.world_x, p.world_y),
            None => (self.scale_x, 0.0, 0.0, self.scale_y, self.x, self.y),
        }
    }

    /// Bounds of region and mesh attachments in draw order. `scratch` is reused for vertices.
    pub fn bounds(&self, scratch: &mut Vec<f32>) -> Option<Bounds> {
        let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
        let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        for &slot_index in &self.draw_order {
            let Some(slot) = self.slots.get(slot_index) else {
                continue;
            };
            let Some(bone) = self.bones.get(slot.bone) else {
                continue;
            };
            if !bone.active {
                continue;
            }
            let count = match slot.attachment().map(|a| a.as_ref()) {
                Some(Attachment::Region(region)) => {
                    scratch.resize(8, 0.0);
                    region.compute_world_vertices(bone, scratch, 0, 2);
                    8
                }
                Some(Attachment::Mesh(mesh)) => {
                    let count = mesh.vertex_data.world_vertices_length();
                    scratch.resize(count, 0.0);
                    mesh.vertex_data
                        .compute_world_vertices(&self.bones, slot, 0, count, scratch, 0, 2);
                    count
                }
                _ => continue,
            };
            for pair in scratch[..count].chunks_exact(2) {
                min_x = min_x.min(pair[0]);
                min_y = min_y.min(pair[1]);
                max_x = max_x.max(pair[0]);
                max_y = max_y.max(pair[1]);
            }
        }
        if min_x > max_x {
            return None;
        }
        Some(Bounds {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }
}

/// Topological sort of bones and constraints for [`Skeleton::update_cache`].
struct CacheBuilder<'a> {
    skeleton: &'a Skeleton,
    skin: Option<&'a SkinData>,
    sorted: Vec<bool>,
    cache: Vec<UpdateCacheItem>,
}

impl<'a> CacheBuilder<'a> {
    fn new(skeleton: &'a Skeleton, skin: Option<&'a SkinData>) -> Self {
        Self {
            skeleton,
            skin,
            // Inactive bones count as sorted so they never enter the cache.
            sorted: skeleton.bones.iter().map(|b| !b.active).collect(),
            cache: Vec::new(),
        }
    }

    fn sort_bone(&mut self, index: usize) {
        if self.sorted.get(index).is_none_or(|sorted| *sorted) {
            return;
        }
        if let Some(parent) = self.skeleton.bones[index].parent_index() {
            self.sort_bone(parent);
        }
        self.sorted[index] = true;
        self.cache.push(UpdateCacheItem::Bone(index));
    }

    /// Unsorts active descendants so they are re-sorted after the constraint just appended.
    fn sort_reset(&mut self, bone_index: usize) {
        let skeleton = self.skeleton;
        for &child in skeleton.bone_children(bone_index) {
            if !skeleton.bones[child].active {
                continue;
            }
            if self.sorted[child] {
                self.sort_reset(child);
            }
            self.sorted[child] = false;
        }
    }

    fn sort_ik(&mut self, index: usize) {
        let skeleton = self.skeleton;
        let constraint = &skeleton.ik_constraints[index];
        if !constraint.active {
            return;
        }
        let Some(&parent) = constraint.bones.first() else {
            return;
        };
        self.sort_bone(constraint.target);
        self.sort_bone(parent);
        if constraint.bones.len() == 1 {
            self.cache.push(UpdateCacheItem::Ik(index));
            self.sort_reset(parent);
        } else {
            let child = constraint.bones[constraint.bones.len() - 1];
            self.sort_bone(child);
            self.cache.push(UpdateCacheItem::Ik(index));
            self.sort_reset(parent);
            self.sorted[child] = true;
        }
    }

    fn sort_transform(&mut self, index: usize) {
        let skeleton = self.skeleton;
        let constraint = &skeleton.transform_constraints[index];
        if !constraint.active {
            return;
        }
        let local = skeleton.data.transform_constraints[constraint.data_index()].local;
        self.sort_bone(constraint.target);
        for &bone in &constraint.bones {
            if local {
                if let Some(parent) = skeleton.bones[bone].parent_index() {
                    self.sort_bone(parent);
                }
            }
            self.sort_bone(bone);
        }
        self.cache.push(UpdateCacheItem::Transform(index));
        self.finish_constrained(&constraint.bones);
    }

    fn sort_path(&mut self, index: usize) {
        let skeleton = self.skeleton;
        let constraint = &skeleton.path_constraints[index];
        if !constraint.active {
            return;
        }
        let slot_index = constraint.target;
        let slot = &skeleton.slots[slot_index];
        let slot_bone = slot.bone;

        let data = &skeleton.data;
        if let Some(skin) = self.skin {
            self.sort_path_skin(skin, slot_index, slot_bone);
        }
        if let Some(default_skin) = data.default_skin() {
            if !self.skin.is_some_and(|s| std::ptr::eq(s, default_skin)) {
                self.sort_path_skin(default_skin, slot_index, slot_bone);
            }
        }
        if let Some(attachment) = slot.attachment() {
            self.sort_path_attachment(attachment, slot_bone);
        }

        for &bone in &constraint.bones {
            self.sort_bone(bone);
        }
        self.cache.push(UpdateCacheItem::Path(index));
        self.finish_constrained(&constraint.bones);
    }

    fn finish_constrained(&mut self, bones: &[usize]) {
        for &bone in bones {
            self.sort_reset(bone);
        }
        for &bone in bones {
            if let Some(sorted) = self.sorted.get_mut(bone) {
                *sorted = true;
            }
        }
    }

    fn sort_path_skin(&mut self, skin: &SkinData, slot_index: usize, slot_bone: usize) {
        let Some(attachments) = skin.attachments.get(slot_index) else {
            return;
        };
        for attachment in attachments.values() {
            self.sort_path_attachment(attachment, slot_bone);
        }
    }

    fn sort_path_attachment(&mut self, attachment: &Attachment, slot_bone: usize) {
        let Attachment::Path(path) = attachment else {
            return;
        };
        match &path.vertex_data.vertices {
            crate::MeshVertices::Unweighted(_) => self.sort_bone(slot_bone),
            crate::MeshVertices::Weighted(vertices) => {
                for weight in vertices.iter().flatten() {
                    self.sort_bone(weight.bone);
                }
            }
        }
    }
}
