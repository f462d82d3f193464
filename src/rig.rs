use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub mod clipper;
pub mod doc;
pub mod state;

use state::Animation;

/// Per-slot compositing rule, resolved to a GPU blend-function pair at draw
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

impl BlendMode {
    pub const ALL: [BlendMode; 4] =
        [BlendMode::Normal, BlendMode::Additive, BlendMode::Multiply, BlendMode::Screen];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// 2D affine transform, column-vector convention:
/// `x' = a*x + b*y + tx`, `y' = c*x + d*y + ty`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl BoneTransform {
    pub const IDENTITY: Self = Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, tx: 0.0, ty: 0.0 };

    pub fn from_srt(x: f32, y: f32, rotation_deg: f32, scale_x: f32, scale_y: f32) -> Self {
        let (sin, cos) = rotation_deg.to_radians().sin_cos();
        Self {
            a: cos * scale_x,
            b: -sin * scale_y,
            c: sin * scale_x,
            d: cos * scale_y,
            tx: x,
            ty: y,
        }
    }

    pub fn transform(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            self.a * point.x + self.b * point.y + self.tx,
            self.c * point.x + self.d * point.y + self.ty,
        )
    }

    /// `self * child`, with the child transform applied first.
    pub fn concat(&self, child: &BoneTransform) -> BoneTransform {
        BoneTransform {
            a: self.a * child.a + self.b * child.c,
            b: self.a * child.b + self.b * child.d,
            c: self.c * child.a + self.d * child.c,
            d: self.c * child.b + self.d * child.d,
            tx: self.a * child.tx + self.b * child.ty + self.tx,
            ty: self.c * child.tx + self.d * child.ty + self.ty,
        }
    }
}

/// Setup-pose definition of one bone. `parent` always indexes an earlier bone
/// (validated when the document is built).
#[derive(Debug, Clone)]
pub struct BoneData {
    pub name: Arc<str>,
    pub parent: Option<usize>,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

/// One drawing channel of the skeleton. Slot order is the draw order.
#[derive(Debug, Clone)]
pub struct SlotData {
    pub name: Arc<str>,
    pub bone: usize,
    pub color: [f32; 4],
    pub blend: BlendMode,
    pub attachment: Option<Attachment>,
}

/// Atlas page resolved for a drawable attachment at load time. `None` on the
/// attachment means the named region was missing from the atlas; such slots
/// are skipped at extraction but still take part in clip bookkeeping.
#[derive(Debug, Clone)]
pub struct TextureRef {
    pub page: Arc<str>,
}

#[derive(Debug, Clone)]
pub enum Attachment {
    Region(RegionAttachment),
    Mesh(MeshAttachment),
    Clipping(ClippingAttachment),
}

/// Single textured quad placed relative to the slot's bone.
#[derive(Debug, Clone)]
pub struct RegionAttachment {
    pub name: Arc<str>,
    /// Bone-local corners in order bottom-left, top-left, top-right,
    /// bottom-right, with the attachment transform baked in.
    pub offsets: [Vec2; 4],
    pub uvs: [Vec2; 4],
    pub texture: Option<TextureRef>,
}

impl RegionAttachment {
    pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

    pub fn world_corners(&self, bone: &BoneTransform) -> [Vec2; 4] {
        [
            bone.transform(self.offsets[0]),
            bone.transform(self.offsets[1]),
            bone.transform(self.offsets[2]),
            bone.transform(self.offsets[3]),
        ]
    }
}

/// Arbitrary triangulated shape bound to the slot's bone. UVs are already in
/// atlas-page space.
#[derive(Debug, Clone)]
pub struct MeshAttachment {
    pub name: Arc<str>,
    pub vertices: Arc<[Vec2]>,
    pub uvs: Arc<[Vec2]>,
    pub triangles: Arc<[u16]>,
    pub texture: Option<TextureRef>,
}

impl MeshAttachment {
    pub fn world_vertices(&self, bone: &BoneTransform, out: &mut Vec<Vec2>) {
        out.clear();
        out.reserve(self.vertices.len());
        for vertex in self.vertices.iter() {
            out.push(bone.transform(*vertex));
        }
    }
}

/// Clip-defining polygon. `end_slot` names the slot at which the region
/// closes; `None` keeps it open until the unit traversal force-closes it.
#[derive(Debug, Clone)]
pub struct ClippingAttachment {
    pub name: Arc<str>,
    pub end_slot: Option<usize>,
    pub vertices: Arc<[Vec2]>,
}

impl ClippingAttachment {
    pub fn world_polygon(&self, bone: &BoneTransform) -> Vec<Vec2> {
        self.vertices.iter().map(|vertex| bone.transform(*vertex)).collect()
    }
}

/// Shared immutable skeleton definition: bones, slots in draw order, named
/// animations. Built once per asset load and reference-counted across units.
pub struct SkeletonData {
    pub name: Arc<str>,
    pub bones: Arc<[BoneData]>,
    pub slots: Arc<[SlotData]>,
    animations: HashMap<Arc<str>, Arc<Animation>>,
}

impl SkeletonData {
    pub fn new(
        name: Arc<str>,
        bones: Arc<[BoneData]>,
        slots: Arc<[SlotData]>,
        animations: HashMap<Arc<str>, Arc<Animation>>,
    ) -> Self {
        Self { name, bones, slots, animations }
    }

    pub fn find_animation(&self, name: &str) -> Option<Arc<Animation>> {
        self.animations.get(name).cloned()
    }

    pub fn animation_names(&self) -> Vec<Arc<str>> {
        let mut names: Vec<Arc<str>> = self.animations.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.name.as_ref() == name)
    }
}

/// Mutable local pose of one bone plus its derived world transform.
#[derive(Debug, Clone)]
pub struct BonePose {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub world: BoneTransform,
}

#[derive(Debug, Clone)]
pub struct SlotPose {
    pub color: [f32; 4],
}

/// Posed skeleton instance. Local poses are overwritten from the setup pose
/// and the animation state every frame; world transforms are derived in one
/// parents-first pass.
pub struct Skeleton {
    data: Arc<SkeletonData>,
    pub x: f32,
    pub y: f32,
    pub color: [f32; 4],
    bones: Vec<BonePose>,
    slots: Vec<SlotPose>,
}

impl Skeleton {
    pub fn new(data: Arc<SkeletonData>) -> Self {
        let bones = data
            .bones
            .iter()
            .map(|bone| BonePose {
                x: bone.x,
                y: bone.y,
                rotation: bone.rotation,
                scale_x: bone.scale_x,
                scale_y: bone.scale_y,
                world: BoneTransform::IDENTITY,
            })
            .collect();
        let slots = data.slots.iter().map(|slot| SlotPose { color: slot.color }).collect();
        Self { data, x: 0.0, y: 0.0, color: [1.0, 1.0, 1.0, 1.0], bones, slots }
    }

    pub fn data(&self) -> &Arc<SkeletonData> {
        &self.data
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn set_to_setup_pose(&mut self) {
        for (pose, setup) in self.bones.iter_mut().zip(self.data.bones.iter()) {
            pose.x = setup.x;
            pose.y = setup.y;
            pose.rotation = setup.rotation;
            pose.scale_x = setup.scale_x;
            pose.scale_y = setup.scale_y;
        }
        for (pose, setup) in self.slots.iter_mut().zip(self.data.slots.iter()) {
            pose.color = setup.color;
        }
    }

    /// Recomputes world transforms from the current local poses. Bones are
    /// ordered parents-first, so a single forward pass is enough; roots pick
    /// up the skeleton's `(x, y)` offset.
    pub fn update_world_transform(&mut self) {
        for index in 0..self.bones.len() {
            let pose = &self.bones[index];
            let local = BoneTransform::from_srt(pose.x, pose.y, pose.rotation, pose.scale_x, pose.scale_y);
            let world = match self.data.bones[index].parent {
                Some(parent) => self.bones[parent].world.concat(&local),
                None => BoneTransform { tx: local.tx + self.x, ty: local.ty + self.y, ..local },
            };
            self.bones[index].world = world;
        }
    }

    pub fn bone_world(&self, index: usize) -> &BoneTransform {
        &self.bones[index].world
    }

    pub fn bone_pose_mut(&mut self, index: usize) -> &mut BonePose {
        &mut self.bones[index]
    }

    pub fn slot_color(&self, index: usize) -> [f32; 4] {
        self.slots[index].color
    }

    /// Component-wise product of the skeleton tint and the slot tint.
    pub fn combined_color(&self, slot_index: usize) -> [f32; 4] {
        let slot = self.slots[slot_index].color;
        [
            self.color[0] * slot[0],
            self.color[1] * slot[1],
            self.color[2] * slot[2],
            self.color[3] * slot[3],
        ]
    }
}
