use crate::rig::clipper::Clipper;
use crate::rig::{Attachment, BlendMode, RegionAttachment, Skeleton};
use glam::Vec2;
use std::sync::Arc;

/// One drawable slot mesh in world space, post-clip, ready for upload.
pub struct SlotGeometry {
    pub positions: Vec<Vec2>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u16>,
    pub color: [f32; 4],
    pub blend: BlendMode,
    pub page: Arc<str>,
}

impl SlotGeometry {
    /// Anything below one full triangle is skipped rather than drawn.
    pub fn is_degenerate(&self) -> bool {
        self.positions.len() < 3 || self.indices.len() < 3
    }
}

/// Runs one unit's draw-order traversal, appending a mesh per drawable slot
/// to `out`. Any clip region still active at the end is force-closed so no
/// state leaks into the next unit.
pub fn unit_geometry(skeleton: &Skeleton, clipper: &mut Clipper, out: &mut Vec<SlotGeometry>) {
    for slot_index in 0..skeleton.slot_count() {
        process_slot(skeleton, slot_index, clipper, out);
    }
    clipper.clip_end_all();
}

/// Emits at most one mesh for the slot and keeps the clip state current.
/// Every exit path runs the end-of-clip check for this slot.
pub fn process_slot(
    skeleton: &Skeleton,
    slot_index: usize,
    clipper: &mut Clipper,
    out: &mut Vec<SlotGeometry>,
) {
    let slot = &skeleton.data().slots[slot_index];
    let bone = *skeleton.bone_world(slot.bone);

    let (positions, uvs, indices, texture) = match &slot.attachment {
        Some(Attachment::Clipping(clip)) => {
            let polygon = clip.world_polygon(&bone);
            clipper.clip_start(clip.end_slot, &polygon);
            // The clip-defining slot renders nothing.
            clipper.clip_end(slot_index);
            return;
        }
        Some(Attachment::Region(region)) => {
            let corners = region.world_corners(&bone);
            (
                corners.to_vec(),
                region.uvs.to_vec(),
                RegionAttachment::QUAD_INDICES.to_vec(),
                region.texture.clone(),
            )
        }
        Some(Attachment::Mesh(mesh)) => {
            let mut world = Vec::new();
            mesh.world_vertices(&bone, &mut world);
            (world, mesh.uvs.to_vec(), mesh.triangles.to_vec(), mesh.texture.clone())
        }
        None => {
            clipper.clip_end(slot_index);
            return;
        }
    };

    let Some(texture) = texture else {
        // Unresolved texture region: skipped, but clip bookkeeping continues.
        clipper.clip_end(slot_index);
        return;
    };

    let color = skeleton.combined_color(slot_index);
    let geometry = if clipper.is_clipping() {
        clipper.clip_triangles(&positions, &uvs, &indices);
        SlotGeometry {
            positions: clipper.positions.clone(),
            uvs: clipper.uvs.clone(),
            indices: clipper.indices.clone(),
            color,
            blend: slot.blend,
            page: texture.page,
        }
    } else {
        SlotGeometry { positions, uvs, indices, color, blend: slot.blend, page: texture.page }
    };

    if !geometry.is_degenerate() {
        out.push(geometry);
    }
    clipper.clip_end(slot_index);
}
