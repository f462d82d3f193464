use super::state::{Animation, BoneTimeline, Keyframe, Track};
use super::{
    Attachment, BlendMode, BoneData, BoneTransform, ClippingAttachment, MeshAttachment,
    RegionAttachment, SkeletonData, SlotData, TextureRef,
};
use crate::atlas::TextureAtlas;
use anyhow::{anyhow, bail, Context, Result};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Serialized skeleton document. `skel` asset files carry this structure as a
/// bincode payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonDoc {
    pub name: String,
    pub bones: Vec<BoneDoc>,
    pub slots: Vec<SlotDoc>,
    #[serde(default)]
    pub animations: Vec<AnimationDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneDoc {
    pub name: String,
    pub parent: Option<u32>,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "one")]
    pub scale_x: f32,
    #[serde(default = "one")]
    pub scale_y: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDoc {
    pub name: String,
    pub bone: u32,
    #[serde(default = "white")]
    pub color: [f32; 4],
    #[serde(default)]
    pub blend: BlendMode,
    #[serde(default)]
    pub attachment: Option<AttachmentDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttachmentDoc {
    Region {
        region: String,
        #[serde(default)]
        x: f32,
        #[serde(default)]
        y: f32,
        #[serde(default)]
        rotation: f32,
        #[serde(default = "one")]
        scale_x: f32,
        #[serde(default = "one")]
        scale_y: f32,
        width: f32,
        height: f32,
    },
    Mesh {
        region: String,
        /// Bone-local positions.
        vertices: Vec<[f32; 2]>,
        /// Region-local texture coordinates in `[0, 1]`.
        uvs: Vec<[f32; 2]>,
        triangles: Vec<u16>,
    },
    Clipping {
        /// Name of the slot at which the region closes; `None` clips to the
        /// end of the draw order.
        end_slot: Option<String>,
        vertices: Vec<[f32; 2]>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationDoc {
    pub name: String,
    pub timelines: Vec<BoneTimelineDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneTimelineDoc {
    pub bone: String,
    #[serde(default)]
    pub translate: Vec<KeyframeDoc<[f32; 2]>>,
    #[serde(default)]
    pub rotate: Vec<KeyframeDoc<f32>>,
    #[serde(default)]
    pub scale: Vec<KeyframeDoc<[f32; 2]>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyframeDoc<T> {
    pub time: f32,
    pub value: T,
}

const fn one() -> f32 {
    1.0
}

const fn white() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

impl SkeletonDoc {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).context("invalid skeleton payload")
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("failed to encode skeleton payload")
    }
}

/// Builds the immutable runtime definition from a decoded document, resolving
/// attachment regions against `atlas` and baking the loader `scale` into
/// setup translations and attachment-local vertices.
pub fn build_skeleton_data(
    doc: &SkeletonDoc,
    atlas: &TextureAtlas,
    scale: f32,
) -> Result<Arc<SkeletonData>> {
    if !(scale.is_finite() && scale > 0.0) {
        bail!("skeleton '{}' has invalid scale {scale}", doc.name);
    }

    let mut bones = Vec::with_capacity(doc.bones.len());
    for (index, bone) in doc.bones.iter().enumerate() {
        let parent = match bone.parent {
            Some(parent) => {
                let parent = parent as usize;
                if parent >= index {
                    bail!(
                        "skeleton '{}': bone '{}' must be ordered after its parent",
                        doc.name,
                        bone.name
                    );
                }
                Some(parent)
            }
            None => None,
        };
        bones.push(BoneData {
            name: Arc::from(bone.name.as_str()),
            parent,
            x: bone.x * scale,
            y: bone.y * scale,
            rotation: bone.rotation,
            scale_x: bone.scale_x,
            scale_y: bone.scale_y,
        });
    }

    let slot_index_by_name: HashMap<&str, usize> = doc
        .slots
        .iter()
        .enumerate()
        .map(|(index, slot)| (slot.name.as_str(), index))
        .collect();

    let mut slots = Vec::with_capacity(doc.slots.len());
    for slot in &doc.slots {
        let bone = slot.bone as usize;
        if bone >= bones.len() {
            bail!("skeleton '{}': slot '{}' references unknown bone", doc.name, slot.name);
        }
        let attachment = match &slot.attachment {
            Some(attachment) => Some(build_attachment(
                doc,
                &slot.name,
                attachment,
                atlas,
                scale,
                &slot_index_by_name,
            )?),
            None => None,
        };
        slots.push(SlotData {
            name: Arc::from(slot.name.as_str()),
            bone,
            color: slot.color,
            blend: slot.blend,
            attachment,
        });
    }

    let mut animations = HashMap::new();
    for animation in &doc.animations {
        let built = build_animation(doc, animation, &bones, scale)?;
        animations.insert(Arc::clone(&built.name), Arc::new(built));
    }

    Ok(Arc::new(SkeletonData::new(
        Arc::from(doc.name.as_str()),
        Arc::from(bones.into_boxed_slice()),
        Arc::from(slots.into_boxed_slice()),
        animations,
    )))
}

fn build_attachment(
    doc: &SkeletonDoc,
    slot_name: &str,
    attachment: &AttachmentDoc,
    atlas: &TextureAtlas,
    scale: f32,
    slot_index_by_name: &HashMap<&str, usize>,
) -> Result<Attachment> {
    match attachment {
        AttachmentDoc::Region { region, x, y, rotation, scale_x, scale_y, width, height } => {
            let local = BoneTransform::from_srt(x * scale, y * scale, *rotation, *scale_x, *scale_y);
            let half_w = width * scale * 0.5;
            let half_h = height * scale * 0.5;
            let offsets = [
                local.transform(Vec2::new(-half_w, -half_h)),
                local.transform(Vec2::new(-half_w, half_h)),
                local.transform(Vec2::new(half_w, half_h)),
                local.transform(Vec2::new(half_w, -half_h)),
            ];
            let (uvs, texture) = match atlas.region_uv(region) {
                Some([u0, v0, u1, v1]) => (
                    [
                        Vec2::new(u0, v1),
                        Vec2::new(u0, v0),
                        Vec2::new(u1, v0),
                        Vec2::new(u1, v1),
                    ],
                    Some(TextureRef { page: Arc::clone(&atlas.page) }),
                ),
                None => {
                    eprintln!(
                        "[units] skeleton '{}': slot '{slot_name}' references unknown atlas region '{region}'",
                        doc.name
                    );
                    (
                        [
                            Vec2::new(0.0, 1.0),
                            Vec2::new(0.0, 0.0),
                            Vec2::new(1.0, 0.0),
                            Vec2::new(1.0, 1.0),
                        ],
                        None,
                    )
                }
            };
            Ok(Attachment::Region(RegionAttachment {
                name: Arc::from(region.as_str()),
                offsets,
                uvs,
                texture,
            }))
        }
        AttachmentDoc::Mesh { region, vertices, uvs, triangles } => {
            if vertices.len() != uvs.len() {
                bail!(
                    "skeleton '{}': mesh on slot '{slot_name}' has {} vertices but {} uvs",
                    doc.name,
                    vertices.len(),
                    uvs.len()
                );
            }
            if triangles.len() % 3 != 0 {
                bail!(
                    "skeleton '{}': mesh on slot '{slot_name}' triangle list is not a multiple of 3",
                    doc.name
                );
            }
            if let Some(&bad) = triangles.iter().find(|&&index| index as usize >= vertices.len()) {
                bail!(
                    "skeleton '{}': mesh on slot '{slot_name}' index {bad} is out of range",
                    doc.name
                );
            }
            let positions: Vec<Vec2> =
                vertices.iter().map(|[x, y]| Vec2::new(x * scale, y * scale)).collect();
            let (mapped_uvs, texture) = match atlas.region_uv(region) {
                Some([u0, v0, u1, v1]) => (
                    uvs.iter()
                        .map(|[u, v]| Vec2::new(u0 + u * (u1 - u0), v0 + v * (v1 - v0)))
                        .collect::<Vec<Vec2>>(),
                    Some(TextureRef { page: Arc::clone(&atlas.page) }),
                ),
                None => {
                    eprintln!(
                        "[units] skeleton '{}': slot '{slot_name}' references unknown atlas region '{region}'",
                        doc.name
                    );
                    (uvs.iter().map(|[u, v]| Vec2::new(*u, *v)).collect(), None)
                }
            };
            Ok(Attachment::Mesh(MeshAttachment {
                name: Arc::from(region.as_str()),
                vertices: Arc::from(positions.into_boxed_slice()),
                uvs: Arc::from(mapped_uvs.into_boxed_slice()),
                triangles: Arc::from(triangles.clone().into_boxed_slice()),
                texture,
            }))
        }
        AttachmentDoc::Clipping { end_slot, vertices } => {
            let end_slot = match end_slot {
                Some(name) => match slot_index_by_name.get(name.as_str()) {
                    Some(&index) => Some(index),
                    None => {
                        eprintln!(
                            "[units] skeleton '{}': clip on slot '{slot_name}' names unknown end slot '{name}'",
                            doc.name
                        );
                        None
                    }
                },
                None => None,
            };
            let positions: Vec<Vec2> =
                vertices.iter().map(|[x, y]| Vec2::new(x * scale, y * scale)).collect();
            Ok(Attachment::Clipping(ClippingAttachment {
                name: Arc::from(slot_name),
                end_slot,
                vertices: Arc::from(positions.into_boxed_slice()),
            }))
        }
    }
}

fn build_animation(
    doc: &SkeletonDoc,
    animation: &AnimationDoc,
    bones: &[BoneData],
    scale: f32,
) -> Result<Animation> {
    let mut timelines = Vec::new();
    let mut duration = 0.0_f32;
    for timeline in &animation.timelines {
        let Some(bone) = bones.iter().position(|bone| bone.name.as_ref() == timeline.bone) else {
            eprintln!(
                "[units] skeleton '{}': animation '{}' targets unknown bone '{}', skipping timeline",
                doc.name, animation.name, timeline.bone
            );
            continue;
        };
        let translate = build_track(&timeline.translate, |[x, y]| Vec2::new(x * scale, y * scale))
            .with_context(|| {
                format!("animation '{}' translate track for bone '{}'", animation.name, timeline.bone)
            })?;
        let rotate = build_track(&timeline.rotate, |degrees| degrees).with_context(|| {
            format!("animation '{}' rotate track for bone '{}'", animation.name, timeline.bone)
        })?;
        let bone_scale = build_track(&timeline.scale, |[x, y]| Vec2::new(x, y)).with_context(|| {
            format!("animation '{}' scale track for bone '{}'", animation.name, timeline.bone)
        })?;
        for track_duration in [
            translate.as_ref().map(Track::duration),
            rotate.as_ref().map(Track::duration),
            bone_scale.as_ref().map(Track::duration),
        ]
        .into_iter()
        .flatten()
        {
            duration = duration.max(track_duration);
        }
        if translate.is_none() && rotate.is_none() && bone_scale.is_none() {
            continue;
        }
        timelines.push(BoneTimeline { bone, translate, rotate, scale: bone_scale });
    }
    Ok(Animation {
        name: Arc::from(animation.name.as_str()),
        duration,
        timelines: Arc::from(timelines.into_boxed_slice()),
    })
}

/// Sorts keyframes by time (stable for ties), collapses duplicates, and
/// rejects negative or non-finite times.
fn build_track<R: Copy, T: super::state::Interpolate>(
    raw: &[KeyframeDoc<R>],
    convert: impl Fn(R) -> T,
) -> Result<Option<Track<T>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let mut frames: Vec<(usize, Keyframe<T>)> = Vec::with_capacity(raw.len());
    for (index, key) in raw.iter().enumerate() {
        if !key.time.is_finite() {
            return Err(anyhow!("keyframe time must be finite"));
        }
        if key.time < 0.0 {
            return Err(anyhow!("keyframe time cannot be negative"));
        }
        frames.push((index, Keyframe { time: key.time, value: convert(key.value) }));
    }
    frames.sort_by(|a, b| {
        a.1.time.partial_cmp(&b.1.time).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0))
    });
    let mut deduped: Vec<Keyframe<T>> = Vec::with_capacity(frames.len());
    for (_, frame) in frames {
        if let Some(last) = deduped.last_mut() {
            if (frame.time - last.time).abs() <= f32::EPSILON {
                *last = frame;
                continue;
            }
        }
        deduped.push(frame);
    }
    Ok(Track::new(deduped))
}
