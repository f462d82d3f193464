#![allow(dead_code)]

use marionette::config::UnitDescriptor;
use marionette::rig::doc::{
    AnimationDoc, AttachmentDoc, BoneDoc, BoneTimelineDoc, KeyframeDoc, SkeletonDoc, SlotDoc,
};
use marionette::rig::BlendMode;
use std::path::{Path, PathBuf};

/// 64x64 page with two 32x32 regions. UVs: body covers the top-left quarter,
/// head the top-right quarter.
pub const ATLAS_JSON: &str = r#"{
    "image": "hero.png",
    "width": 64,
    "height": 64,
    "regions": {
        "body": {"x": 0, "y": 0, "w": 32, "h": 32},
        "head": {"x": 32, "y": 0, "w": 32, "h": 32}
    }
}"#;

pub fn write_atlas(dir: &Path) -> PathBuf {
    let path = dir.join("hero.atlas.json");
    std::fs::write(&path, ATLAS_JSON).expect("write atlas fixture");
    path
}

pub fn write_skel(dir: &Path, doc: &SkeletonDoc) -> PathBuf {
    let path = dir.join(format!("{}.skel", doc.name));
    std::fs::write(&path, doc.encode().expect("encode skeleton fixture")).expect("write skel fixture");
    path
}

pub fn bone(name: &str, parent: Option<u32>, x: f32, y: f32) -> BoneDoc {
    BoneDoc { name: name.to_string(), parent, x, y, rotation: 0.0, scale_x: 1.0, scale_y: 1.0 }
}

pub fn region_slot(name: &str, bone: u32, region: &str, size: f32, color: [f32; 4]) -> SlotDoc {
    SlotDoc {
        name: name.to_string(),
        bone,
        color,
        blend: BlendMode::Normal,
        attachment: Some(AttachmentDoc::Region {
            region: region.to_string(),
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            width: size,
            height: size,
        }),
    }
}

pub fn mesh_slot(name: &str, bone: u32, region: &str, color: [f32; 4]) -> SlotDoc {
    SlotDoc {
        name: name.to_string(),
        bone,
        color,
        blend: BlendMode::Normal,
        attachment: Some(AttachmentDoc::Mesh {
            region: region.to_string(),
            vertices: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            triangles: vec![0, 1, 2, 2, 3, 0],
        }),
    }
}

pub fn clip_slot(name: &str, bone: u32, end_slot: Option<&str>, half_extent: f32) -> SlotDoc {
    SlotDoc {
        name: name.to_string(),
        bone,
        color: [1.0, 1.0, 1.0, 1.0],
        blend: BlendMode::Normal,
        attachment: Some(AttachmentDoc::Clipping {
            end_slot: end_slot.map(str::to_string),
            vertices: vec![
                [-half_extent, -half_extent],
                [half_extent, -half_extent],
                [half_extent, half_extent],
                [-half_extent, half_extent],
            ],
        }),
    }
}

pub fn empty_slot(name: &str, bone: u32) -> SlotDoc {
    SlotDoc {
        name: name.to_string(),
        bone,
        color: [1.0, 1.0, 1.0, 1.0],
        blend: BlendMode::Normal,
        attachment: None,
    }
}

/// Linear x-translation of `bone` from 0 to 1 unit over one second.
pub fn slide_animation(name: &str, bone: &str) -> AnimationDoc {
    AnimationDoc {
        name: name.to_string(),
        timelines: vec![BoneTimelineDoc {
            bone: bone.to_string(),
            translate: vec![
                KeyframeDoc { time: 0.0, value: [0.0, 0.0] },
                KeyframeDoc { time: 1.0, value: [1.0, 0.0] },
            ],
            rotate: Vec::new(),
            scale: Vec::new(),
        }],
    }
}

pub fn spin_animation(name: &str, bone: &str, duration: f32) -> AnimationDoc {
    AnimationDoc {
        name: name.to_string(),
        timelines: vec![BoneTimelineDoc {
            bone: bone.to_string(),
            translate: Vec::new(),
            rotate: vec![
                KeyframeDoc { time: 0.0, value: 0.0 },
                KeyframeDoc { time: duration, value: 360.0 },
            ],
            scale: Vec::new(),
        }],
    }
}

/// Full fixture: root + arm bones, three drawable slots in back-to-front
/// order (red back quad, green mid mesh, blue front quad), one unresolvable
/// region, one empty slot, and three animations.
pub fn hero_doc() -> SkeletonDoc {
    SkeletonDoc {
        name: "hero".to_string(),
        bones: vec![bone("root", None, 0.0, 0.0), bone("arm", Some(0), 1.0, 0.0)],
        slots: vec![
            region_slot("back", 0, "body", 2.0, [1.0, 0.0, 0.0, 1.0]),
            mesh_slot("mid", 1, "head", [0.0, 1.0, 0.0, 1.0]),
            region_slot("front", 0, "head", 2.0, [0.0, 0.0, 1.0, 1.0]),
            region_slot("pouch", 0, "no-such-region", 1.0, [1.0, 1.0, 1.0, 1.0]),
            empty_slot("tail", 0),
        ],
        animations: vec![
            slide_animation("idle", "root"),
            slide_animation("walk", "arm"),
            spin_animation("jump", "root", 0.5),
        ],
    }
}

pub fn descriptor(name: &str, atlas: &Path, skel: &Path) -> UnitDescriptor {
    UnitDescriptor {
        name: name.to_string(),
        atlas: atlas.to_string_lossy().into_owned(),
        skel: skel.to_string_lossy().into_owned(),
        scale: 1.0,
        x: 0.0,
        y: 0.0,
        default_anim: None,
    }
}
