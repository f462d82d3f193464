use crate::assets::AssetPaths;
use crate::atlas::TextureAtlas;
use crate::config::UnitDescriptor;
use crate::rig::doc::{self, SkeletonDoc};
use crate::rig::state::AnimationState;
use crate::rig::{Skeleton, SkeletonData};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

/// One loaded, independently animated character instance. A `Unit` only
/// exists fully constructed; a descriptor that fails any load step never
/// produces one.
pub struct Unit {
    pub name: String,
    pub skeleton: Skeleton,
    pub state: AnimationState,
    pub atlas: Arc<TextureAtlas>,
}

impl Unit {
    pub fn data(&self) -> Arc<SkeletonData> {
        Arc::clone(self.skeleton.data())
    }
}

/// Owns every loaded unit for the compositor's lifetime. The set is fixed at
/// load; lookups are linear over the (small) list.
#[derive(Default)]
pub struct UnitRegistry {
    units: Vec<Unit>,
}

impl UnitRegistry {
    /// Constructs zero or more units from the configuration list. Each entry
    /// fails independently: the failure is logged and the entry skipped.
    pub fn load(descriptors: &[UnitDescriptor], paths: &AssetPaths) -> Self {
        let mut units = Vec::new();
        for descriptor in descriptors {
            match load_unit(descriptor, paths) {
                Ok(unit) => {
                    eprintln!("[units] loaded unit '{}'", unit.name);
                    units.push(unit);
                }
                Err(err) => {
                    eprintln!("[units] skipping unit '{}': {err:#}", descriptor.name);
                }
            }
        }
        Self { units }
    }

    pub fn from_units(units: Vec<Unit>) -> Self {
        Self { units }
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Unit> {
        self.units.iter().find(|unit| unit.name == name)
    }

    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut Unit> {
        self.units.iter_mut().find(|unit| unit.name == name)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn units_mut(&mut self) -> &mut [Unit] {
        &mut self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

fn load_unit(descriptor: &UnitDescriptor, paths: &AssetPaths) -> Result<Unit> {
    descriptor.validate().map_err(|message| anyhow!(message))?;

    let atlas = TextureAtlas::load(&paths.resolve(&descriptor.atlas))
        .with_context(|| format!("atlas '{}'", descriptor.atlas))?;
    let bytes = paths.read_bytes(&descriptor.skel)?;
    let skel = SkeletonDoc::decode(&bytes)
        .with_context(|| format!("skeleton '{}'", descriptor.skel))?;
    let data = doc::build_skeleton_data(&skel, &atlas, descriptor.scale)?;

    let mut skeleton = Skeleton::new(Arc::clone(&data));
    skeleton.x = descriptor.x;
    skeleton.y = descriptor.y;
    skeleton.set_to_setup_pose();
    skeleton.update_world_transform();

    let mut state = AnimationState::new();
    if let Some(default_anim) = &descriptor.default_anim {
        match data.find_animation(default_anim) {
            Some(animation) => state.set_animation(0, animation, true),
            None => eprintln!(
                "[units] unit '{}': default animation '{default_anim}' not found",
                descriptor.name
            ),
        }
    }

    Ok(Unit { name: descriptor.name.clone(), skeleton, state, atlas: Arc::new(atlas) })
}
