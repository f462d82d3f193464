use crate::assets::AssetPaths;
use crate::commands::{CommandQueue, TriggerCommand};
use crate::config::StageConfig;
use crate::extract::{self, SlotGeometry};
use crate::registry::{Unit, UnitRegistry};
use crate::renderer::StageRenderer;
use crate::rig::clipper::Clipper;
use crate::time::{clamp_delta, FrameClock};
use anyhow::Result;
use std::sync::Arc;

/// Per-frame compositor. Turns the loaded units' posed skeletons into
/// textured triangle batches in a stable, deterministic order:
/// trigger execution, animation stepping, then per-slot extraction and
/// clipping in each skeleton's draw order.
pub struct Compositor {
    registry: UnitRegistry,
    queue: Arc<CommandQueue>,
    pending: Vec<TriggerCommand>,
    clock: FrameClock,
    clipper: Clipper,
    geometry: Vec<SlotGeometry>,
}

impl Compositor {
    pub fn new(config: &StageConfig) -> Self {
        let paths = AssetPaths::new(config.asset_root.clone());
        let registry = UnitRegistry::load(&config.units, &paths);
        Self::from_registry(registry, config.max_frame_delta)
    }

    pub fn from_registry(registry: UnitRegistry, max_frame_delta: f32) -> Self {
        Self {
            registry,
            queue: Arc::new(CommandQueue::new()),
            pending: Vec::new(),
            clock: FrameClock::new(max_frame_delta),
            clipper: Clipper::new(),
            geometry: Vec::new(),
        }
    }

    /// Handle for the control surface. `submit` may be called on it from any
    /// thread; the compositor consumes the latest batch at `synchronize`.
    pub fn command_queue(&self) -> Arc<CommandQueue> {
        Arc::clone(&self.queue)
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut UnitRegistry {
        &mut self.registry
    }

    /// Takes the latest trigger snapshot. Called once per frame, before
    /// `render`.
    pub fn synchronize(&mut self) {
        self.pending = self.queue.take_all();
    }

    /// One full frame with the clock-derived delta, drawn into `target`.
    pub fn render(
        &mut self,
        renderer: &mut StageRenderer,
        target: &wgpu::TextureView,
        size: (u32, u32),
    ) -> Result<()> {
        let dt = self.clock.tick();
        self.advance(dt);
        renderer.render(target, size, &self.geometry)
    }

    /// The CPU body of a frame with an explicit delta: triggers, stepping,
    /// extraction and clipping. Returns the frame's draw list in draw order.
    pub fn advance(&mut self, dt: f32) -> &[SlotGeometry] {
        let commands = std::mem::take(&mut self.pending);
        self.execute_triggers(&commands);

        let dt = clamp_delta(dt, self.clock.max_delta());
        for unit in self.registry.units_mut() {
            step_unit(unit, dt);
        }

        self.geometry.clear();
        for unit in self.registry.units() {
            extract::unit_geometry(&unit.skeleton, &mut self.clipper, &mut self.geometry);
        }
        &self.geometry
    }

    /// Interprets queued trigger commands as track operations. Unknown units
    /// and unknown animation names are skipped per item, never failing the
    /// rest of the batch.
    fn execute_triggers(&mut self, commands: &[TriggerCommand]) {
        for command in commands {
            let Some(unit) = self.registry.find_by_name_mut(&command.unit) else {
                continue;
            };
            let data = unit.data();
            let last_index = command.queue.len().saturating_sub(1);
            let mut first = true;
            for (index, name) in command.queue.iter().enumerate() {
                let Some(animation) = data.find_animation(name) else {
                    continue;
                };
                let looping = index == last_index && command.loop_last;
                if first {
                    unit.state.set_animation(command.track, animation, looping);
                    first = false;
                } else {
                    unit.state.add_animation(command.track, animation, looping);
                }
            }
        }
    }
}

/// Advances one unit's state machine by `dt` seconds and re-derives its
/// world-space pose.
pub fn step_unit(unit: &mut Unit, dt: f32) {
    unit.state.update(dt);
    unit.skeleton.set_to_setup_pose();
    unit.state.apply(&mut unit.skeleton);
    unit.skeleton.update_world_transform();
}
