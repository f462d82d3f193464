pub mod assets;
pub mod atlas;
pub mod cli;
pub mod commands;
pub mod compositor;
pub mod config;
pub mod extract;
pub mod registry;
pub mod renderer;
pub mod rig;
pub mod time;

pub use compositor::Compositor;
pub use renderer::{GpuContext, StageRenderer};
