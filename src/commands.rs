use serde::Deserialize;
use std::sync::Mutex;

/// One animation-trigger request against a named unit. The first queue entry
/// replaces whatever the track is playing; later entries are chained to play
/// after it, and only the final one may loop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerCommand {
    pub unit: String,
    #[serde(default)]
    pub track: usize,
    #[serde(default)]
    pub queue: Vec<String>,
    #[serde(default = "default_loop_last")]
    pub loop_last: bool,
}

const fn default_loop_last() -> bool {
    true
}

/// Handoff of pending trigger batches from the control surface into the frame
/// loop. A newer `submit` before the compositor has consumed the previous
/// batch overwrites it; only the latest batch matters.
#[derive(Default)]
pub struct CommandQueue {
    pending: Mutex<Vec<TriggerCommand>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the pending batch for the next synchronization point.
    pub fn submit(&self, commands: Vec<TriggerCommand>) {
        *self.pending.lock().expect("command queue poisoned") = commands;
    }

    /// Atomically empties the queue and returns the snapshot. Called once per
    /// frame boundary, before stepping.
    pub fn take_all(&self) -> Vec<TriggerCommand> {
        std::mem::take(&mut *self.pending.lock().expect("command queue poisoned"))
    }
}
