// Use-case level settings for one game instance.

use crate::domain::PhysicsTuning;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct GameOptions {
    pub tuning: PhysicsTuning,
    /// Zero means the ticker only yields between ticks.
    pub tick_interval: Duration,
    pub command_capacity: usize,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            tuning: PhysicsTuning::default(),
            tick_interval: Duration::from_millis(16),
            command_capacity: 1024,
        }
    }
}
