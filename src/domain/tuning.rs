/// Gameplay tuning for piece motion and cooldowns.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsTuning {
    /// Move speed in cells per second.
    pub move_cells_per_sec: f64,

    /// Time a piece spends in the air when jumping.
    pub jump_ms: i64,

    /// Cooldown after a move completes.
    pub long_rest_ms: i64,

    /// Cooldown after a jump completes.
    pub short_rest_ms: i64,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            move_cells_per_sec: 1.0,
            jump_ms: 1000,
            long_rest_ms: 2000,
            short_rest_ms: 500,
        }
    }
}
