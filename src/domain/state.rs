// Piece states as data: a name, a timing rule, and a transition table.

use crate::domain::physics::Timing;
use crate::domain::PhysicsTuning;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateName {
    Idle,
    Move,
    Jump,
    LongRest,
    ShortRest,
}

impl StateName {
    pub const ALL: [StateName; 5] = [
        StateName::Idle,
        StateName::Move,
        StateName::Jump,
        StateName::LongRest,
        StateName::ShortRest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StateName::Idle => "idle",
            StateName::Move => "move",
            StateName::Jump => "jump",
            StateName::LongRest => "long_rest",
            StateName::ShortRest => "short_rest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Trigger {
    Move,
    Jump,
    Done,
}

#[derive(Debug, Clone)]
pub struct StateDef {
    pub timing: Timing,
    pub transitions: BTreeMap<Trigger, StateName>,
}

/// Transition graph shared by every piece of a game.
#[derive(Debug, Clone, Default)]
pub struct StateGraph {
    states: BTreeMap<StateName, StateDef>,
}

impl StateGraph {
    /// idle -move-> move -done-> long_rest -done-> idle,
    /// idle -jump-> jump -done-> short_rest -done-> idle.
    pub fn standard(tuning: &PhysicsTuning) -> Self {
        let mut graph = Self::default();
        graph.insert(
            StateName::Idle,
            Timing::Unbounded,
            &[
                (Trigger::Move, StateName::Move),
                (Trigger::Jump, StateName::Jump),
            ],
        );
        graph.insert(
            StateName::Move,
            Timing::PerCell {
                cells_per_sec: tuning.move_cells_per_sec,
            },
            &[(Trigger::Done, StateName::LongRest)],
        );
        graph.insert(
            StateName::Jump,
            Timing::Fixed {
                ms: tuning.jump_ms,
            },
            &[(Trigger::Done, StateName::ShortRest)],
        );
        graph.insert(
            StateName::LongRest,
            Timing::Fixed {
                ms: tuning.long_rest_ms,
            },
            &[(Trigger::Done, StateName::Idle)],
        );
        graph.insert(
            StateName::ShortRest,
            Timing::Fixed {
                ms: tuning.short_rest_ms,
            },
            &[(Trigger::Done, StateName::Idle)],
        );
        graph
    }

    pub fn insert(&mut self, name: StateName, timing: Timing, transitions: &[(Trigger, StateName)]) {
        self.states.insert(
            name,
            StateDef {
                timing,
                transitions: transitions.iter().copied().collect(),
            },
        );
    }

    pub fn next(&self, from: StateName, trigger: Trigger) -> Option<StateName> {
        self.states.get(&from)?.transitions.get(&trigger).copied()
    }

    /// Timing of a state; states missing from the graph never finish.
    pub fn timing(&self, name: StateName) -> Timing {
        self.states
            .get(&name)
            .map(|def| def.timing)
            .unwrap_or(Timing::Unbounded)
    }
}
