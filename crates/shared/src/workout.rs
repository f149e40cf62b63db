use serde::{Deserialize, Serialize};

use crate::domain::{BlockId, OrganizationId, WorkoutId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    Amrap,
    ForTime,
    Emom,
    Tabata,
    Interval,
    Stopwatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountDirection {
    #[default]
    Down,
    Up,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSettings {
    pub mode: TimerMode,
    pub work_time_secs: u32,
    #[serde(default)]
    pub rest_time_secs: u32,
    pub rounds: u32,
    #[serde(default)]
    pub prepare_time_secs: u32,
    #[serde(default)]
    pub direction: CountDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutBlock {
    pub id: BlockId,
    pub title: String,
    pub settings: TimerSettings,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    pub id: WorkoutId,
    pub organization_id: OrganizationId,
    pub title: String,
    #[serde(default)]
    pub blocks: Vec<WorkoutBlock>,
}

impl Workout {
    pub fn block(&self, block_id: &BlockId) -> Option<&WorkoutBlock> {
        self.blocks.iter().find(|block| &block.id == block_id)
    }

    pub fn is_freestanding(&self) -> bool {
        self.id.is_freestanding()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub id: WorkoutId,
    pub title: String,
    pub block_count: usize,
}
