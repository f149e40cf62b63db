use shared::{
    domain::{BlockId, OrganizationId, WorkoutId},
    workout::{Exercise, TimerMode, TimerSettings, Workout, WorkoutBlock},
};

/// An ad-hoc timer the user sets up on the controller. It becomes a real
/// stored workout with a single block before the display is told about it.
#[derive(Debug, Clone, PartialEq)]
pub struct FreestandingTimer {
    pub title: String,
    pub settings: TimerSettings,
    pub exercises: Vec<Exercise>,
}

impl FreestandingTimer {
    pub fn new(title: impl Into<String>, settings: TimerSettings) -> Self {
        Self {
            title: title.into(),
            settings,
            exercises: Vec::new(),
        }
    }

    pub fn synthesize(&self, organization_id: &OrganizationId) -> Workout {
        let id = WorkoutId::freestanding();
        let title = if self.title.trim().is_empty() {
            describe(&self.settings)
        } else {
            self.title.trim().to_string()
        };
        Workout {
            blocks: vec![WorkoutBlock {
                id: BlockId::new(format!("{id}-block")),
                title: title.clone(),
                settings: self.settings.clone(),
                exercises: self.exercises.clone(),
            }],
            id,
            organization_id: organization_id.clone(),
            title,
        }
    }
}

/// Short label such as "EMOM 10 min" used when the user gave no title.
pub fn describe(settings: &TimerSettings) -> String {
    let label = match settings.mode {
        TimerMode::Amrap => "AMRAP",
        TimerMode::ForTime => "For Time",
        TimerMode::Emom => "EMOM",
        TimerMode::Tabata => "Tabata",
        TimerMode::Interval => "Interval",
        TimerMode::Stopwatch => return "Stopwatch".to_string(),
    };
    let rounds = u64::from(settings.rounds.max(1));
    let total_secs = (u64::from(settings.work_time_secs) + u64::from(settings.rest_time_secs))
        .saturating_mul(rounds);
    if total_secs % 60 == 0 {
        format!("{label} {} min", total_secs / 60)
    } else {
        format!("{label} {total_secs} s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::workout::CountDirection;

    fn emom(minutes: u32) -> TimerSettings {
        TimerSettings {
            mode: TimerMode::Emom,
            work_time_secs: 60,
            rest_time_secs: 0,
            rounds: minutes,
            prepare_time_secs: 10,
            direction: CountDirection::Down,
        }
    }

    #[test]
    fn synthesized_workout_is_freestanding_with_one_block() {
        let workout = FreestandingTimer::new("EMOM 10 min", emom(10))
            .synthesize(&OrganizationId::new("gym"));
        assert!(workout.is_freestanding());
        assert_eq!(workout.title, "EMOM 10 min");
        assert_eq!(workout.blocks.len(), 1);
        assert_eq!(workout.blocks[0].settings.rounds, 10);
        assert!(workout.block(&workout.blocks[0].id).is_some());
    }

    #[test]
    fn each_synthesis_gets_a_fresh_id() {
        let timer = FreestandingTimer::new("", emom(10));
        let org = OrganizationId::new("gym");
        assert_ne!(timer.synthesize(&org).id, timer.synthesize(&org).id);
    }

    #[test]
    fn blank_title_falls_back_to_description() {
        let workout = FreestandingTimer::new("  ", emom(10)).synthesize(&OrganizationId::new("gym"));
        assert_eq!(workout.title, "EMOM 10 min");

        let tabata = TimerSettings {
            mode: TimerMode::Tabata,
            work_time_secs: 20,
            rest_time_secs: 10,
            rounds: 8,
            prepare_time_secs: 0,
            direction: CountDirection::Down,
        };
        assert_eq!(describe(&tabata), "Tabata 4 min");
    }

    #[test]
    fn oversized_form_input_still_describes() {
        let huge = TimerSettings {
            mode: TimerMode::Interval,
            work_time_secs: u32::MAX,
            rest_time_secs: u32::MAX,
            rounds: u32::MAX,
            prepare_time_secs: 0,
            direction: CountDirection::Up,
        };
        assert_eq!(describe(&huge), format!("Interval {} s", u64::MAX));
    }
}
