use serde::Serialize;
use crate::modules::catalog::WorkoutDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScaledWorkout {
    pub duration_secs: u32,
    pub xp: u32,
}

fn scale(def: &WorkoutDefinition, level: u32, time_factor: f64, xp_factor: f64) -> ScaledWorkout {
    let level = level as f64;
    ScaledWorkout {
        duration_secs: (def.base_time_secs as f64 * (1.0 + level * time_factor)).floor() as u32,
        xp: (def.base_xp as f64 * (1.0 + level * xp_factor)).floor() as u32,
    }
}

/// "Elite" estimate shown on the dashboard and challenge list.
pub fn preview_scale(def: &WorkoutDefinition, level: u32) -> ScaledWorkout {
    scale(def, level, 0.15, 0.10)
}

/// What a session actually runs for and grants. Deliberately softer than the preview.
pub fn live_scale(def: &WorkoutDefinition, level: u32) -> ScaledWorkout {
    scale(def, level, 0.10, 0.05)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::{catalog, find_workout};

    #[test]
    fn test_live_scale_level_one() {
        let s1 = find_workout("s1").unwrap();
        assert_eq!(live_scale(s1, 1), ScaledWorkout { duration_secs: 33, xp: 105 });
    }

    #[test]
    fn test_preview_scale_level_one() {
        let s1 = find_workout("s1").unwrap();
        assert_eq!(preview_scale(s1, 1), ScaledWorkout { duration_secs: 34, xp: 110 });
    }

    #[test]
    fn test_live_scale_level_four() {
        let s1 = find_workout("s1").unwrap();
        assert_eq!(live_scale(s1, 4), ScaledWorkout { duration_secs: 42, xp: 120 });
    }

    #[test]
    fn test_preview_and_live_differ() {
        for workout in catalog().values().flat_map(|w| w.iter()) {
            for level in 1..=50 {
                let preview = preview_scale(workout, level);
                let live = live_scale(workout, level);
                assert!(preview.duration_secs > live.duration_secs, "{} at level {}", workout.id, level);
                assert!(preview.xp >= live.xp);
            }
        }
    }

    #[test]
    fn test_preview_is_idempotent() {
        let c2 = find_workout("c2").unwrap();
        assert_eq!(preview_scale(c2, 7), preview_scale(c2, 7));
    }

    #[test]
    fn test_scaling_grows_with_level() {
        let z3 = find_workout("z3").unwrap();
        let mut last = live_scale(z3, 1);
        for level in 2..20 {
            let next = live_scale(z3, level);
            assert!(next.duration_secs >= last.duration_secs);
            assert!(next.xp >= last.xp);
            last = next;
        }
    }
}
