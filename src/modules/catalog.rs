use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Course {
    Strength,
    Cardio,
    Zen,
}

impl Course {
    pub const ALL: [Course; 3] = [Course::Strength, Course::Cardio, Course::Zen];

    pub fn as_str(&self) -> &'static str {
        match self {
            Course::Strength => "strength",
            Course::Cardio => "cardio",
            Course::Zen => "zen",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Course::Strength => "Strength",
            Course::Cardio => "Cardio",
            Course::Zen => "Zen",
        }
    }
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Course {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "strength" => Ok(Course::Strength),
            "cardio" => Ok(Course::Cardio),
            "zen" => Ok(Course::Zen),
            other => Err(format!("Unknown course: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkoutDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub base_time_secs: u32,
    pub base_xp: u32,
}

const STRENGTH: &[WorkoutDefinition] = &[
    WorkoutDefinition { id: "s1", name: "Power Squats", base_time_secs: 30, base_xp: 100 },
    WorkoutDefinition { id: "s2", name: "Push-Up Ladder", base_time_secs: 45, base_xp: 120 },
    WorkoutDefinition { id: "s3", name: "Plank Hold", base_time_secs: 60, base_xp: 150 },
];

const CARDIO: &[WorkoutDefinition] = &[
    WorkoutDefinition { id: "c1", name: "HIIT Blast", base_time_secs: 40, base_xp: 130 },
    WorkoutDefinition { id: "c2", name: "Run in Place", base_time_secs: 60, base_xp: 110 },
    WorkoutDefinition { id: "c3", name: "Jumping Jacks", base_time_secs: 30, base_xp: 90 },
];

const ZEN: &[WorkoutDefinition] = &[
    WorkoutDefinition { id: "z1", name: "Breathing Flow", base_time_secs: 60, base_xp: 60 },
    WorkoutDefinition { id: "z2", name: "Sun Salutation", base_time_secs: 90, base_xp: 80 },
    WorkoutDefinition { id: "z3", name: "Deep Stretch", base_time_secs: 120, base_xp: 100 },
];

static CATALOG: OnceLock<IndexMap<Course, &'static [WorkoutDefinition]>> = OnceLock::new();

/// Course → workouts, in display order.
pub fn catalog() -> &'static IndexMap<Course, &'static [WorkoutDefinition]> {
    CATALOG.get_or_init(|| {
        let mut map = IndexMap::new();
        map.insert(Course::Strength, STRENGTH);
        map.insert(Course::Cardio, CARDIO);
        map.insert(Course::Zen, ZEN);
        map
    })
}

pub fn workouts_for(course: Course) -> &'static [WorkoutDefinition] {
    catalog().get(&course).copied().unwrap_or(&[])
}

/// Linear scan across every course; ids are globally unique.
pub fn find_workout(id: &str) -> Option<&'static WorkoutDefinition> {
    catalog()
        .values()
        .copied()
        .flat_map(|workouts| workouts.iter())
        .find(|w| w.id == id)
}

/// Elite challenges: the lead workout of every course.
pub fn challenges() -> Vec<&'static WorkoutDefinition> {
    catalog()
        .values()
        .copied()
        .filter_map(|workouts| workouts.first())
        .collect()
}
