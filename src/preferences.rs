// src/preferences.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{
    ExerciseDefinition, ExerciseKind, ExercisePreference, ExerciseType, TimerSettings,
    TimerSettingsPatch,
};
use crate::repository::{generate_id, NewExercise};

/// Custom exercises, picker bookkeeping and global timer settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub custom_exercises: Vec<ExerciseDefinition>,
    pub exercise_preferences: BTreeMap<String, ExercisePreference>,
    pub timer_settings: TimerSettings,
}

impl Preferences {
    /// Adds a custom exercise. Blank names are ignored.
    /// Returns the id of the new definition.
    pub fn add_custom_exercise(&mut self, name: &str, kind: ExerciseKind) -> Option<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }
        let definition = ExerciseDefinition {
            id: generate_id(),
            name: trimmed.to_string(),
            kind,
        };
        let id = definition.id.clone();
        self.custom_exercises.push(definition);
        Some(id)
    }

    /// Returns `true` if a definition was removed.
    pub fn remove_custom_exercise(&mut self, id: &str) -> bool {
        let before = self.custom_exercises.len();
        self.custom_exercises.retain(|d| d.id != id);
        before != self.custom_exercises.len()
    }

    #[must_use]
    pub fn custom_exercise(&self, id: &str) -> Option<&ExerciseDefinition> {
        self.custom_exercises.iter().find(|d| d.id == id)
    }

    /// Resolves display name and tracking style for a type.
    ///
    /// A custom definition wins over the builtin table. Unknown strings are
    /// named after themselves and tracked by sets.
    #[must_use]
    pub fn resolve(&self, exercise_type: ExerciseType) -> NewExercise {
        if let Some(definition) = self.custom_exercise(exercise_type.as_str()) {
            return NewExercise {
                name: definition.name.clone(),
                duration_based: definition.kind.is_duration_based(),
                exercise_type,
            };
        }
        match exercise_type.builtin() {
            Some(builtin) => NewExercise {
                name: builtin.display_name().to_string(),
                duration_based: builtin.is_duration_based(),
                exercise_type,
            },
            None => NewExercise {
                name: exercise_type.as_str().to_string(),
                duration_based: false,
                exercise_type,
            },
        }
    }

    /// Flips the favorite flag and returns the new value.
    pub fn toggle_favorite(&mut self, exercise_id: &str) -> bool {
        let pref = self
            .exercise_preferences
            .entry(exercise_id.to_string())
            .or_default();
        let favorite = !pref.is_favorite.unwrap_or(false);
        pref.is_favorite = Some(favorite);
        favorite
    }

    pub fn touch_last_used(&mut self, exercise_id: &str, now: DateTime<Utc>) {
        self.exercise_preferences
            .entry(exercise_id.to_string())
            .or_default()
            .last_used_at = Some(now);
    }

    #[must_use]
    pub fn preference(&self, exercise_id: &str) -> ExercisePreference {
        self.exercise_preferences
            .get(exercise_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn update_timer_settings(&mut self, patch: TimerSettingsPatch) {
        let settings = &mut self.timer_settings;
        if let Some(interval) = patch.interval_seconds {
            settings.interval_seconds = interval;
        }
        if let Some(bpm) = patch.metronome_bpm {
            settings.metronome_bpm = bpm;
        }
        if let Some(beats) = patch.metronome_beats {
            settings.metronome_beats = beats;
        }
        if let Some(mode) = patch.feedback_mode {
            settings.feedback_mode = mode;
        }
    }
}
