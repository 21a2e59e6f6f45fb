// src/migration.rs
//! Upgrades stored documents to the current shape before they are decoded.
//!
//! Each step lifts a document from version `N` to `N + 1` and is safe to run
//! on data that is already in the newer shape.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

pub const CURRENT_VERSION: u32 = 3;

/// Keys the old app persisted for an in-flight timer. Never restored.
const TIMER_KEYS: [&str; 5] = [
    "workoutTimerRunning",
    "workoutTimerStartedAt",
    "workoutTimerTargetDate",
    "workoutTimerDraftSeconds",
    "workoutTimerDraftTargetDate",
];

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Stored document must be a JSON object")]
    NotAnObject,
    #[error("Unrecognized shape at {path}: {reason}")]
    Shape { path: String, reason: String },
    #[error("Invalid version tag: {0}")]
    InvalidVersion(Value),
    #[error("Stored version {found} is newer than supported version {supported}")]
    FutureVersion { found: u32, supported: u32 },
}

type Step = fn(&mut Map<String, Value>, NaiveDate) -> Result<(), MigrationError>;

/// `(from_version, step)`, applied in order.
const STEPS: [(u32, Step); 3] = [
    (0, wrap_legacy_sets),
    (1, default_selected_date),
    (2, strip_timer_state),
];

/// Splits a raw stored value into the state object and its version tag.
///
/// Accepts both the flat `{..., "version": N}` layout and the
/// `{"state": {...}, "version": N}` envelope written by the old app.
pub fn unwrap_document(raw: Value) -> Result<(Map<String, Value>, u32), MigrationError> {
    let Value::Object(mut outer) = raw else {
        return Err(MigrationError::NotAnObject);
    };
    let version = match outer.remove("version") {
        None | Some(Value::Null) => 0,
        Some(tag) => tag
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or(MigrationError::InvalidVersion(tag))?,
    };
    let state = match outer.remove("state") {
        Some(Value::Object(state)) if !outer.contains_key("workouts") => state,
        Some(other) => {
            outer.insert("state".to_string(), other);
            outer
        }
        None => outer,
    };
    Ok((state, version))
}

/// Runs every step from `from_version` up to `CURRENT_VERSION`.
pub fn migrate(
    mut state: Map<String, Value>,
    from_version: u32,
    today: NaiveDate,
) -> Result<Map<String, Value>, MigrationError> {
    if from_version > CURRENT_VERSION {
        return Err(MigrationError::FutureVersion {
            found: from_version,
            supported: CURRENT_VERSION,
        });
    }
    for (version, step) in STEPS {
        if version >= from_version {
            info!(from = version, to = version + 1, "Migrating stored workout data");
            step(&mut state, today)?;
        }
    }
    // Both hold for every load, not only when upgrading.
    default_selected_date(&mut state, today)?;
    strip_timer_state(&mut state, today)?;
    Ok(state)
}

/// v0 -> v1: sets stored reps directly; wrap them in a single entry.
fn wrap_legacy_sets(state: &mut Map<String, Value>, _today: NaiveDate) -> Result<(), MigrationError> {
    let Some(workouts) = state.get_mut("workouts") else {
        return Ok(());
    };
    let workouts = as_array_mut(workouts, "workouts")?;
    for (wi, workout) in workouts.iter_mut().enumerate() {
        let path = format!("workouts[{wi}]");
        let workout = as_object_mut(workout, &path)?;
        let Some(exercises) = workout.get_mut("exercises") else {
            continue;
        };
        let exercises = as_array_mut(exercises, &format!("{path}.exercises"))?;
        for (ei, exercise) in exercises.iter_mut().enumerate() {
            let path = format!("{path}.exercises[{ei}]");
            let exercise = as_object_mut(exercise, &path)?;
            let Some(sets) = exercise.get_mut("sets") else {
                continue;
            };
            let sets = as_array_mut(sets, &format!("{path}.sets"))?;
            for (si, set) in sets.iter_mut().enumerate() {
                let path = format!("{path}.sets[{si}]");
                let set_obj = as_object_mut(set, &path)?;
                if set_obj.contains_key("entries") {
                    continue;
                }
                let wrapped = wrap_set(set_obj);
                *set = Value::Object(wrapped);
            }
        }
    }
    Ok(())
}

fn wrap_set(legacy: &Map<String, Value>) -> Map<String, Value> {
    let mut entry = Map::new();
    entry.insert("reps".to_string(), Value::from(legacy_reps(legacy.get("reps"))));
    for key in ["weight", "variation", "tempo", "assistance"] {
        if let Some(value) = legacy.get(key).filter(|v| !v.is_null()) {
            entry.insert(key.to_string(), value.clone());
        }
    }

    let completed = legacy
        .get("completed")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut set = Map::new();
    set.insert("entries".to_string(), Value::Array(vec![Value::Object(entry)]));
    set.insert("completed".to_string(), Value::Bool(completed));
    if let Some(metronome) = legacy.get("metronome").filter(|v| !v.is_null()) {
        set.insert("metronome".to_string(), metronome.clone());
    }
    set
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn legacy_reps(value: Option<&Value>) -> u64 {
    match value.and_then(Value::as_f64) {
        Some(reps) if reps.is_finite() && reps > 0.0 => reps.floor() as u64,
        _ => 0,
    }
}

/// v1 -> v2: `selectedDate` became part of the stored state.
fn default_selected_date(state: &mut Map<String, Value>, today: NaiveDate) -> Result<(), MigrationError> {
    let missing = state
        .get("selectedDate")
        .and_then(Value::as_str)
        .map_or(true, str::is_empty);
    if missing {
        state.insert(
            "selectedDate".to_string(),
            Value::String(today.format("%Y-%m-%d").to_string()),
        );
    }
    Ok(())
}

/// v2 -> v3: timer fields were persisted; an unfinished session is never resumed.
fn strip_timer_state(state: &mut Map<String, Value>, _today: NaiveDate) -> Result<(), MigrationError> {
    for key in TIMER_KEYS {
        state.remove(key);
    }
    Ok(())
}

fn as_array_mut<'a>(value: &'a mut Value, path: &str) -> Result<&'a mut Vec<Value>, MigrationError> {
    value.as_array_mut().ok_or_else(|| MigrationError::Shape {
        path: path.to_string(),
        reason: "expected an array".to_string(),
    })
}

fn as_object_mut<'a>(
    value: &'a mut Value,
    path: &str,
) -> Result<&'a mut Map<String, Value>, MigrationError> {
    value.as_object_mut().ok_or_else(|| MigrationError::Shape {
        path: path.to_string(),
        reason: "expected an object".to_string(),
    })
}
