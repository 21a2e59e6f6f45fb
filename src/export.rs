// src/export.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::model::DailyWorkout;

/// Format version written into every export.
pub const EXPORT_FORMAT_VERSION: &str = "1.0.0";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error writing export: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize export (JSON): {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub total_days: usize,
    pub total_exercises: usize,
    pub exercise_breakdown: BTreeMap<String, usize>, // exercise type -> count
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub exported_at: DateTime<Utc>,
    pub version: String,
    pub workouts: Vec<DailyWorkout>,
    pub summary: ExportSummary,
}

#[must_use]
pub fn generate_export_data(workouts: &[DailyWorkout], exported_at: DateTime<Utc>) -> ExportData {
    let mut exercise_breakdown = BTreeMap::new();
    let mut total_exercises = 0;
    for exercise in workouts.iter().flat_map(|w| &w.exercises) {
        total_exercises += 1;
        *exercise_breakdown
            .entry(exercise.exercise_type.to_string())
            .or_insert(0) += 1;
    }

    ExportData {
        exported_at,
        version: EXPORT_FORMAT_VERSION.to_string(),
        workouts: workouts.to_vec(),
        summary: ExportSummary {
            total_days: workouts.len(),
            total_exercises,
            exercise_breakdown,
        },
    }
}

/// Keeps records with `start <= date <= end`.
#[must_use]
pub fn filter_workouts_by_date_range(
    workouts: &[DailyWorkout],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<DailyWorkout> {
    workouts
        .iter()
        .filter(|w| w.date >= start && w.date <= end)
        .cloned()
        .collect()
}

/// Pretty-printed JSON for sharing.
pub fn export_to_json(data: &ExportData) -> Result<String, ExportError> {
    serde_json::to_string_pretty(data).map_err(ExportError::Serialize)
}

#[must_use]
pub fn export_file_name(exported_at: DateTime<Utc>) -> String {
    format!("workout-data-{}.json", exported_at.format("%Y-%m-%d"))
}

/// Writes an export of `workouts` into `dir` and returns the file path.
pub fn export_to_file(
    dir: &Path,
    workouts: &[DailyWorkout],
    exported_at: DateTime<Utc>,
) -> Result<PathBuf, ExportError> {
    let data = generate_export_data(workouts, exported_at);
    let json = export_to_json(&data)?;
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    let path = dir.join(export_file_name(exported_at));
    fs::write(&path, json)?;
    info!(path = %path.display(), days = data.summary.total_days, "Exported workouts");
    Ok(path)
}
