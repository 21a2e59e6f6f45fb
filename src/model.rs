// src/model.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString};
use thiserror::Error;

/// Minute presets offered for duration-based exercises.
pub const DURATION_PRESETS: [u32; 3] = [30, 45, 60];

// --- Exercise types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum BuiltinExercise {
    Pushup,
    Squat,
    Pullup,
    Cardio,
    Bodypump,
    Bodycombat,
    Leapfight,
}

impl BuiltinExercise {
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Pushup => "Push-up",
            Self::Squat => "Squat",
            Self::Pullup => "Pull-up",
            Self::Cardio => "Cardio",
            Self::Bodypump => "BodyPump",
            Self::Bodycombat => "BodyCombat",
            Self::Leapfight => "LeapFight",
        }
    }

    /// Cardio and the studio classes are tracked by time instead of sets.
    #[must_use]
    pub const fn is_duration_based(self) -> bool {
        matches!(
            self,
            Self::Cardio | Self::Bodypump | Self::Bodycombat | Self::Leapfight
        )
    }

    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }
}

/// Either a builtin exercise or the id of a custom exercise definition.
/// Stored as a plain string (`"squat"`, or a custom id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExerciseType {
    Builtin(BuiltinExercise),
    Custom(String),
}

impl ExerciseType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Builtin(builtin) => builtin.as_ref(),
            Self::Custom(id) => id,
        }
    }

    #[must_use]
    pub const fn builtin(&self) -> Option<BuiltinExercise> {
        match self {
            Self::Builtin(builtin) => Some(*builtin),
            Self::Custom(_) => None,
        }
    }
}

impl From<String> for ExerciseType {
    fn from(value: String) -> Self {
        match BuiltinExercise::from_str(&value) {
            Ok(builtin) => Self::Builtin(builtin),
            Err(_) => Self::Custom(value),
        }
    }
}

impl From<&str> for ExerciseType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<BuiltinExercise> for ExerciseType {
    fn from(value: BuiltinExercise) -> Self {
        Self::Builtin(value)
    }
}

impl From<ExerciseType> for String {
    fn from(value: ExerciseType) -> Self {
        match value {
            ExerciseType::Builtin(builtin) => builtin.as_ref().to_string(),
            ExerciseType::Custom(id) => id,
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    Strength,
    Cardio,
    Machine,
    Freeweight,
}

impl ExerciseKind {
    /// Anything that is not strength work is logged by time.
    #[must_use]
    pub const fn is_duration_based(self) -> bool {
        !matches!(self, Self::Strength)
    }
}

/// A user-defined exercise shown next to the builtin ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseDefinition {
    pub id: String,
    pub name: String,
    pub kind: ExerciseKind,
}

// --- Sets and entries ---

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetEntry {
    pub reps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistance: Option<bool>,
}

impl SetEntry {
    /// Zero-reps placeholder used for every new set or entry.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetronomeSettings {
    pub enabled: bool,
    pub bpm: u32,
    pub beats_per_bar: u32,
}

/// Older builds stored a plain flag, newer ones the full settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SetMetronome {
    Flag(bool),
    Settings(MetronomeSettings),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSet {
    pub entries: Vec<SetEntry>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metronome: Option<SetMetronome>,
}

impl WorkoutSet {
    /// A fresh set always starts with one placeholder entry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![SetEntry::empty()],
            completed: false,
            metronome: None,
        }
    }

    /// Deep copy with the completion flag cleared.
    #[must_use]
    pub fn fresh_copy(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            completed: false,
            metronome: self.metronome,
        }
    }
}

impl Default for WorkoutSet {
    fn default() -> Self {
        Self::new()
    }
}

// --- Exercises and days ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    #[serde(rename = "type")]
    pub exercise_type: ExerciseType,
    pub name: String, // Resolved once at creation, never re-resolved
    #[serde(default)]
    pub sets: Vec<WorkoutSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>, // seconds, duration-based types only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Exercise {
    #[must_use]
    pub const fn is_duration_based(&self) -> bool {
        self.duration.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BeatsPerBar {
    #[default]
    Four,
    Eight,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Beats per bar must be 4 or 8, got {0}")]
pub struct InvalidBeatsPerBar(pub u8);

impl TryFrom<u8> for BeatsPerBar {
    type Error = InvalidBeatsPerBar;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            other => Err(InvalidBeatsPerBar(other)),
        }
    }
}

impl From<BeatsPerBar> for u8 {
    fn from(value: BeatsPerBar) -> Self {
        match value {
            BeatsPerBar::Four => 4,
            BeatsPerBar::Eight => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyWorkout {
    pub date: NaiveDate,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_between_sets_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_interval_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metronome_bpm: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metronome_beats_per_bar: Option<BeatsPerBar>,
}

impl DailyWorkout {
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self {
            date,
            exercises: Vec::new(),
            duration_seconds: Some(0),
            rest_between_sets_seconds: None,
            rest_interval_seconds: None,
            metronome_bpm: None,
            metronome_beats_per_bar: None,
        }
    }

    #[must_use]
    pub fn committed_seconds(&self) -> u64 {
        self.duration_seconds.unwrap_or(0)
    }

    /// True when the record carries neither exercises nor recorded time.
    #[must_use]
    pub fn is_prunable(&self) -> bool {
        self.exercises.is_empty() && self.committed_seconds() == 0
    }
}

// --- Preferences and settings ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExercisePreference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackMode {
    Vibration,
    Sound,
    #[default]
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerSettings {
    pub interval_seconds: u32,
    pub metronome_bpm: u32,
    pub metronome_beats: BeatsPerBar,
    pub feedback_mode: FeedbackMode,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            metronome_bpm: 60,
            metronome_beats: BeatsPerBar::Four,
            feedback_mode: FeedbackMode::Both,
        }
    }
}

/// Partial update for `TimerSettings`; `None` fields are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerSettingsPatch {
    pub interval_seconds: Option<u32>,
    pub metronome_bpm: Option<u32>,
    pub metronome_beats: Option<BeatsPerBar>,
    pub feedback_mode: Option<FeedbackMode>,
}

// --- Input coercion ---

/// Parses reps typed by the user. Garbage and negatives become 0.
#[must_use]
pub fn coerce_reps(input: &str) -> u32 {
    match input.trim().parse::<i64>() {
        Ok(value) => u32::try_from(value.max(0)).unwrap_or(u32::MAX),
        Err(_) => 0,
    }
}

/// Parses a weight typed by the user. Garbage, NaN and negatives become 0.
#[must_use]
pub fn coerce_weight(input: &str) -> f64 {
    input.trim().parse::<f64>().map_or(0.0, sanitize_weight)
}

#[must_use]
pub fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}
