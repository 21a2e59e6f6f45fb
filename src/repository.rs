// src/repository.rs
//! Canonical, in-memory collection of daily workout records.
//!
//! Every mutation addresses a record by date and then by exercise id, set
//! index and entry index. A miss at any level leaves the collection untouched
//! and reports which level was missing through [`NotFound`].

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::model::{
    BeatsPerBar, DailyWorkout, Exercise, ExerciseType, SetEntry, WorkoutSet,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    #[error("No workout recorded on {0}")]
    Workout(NaiveDate),
    #[error("Exercise not found: {0}")]
    Exercise(String),
    #[error("Exercise {0} is not tracked by sets")]
    SetBasedExercise(String),
    #[error("Exercise {0} is not tracked by duration")]
    DurationBasedExercise(String),
    #[error("Set {set_index} not found on exercise {exercise_id}")]
    Set {
        exercise_id: String,
        set_index: usize,
    },
    #[error("Entry {entry_index} not found in set {set_index} of exercise {exercise_id}")]
    Entry {
        exercise_id: String,
        set_index: usize,
        entry_index: usize,
    },
    #[error("No workout found before {0}")]
    PreviousWorkout(NaiveDate),
}

pub type RepoResult<T = ()> = Result<T, NotFound>;

/// How copied exercises are merged into the target day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyMode {
    /// Replace the day's exercises and zero its recorded duration.
    Replace,
    #[default]
    Append,
}

/// Exercise type with its name and tracking style already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExercise {
    pub exercise_type: ExerciseType,
    pub name: String,
    pub duration_based: bool,
}

pub(crate) fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkoutRepository {
    workouts: Vec<DailyWorkout>,
}

impl WorkoutRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_workouts(workouts: Vec<DailyWorkout>) -> Self {
        Self { workouts }
    }

    // --- Read accessors ---

    #[must_use]
    pub fn get_workout_by_date(&self, date: NaiveDate) -> Option<&DailyWorkout> {
        self.workouts.iter().find(|w| w.date == date)
    }

    /// All records in insertion order.
    #[must_use]
    pub fn all_workouts(&self) -> &[DailyWorkout] {
        &self.workouts
    }

    #[must_use]
    pub fn into_workouts(self) -> Vec<DailyWorkout> {
        self.workouts
    }

    /// Most recent record strictly before `date`.
    #[must_use]
    pub fn previous_workout(&self, date: NaiveDate) -> Option<&DailyWorkout> {
        self.workouts
            .iter()
            .filter(|w| w.date < date)
            .max_by_key(|w| w.date)
    }

    #[must_use]
    pub fn committed_seconds(&self, date: NaiveDate) -> u64 {
        self.get_workout_by_date(date)
            .map_or(0, DailyWorkout::committed_seconds)
    }

    // --- Lookup helpers ---

    fn workout_mut(&mut self, date: NaiveDate) -> RepoResult<&mut DailyWorkout> {
        self.workouts
            .iter_mut()
            .find(|w| w.date == date)
            .ok_or(NotFound::Workout(date))
    }

    fn workout_or_insert(&mut self, date: NaiveDate) -> &mut DailyWorkout {
        let index = match self.workouts.iter().position(|w| w.date == date) {
            Some(index) => index,
            None => {
                self.workouts.push(DailyWorkout::new(date));
                self.workouts.len() - 1
            }
        };
        &mut self.workouts[index]
    }

    fn exercise_mut(&mut self, date: NaiveDate, exercise_id: &str) -> RepoResult<&mut Exercise> {
        self.workout_mut(date)?
            .exercises
            .iter_mut()
            .find(|e| e.id == exercise_id)
            .ok_or_else(|| NotFound::Exercise(exercise_id.to_string()))
    }

    fn set_based_exercise_mut(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
    ) -> RepoResult<&mut Exercise> {
        let exercise = self.exercise_mut(date, exercise_id)?;
        if exercise.is_duration_based() {
            return Err(NotFound::SetBasedExercise(exercise_id.to_string()));
        }
        Ok(exercise)
    }

    fn set_mut(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        set_index: usize,
    ) -> RepoResult<&mut WorkoutSet> {
        self.exercise_mut(date, exercise_id)?
            .sets
            .get_mut(set_index)
            .ok_or_else(|| NotFound::Set {
                exercise_id: exercise_id.to_string(),
                set_index,
            })
    }

    fn entry_mut(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
    ) -> RepoResult<&mut SetEntry> {
        self.set_mut(date, exercise_id, set_index)?
            .entries
            .get_mut(entry_index)
            .ok_or_else(|| NotFound::Entry {
                exercise_id: exercise_id.to_string(),
                set_index,
                entry_index,
            })
    }

    /// Drops every record that has no exercises and no recorded time.
    fn prune(&mut self) {
        let before = self.workouts.len();
        self.workouts.retain(|w| !w.is_prunable());
        let removed = before - self.workouts.len();
        if removed > 0 {
            debug!(removed, "Pruned empty workout records");
        }
    }

    // --- Exercises ---

    /// Appends a new exercise to `date`, creating the record if needed.
    /// Returns the new exercise id.
    pub fn add_exercise(
        &mut self,
        date: NaiveDate,
        new: NewExercise,
        created_at: DateTime<Utc>,
    ) -> String {
        let (sets, duration) = if new.duration_based {
            (Vec::new(), Some(0))
        } else {
            (vec![WorkoutSet::new()], None)
        };
        let exercise = Exercise {
            id: generate_id(),
            exercise_type: new.exercise_type,
            name: new.name,
            sets,
            duration,
            duration_minutes: None,
            created_at,
        };
        let id = exercise.id.clone();
        self.workout_or_insert(date).exercises.push(exercise);
        id
    }

    pub fn remove_exercise(&mut self, date: NaiveDate, exercise_id: &str) -> RepoResult {
        let workout = self.workout_mut(date)?;
        let index = workout
            .exercises
            .iter()
            .position(|e| e.id == exercise_id)
            .ok_or_else(|| NotFound::Exercise(exercise_id.to_string()))?;
        workout.exercises.remove(index);
        self.prune();
        Ok(())
    }

    /// Bulk removal used to undo a copy. Returns how many were removed.
    pub fn remove_exercises_by_ids(&mut self, date: NaiveDate, ids: &[String]) -> RepoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let workout = self.workout_mut(date)?;
        let before = workout.exercises.len();
        workout.exercises.retain(|e| !wanted.contains(e.id.as_str()));
        let removed = before - workout.exercises.len();
        self.prune();
        Ok(removed)
    }

    /// Empties the exercise list but keeps duration, rest and metronome data.
    pub fn clear_exercises(&mut self, date: NaiveDate) -> RepoResult {
        self.workout_mut(date)?.exercises.clear();
        Ok(())
    }

    // --- Sets ---

    /// Returns the index of the new set.
    pub fn add_set(&mut self, date: NaiveDate, exercise_id: &str) -> RepoResult<usize> {
        let exercise = self.set_based_exercise_mut(date, exercise_id)?;
        exercise.sets.push(WorkoutSet::new());
        Ok(exercise.sets.len() - 1)
    }

    pub fn remove_set(&mut self, date: NaiveDate, exercise_id: &str, set_index: usize) -> RepoResult {
        let exercise = self.exercise_mut(date, exercise_id)?;
        if set_index >= exercise.sets.len() {
            return Err(NotFound::Set {
                exercise_id: exercise_id.to_string(),
                set_index,
            });
        }
        exercise.sets.remove(set_index);
        Ok(())
    }

    /// Inserts an uncompleted deep copy right after `set_index`.
    pub fn copy_set(&mut self, date: NaiveDate, exercise_id: &str, set_index: usize) -> RepoResult {
        let exercise = self.exercise_mut(date, exercise_id)?;
        let copy = exercise
            .sets
            .get(set_index)
            .map(WorkoutSet::fresh_copy)
            .ok_or_else(|| NotFound::Set {
                exercise_id: exercise_id.to_string(),
                set_index,
            })?;
        exercise.sets.insert(set_index + 1, copy);
        Ok(())
    }

    pub fn toggle_set_completed(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        set_index: usize,
    ) -> RepoResult<bool> {
        let set = self.set_mut(date, exercise_id, set_index)?;
        set.completed = !set.completed;
        Ok(set.completed)
    }

    // --- Entries ---

    /// Returns the index of the new entry.
    pub fn add_set_entry(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        set_index: usize,
    ) -> RepoResult<usize> {
        let set = self.set_mut(date, exercise_id, set_index)?;
        set.entries.push(SetEntry::empty());
        Ok(set.entries.len() - 1)
    }

    pub fn remove_set_entry(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
    ) -> RepoResult {
        self.entry_mut(date, exercise_id, set_index, entry_index)?;
        self.set_mut(date, exercise_id, set_index)?
            .entries
            .remove(entry_index);
        Ok(())
    }

    /// Replaces one leaf entry; siblings are never touched.
    pub fn update_entry<F>(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
        update: F,
    ) -> RepoResult
    where
        F: FnOnce(&mut SetEntry),
    {
        update(self.entry_mut(date, exercise_id, set_index, entry_index)?);
        Ok(())
    }

    pub fn update_entry_reps(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
        reps: u32,
    ) -> RepoResult {
        self.update_entry(date, exercise_id, set_index, entry_index, |e| e.reps = reps)
    }

    pub fn update_entry_weight(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
        weight: f64,
    ) -> RepoResult {
        self.update_entry(date, exercise_id, set_index, entry_index, |e| {
            e.weight = Some(weight);
        })
    }

    pub fn update_entry_variation(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
        variation: String,
    ) -> RepoResult {
        self.update_entry(date, exercise_id, set_index, entry_index, |e| {
            e.variation = Some(variation);
        })
    }

    pub fn update_entry_tempo(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
        tempo: String,
    ) -> RepoResult {
        self.update_entry(date, exercise_id, set_index, entry_index, |e| {
            e.tempo = Some(tempo);
        })
    }

    pub fn update_entry_assistance(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
        assistance: bool,
    ) -> RepoResult {
        self.update_entry(date, exercise_id, set_index, entry_index, |e| {
            e.assistance = Some(assistance);
        })
    }

    pub fn toggle_entry_assistance(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
    ) -> RepoResult {
        self.update_entry(date, exercise_id, set_index, entry_index, |e| {
            e.assistance = Some(!e.assistance.unwrap_or(false));
        })
    }

    // --- Duration-based exercises ---

    /// Sets the duration in seconds. Minutes only follow when the value is a
    /// whole number of minutes; otherwise the previous minutes stay as they were.
    pub fn update_cardio_duration(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        seconds: u32,
    ) -> RepoResult {
        let exercise = self.duration_exercise_mut(date, exercise_id)?;
        exercise.duration = Some(seconds);
        if seconds % 60 == 0 {
            exercise.duration_minutes = Some(seconds / 60);
        }
        Ok(())
    }

    /// Sets the minute preset and derives the duration from it.
    pub fn update_duration_minutes(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
        minutes: u32,
    ) -> RepoResult {
        let exercise = self.duration_exercise_mut(date, exercise_id)?;
        exercise.duration_minutes = Some(minutes);
        exercise.duration = Some(minutes.saturating_mul(60));
        Ok(())
    }

    fn duration_exercise_mut(
        &mut self,
        date: NaiveDate,
        exercise_id: &str,
    ) -> RepoResult<&mut Exercise> {
        let exercise = self.exercise_mut(date, exercise_id)?;
        if !exercise.is_duration_based() {
            return Err(NotFound::DurationBasedExercise(exercise_id.to_string()));
        }
        Ok(exercise)
    }

    // --- Per-day scalar fields ---

    pub fn set_rest_interval_seconds(&mut self, date: NaiveDate, seconds: u32) {
        self.workout_or_insert(date).rest_interval_seconds = Some(seconds);
    }

    pub fn clear_rest_interval_seconds(&mut self, date: NaiveDate) -> RepoResult {
        self.workout_mut(date)?.rest_interval_seconds = None;
        Ok(())
    }

    /// `None` clears the value but still creates the record, as setting does.
    pub fn set_rest_between_sets_seconds(&mut self, date: NaiveDate, seconds: Option<u32>) {
        self.workout_or_insert(date).rest_between_sets_seconds = seconds;
    }

    pub fn set_metronome(&mut self, date: NaiveDate, bpm: u32, beats: BeatsPerBar) {
        let workout = self.workout_or_insert(date);
        workout.metronome_bpm = Some(bpm);
        workout.metronome_beats_per_bar = Some(beats);
    }

    pub fn clear_metronome(&mut self, date: NaiveDate) -> RepoResult {
        let workout = self.workout_mut(date)?;
        workout.metronome_bpm = None;
        workout.metronome_beats_per_bar = None;
        Ok(())
    }

    /// Adds committed timer seconds to `date`, creating the record if needed.
    pub fn add_duration_seconds(&mut self, date: NaiveDate, seconds: u64) -> u64 {
        let workout = self.workout_or_insert(date);
        let total = workout.committed_seconds() + seconds;
        workout.duration_seconds = Some(total);
        total
    }

    /// Zeroes the recorded time for `date` and prunes the record if that
    /// leaves it empty.
    pub fn reset_duration_seconds(&mut self, date: NaiveDate) {
        if let Ok(workout) = self.workout_mut(date) {
            workout.duration_seconds = Some(0);
        }
        self.prune();
    }

    pub fn clear_duration_seconds(&mut self, date: NaiveDate) -> RepoResult {
        self.workout_mut(date)?.duration_seconds = None;
        self.prune();
        Ok(())
    }

    // --- Copy previous day ---

    /// Copies the exercises of the latest earlier workout onto `date` with
    /// fresh ids and uncompleted sets. Returns the new ids for undo.
    pub fn copy_last_workout(
        &mut self,
        date: NaiveDate,
        mode: CopyMode,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<String>> {
        let source = self
            .previous_workout(date)
            .ok_or(NotFound::PreviousWorkout(date))?;
        debug!(source = %source.date, target = %date, ?mode, "Copying previous workout");

        let copied: Vec<Exercise> = source
            .exercises
            .iter()
            .map(|exercise| Exercise {
                id: generate_id(),
                created_at: now,
                sets: exercise.sets.iter().map(WorkoutSet::fresh_copy).collect(),
                ..exercise.clone()
            })
            .collect();
        let ids = copied.iter().map(|e| e.id.clone()).collect();

        let workout = self.workout_or_insert(date);
        match mode {
            CopyMode::Replace => {
                workout.exercises = copied;
                workout.duration_seconds = Some(0);
            }
            CopyMode::Append => {
                workout.exercises.extend(copied);
                workout.duration_seconds = Some(workout.committed_seconds());
            }
        }
        Ok(ids)
    }
}
