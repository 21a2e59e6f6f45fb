// src/lib.rs
//! Workout log store: daily records of exercises, sets and entries, plus a
//! workout stopwatch that commits its time into those records.
//!
//! [`WorkoutStore`] is the single writer. Every command runs to completion
//! against in-memory state and then writes the whole document through the
//! injected [`KeyValueStore`]. A failed write is reported to the caller but
//! the in-memory change is kept. Hosts that share the store across threads
//! should put it behind one `Mutex`.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// --- Declare modules ---
pub mod clock;
mod config;
pub mod export;
pub mod migration;
pub mod model;
pub mod preferences;
pub mod repository;
pub mod storage;
pub mod timer;

// --- Expose public types ---
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    get_config_path as get_config_path_util, load_config as load_config_util,
    save_config as save_config_util, Config, ConfigError,
};
pub use export::{ExportData, ExportError, ExportSummary};
pub use migration::{MigrationError, CURRENT_VERSION};
pub use model::{
    coerce_reps, coerce_weight, BeatsPerBar, BuiltinExercise, DailyWorkout, Exercise,
    ExerciseDefinition, ExerciseKind, ExercisePreference, ExerciseType, FeedbackMode, SetEntry,
    TimerSettings, TimerSettingsPatch, WorkoutSet, DURATION_PRESETS,
};
pub use preferences::Preferences;
pub use repository::{CopyMode, NotFound, WorkoutRepository};
pub use storage::{KeyValueStore, LoadError, MemoryStore, SqliteStore, StorageError, StoredDocument};
pub use timer::{Commit, PauseOutcome, TimerState, WorkoutTimer};

/// Result of a command that addresses existing data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T = ()> {
    Applied(T),
    /// Nothing was changed and nothing was written.
    NotFound(NotFound),
}

impl<T> Outcome<T> {
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::NotFound(_) => None,
        }
    }
}

/// `Err` means the change is in memory but could not be written durably.
pub type CommandResult<T = Outcome> = std::result::Result<T, StorageError>;

pub struct WorkoutStore {
    config: Config,
    repository: WorkoutRepository,
    preferences: Preferences,
    timer: WorkoutTimer,
    selected_date: NaiveDate,
    storage: Box<dyn KeyValueStore>,
    clock: Box<dyn Clock>,
}

impl WorkoutStore {
    /// Initializes the store from the user's config and SQLite database.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or
    /// migrating the stored document fails.
    pub fn initialize() -> Result<Self> {
        let config_path = config::get_config_path()
            .context("Failed to determine configuration file path")?;
        let config = config::load_config(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let data_dir = config
            .resolved_data_dir()
            .context("Failed to determine data directory")?;
        let db_path = storage::get_db_path(Some(&data_dir))
            .context("Failed to determine database path")?;
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;

        Self::open(config, Box::new(store), Box::new(SystemClock))
            .with_context(|| format!("Failed to load workout data from {db_path:?}"))
    }

    /// Loads the document stored under the configured key, or starts empty.
    /// # Errors
    /// Returns `LoadError` if the backend fails or the stored data is
    /// corrupt. Missing data is not an error.
    pub fn open(
        config: Config,
        storage: Box<dyn KeyValueStore>,
        clock: Box<dyn Clock>,
    ) -> std::result::Result<Self, LoadError> {
        let today = clock.today();
        let document = match storage::load_document(storage.as_ref(), &config.storage_key, today)? {
            Some(document) => {
                info!(days = document.workouts.len(), "Loaded workout data");
                document
            }
            None => StoredDocument::empty(today),
        };
        Ok(Self {
            config,
            repository: WorkoutRepository::from_workouts(document.workouts),
            preferences: document.preferences,
            timer: WorkoutTimer::new(),
            selected_date: document.selected_date,
            storage,
            clock,
        })
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Writes the current state to the backend.
    /// # Errors
    /// Returns `StorageError` if serializing or writing fails.
    pub fn persist(&mut self) -> CommandResult<()> {
        let raw = storage::encode_state(
            self.repository.all_workouts(),
            &self.preferences,
            self.selected_date,
        )?;
        match self.storage.save(&self.config.storage_key, &raw) {
            Ok(()) => {
                debug!(bytes = raw.len(), "Saved workout data");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to save workout data; keeping in-memory state");
                Err(e)
            }
        }
    }

    fn apply<T>(&mut self, result: repository::RepoResult<T>) -> CommandResult<Outcome<T>> {
        match result {
            Ok(value) => {
                self.persist()?;
                Ok(Outcome::Applied(value))
            }
            Err(miss) => {
                debug!(%miss, "Command left workouts unchanged");
                Ok(Outcome::NotFound(miss))
            }
        }
    }

    // --- Date selection ---

    pub const fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn set_selected_date(&mut self, date: NaiveDate) -> CommandResult<()> {
        self.selected_date = date;
        self.persist()
    }

    // --- Read accessors ---

    pub fn get_workout_by_date(&self, date: NaiveDate) -> Option<&DailyWorkout> {
        self.repository.get_workout_by_date(date)
    }

    pub fn get_all_workouts(&self) -> &[DailyWorkout] {
        self.repository.all_workouts()
    }

    pub fn get_today_workout(&self) -> Option<&DailyWorkout> {
        self.repository.get_workout_by_date(self.clock.today())
    }

    pub fn get_selected_workout(&self) -> Option<&DailyWorkout> {
        self.repository.get_workout_by_date(self.selected_date)
    }

    // --- Exercises ---

    /// Adds an exercise to the selected date and returns its id.
    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn add_exercise(&mut self, exercise_type: impl Into<ExerciseType>) -> CommandResult<String> {
        let new = self.preferences.resolve(exercise_type.into());
        debug!(exercise_type = %new.exercise_type, name = %new.name, "Adding exercise");
        let id = self
            .repository
            .add_exercise(self.selected_date, new, self.clock.now());
        self.persist()?;
        Ok(id)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn remove_exercise(&mut self, exercise_id: &str) -> CommandResult {
        let result = self.repository.remove_exercise(self.selected_date, exercise_id);
        self.apply(result)
    }

    /// Undo helper for [`Self::copy_last_workout_to_selected_date`].
    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn remove_exercises_by_ids(&mut self, date: NaiveDate, ids: &[String]) -> CommandResult<Outcome<usize>> {
        let result = self.repository.remove_exercises_by_ids(date, ids);
        self.apply(result)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn clear_selected_workout_exercises(&mut self) -> CommandResult {
        let result = self.repository.clear_exercises(self.selected_date);
        self.apply(result)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn copy_last_workout_to_selected_date(&mut self, mode: CopyMode) -> CommandResult<Outcome<Vec<String>>> {
        let result = self
            .repository
            .copy_last_workout(self.selected_date, mode, self.clock.now());
        self.apply(result)
    }

    // --- Sets ---

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn add_set(&mut self, exercise_id: &str) -> CommandResult<Outcome<usize>> {
        let result = self.repository.add_set(self.selected_date, exercise_id);
        self.apply(result)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn remove_set(&mut self, exercise_id: &str, set_index: usize) -> CommandResult {
        let result = self
            .repository
            .remove_set(self.selected_date, exercise_id, set_index);
        self.apply(result)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn copy_set(&mut self, exercise_id: &str, set_index: usize) -> CommandResult {
        let result = self
            .repository
            .copy_set(self.selected_date, exercise_id, set_index);
        self.apply(result)
    }

    /// Returns the new completion state.
    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn toggle_set_completed(&mut self, exercise_id: &str, set_index: usize) -> CommandResult<Outcome<bool>> {
        let result = self
            .repository
            .toggle_set_completed(self.selected_date, exercise_id, set_index);
        self.apply(result)
    }

    // --- Entries ---

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn add_set_entry(&mut self, exercise_id: &str, set_index: usize) -> CommandResult<Outcome<usize>> {
        let result = self
            .repository
            .add_set_entry(self.selected_date, exercise_id, set_index);
        self.apply(result)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn remove_set_entry(&mut self, exercise_id: &str, set_index: usize, entry_index: usize) -> CommandResult {
        let result = self.repository.remove_set_entry(
            self.selected_date,
            exercise_id,
            set_index,
            entry_index,
        );
        self.apply(result)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn update_entry_reps(
        &mut self,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
        reps: u32,
    ) -> CommandResult {
        let result = self.repository.update_entry_reps(
            self.selected_date,
            exercise_id,
            set_index,
            entry_index,
            reps,
        );
        self.apply(result)
    }

    /// Negative or non-finite weights are stored as 0.
    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn update_entry_weight(
        &mut self,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
        weight: f64,
    ) -> CommandResult {
        let result = self.repository.update_entry_weight(
            self.selected_date,
            exercise_id,
            set_index,
            entry_index,
            model::sanitize_weight(weight),
        );
        self.apply(result)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn update_entry_variation(
        &mut self,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
        variation: &str,
    ) -> CommandResult {
        let result = self.repository.update_entry_variation(
            self.selected_date,
            exercise_id,
            set_index,
            entry_index,
            variation.to_string(),
        );
        self.apply(result)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn update_entry_tempo(
        &mut self,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
        tempo: &str,
    ) -> CommandResult {
        let result = self.repository.update_entry_tempo(
            self.selected_date,
            exercise_id,
            set_index,
            entry_index,
            tempo.to_string(),
        );
        self.apply(result)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn update_entry_assistance(
        &mut self,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
        assistance: bool,
    ) -> CommandResult {
        let result = self.repository.update_entry_assistance(
            self.selected_date,
            exercise_id,
            set_index,
            entry_index,
            assistance,
        );
        self.apply(result)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn toggle_entry_assistance(
        &mut self,
        exercise_id: &str,
        set_index: usize,
        entry_index: usize,
    ) -> CommandResult {
        let result = self.repository.toggle_entry_assistance(
            self.selected_date,
            exercise_id,
            set_index,
            entry_index,
        );
        self.apply(result)
    }

    // --- Duration-based exercises ---

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn update_cardio_duration(&mut self, exercise_id: &str, seconds: u32) -> CommandResult {
        let result = self
            .repository
            .update_cardio_duration(self.selected_date, exercise_id, seconds);
        self.apply(result)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn update_duration_minutes(&mut self, exercise_id: &str, minutes: u32) -> CommandResult {
        let result = self
            .repository
            .update_duration_minutes(self.selected_date, exercise_id, minutes);
        self.apply(result)
    }

    // --- Per-day rest and metronome ---

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn set_rest_interval_seconds(&mut self, seconds: u32) -> CommandResult<()> {
        self.repository
            .set_rest_interval_seconds(self.selected_date, seconds);
        self.persist()
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn clear_rest_interval_seconds(&mut self, date: NaiveDate) -> CommandResult {
        let result = self.repository.clear_rest_interval_seconds(date);
        self.apply(result)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn update_rest_between_sets_seconds(&mut self, date: NaiveDate, seconds: Option<u32>) -> CommandResult<()> {
        self.repository.set_rest_between_sets_seconds(date, seconds);
        self.persist()
    }

    /// Records `bpm` with the configured beats per bar on the selected date.
    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn set_metronome_bpm(&mut self, bpm: u32) -> CommandResult<()> {
        let beats = self.preferences.timer_settings.metronome_beats;
        self.repository.set_metronome(self.selected_date, bpm, beats);
        self.persist()
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn clear_metronome_bpm(&mut self, date: NaiveDate) -> CommandResult {
        let result = self.repository.clear_metronome(date);
        self.apply(result)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn clear_workout_duration_seconds(&mut self, date: NaiveDate) -> CommandResult {
        let result = self.repository.clear_duration_seconds(date);
        self.apply(result)
    }

    // --- Custom exercises and preferences ---

    pub fn custom_exercises(&self) -> &[ExerciseDefinition] {
        &self.preferences.custom_exercises
    }

    /// Returns the new definition id, or `None` for a blank name.
    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn add_custom_exercise(&mut self, name: &str, kind: ExerciseKind) -> CommandResult<Option<String>> {
        let Some(id) = self.preferences.add_custom_exercise(name, kind) else {
            return Ok(None);
        };
        self.persist()?;
        Ok(Some(id))
    }

    /// Exercises already logged keep the name they were created with.
    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn remove_custom_exercise(&mut self, id: &str) -> CommandResult<bool> {
        if !self.preferences.remove_custom_exercise(id) {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    pub fn exercise_preference(&self, exercise_id: &str) -> ExercisePreference {
        self.preferences.preference(exercise_id)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn toggle_exercise_favorite(&mut self, exercise_id: &str) -> CommandResult<bool> {
        let favorite = self.preferences.toggle_favorite(exercise_id);
        self.persist()?;
        Ok(favorite)
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn update_exercise_last_used(&mut self, exercise_id: &str) -> CommandResult<()> {
        let now = self.clock.now();
        self.preferences.touch_last_used(exercise_id, now);
        self.persist()
    }

    pub const fn timer_settings(&self) -> &TimerSettings {
        &self.preferences.timer_settings
    }

    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn update_timer_settings(&mut self, patch: TimerSettingsPatch) -> CommandResult<()> {
        self.preferences.update_timer_settings(patch);
        self.persist()
    }

    // --- Workout timer ---

    pub fn timer_state(&self) -> TimerState {
        self.timer.state()
    }

    /// Starts timing the selected date. Returns `false` if already running.
    pub fn start_workout_timer(&mut self) -> bool {
        let started = self.timer.start(self.clock.now(), self.selected_date);
        if started {
            debug!(date = %self.selected_date, "Workout timer started");
        }
        started
    }

    pub fn pause_workout_timer(&mut self) -> PauseOutcome {
        let outcome = self.timer.pause(self.clock.now());
        debug!(?outcome, "Workout timer paused");
        outcome
    }

    pub fn stop_workout_timer(&mut self) -> PauseOutcome {
        self.pause_workout_timer()
    }

    /// Folds draft and live time into the target day's recorded duration and
    /// stamps that day with the configured rest interval.
    /// # Errors
    /// Returns `StorageError` if the write fails; the time is still recorded
    /// in memory.
    pub fn record_workout_timer(&mut self) -> CommandResult<Option<Commit>> {
        let Some(commit) = self.timer.record(self.clock.now(), self.selected_date) else {
            debug!("Nothing timed; workout timer reset");
            return Ok(None);
        };
        let total = self
            .repository
            .add_duration_seconds(commit.date, commit.seconds);
        self.repository.set_rest_interval_seconds(
            commit.date,
            self.preferences.timer_settings.interval_seconds,
        );
        info!(date = %commit.date, seconds = commit.seconds, total, "Recorded workout time");
        self.persist()?;
        Ok(Some(commit))
    }

    /// Drops timer state and zeroes the target day's recorded duration.
    /// Returns the date that was reset.
    /// # Errors
    /// Returns `StorageError` if the write fails.
    pub fn reset_workout_timer(&mut self) -> CommandResult<NaiveDate> {
        let date = self.timer.reset(self.selected_date);
        self.repository.reset_duration_seconds(date);
        info!(%date, "Workout timer reset");
        self.persist()?;
        Ok(date)
    }

    /// Recorded plus pending seconds for the selected date. Recomputed on
    /// every call while the timer runs.
    pub fn elapsed_seconds_for_selected_date(&self) -> u64 {
        self.elapsed_seconds_for(self.selected_date)
    }

    pub fn elapsed_seconds_for(&self, date: NaiveDate) -> u64 {
        self.repository.committed_seconds(date)
            + self.timer.pending_seconds_for(date, self.clock.now())
    }

    // --- Export ---

    /// Export document for all workouts, or those within `range` inclusive.
    pub fn export_data(&self, range: Option<(NaiveDate, NaiveDate)>) -> ExportData {
        let now = self.clock.now();
        match range {
            Some((start, end)) => {
                let filtered = export::filter_workouts_by_date_range(
                    self.repository.all_workouts(),
                    start,
                    end,
                );
                export::generate_export_data(&filtered, now)
            }
            None => export::generate_export_data(self.repository.all_workouts(), now),
        }
    }

    /// Writes an export file into `dir`, or the configured export directory.
    /// # Errors
    /// Returns `anyhow::Error` if the export directory cannot be determined
    /// or the file cannot be written.
    pub fn export_to_file(
        &self,
        dir: Option<&Path>,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<PathBuf> {
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => self
                .config
                .resolved_export_dir()
                .context("Failed to determine export directory")?,
        };
        let workouts = self.export_data(range).workouts;
        export::export_to_file(&dir, &workouts, self.clock.now())
            .with_context(|| format!("Failed to write export into {dir:?}"))
    }
}
