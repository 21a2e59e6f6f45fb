use anyhow::Result;
use chrono::NaiveDate;
use workout_tracker_core::{
    BeatsPerBar, BuiltinExercise, Clock, Config, CopyMode, DailyWorkout, ExerciseKind,
    KeyValueStore, LoadError, ManualClock, MemoryStore, NotFound, Outcome, PauseOutcome, SetEntry,
    StorageError, TimerSettingsPatch, TimerState, WorkoutStore,
};

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

// Helper function to create a test store over a shared in-memory backend
fn create_test_store(today: &str) -> Result<(WorkoutStore, ManualClock, MemoryStore)> {
    let clock = ManualClock::at_date(date(today));
    let backend = MemoryStore::new();
    let store = WorkoutStore::open(
        Config::default(),
        Box::new(backend.clone()),
        Box::new(clock.clone()),
    )?;
    Ok((store, clock, backend))
}

/// Backend whose writes always fail.
struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn save(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk full".to_string()))
    }

    fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

#[test]
fn test_end_to_end_exercise_lifecycle() -> Result<()> {
    let (mut store, _clock, _backend) = create_test_store("2024-03-01")?;
    let day = date("2024-03-01");
    assert_eq!(store.selected_date(), day);

    let id = store.add_exercise(BuiltinExercise::Squat)?;
    let workout = store.get_workout_by_date(day).unwrap();
    assert_eq!(workout.exercises.len(), 1);
    assert_eq!(workout.exercises[0].name, "Squat");
    assert_eq!(workout.exercises[0].sets.len(), 1);
    assert_eq!(workout.exercises[0].sets[0].entries[0].reps, 0);

    assert!(store.update_entry_reps(&id, 0, 0, 12)?.is_applied());
    assert!(store.add_set(&id)?.is_applied());
    assert_eq!(store.toggle_set_completed(&id, 0)?, Outcome::Applied(true));

    let sets = &store.get_workout_by_date(day).unwrap().exercises[0].sets;
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].entries[0].reps, 12);
    assert!(sets[0].completed);
    assert!(!sets[1].completed);

    assert!(store.remove_exercise(&id)?.is_applied());
    assert!(store.get_workout_by_date(day).is_none());
    assert!(store.export_data(None).workouts.is_empty());

    Ok(())
}

// Everything except entry 0 of set 1 of the first exercise must match
fn assert_only_target_entry_changed(before: &DailyWorkout, after: &DailyWorkout) {
    assert_eq!(after.exercises.len(), before.exercises.len());
    assert_eq!(after.exercises[1], before.exercises[1]);
    let (old, new) = (&before.exercises[0], &after.exercises[0]);
    assert_eq!(new.id, old.id);
    assert_eq!(new.sets.len(), old.sets.len());
    assert_eq!(new.sets[0], old.sets[0]);
    assert_eq!(new.sets[1].completed, old.sets[1].completed);
    assert_eq!(new.sets[1].entries.len(), old.sets[1].entries.len());
    assert_eq!(new.sets[1].entries[1], old.sets[1].entries[1]);
}

#[test]
fn test_update_entry_touches_only_target_leaf() -> Result<()> {
    let (mut store, _clock, _backend) = create_test_store("2024-03-01")?;
    let squat = store.add_exercise(BuiltinExercise::Squat)?;
    let pushup = store.add_exercise("pushup")?;
    store.update_entry_reps(&pushup, 0, 0, 20)?;
    store.update_entry_reps(&squat, 0, 0, 6)?;
    store.add_set(&squat)?;
    store.add_set_entry(&squat, 1)?;
    store.update_entry_weight(&squat, 1, 1, 40.0)?;
    store.update_entry_variation(&squat, 1, 1, "narrow")?;

    let before = store.get_selected_workout().unwrap().clone();
    assert!(store.update_entry_reps(&squat, 1, 0, 5)?.is_applied());
    assert_only_target_entry_changed(&before, store.get_selected_workout().unwrap());

    let before = store.get_selected_workout().unwrap().clone();
    assert!(store.update_entry_weight(&squat, 1, 0, 62.5)?.is_applied());
    assert_only_target_entry_changed(&before, store.get_selected_workout().unwrap());

    let before = store.get_selected_workout().unwrap().clone();
    assert!(store.update_entry_variation(&squat, 1, 0, "wide")?.is_applied());
    assert_only_target_entry_changed(&before, store.get_selected_workout().unwrap());

    let before = store.get_selected_workout().unwrap().clone();
    assert!(store.update_entry_tempo(&squat, 1, 0, "3-1-1")?.is_applied());
    assert_only_target_entry_changed(&before, store.get_selected_workout().unwrap());

    let before = store.get_selected_workout().unwrap().clone();
    assert!(store.update_entry_assistance(&squat, 1, 0, true)?.is_applied());
    assert_only_target_entry_changed(&before, store.get_selected_workout().unwrap());

    let workout = store.get_selected_workout().unwrap();
    assert_eq!(workout.exercises[1].id, pushup);
    assert_eq!(workout.exercises[1].sets[0].entries[0].reps, 20);
    assert_eq!(workout.exercises[0].sets[0].entries[0].reps, 6);
    assert_eq!(
        workout.exercises[0].sets[1].entries[0],
        SetEntry {
            reps: 5,
            weight: Some(62.5),
            variation: Some("wide".to_string()),
            tempo: Some("3-1-1".to_string()),
            assistance: Some(true),
        }
    );
    assert_eq!(
        workout.exercises[0].sets[1].entries[1],
        SetEntry {
            reps: 0,
            weight: Some(40.0),
            variation: Some("narrow".to_string()),
            tempo: None,
            assistance: None,
        }
    );

    Ok(())
}

#[test]
fn test_copy_set_is_independent_and_uncompleted() -> Result<()> {
    let (mut store, _clock, _backend) = create_test_store("2024-03-01")?;
    let id = store.add_exercise(BuiltinExercise::Pullup)?;
    store.update_entry_reps(&id, 0, 0, 8)?;
    store.toggle_set_completed(&id, 0)?;

    assert!(store.copy_set(&id, 0)?.is_applied());
    store.update_entry_reps(&id, 0, 0, 3)?;
    store.update_entry_tempo(&id, 1, 0, "2-1-2")?;

    let sets = &store.get_selected_workout().unwrap().exercises[0].sets;
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].entries[0].reps, 3);
    assert_eq!(sets[0].entries[0].tempo, None);
    assert_eq!(sets[1].entries[0].reps, 8);
    assert_eq!(sets[1].entries[0].tempo.as_deref(), Some("2-1-2"));
    assert!(sets[0].completed);
    assert!(!sets[1].completed);

    Ok(())
}

#[test]
fn test_missing_targets_are_reported_without_writing() -> Result<()> {
    let (mut store, _clock, backend) = create_test_store("2024-03-01")?;
    assert_eq!(
        store.remove_exercise("ghost")?,
        Outcome::NotFound(NotFound::Workout(date("2024-03-01")))
    );
    assert_eq!(backend.load("workout-storage")?, None);

    let id = store.add_exercise(BuiltinExercise::Cardio)?;
    assert_eq!(
        store.add_set(&id)?,
        Outcome::NotFound(NotFound::SetBasedExercise(id.clone()))
    );
    assert_eq!(
        store.update_entry_reps(&id, 0, 0, 4)?,
        Outcome::NotFound(NotFound::Set { exercise_id: id, set_index: 0 })
    );

    Ok(())
}

#[test]
fn test_pruning_after_exercises_removed_and_duration_zeroed() -> Result<()> {
    let (mut store, clock, _backend) = create_test_store("2024-03-01")?;
    let day = date("2024-03-01");
    let id = store.add_exercise(BuiltinExercise::Squat)?;

    store.start_workout_timer();
    clock.advance_secs(30);
    store.record_workout_timer()?;
    store.remove_exercise(&id)?;
    assert_eq!(store.get_workout_by_date(day).unwrap().duration_seconds, Some(30));

    assert_eq!(store.reset_workout_timer()?, day);
    assert!(store.get_workout_by_date(day).is_none());

    Ok(())
}

#[test]
fn test_timer_live_time_stays_with_started_date() -> Result<()> {
    let (mut store, clock, _backend) = create_test_store("2024-01-01")?;

    assert!(store.start_workout_timer());
    clock.advance_secs(10);
    store.set_selected_date(date("2024-01-02"))?;

    assert_eq!(store.elapsed_seconds_for_selected_date(), 0);
    assert!(store.elapsed_seconds_for(date("2024-01-01")) >= 10);
    assert!(matches!(
        store.timer_state(),
        TimerState::Running { target_date, .. } if target_date == date("2024-01-01")
    ));

    store.set_selected_date(date("2024-01-01"))?;
    assert_eq!(store.elapsed_seconds_for_selected_date(), 10);

    Ok(())
}

#[test]
fn test_timer_pause_resume_then_record() -> Result<()> {
    let (mut store, clock, _backend) = create_test_store("2024-01-01")?;
    let day = date("2024-01-01");

    store.start_workout_timer();
    clock.advance_secs(5);
    assert!(matches!(store.pause_workout_timer(), PauseOutcome::Drafted(d) if d.seconds == 5));

    clock.advance_secs(60);
    store.start_workout_timer();
    clock.advance_secs(7);
    assert!(matches!(store.stop_workout_timer(), PauseOutcome::Drafted(d) if d.seconds == 12));
    assert_eq!(store.elapsed_seconds_for_selected_date(), 12);
    assert!(store.get_workout_by_date(day).is_none());

    let commit = store.record_workout_timer()?.unwrap();
    assert_eq!(commit.seconds, 12);
    assert_eq!(store.timer_state(), TimerState::Idle);

    let workout = store.get_workout_by_date(day).unwrap();
    assert_eq!(workout.duration_seconds, Some(12));
    assert_eq!(workout.rest_interval_seconds, Some(60));

    clock.advance_secs(100);
    assert_eq!(store.elapsed_seconds_for_selected_date(), 12);

    // A second session adds to the recorded total
    store.start_workout_timer();
    clock.advance_secs(8);
    store.record_workout_timer()?;
    assert_eq!(store.get_workout_by_date(day).unwrap().duration_seconds, Some(20));
    assert_eq!(store.record_workout_timer()?, None);

    Ok(())
}

#[test]
fn test_copy_last_workout_and_undo() -> Result<()> {
    let (mut store, _clock, _backend) = create_test_store("2024-03-01")?;

    assert_eq!(
        store.copy_last_workout_to_selected_date(CopyMode::Append)?,
        Outcome::NotFound(NotFound::PreviousWorkout(date("2024-03-01")))
    );
    assert!(store.get_selected_workout().is_none());

    let squat = store.add_exercise(BuiltinExercise::Squat)?;
    store.update_entry_reps(&squat, 0, 0, 10)?;
    store.toggle_set_completed(&squat, 0)?;

    let target = date("2024-03-04");
    store.set_selected_date(target)?;
    let ids = store
        .copy_last_workout_to_selected_date(CopyMode::Append)?
        .applied()
        .unwrap();
    assert_eq!(ids.len(), 1);

    let copied = &store.get_workout_by_date(target).unwrap().exercises[0];
    assert_ne!(copied.id, squat);
    assert_eq!(copied.sets[0].entries[0].reps, 10);
    assert!(!copied.sets[0].completed);

    assert_eq!(store.remove_exercises_by_ids(target, &ids)?, Outcome::Applied(1));
    assert!(store.get_workout_by_date(target).is_none());
    assert_eq!(store.get_all_workouts().len(), 1);

    Ok(())
}

#[test]
fn test_duration_minutes_and_seconds_asymmetry() -> Result<()> {
    let (mut store, _clock, _backend) = create_test_store("2024-03-01")?;
    let id = store.add_exercise(BuiltinExercise::Bodypump)?;

    store.update_duration_minutes(&id, 45)?;
    store.update_cardio_duration(&id, 125)?;
    let exercise = &store.get_selected_workout().unwrap().exercises[0];
    assert_eq!(exercise.duration, Some(125));
    assert_eq!(exercise.duration_minutes, Some(45));

    Ok(())
}

#[test]
fn test_rest_and_metronome_fields() -> Result<()> {
    let (mut store, _clock, _backend) = create_test_store("2024-03-01")?;
    let day = date("2024-03-01");

    store.update_timer_settings(TimerSettingsPatch {
        metronome_beats: Some(BeatsPerBar::Eight),
        ..Default::default()
    })?;
    store.set_metronome_bpm(72)?;
    store.set_rest_interval_seconds(90)?;
    store.update_rest_between_sets_seconds(day, Some(45))?;

    let workout = store.get_workout_by_date(day).unwrap();
    assert_eq!(workout.metronome_bpm, Some(72));
    assert_eq!(workout.metronome_beats_per_bar, Some(BeatsPerBar::Eight));
    assert_eq!(workout.rest_interval_seconds, Some(90));
    assert_eq!(workout.rest_between_sets_seconds, Some(45));

    assert!(store.clear_metronome_bpm(day)?.is_applied());
    assert!(store.clear_rest_interval_seconds(day)?.is_applied());
    assert!(!store.clear_metronome_bpm(date("2024-03-02"))?.is_applied());

    let workout = store.get_workout_by_date(day).unwrap();
    assert_eq!(workout.metronome_bpm, None);
    assert_eq!(workout.rest_interval_seconds, None);

    store.update_rest_between_sets_seconds(day, None)?;
    assert_eq!(store.get_workout_by_date(day).unwrap().rest_between_sets_seconds, None);

    // Clearing on a date with no record still creates it, as setting does
    let later = date("2024-03-09");
    store.update_rest_between_sets_seconds(later, None)?;
    assert_eq!(store.get_workout_by_date(later).unwrap().rest_between_sets_seconds, None);

    Ok(())
}

#[test]
fn test_clearing_exercises_keeps_record_until_duration_cleared() -> Result<()> {
    let (mut store, _clock, backend) = create_test_store("2024-03-01")?;
    let day = date("2024-03-01");
    store.add_exercise(BuiltinExercise::Squat)?;
    store.add_exercise(BuiltinExercise::Cardio)?;

    assert!(store.clear_selected_workout_exercises()?.is_applied());
    let workout = store.get_workout_by_date(day).unwrap();
    assert!(workout.exercises.is_empty());
    assert_eq!(workout.duration_seconds, Some(0));

    assert!(store.clear_workout_duration_seconds(day)?.is_applied());
    assert!(store.get_workout_by_date(day).is_none());

    // The pruned state is what was written
    let reopened = WorkoutStore::open(
        Config::default(),
        Box::new(backend),
        Box::new(ManualClock::at_date(day)),
    )?;
    assert!(reopened.get_all_workouts().is_empty());

    assert_eq!(
        store.clear_workout_duration_seconds(day)?,
        Outcome::NotFound(NotFound::Workout(day))
    );
    assert_eq!(
        store.clear_selected_workout_exercises()?,
        Outcome::NotFound(NotFound::Workout(day))
    );

    Ok(())
}

#[test]
fn test_today_workout_follows_injected_clock() -> Result<()> {
    let (mut store, clock, _backend) = create_test_store("2024-03-01")?;
    store.add_exercise(BuiltinExercise::Pushup)?;
    store.set_selected_date(date("2024-03-02"))?;
    store.add_exercise(BuiltinExercise::Squat)?;

    let today = store.get_today_workout().unwrap();
    assert_eq!(today.date, date("2024-03-01"));
    assert_eq!(today.exercises[0].name, "Push-up");

    clock.advance_secs(24 * 60 * 60 + 30);
    let today = store.get_today_workout().unwrap();
    assert_eq!(today.date, date("2024-03-02"));
    assert_eq!(today.exercises[0].name, "Squat");

    clock.advance_secs(24 * 60 * 60);
    assert!(store.get_today_workout().is_none());

    Ok(())
}

#[test]
fn test_custom_exercises_and_preferences() -> Result<()> {
    let (mut store, clock, _backend) = create_test_store("2024-03-01")?;

    assert_eq!(store.add_custom_exercise("   ", ExerciseKind::Cardio)?, None);
    let rowing = store
        .add_custom_exercise("Rowing", ExerciseKind::Machine)?
        .unwrap();
    let id = store.add_exercise(rowing.as_str())?;
    let exercise = &store.get_selected_workout().unwrap().exercises[0];
    assert_eq!(exercise.name, "Rowing");
    assert!(exercise.is_duration_based());

    assert!(store.remove_custom_exercise(&rowing)?);
    assert_eq!(store.get_selected_workout().unwrap().exercises[0].id, id);
    assert_eq!(store.get_selected_workout().unwrap().exercises[0].name, "Rowing");

    assert!(store.toggle_exercise_favorite("squat")?);
    store.update_exercise_last_used("squat")?;
    let pref = store.exercise_preference("squat");
    assert_eq!(pref.is_favorite, Some(true));
    assert_eq!(pref.last_used_at, Some(clock.now()));

    Ok(())
}

#[test]
fn test_state_survives_reload() -> Result<()> {
    let (mut store, clock, backend) = create_test_store("2024-03-01")?;
    let id = store.add_exercise(BuiltinExercise::Squat)?;
    store.update_entry_reps(&id, 0, 0, 9)?;
    store.set_selected_date(date("2024-02-28"))?;
    store.start_workout_timer();
    clock.advance_secs(40);

    let reopened = WorkoutStore::open(
        Config::default(),
        Box::new(backend.clone()),
        Box::new(clock.clone()),
    )?;
    assert_eq!(reopened.selected_date(), date("2024-02-28"));
    assert_eq!(reopened.get_all_workouts(), store.get_all_workouts());
    // Timer state is never restored
    assert_eq!(reopened.timer_state(), TimerState::Idle);

    Ok(())
}

#[test]
fn test_failed_write_keeps_in_memory_change() -> Result<()> {
    let clock = ManualClock::at_date(date("2024-03-01"));
    let mut store = WorkoutStore::open(Config::default(), Box::new(BrokenStore), Box::new(clock))?;

    let result = store.add_exercise(BuiltinExercise::Pushup);
    assert!(matches!(result, Err(StorageError::Unavailable(_))));
    assert_eq!(store.get_all_workouts().len(), 1);

    Ok(())
}

#[test]
fn test_corrupt_stored_data_fails_load() -> Result<()> {
    let mut backend = MemoryStore::new();
    backend.save("workout-storage", r#"{"workouts": "nope", "version": 0}"#)?;
    let clock = ManualClock::at_date(date("2024-03-01"));

    let result = WorkoutStore::open(Config::default(), Box::new(backend), Box::new(clock));
    assert!(matches!(result, Err(LoadError::Migration(_))));

    Ok(())
}

#[test]
fn test_export_range_and_file() -> Result<()> {
    let (mut store, _clock, _backend) = create_test_store("2024-03-01")?;
    store.add_exercise(BuiltinExercise::Squat)?;
    store.set_selected_date(date("2024-03-05"))?;
    store.add_exercise(BuiltinExercise::Squat)?;
    store.add_exercise(BuiltinExercise::Cardio)?;

    let all = store.export_data(None);
    assert_eq!(all.summary.total_days, 2);
    assert_eq!(all.summary.total_exercises, 3);
    assert_eq!(all.summary.exercise_breakdown["squat"], 2);

    let ranged = store.export_data(Some((date("2024-03-02"), date("2024-03-05"))));
    assert_eq!(ranged.summary.total_days, 1);

    let dir = tempfile::tempdir()?;
    let path = store.export_to_file(Some(dir.path()), None)?;
    assert!(path.ends_with("workout-data-2024-03-01.json"));
    assert!(path.exists());

    Ok(())
}
