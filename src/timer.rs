// src/timer.rs
//! Workout stopwatch that keeps track of which day its seconds belong to.
//!
//! The timer never touches workout records itself. `record` and `reset`
//! return the date (and seconds) the caller must apply to the repository,
//! which keeps every transition a pure function of `(now, selected date)`.

use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningSpan {
    pub started_at: DateTime<Utc>,
    pub target_date: NaiveDate,
}

impl RunningSpan {
    /// Whole seconds since the span started, never negative.
    #[must_use]
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((now - self.started_at).num_seconds()).unwrap_or(0)
    }
}

/// Paused, not yet recorded time for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draft {
    pub seconds: u64,
    pub target_date: NaiveDate,
}

/// Coarse view of the timer for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Nothing running and no unrecorded seconds. A zero-second draft may
    /// still pin the date `record`/`reset` act on; see
    /// [`WorkoutTimer::target_date`].
    Idle,
    Running {
        started_at: DateTime<Utc>,
        target_date: NaiveDate,
    },
    Paused {
        draft_seconds: u64,
        target_date: NaiveDate,
    },
}

/// Seconds to fold into `DailyWorkout::duration_seconds` for `date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commit {
    pub date: NaiveDate,
    pub seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    NotRunning,
    Discarded, // stopped before a full second elapsed
    Drafted(Draft),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkoutTimer {
    running: Option<RunningSpan>,
    draft: Option<Draft>,
}

impl WorkoutTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }

    #[must_use]
    pub const fn running(&self) -> Option<RunningSpan> {
        self.running
    }

    #[must_use]
    pub const fn draft(&self) -> Option<Draft> {
        self.draft
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        match (self.running, self.draft) {
            (Some(span), _) => TimerState::Running {
                started_at: span.started_at,
                target_date: span.target_date,
            },
            (None, Some(draft)) if draft.seconds > 0 => TimerState::Paused {
                draft_seconds: draft.seconds,
                target_date: draft.target_date,
            },
            _ => TimerState::Idle,
        }
    }

    /// Date that `record`/`reset` would act on right now: the running span's
    /// date, else the draft's date, else `selected`.
    ///
    /// A pause shorter than a second leaves an empty draft behind, so the
    /// started date stays the target even though `state()` reports `Idle`.
    #[must_use]
    pub fn target_date(&self, selected: NaiveDate) -> NaiveDate {
        self.running
            .map(|span| span.target_date)
            .or_else(|| self.draft.map(|draft| draft.target_date))
            .unwrap_or(selected)
    }

    /// Starts a span for `selected`. Returns `false` if already running.
    ///
    /// A draft belonging to another date is dropped.
    pub fn start(&mut self, now: DateTime<Utc>, selected: NaiveDate) -> bool {
        if self.running.is_some() {
            return false;
        }
        let draft = match self.draft {
            Some(draft) if draft.target_date == selected => draft,
            _ => Draft {
                seconds: 0,
                target_date: selected,
            },
        };
        self.draft = Some(draft);
        self.running = Some(RunningSpan {
            started_at: now,
            target_date: selected,
        });
        true
    }

    /// Stops the running span and folds its whole seconds into the draft.
    pub fn pause(&mut self, now: DateTime<Utc>) -> PauseOutcome {
        let Some(span) = self.running.take() else {
            return PauseOutcome::NotRunning;
        };
        let elapsed = span.elapsed_seconds(now);
        if elapsed == 0 {
            return PauseOutcome::Discarded;
        }
        let seconds = match self.draft {
            Some(draft) if draft.target_date == span.target_date => draft.seconds + elapsed,
            _ => elapsed,
        };
        let draft = Draft {
            seconds,
            target_date: span.target_date,
        };
        self.draft = Some(draft);
        PauseOutcome::Drafted(draft)
    }

    /// Ends the session. Returns the commit to apply, or `None` if nothing
    /// was timed. The timer is idle afterwards either way.
    pub fn record(&mut self, now: DateTime<Utc>, selected: NaiveDate) -> Option<Commit> {
        let target = self.target_date(selected);
        let running_seconds = self
            .running
            .filter(|span| span.target_date == target)
            .map_or(0, |span| span.elapsed_seconds(now));
        let draft_seconds = self
            .draft
            .filter(|draft| draft.target_date == target)
            .map_or(0, |draft| draft.seconds);
        *self = Self::default();

        let seconds = draft_seconds + running_seconds;
        (seconds > 0).then_some(Commit {
            date: target,
            seconds,
        })
    }

    /// Drops all live and draft time and returns the date whose recorded
    /// duration the caller should zero.
    pub fn reset(&mut self, selected: NaiveDate) -> NaiveDate {
        let target = self.target_date(selected);
        *self = Self::default();
        target
    }

    /// Unrecorded seconds (draft plus live span) credited to `date`.
    #[must_use]
    pub fn pending_seconds_for(&self, date: NaiveDate, now: DateTime<Utc>) -> u64 {
        let draft = self
            .draft
            .filter(|draft| draft.target_date == date)
            .map_or(0, |draft| draft.seconds);
        let live = self
            .running
            .filter(|span| span.target_date == date)
            .map_or(0, |span| span.elapsed_seconds(now));
        draft + live
    }
}
