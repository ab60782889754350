//! Fluent builders: `timer` (one-shot) -> `ticker` (every/interval) ->
//! `alarm` (calendar). Each builder method takes `self` by value and
//! returns `Self`, so a chain reads top to bottom in call order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::calendar::{Anchor, Instant, RecurrenceSpec};
use crate::error::SchedulerError;
use crate::job::{EveryJob, EveryMode, OneShotJob, PeriodicalJob};
use crate::scheduler::ScheduledJob;
use crate::Scheduler;

const TIME_OF_DAY_FORMATS: &[&str] = &["%H:%M:%S"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];

fn parse_at_str(input: &str, now: Instant) -> Result<Instant, SchedulerError> {
    for fmt in TIME_OF_DAY_FORMATS {
        if let Ok(time) = chrono::NaiveTime::parse_from_str(input, fmt) {
            let mut candidate = now.date_naive().and_time(time).and_utc();
            if candidate <= now {
                candidate += chrono::Duration::days(1);
            }
            return Ok(candidate);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(SchedulerError::UnparseableDatetime {
        input: input.to_string(),
    })
}

/// `Scheduler::timer()`'s builder: schedules a job to run exactly once.
pub struct TimerBuilder<'s> {
    scheduler: &'s Scheduler,
    at: Result<Instant, SchedulerError>,
    on: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl<'s> TimerBuilder<'s> {
    pub(crate) fn new(scheduler: &'s Scheduler) -> Self {
        Self {
            scheduler,
            at: Ok(scheduler.now()),
            on: None,
        }
    }

    /// Fire `duration` from now.
    pub fn in_(mut self, duration: Duration) -> Self {
        self.at = Ok(self.scheduler.now() + chrono::Duration::from_std(duration).unwrap_or_default());
        self
    }

    /// Alias for [`TimerBuilder::in_`].
    pub fn after(self, duration: Duration) -> Self {
        self.in_(duration)
    }

    /// Fire at an exact instant.
    pub fn at(mut self, when: DateTime<Utc>) -> Self {
        self.at = Ok(when);
        self
    }

    /// Fire at a time parsed from `input`, trying `%H:%M:%S`, then
    /// `%Y-%m-%d %H:%M:%S`, then `%Y/%m/%d %H:%M:%S`. A bare time-of-day
    /// that has already passed today rolls to tomorrow. Parse failures are
    /// stored and surfaced by `build()`, not panicked on here, so the
    /// fluent chain never needs a `Result` threaded through every call.
    pub fn at_str(mut self, input: &str) -> Self {
        self.at = parse_at_str(input, self.scheduler.now());
        self
    }

    pub fn on(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Result<ScheduledJob, SchedulerError> {
        let at = self.at?;
        let f = self
            .on
            .unwrap_or_else(|| Box::new(|| {}) as Box<dyn FnOnce() + Send>);
        let job: Arc<dyn crate::job::Job> = Arc::new(OneShotJob::new(f));
        self.scheduler.register_job(at, job)
    }
}

/// `Scheduler::ticker()`'s builder: schedules a job on a fixed interval, in
/// either `every` (schedule-from-previous-fire) or `interval`
/// (schedule-from-dispatch) mode.
///
/// Holds a [`TimerBuilder`] to reuse its `at`/`at_str` time resolution
/// rather than duplicating it; `on` is its own field since a ticker's
/// closure repeats (`Fn`) where a timer's runs once (`FnOnce`).
pub struct TickerBuilder<'s> {
    timer: TimerBuilder<'s>,
    period: Option<Duration>,
    mode: EveryMode,
    on: Option<Box<dyn Fn() + Send + Sync + 'static>>,
}

impl<'s> TickerBuilder<'s> {
    pub(crate) fn new(scheduler: &'s Scheduler) -> Self {
        Self {
            timer: TimerBuilder::new(scheduler),
            period: None,
            mode: EveryMode::Every,
            on: None,
        }
    }

    /// Schedule-from-previous-fire: a slow run delays the next tick, but
    /// drift never accumulates across many fast runs.
    pub fn every(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self.mode = EveryMode::Every;
        self
    }

    /// Schedule-from-dispatch-time: always `period` apart from when the
    /// previous run actually finished.
    pub fn interval(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self.mode = EveryMode::Interval;
        self
    }

    pub fn at_str(mut self, input: &str) -> Self {
        self.timer = self.timer.at_str(input);
        self
    }

    pub fn on(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Result<ScheduledJob, SchedulerError> {
        let scheduler = self.timer.scheduler;
        let base = self.timer.at?;
        let period = self.period.unwrap_or(Duration::from_secs(1));
        // `interval` fires immediately, then every `period` after each
        // callback completes; `every` waits out one full `period` before its
        // first fire, measured from `base`.
        let first_fire = match self.mode {
            EveryMode::Interval => base,
            EveryMode::Every => base + chrono::Duration::from_std(period).unwrap_or_default(),
        };
        let f = self
            .on
            .unwrap_or_else(|| Box::new(|| {}) as Box<dyn Fn() + Send + Sync>);
        let job: Arc<dyn crate::job::Job> =
            Arc::new(EveryJob::new(move || f(), period, self.mode, first_fire));
        scheduler.register_job(first_fire, job)
    }
}

/// `Scheduler::alarm()`'s builder: schedules a job on a calendar-anchored
/// recurrence (see [`crate::calendar`]).
pub struct AlarmBuilder<'s> {
    scheduler: &'s Scheduler,
    on: Option<Box<dyn Fn() + Send + Sync + 'static>>,
    spec: Result<RecurrenceSpec, SchedulerError>,
    repeat_limit: Option<u64>,
}

/// Build a `RecurrenceSpec`, rejecting a non-positive `ordinal` on anchors
/// where `ordinal` is a period stride rather than a weekday/day selector —
/// see [`crate::calendar::ordinal_must_be_positive`].
fn validated_spec(anchor: Anchor, offset: i32, ordinal: i32) -> Result<RecurrenceSpec, SchedulerError> {
    if crate::calendar::ordinal_must_be_positive(anchor) && ordinal <= 0 {
        return Err(SchedulerError::NonPositiveOrdinal { ordinal });
    }
    Ok(RecurrenceSpec::new(anchor, offset, ordinal))
}

impl<'s> AlarmBuilder<'s> {
    pub(crate) fn new(scheduler: &'s Scheduler) -> Self {
        Self {
            scheduler,
            on: None,
            spec: Ok(RecurrenceSpec::new(Anchor::None, 0, 1)),
            repeat_limit: None,
        }
    }

    /// `day_offset`-th day of every `repeat`-th month (1 = every month).
    /// `repeat == 0` means unbounded.
    pub fn every_month(self, day_offset: i32, ordinal: i32, repeat: u64) -> Self {
        self.loop_for(Anchor::Month, day_offset, ordinal, repeat)
    }

    pub fn every_year(self, day_offset: i32, ordinal: i32, repeat: u64) -> Self {
        self.loop_for(Anchor::Year, day_offset, ordinal, repeat)
    }

    /// The general form: pick any [`Anchor`] directly. A non-positive
    /// `ordinal` on an anchor that uses it as a period stride is stored as a
    /// pending error and surfaced by `build()`, matching `TimerBuilder::at_str`'s
    /// fallible-chain-step pattern.
    pub fn loop_for(mut self, anchor: Anchor, offset: i32, ordinal: i32, repeat: u64) -> Self {
        self.spec = validated_spec(anchor, offset, ordinal);
        self.repeat_limit = if repeat == 0 { None } else { Some(repeat) };
        self
    }

    pub fn on(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Result<ScheduledJob, SchedulerError> {
        let mut spec = self.spec?;
        let first_fire = spec.next_after(self.scheduler.now());
        let f = self
            .on
            .unwrap_or_else(|| Box::new(|| {}) as Box<dyn Fn() + Send + Sync>);
        let job: Arc<dyn crate::job::Job> =
            Arc::new(PeriodicalJob::new(move || f(), spec, self.repeat_limit));
        self.scheduler.register_job(first_fire, job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use chrono::{Duration as ChronoDuration, Timelike};

    fn test_scheduler() -> Scheduler {
        Scheduler::new(SchedulerConfig {
            worker_count: 1,
            larger_gap: Duration::from_millis(50),
            ..Default::default()
        })
        .expect("scheduler construction failed")
    }

    // Spec §8 boundary #10: a bare time-of-day already past today rolls to
    // tomorrow rather than firing immediately.
    #[test]
    fn at_str_time_of_day_already_past_rolls_to_tomorrow() {
        let now = Utc::now();
        let past = now - ChronoDuration::minutes(5);
        let input = past.format("%H:%M:%S").to_string();

        let parsed = parse_at_str(&input, now).expect("should parse as a time-of-day");
        assert!(parsed > now);
        assert_eq!(parsed.date_naive(), (now + ChronoDuration::days(1)).date_naive());
        assert_eq!(parsed.hour(), past.hour());
        assert_eq!(parsed.minute(), past.minute());
    }

    #[test]
    fn at_str_time_of_day_still_upcoming_stays_today() {
        let now = Utc::now();
        let future = now + ChronoDuration::minutes(5);
        let input = future.format("%H:%M:%S").to_string();

        let parsed = parse_at_str(&input, now).expect("should parse as a time-of-day");
        assert_eq!(parsed.date_naive(), now.date_naive());
    }

    #[test]
    fn at_str_parses_dash_separated_datetime() {
        let now = Utc::now();
        let parsed = parse_at_str("2030-01-02 03:04:05", now).expect("should parse");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap());
    }

    #[test]
    fn at_str_parses_slash_separated_datetime() {
        let now = Utc::now();
        let parsed = parse_at_str("2030/01/02 03:04:05", now).expect("should parse");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap());
    }

    #[test]
    fn at_str_rejects_unrecognized_format() {
        let now = Utc::now();
        assert!(matches!(
            parse_at_str("not a time", now),
            Err(SchedulerError::UnparseableDatetime { .. })
        ));
    }

    // Spec §8 invariant #2: after build(), the wheel is strictly larger.
    #[test]
    fn timer_build_grows_the_wheel() {
        let scheduler = test_scheduler();
        let before = scheduler.bucket_count();
        scheduler
            .timer()
            .in_(Duration::from_secs(30))
            .on(|| ())
            .build()
            .expect("build failed");
        assert!(scheduler.bucket_count() > before);
    }

    #[test]
    fn ticker_interval_mode_fires_immediately_every_mode_waits_a_period() {
        let scheduler = test_scheduler();

        let interval_job = scheduler
            .ticker()
            .interval(Duration::from_secs(60))
            .on(|| ())
            .build()
            .expect("build failed");
        let every_job = scheduler
            .ticker()
            .every(Duration::from_secs(60))
            .on(|| ())
            .build()
            .expect("build failed");

        // `interval` schedules its first fire at `now`; `every` schedules it
        // a full period out. Neither has fired yet, so hit_count is 0 either
        // way — the difference is observable only in how soon the runner
        // will pick them up, which the wheel's bucket keys encode.
        assert_eq!(interval_job.hit_count(), 0);
        assert_eq!(every_job.hit_count(), 0);
        interval_job.cancel();
        every_job.cancel();
    }

    #[test]
    fn alarm_loop_for_zero_repeat_means_unbounded() {
        let scheduler = test_scheduler();
        let job = scheduler
            .alarm()
            .loop_for(Anchor::Month, 1, 1, 0)
            .on(|| ())
            .build()
            .expect("build failed");
        job.cancel();
    }

    // A non-positive ordinal on a stride anchor would never advance a stale
    // candidate (see `calendar::ordinal_must_be_positive`), livelocking the
    // runner; `build()` must reject it instead.
    #[test]
    fn alarm_rejects_non_positive_ordinal_on_month_anchor() {
        let scheduler = test_scheduler();
        let result = scheduler.alarm().loop_for(Anchor::Month, 1, 0, 0).on(|| ()).build();
        assert!(matches!(
            result,
            Err(SchedulerError::NonPositiveOrdinal { ordinal: 0 })
        ));
    }

    #[test]
    fn alarm_rejects_non_positive_ordinal_via_every_month() {
        let scheduler = test_scheduler();
        let result = scheduler.alarm().every_month(1, -1, 0).on(|| ()).build();
        assert!(matches!(
            result,
            Err(SchedulerError::NonPositiveOrdinal { ordinal: -1 })
        ));
    }

    // `WeekInMonth` uses `ordinal` as a weekday selector (0..=6), not a
    // stride, so a non-positive value (Sunday) must not be rejected.
    #[test]
    fn alarm_allows_zero_ordinal_on_week_in_month_anchor() {
        let scheduler = test_scheduler();
        let job = scheduler
            .alarm()
            .loop_for(Anchor::WeekInMonth, 1, 0, 0)
            .on(|| ())
            .build()
            .expect("build failed");
        job.cancel();
    }
}
