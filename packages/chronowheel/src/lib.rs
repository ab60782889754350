//! # chronowheel
//!
//! An in-process timer, ticker, and calendar-alarm scheduler backed by a
//! timing wheel and a blocking worker pool.
//!
//! ## Core Concepts
//!
//! - A [`Scheduler`] owns a [`TimingWheel`](wheel::TimingWheel), a fixed-size
//!   worker pool, and a background runner thread that scans the wheel.
//! - Three fluent builders describe what to schedule:
//!   - `scheduler.timer()` — fire once, after a duration or at an instant.
//!   - `scheduler.ticker()` — fire on a fixed period, either
//!     schedule-from-previous-fire (`every`) or schedule-from-dispatch
//!     (`interval`).
//!   - `scheduler.alarm()` — fire on a calendar-anchored recurrence (the
//!     Nth day of every Mth month, the last third of the year, and so on).
//! - Dispatch runs on the worker pool, never on the runner thread, so one
//!   slow job can't delay every other job's timing.
//!
//! ## Example
//!
//! ```no_run
//! use chronowheel::{Scheduler, SchedulerConfig};
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new(SchedulerConfig::default())?;
//!
//! scheduler
//!     .timer()
//!     .in_(Duration::from_secs(5))
//!     .on(|| println!("five seconds later"))
//!     .build()?;
//!
//! scheduler
//!     .ticker()
//!     .every(Duration::from_secs(60))
//!     .on(|| println!("once a minute"))
//!     .build()?;
//! # Ok::<(), chronowheel::SchedulerError>(())
//! ```
//!
//! ## What This Is Not
//!
//! chronowheel is **not**:
//! - A distributed or durable job queue — state lives in the process memory
//!   and does not survive a restart.
//! - An async runtime — the wheel, pool, and runner coordinate OS threads,
//!   not futures.
//! - A cron-expression engine — calendar anchors cover the reference
//!   implementation's fixed set of recurrence shapes, not arbitrary
//!   expressions.

mod builder;
mod calendar;
mod config;
mod error;
mod job;
mod pool;
mod queue;
mod runner;
mod scheduler;
mod shutdown;
mod wait;
mod wheel;

pub use builder::{AlarmBuilder, TickerBuilder, TimerBuilder};
pub use calendar::{Anchor, Instant, RecurrenceSpec};
pub use config::{ClockKind, SchedulerConfig};
pub use error::SchedulerError;
pub use job::{EveryMode, Job};
pub use pool::JobHandle;
pub use scheduler::{ScheduledJob, Scheduler};
pub use wheel::TimingWheel;
