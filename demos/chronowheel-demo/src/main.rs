//! Registers a one-shot timer, a fixed-interval ticker, and a calendar
//! alarm, then lets the scheduler run for a little while so their output
//! is visible on stdout.

use std::time::Duration;

use chronowheel::{Anchor, Scheduler, SchedulerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chronowheel=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    tracing::info!("starting chronowheel demo");

    let scheduler = Scheduler::new(SchedulerConfig::default())?;

    scheduler
        .timer()
        .in_(Duration::from_secs(2))
        .on(|| tracing::info!("one-shot timer fired"))
        .build()?;

    scheduler
        .ticker()
        .every(Duration::from_secs(1))
        .on(|| tracing::info!("ticker fired"))
        .build()?;

    scheduler
        .alarm()
        .every_month(1, 1, 0)
        .on(|| tracing::info!("monthly alarm fired"))
        .build()?;

    std::thread::sleep(Duration::from_secs(6));
    tracing::info!("shutting down");
    scheduler.shutdown()?;
    Ok(())
}
