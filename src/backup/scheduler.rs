use crate::backup::Shutdown;
use crate::error::{BackupError, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::collections::BTreeSet;
use std::future::Future;
use std::str::FromStr;
use tokio::select;
use tokio::time::sleep;
use tracing::{info, warn};

pub fn parse_timezone(timezone: &str) -> Result<Tz> {
    timezone
        .parse()
        .map_err(|e| BackupError::Config(format!("invalid time zone '{}': {}", timezone, e)))
}

/// Rewrites a standard day-of-week field (0-7, Sunday is 0 or 7) into the
/// 1-7 numbering the `cron` crate uses (Sunday is 1). Named days pass through.
fn standard_day_of_week(field: &str) -> std::result::Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut days = BTreeSet::new();
    for item in field.split(',') {
        if item.chars().any(|c| c.is_ascii_alphabetic()) {
            return Ok(field.to_string());
        }

        let (base, step) = match item.split_once('/') {
            Some((base, step)) => {
                let step: u32 = step.parse().map_err(|_| format!("invalid step in '{}'", item))?;
                if step == 0 {
                    return Err(format!("invalid step in '{}'", item));
                }
                (base, Some(step))
            }
            None => (item, None),
        };

        let (low, high) = match base {
            "*" | "?" => (0, 6),
            _ => match base.split_once('-') {
                Some((low, high)) => (parse_day(low)?, parse_day(high)?),
                // `n/step` runs from n to the end of the week.
                None if step.is_some() => (parse_day(base)?, 6),
                None => {
                    let day = parse_day(base)?;
                    (day, day)
                }
            },
        };
        if low > high {
            return Err(format!("invalid day-of-week range '{}'", base));
        }

        let step = step.unwrap_or(1) as usize;
        days.extend((low..=high).step_by(step).map(|day| day % 7 + 1));
    }

    Ok(days.iter().map(u32::to_string).collect::<Vec<_>>().join(","))
}

fn parse_day(value: &str) -> std::result::Result<u32, String> {
    match value.parse::<u32>() {
        Ok(day) if day <= 7 => Ok(day),
        _ => Err(format!("invalid day of week '{}'", value)),
    }
}

/// A cron expression bound to an IANA time zone.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
    tz: Tz,
}

impl CronSchedule {
    /// Accepts standard five-field expressions as well as the six/seven-field
    /// form with seconds.
    pub fn new(expression: &str, timezone: &str) -> Result<Self> {
        let tz = parse_timezone(timezone)?;

        let fields: Vec<&str> = expression.split_whitespace().collect();
        let normalized = match fields.len() {
            5 => {
                let day_of_week = standard_day_of_week(fields[4])
                    .map_err(|e| BackupError::Config(format!("invalid cron expression '{}': {}", expression, e)))?;
                format!("0 {} {}", fields[..4].join(" "), day_of_week)
            }
            6 | 7 => fields.join(" "),
            _ => {
                return Err(BackupError::Config(format!(
                    "invalid cron expression '{}': expected 5 to 7 fields",
                    expression
                )))
            }
        };
        let schedule = Schedule::from_str(&normalized)
            .map_err(|e| BackupError::Config(format!("invalid cron expression '{}': {}", expression, e)))?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
            tz,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Tz>> {
        self.schedule.after(&after.with_timezone(&self.tz)).next()
    }
}

/// Fires `run` on every tick until shutdown is requested. A tick never starts
/// while the previous run is still in progress; ticks missed meanwhile are
/// skipped.
pub async fn run_scheduler<F, Fut>(schedule: &CronSchedule, shutdown: &Shutdown, mut run: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    info!(
        "Starting scheduler: '{}' in {}",
        schedule.expression, schedule.tz
    );

    loop {
        if shutdown.is_requested() {
            info!("Scheduler shutdown requested");
            break;
        }

        let Some(next) = schedule.next_after(Utc::now()) else {
            warn!("Cron expression '{}' has no upcoming runs", schedule.expression);
            break;
        };
        info!("Next run at {}", next.format("%Y-%m-%d %H:%M:%S %Z"));

        let wait = (next.with_timezone(&Utc) - Utc::now())
            .to_std()
            .unwrap_or_default();
        select! {
            _ = sleep(wait) => {}
            _ = shutdown.requested() => {
                info!("Scheduler shutdown requested during wait");
                break;
            }
        }

        run().await;
    }

    info!("Scheduler stopped");
}
