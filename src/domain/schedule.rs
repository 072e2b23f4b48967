//! Cron schedules
//!
//! Schedules may contain placeholders that are replaced with values derived
//! from a seed (the namespace), spreading jobs across the clock while keeping
//! every build of the same environment on the same times:
//!
//! - `M` a minute, `H` an hour
//! - `M/15` every 15 minutes starting at an offset
//! - `H(22-2)` an hour inside the (wrapping) range
//! - `@hourly`, `@daily`, `@weekly` and their `-random` aliases

use serde::{Deserialize, Serialize};

use super::hostname::sha256_hex;
use crate::error::ConfigError;

/// Cronjobs firing at least this often run inside the pod
const IN_POD_INTERVAL_MINUTES: u32 = 15;

/// One cronjob declared for an environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cronjob {
    pub name: String,
    pub service: String,
    pub schedule: String,
    pub command: String,
}

impl Cronjob {
    /// Kubernetes name for a native cronjob
    pub fn native_name(&self) -> String {
        format!("cronjob-{}-{}", self.service, sanitize_name(&self.name))
    }
}

/// Lowercase and collapse anything outside `[a-z0-9]` into single dashes.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// Deterministic pseudo-random source for one seed
struct SeededClock {
    minute: u32,
    hour: u32,
    day_of_week: u32,
}

impl SeededClock {
    fn new(seed: &str) -> Self {
        let hash = sha256_hex(seed);
        let value = u64::from_str_radix(&hash[..15], 16).unwrap_or(0);
        Self {
            minute: (value % 60) as u32,
            hour: ((value / 60) % 24) as u32,
            day_of_week: ((value / 1440) % 7) as u32,
        }
    }
}

/// Replace placeholders in `schedule` using values derived from `seed`.
pub fn convert_schedule(seed: &str, schedule: &str) -> Result<String, ConfigError> {
    let clock = SeededClock::new(seed);
    let expanded = match schedule.trim() {
        "@hourly" | "@hourly-random" => "M * * * *".to_string(),
        "@daily" | "@daily-random" => "M H * * *".to_string(),
        "@weekly" | "@weekly-random" => format!("M H * * {}", clock.day_of_week),
        other => other.to_string(),
    };

    let fields: Vec<&str> = expanded.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(ConfigError::InvalidSchedule {
            schedule: schedule.to_string(),
            message: format!("expected 5 fields, found {}", fields.len()),
        });
    }

    let minute = convert_minute(fields[0], clock.minute, schedule)?;
    let hour = convert_hour(fields[1], clock.hour, schedule)?;

    Ok(format!(
        "{} {} {} {} {}",
        minute, hour, fields[2], fields[3], fields[4]
    ))
}

fn convert_minute(field: &str, seeded: u32, schedule: &str) -> Result<String, ConfigError> {
    if field == "M" {
        return Ok(seeded.to_string());
    }
    let Some(step) = field.strip_prefix("M/") else {
        return Ok(field.to_string());
    };
    let step: u32 = step
        .parse()
        .ok()
        .filter(|s| (1..60).contains(s))
        .ok_or_else(|| ConfigError::InvalidSchedule {
            schedule: schedule.to_string(),
            message: "minute step must be between 1 and 59".to_string(),
        })?;
    Ok(format!("{}-59/{}", seeded % step, step))
}

fn convert_hour(field: &str, seeded: u32, schedule: &str) -> Result<String, ConfigError> {
    if field == "H" {
        return Ok(seeded.to_string());
    }
    let Some(range) = field.strip_prefix("H(").and_then(|r| r.strip_suffix(')')) else {
        return Ok(field.to_string());
    };

    let invalid = |message: &str| ConfigError::InvalidSchedule {
        schedule: schedule.to_string(),
        message: message.to_string(),
    };
    let (start, end) = range
        .split_once('-')
        .ok_or_else(|| invalid("hour range must be H(start-end)"))?;
    let start: u32 = start.trim().parse().map_err(|_| invalid("hour range start is not a number"))?;
    let end: u32 = end.trim().parse().map_err(|_| invalid("hour range end is not a number"))?;
    if start > 23 || end > 23 {
        return Err(invalid("hour range must be within 0-23"));
    }

    // ranges may wrap past midnight, e.g. 22-2
    let span = if end >= start { end - start + 1 } else { 24 - start + end + 1 };
    Ok(((start + seeded % span) % 24).to_string())
}

/// How many times per hour the minute field fires
fn runs_per_hour(minute: &str) -> u32 {
    minute
        .split(',')
        .map(|part| {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (range, step.parse::<u32>().unwrap_or(1).max(1)),
                None => (part, 1),
            };
            let (start, end) = if range == "*" {
                (0, 59)
            } else if let Some((a, b)) = range.split_once('-') {
                match (a.parse::<u32>(), b.parse::<u32>()) {
                    (Ok(a), Ok(b)) if b >= a => (a, b),
                    _ => return 1,
                }
            } else {
                match range.parse::<u32>() {
                    Ok(m) if step > 1 => (m, 59),
                    Ok(m) => (m, m),
                    Err(_) => return 1,
                }
            };
            (end - start) / step + 1
        })
        .sum()
}

/// Whether a converted schedule fires often enough to run inside the pod.
pub fn runs_in_pod(converted: &str) -> bool {
    let mut fields = converted.split_whitespace();
    let minute = fields.next().unwrap_or("");
    let hour = fields.next().unwrap_or("");
    hour == "*" && runs_per_hour(minute) >= 60 / IN_POD_INTERVAL_MINUTES
}

/// Convert every schedule and split cronjobs into (native, in-pod).
pub fn split_cronjobs(seed: &str, cronjobs: &[Cronjob]) -> Result<(Vec<Cronjob>, Vec<Cronjob>), ConfigError> {
    let mut native = Vec::new();
    let mut in_pod = Vec::new();
    for cronjob in cronjobs {
        let converted = Cronjob {
            schedule: convert_schedule(seed, &cronjob.schedule)?,
            ..cronjob.clone()
        };
        if runs_in_pod(&converted.schedule) {
            in_pod.push(converted);
        } else {
            native.push(converted);
        }
    }
    Ok((native, in_pod))
}
