// src/time_value.rs
//! Free-text time entry: typing filter, blur-time normalization, validity and
//! 12-hour display.

use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

/// Shown in place of a missing time value.
pub const TIME_PLACEHOLDER: &str = "--:--";

static VALID_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([01]?[0-9]|2[0-3]):([0-5][0-9])$").unwrap_or_else(|e| {
        // The pattern is a literal; this only fires if it is edited into something invalid.
        panic!("time pattern failed to compile: {}", e)
    })
});

/// Drops everything except ASCII digits and `:` (applied as the user types).
pub fn sanitize_input(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == ':')
        .collect()
}

/// Empty is valid (the field is optional while editing). Otherwise the value
/// must be `H:MM` or `HH:MM` with hour 0-23 and minute 00-59.
pub fn is_valid_time(value: &str) -> bool {
    value.is_empty() || VALID_TIME.is_match(value)
}

/// Correction applied when the field loses focus: bare digit runs of length
/// 1 to 4 get a `:` inserted. Anything else is only trimmed.
pub fn normalize_on_blur(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.to_string();
    }

    match trimmed.len() {
        1 | 2 => format!("{}:00", trimmed),
        3 => format!("{}:{}", &trimmed[..1], &trimmed[1..]),
        4 => format!("{}:{}", &trimmed[..2], &trimmed[2..]),
        _ => trimmed.to_string(),
    }
}

/// Renders a stored time as `HH:MM AM`/`HH:MM PM`.
///
/// Accepts the canonical `H:MM` form as well as timestamps the backing sheet
/// hands back for time cells (`1899-12-30T08:00:00.000Z`). Missing or
/// unreadable values render as [`TIME_PLACEHOLDER`].
pub fn format_time_12h(value: Option<&str>) -> String {
    let value = match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => return TIME_PLACEHOLDER.to_string(),
    };

    match hour_minute(value) {
        Some((hour, minute)) => {
            let suffix = if hour < 12 { "AM" } else { "PM" };
            let hour12 = match hour % 12 {
                0 => 12,
                h => h,
            };
            format!("{:02}:{:02} {}", hour12, minute, suffix)
        }
        None => TIME_PLACEHOLDER.to_string(),
    }
}

fn hour_minute(value: &str) -> Option<(u32, u32)> {
    if value.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            let local = dt.with_timezone(&Local);
            return Some((local.hour(), local.minute()));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
                return Some((naive.hour(), naive.minute()));
            }
        }
        return None;
    }

    let mut parts = value.split(':');
    let hour = parts.next()?.trim().parse::<u32>().ok()?;
    let minute = match parts.next() {
        Some(m) if !m.trim().is_empty() => m.trim().parse::<u32>().ok()?,
        _ => 0,
    };
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

// --- Input field model ---

/// One time input box: typing is filtered, leaving the box normalizes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeField {
    value: String,
}

impl TimeField {
    pub fn new(initial: &str) -> Self {
        Self {
            value: sanitize_input(initial),
        }
    }

    pub fn push_str(&mut self, typed: &str) {
        self.value.push_str(&sanitize_input(typed));
    }

    pub fn set(&mut self, raw: &str) {
        self.value = sanitize_input(raw);
    }

    pub fn blur(&mut self) {
        self.value = normalize_on_blur(&self.value);
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        is_valid_time(&self.value)
    }
}
