// src/report.rs
//! Filtered view over the store snapshot. The table and the export both go
//! through [`filtered`], so they always show the same rows in the same order
//! (ascending by date, as the store sorts them).

use chrono::Datelike;
use std::fmt;
use std::str::FromStr;

use crate::request::Request;

pub const ALL: &str = "All";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NameFilter {
    #[default]
    All,
    Exact(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayFilter {
    #[default]
    All,
    Day(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportFilter {
    pub name: NameFilter,
    pub day: DayFilter,
}

impl NameFilter {
    pub fn matches(&self, request: &Request) -> bool {
        match self {
            NameFilter::All => true,
            NameFilter::Exact(name) => request.staff_name == *name,
        }
    }
}

impl DayFilter {
    pub fn matches(&self, request: &Request) -> bool {
        match self {
            DayFilter::All => true,
            DayFilter::Day(day) => request.date.day() == *day,
        }
    }
}

impl ReportFilter {
    pub fn new(name: NameFilter, day: DayFilter) -> Self {
        Self { name, day }
    }

    pub fn matches(&self, request: &Request) -> bool {
        self.name.matches(request) && self.day.matches(request)
    }
}

impl FromStr for NameFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s == ALL || s.is_empty() {
            NameFilter::All
        } else {
            NameFilter::Exact(s.to_string())
        })
    }
}

impl FromStr for DayFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == ALL || s.is_empty() {
            return Ok(DayFilter::All);
        }
        match s.parse::<u32>() {
            Ok(day) if (1..=31).contains(&day) => Ok(DayFilter::Day(day)),
            _ => Err(format!("day filter must be 1-31 or '{}', got '{}'", ALL, s)),
        }
    }
}

impl fmt::Display for NameFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameFilter::All => f.write_str(ALL),
            NameFilter::Exact(name) => f.write_str(name),
        }
    }
}

impl fmt::Display for DayFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayFilter::All => f.write_str(ALL),
            DayFilter::Day(day) => write!(f, "{}", day),
        }
    }
}

pub fn filtered<'a>(requests: &'a [Request], filter: &ReportFilter) -> Vec<&'a Request> {
    requests.iter().filter(|r| filter.matches(r)).collect()
}
