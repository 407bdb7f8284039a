//! Age-band resolution from free-text age expressions.
//!
//! Accepts whatever the intake form holds ("5y", "3 months", "1y 6m", "10",
//! "2 days") and never fails: anything unreadable bands as an adult.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

static YEAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:years?|yrs?|yo|y)\b").expect("valid year regex")
});

static MONTH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:months?|mos?|m)\b").expect("valid month regex")
});

static WEEK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:weeks?|wks?|w)\b").expect("valid week regex")
});

static DAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:days?|d)\b").expect("valid day regex")
});

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*$").expect("valid bare number regex"));

/// Physiological life stage, ordered youngest to oldest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgeBand {
    Newborn,
    Infant,
    Toddler,
    Preschool,
    SchoolAge,
    Adolescent,
    Adult,
}

impl AgeBand {
    pub const ALL: [AgeBand; 7] = [
        AgeBand::Newborn,
        AgeBand::Infant,
        AgeBand::Toddler,
        AgeBand::Preschool,
        AgeBand::SchoolAge,
        AgeBand::Adolescent,
        AgeBand::Adult,
    ];

    /// Human-readable span used in alert messages
    pub fn range_label(&self) -> &'static str {
        match self {
            AgeBand::Newborn => "0-1 month",
            AgeBand::Infant => "1-12 months",
            AgeBand::Toddler => "1-3 years",
            AgeBand::Preschool => "3-6 years",
            AgeBand::SchoolAge => "6-12 years",
            AgeBand::Adolescent => "12-16 years",
            AgeBand::Adult => ">16 years",
        }
    }

    pub fn is_pediatric(&self) -> bool {
        *self != AgeBand::Adult
    }

    /// Band for an age already split into whole years and months.
    pub fn from_age(years: u32, months: u32) -> Self {
        let total_months = years.saturating_mul(12).saturating_add(months);
        if total_months <= 1 {
            return AgeBand::Newborn;
        }
        if total_months <= 12 {
            return AgeBand::Infant;
        }
        // Whole years from here on, so "1y 6m" sits in the toddler band.
        let years = total_months / 12;
        match years {
            0..=3 => AgeBand::Toddler,
            4..=6 => AgeBand::Preschool,
            7..=12 => AgeBand::SchoolAge,
            13..=16 => AgeBand::Adolescent,
            _ => AgeBand::Adult,
        }
    }
}

impl std::fmt::Display for AgeBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AgeBand::Newborn => "newborn",
            AgeBand::Infant => "infant",
            AgeBand::Toddler => "toddler",
            AgeBand::Preschool => "preschool",
            AgeBand::SchoolAge => "schoolAge",
            AgeBand::Adolescent => "adolescent",
            AgeBand::Adult => "adult",
        };
        write!(f, "{}", name)
    }
}

fn capture_number(pattern: &Regex, text: &str) -> Option<u32> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// Resolve an age expression to its reference band.
///
/// Day and week tokens add nothing to the month count, so "5y 2d" is five
/// years and "2 days" alone is a newborn. A bare integer is whole years.
/// Missing or garbled input is an adult.
pub fn resolve(age_expression: &str) -> AgeBand {
    let text = age_expression.trim();
    if text.is_empty() {
        return AgeBand::Adult;
    }

    let sub_month = capture_number(&DAY_PATTERN, text).is_some()
        || capture_number(&WEEK_PATTERN, text).is_some();
    let mut years = capture_number(&YEAR_PATTERN, text);
    let months = capture_number(&MONTH_PATTERN, text);

    if years.is_none() && months.is_none() {
        if sub_month {
            debug!("Age expression in days/weeks only, banding as newborn");
            return AgeBand::Newborn;
        }
        years = capture_number(&BARE_NUMBER, text);
    }

    match (years, months) {
        (None, None) => AgeBand::Adult,
        (years, months) => AgeBand::from_age(years.unwrap_or(0), months.unwrap_or(0)),
    }
}
