//! Age-banded physiological reference ranges.
//!
//! The table is static data built once; lookups are hash-map reads. A missing
//! row is not an error, it only means the value goes unvalidated.

use crate::age_band::AgeBand;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

/// Quantities the reference table carries rows for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceVital {
    Hr,
    Rr,
    Sbp,
    Dbp,
    Temp,
    Spo2,
}

impl ReferenceVital {
    pub const ALL: [ReferenceVital; 6] = [
        ReferenceVital::Hr,
        ReferenceVital::Rr,
        ReferenceVital::Sbp,
        ReferenceVital::Dbp,
        ReferenceVital::Temp,
        ReferenceVital::Spo2,
    ];

    /// Short name used inside alert messages
    pub fn display_name(&self) -> &'static str {
        match self {
            ReferenceVital::Hr => "HR",
            ReferenceVital::Rr => "RR",
            ReferenceVital::Sbp => "SBP",
            ReferenceVital::Dbp => "DBP",
            ReferenceVital::Temp => "Temp",
            ReferenceVital::Spo2 => "SpO2",
        }
    }

    /// Clinical name for a value below the range.
    pub fn low_name(&self) -> &'static str {
        match self {
            ReferenceVital::Hr => "Bradycardia",
            ReferenceVital::Rr => "Bradypnea",
            ReferenceVital::Sbp => "Hypotension",
            ReferenceVital::Dbp => "Low diastolic",
            ReferenceVital::Temp => "Hypothermia",
            ReferenceVital::Spo2 => "Hypoxia",
        }
    }

    /// Clinical name for a value above the range.
    pub fn high_name(&self) -> &'static str {
        match self {
            ReferenceVital::Hr => "Tachycardia",
            ReferenceVital::Rr => "Tachypnea",
            ReferenceVital::Sbp => "Hypertension",
            ReferenceVital::Dbp => "High diastolic",
            ReferenceVital::Temp => "Fever",
            ReferenceVital::Spo2 => "Hyperoxia",
        }
    }
}

/// Normal `[min, max]` for one vital in one age band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub vital: ReferenceVital,
    pub band: AgeBand,
    pub min: f64,
    pub max: f64,
    pub unit: String,
}

impl ReferenceRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ReferenceError {
    #[error("Invalid range for {vital:?} in {band}: min {min} > max {max}")]
    InvertedRange {
        vital: ReferenceVital,
        band: AgeBand,
        min: f64,
        max: f64,
    },
    #[error("Duplicate reference row for {vital:?} in {band}")]
    DuplicateRow { vital: ReferenceVital, band: AgeBand },
}

// (band, hr, rr, sbp, dbp); temperature and SpO2 are the same for every band.
const PEDIATRIC_ROWS: [(AgeBand, (f64, f64), (f64, f64), (f64, f64), (f64, f64)); 7] = [
    (AgeBand::Newborn, (100.0, 160.0), (30.0, 60.0), (60.0, 90.0), (30.0, 60.0)),
    (AgeBand::Infant, (100.0, 160.0), (25.0, 50.0), (70.0, 100.0), (40.0, 65.0)),
    (AgeBand::Toddler, (90.0, 150.0), (20.0, 30.0), (80.0, 110.0), (50.0, 70.0)),
    (AgeBand::Preschool, (80.0, 140.0), (20.0, 25.0), (80.0, 110.0), (50.0, 70.0)),
    (AgeBand::SchoolAge, (70.0, 120.0), (15.0, 20.0), (90.0, 120.0), (55.0, 80.0)),
    (AgeBand::Adolescent, (60.0, 100.0), (12.0, 20.0), (100.0, 130.0), (60.0, 85.0)),
    (AgeBand::Adult, (60.0, 100.0), (12.0, 20.0), (90.0, 140.0), (60.0, 90.0)),
];

const TEMP_RANGE: (f64, f64) = (36.5, 37.5);
const SPO2_RANGE: (f64, f64) = (95.0, 100.0);

static STANDARD_TABLE: LazyLock<ReferenceTable> = LazyLock::new(ReferenceTable::build_standard);

/// Lookup table keyed by (band, vital)
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    rows: HashMap<(AgeBand, ReferenceVital), ReferenceRange>,
}

impl ReferenceTable {
    /// The pediatric reference table shared by every session.
    pub fn standard() -> &'static ReferenceTable {
        &STANDARD_TABLE
    }

    fn build_standard() -> Self {
        let mut rows = HashMap::new();
        for (band, hr, rr, sbp, dbp) in PEDIATRIC_ROWS {
            let entries = [
                (ReferenceVital::Hr, hr, "bpm"),
                (ReferenceVital::Rr, rr, "/min"),
                (ReferenceVital::Sbp, sbp, "mmHg"),
                (ReferenceVital::Dbp, dbp, "mmHg"),
                (ReferenceVital::Temp, TEMP_RANGE, "°C"),
                (ReferenceVital::Spo2, SPO2_RANGE, "%"),
            ];
            for (vital, (min, max), unit) in entries {
                rows.insert(
                    (band, vital),
                    ReferenceRange {
                        vital,
                        band,
                        min,
                        max,
                        unit: unit.to_string(),
                    },
                );
            }
        }
        Self { rows }
    }

    /// Build a custom table, rejecting inverted ranges and duplicate keys.
    pub fn from_rows(ranges: impl IntoIterator<Item = ReferenceRange>) -> Result<Self, ReferenceError> {
        let mut rows = HashMap::new();
        for range in ranges {
            if range.min > range.max {
                return Err(ReferenceError::InvertedRange {
                    vital: range.vital,
                    band: range.band,
                    min: range.min,
                    max: range.max,
                });
            }
            let key = (range.band, range.vital);
            if rows.contains_key(&key) {
                return Err(ReferenceError::DuplicateRow {
                    vital: range.vital,
                    band: range.band,
                });
            }
            rows.insert(key, range);
        }
        Ok(Self { rows })
    }

    pub fn lookup(&self, band: AgeBand, vital: ReferenceVital) -> Option<&ReferenceRange> {
        self.rows.get(&(band, vital))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
