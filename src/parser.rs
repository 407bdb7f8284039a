//! Per-vital grammars turning a transcript into typed values.
//!
//! Every failure is a plain `None`: a mis-heard utterance is expected input,
//! not an error, and the session simply keeps its previous data.

use crate::spoken_numbers;
use crate::vitals::{ParsedVital, VitalKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

// Vital names carrying a digit; blanked out before any number is read.
static DIGIT_BEARING_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:sp|sa|fi)?o2\b").expect("valid regex"));

// Each number is anchored at its start so "120.5" never yields "5". Trailing
// letters are allowed: "110bpm", "rr22".
static NUMBER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\d.])(\d+(?:\.\d+)?)").expect("valid regex"));

static BP_SEPARATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.])(\d+)\s*(?:over|/|by)\s*(\d+)").expect("valid regex")
});

static BP_BARE_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\d.])(\d+)\s+(\d+)").expect("valid regex"));

static GCS_MARKED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:eyes?|e)\s*(\d+).*?(?:verbal|v)\s*(\d+).*?(?:motor|m)\s*(\d+)")
        .expect("valid regex")
});

static GCS_BARE_TRIPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d.])(\d+)\s+(\d+)\s+(\d+)").expect("valid regex")
});

static TEMP_WITH_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[^\d.])(\d+(?:\.\d+)?)\s*(?:°\s*|degrees?\s+|deg\s+)?(fahrenheit|celsius|centigrade|f|c)\b",
    )
    .expect("valid regex")
});

/// Readings above this with no unit word are taken as Fahrenheit.
const FAHRENHEIT_THRESHOLD: f64 = 50.0;

const GCS_EYE_MAX: f64 = 4.0;
const GCS_VERBAL_MAX: f64 = 5.0;
const GCS_MOTOR_MAX: f64 = 6.0;

/// How to read a temperature spoken without a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureInference {
    /// Values above 50 are Fahrenheit, everything else Celsius.
    #[default]
    Heuristic,
    /// Bare values are rejected; the clinician must say the unit.
    RequireUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemperatureScale {
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VitalParser {
    inference: TemperatureInference,
}

impl VitalParser {
    pub fn new(inference: TemperatureInference) -> Self {
        Self { inference }
    }

    pub fn inference(&self) -> TemperatureInference {
        self.inference
    }

    /// Parse `text` as a reading for `kind`.
    ///
    /// Number words are normalized to digits first. Returns `None` when the
    /// utterance does not contain a complete reading.
    pub fn parse(&self, kind: VitalKind, text: &str) -> Option<ParsedVital> {
        let normalized = spoken_numbers::normalize(text);
        let normalized = DIGIT_BEARING_NAME.replace_all(&normalized, " ");
        let values = match kind {
            VitalKind::Hr | VitalKind::Rr | VitalKind::Spo2 => parse_scalar(&normalized),
            VitalKind::Bp => parse_blood_pressure(&normalized),
            VitalKind::Gcs => parse_gcs(&normalized),
            VitalKind::Temperature => self.parse_temperature(&normalized),
        };

        match values {
            Some(values) => {
                debug!("Parsed {} from {}-char transcript", kind, text.len());
                ParsedVital::new(kind, values, text)
            }
            None => {
                debug!("No {} reading in {}-char transcript", kind, text.len());
                None
            }
        }
    }

    fn parse_temperature(&self, text: &str) -> Option<Vec<f64>> {
        let (value, scale) = if let Some(caps) = TEMP_WITH_UNIT.captures(text) {
            let value: f64 = caps.get(1)?.as_str().parse().ok()?;
            let unit = caps.get(2)?.as_str().to_ascii_lowercase();
            let scale = if unit.starts_with('f') {
                TemperatureScale::Fahrenheit
            } else {
                TemperatureScale::Celsius
            };
            (value, scale)
        } else {
            let value = first_number(text)?;
            match self.inference {
                TemperatureInference::RequireUnit => return None,
                TemperatureInference::Heuristic if value > FAHRENHEIT_THRESHOLD => {
                    (value, TemperatureScale::Fahrenheit)
                }
                TemperatureInference::Heuristic => (value, TemperatureScale::Celsius),
            }
        };

        let celsius = match scale {
            TemperatureScale::Celsius => value,
            TemperatureScale::Fahrenheit => fahrenheit_to_celsius(value),
        };
        Some(vec![celsius])
    }
}

/// Parse with the default heuristic temperature inference.
pub fn parse(kind: VitalKind, text: &str) -> Option<ParsedVital> {
    VitalParser::default().parse(kind, text)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn fahrenheit_to_celsius(value: f64) -> f64 {
    round_one_decimal((value - 32.0) * 5.0 / 9.0)
}

/// Celsius for a temperature that arrived as a bare number, using the same
/// above-50-is-Fahrenheit rule as spoken readings.
pub fn celsius_from_unitless(value: f64) -> f64 {
    if value > FAHRENHEIT_THRESHOLD {
        fahrenheit_to_celsius(value)
    } else {
        value
    }
}

fn first_number(text: &str) -> Option<f64> {
    NUMBER_TOKEN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn capture_ints(caps: &regex::Captures<'_>, count: usize) -> Option<Vec<f64>> {
    (1..=count)
        .map(|i| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .map(f64::from)
        })
        .collect()
}

fn parse_scalar(text: &str) -> Option<Vec<f64>> {
    first_number(text).map(|v| vec![v.round()])
}

fn parse_blood_pressure(text: &str) -> Option<Vec<f64>> {
    let caps = BP_SEPARATED
        .captures(text)
        .or_else(|| BP_BARE_PAIR.captures(text))?;
    capture_ints(&caps, 2)
}

fn parse_gcs(text: &str) -> Option<Vec<f64>> {
    let caps = GCS_MARKED
        .captures(text)
        .or_else(|| GCS_BARE_TRIPLE.captures(text))?;
    let values = capture_ints(&caps, 3)?;

    let in_range = |v: f64, max: f64| (1.0..=max).contains(&v);
    if in_range(values[0], GCS_EYE_MAX)
        && in_range(values[1], GCS_VERBAL_MAX)
        && in_range(values[2], GCS_MOTOR_MAX)
    {
        Some(values)
    } else {
        None
    }
}
