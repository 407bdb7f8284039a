//! Vital-sign kinds, parsed values and the accumulated vitals record.
//!
//! A `VitalsRecord` field that is `None` means "not captured". Zero is a
//! plausible-looking but dangerous value, so nothing in this crate ever
//! substitutes it for a missing reading.

use serde::{Deserialize, Serialize};

/// Measurable quantities the capture wizard asks for, one per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VitalKind {
    Hr,
    Bp,
    Rr,
    Spo2,
    Temperature,
    Gcs,
}

impl VitalKind {
    /// Default wizard order.
    pub const ALL: [VitalKind; 6] = [
        VitalKind::Hr,
        VitalKind::Bp,
        VitalKind::Rr,
        VitalKind::Spo2,
        VitalKind::Temperature,
        VitalKind::Gcs,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            VitalKind::Hr => "hr",
            VitalKind::Bp => "bp",
            VitalKind::Rr => "rr",
            VitalKind::Spo2 => "spo2",
            VitalKind::Temperature => "temperature",
            VitalKind::Gcs => "gcs",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VitalKind::Hr => "Heart Rate",
            VitalKind::Bp => "Blood Pressure",
            VitalKind::Rr => "Respiratory Rate",
            VitalKind::Spo2 => "SpO2",
            VitalKind::Temperature => "Temperature",
            VitalKind::Gcs => "GCS",
        }
    }

    /// Question read to the clinician for this step
    pub fn prompt(&self) -> &'static str {
        match self {
            VitalKind::Hr => "Heart rate?",
            VitalKind::Bp => "Blood pressure?",
            VitalKind::Rr => "Respiratory rate?",
            VitalKind::Spo2 => "Oxygen saturation?",
            VitalKind::Temperature => "Temperature?",
            VitalKind::Gcs => "GCS - Eye, Verbal, Motor?",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            VitalKind::Hr => "bpm",
            VitalKind::Bp => "mmHg",
            VitalKind::Rr => "/min",
            VitalKind::Spo2 => "%",
            VitalKind::Temperature => "°C or °F",
            VitalKind::Gcs => "E/V/M",
        }
    }

    /// Record fields filled by this kind, in the order the parser emits values.
    pub fn fields(&self) -> &'static [VitalField] {
        match self {
            VitalKind::Hr => &[VitalField::Hr],
            VitalKind::Bp => &[VitalField::BpSystolic, VitalField::BpDiastolic],
            VitalKind::Rr => &[VitalField::Rr],
            VitalKind::Spo2 => &[VitalField::Spo2],
            VitalKind::Temperature => &[VitalField::Temperature],
            VitalKind::Gcs => &[VitalField::GcsE, VitalField::GcsV, VitalField::GcsM],
        }
    }

    /// Number of sub-values a single utterance must yield.
    pub fn arity(&self) -> usize {
        self.fields().len()
    }

    pub fn is_composite(&self) -> bool {
        self.arity() > 1
    }
}

impl std::fmt::Display for VitalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short = match self {
            VitalKind::Hr => "HR",
            VitalKind::Bp => "BP",
            VitalKind::Rr => "RR",
            VitalKind::Spo2 => "SpO2",
            VitalKind::Temperature => "Temp",
            VitalKind::Gcs => "GCS",
        };
        write!(f, "{}", short)
    }
}

/// A single nullable slot of the vitals record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalField {
    Hr,
    BpSystolic,
    BpDiastolic,
    Rr,
    Spo2,
    Temperature,
    GcsE,
    GcsV,
    GcsM,
}

impl VitalField {
    pub const ALL: [VitalField; 9] = [
        VitalField::Hr,
        VitalField::BpSystolic,
        VitalField::BpDiastolic,
        VitalField::Rr,
        VitalField::Spo2,
        VitalField::Temperature,
        VitalField::GcsE,
        VitalField::GcsV,
        VitalField::GcsM,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            VitalField::Hr => "hr",
            VitalField::BpSystolic => "bp_systolic",
            VitalField::BpDiastolic => "bp_diastolic",
            VitalField::Rr => "rr",
            VitalField::Spo2 => "spo2",
            VitalField::Temperature => "temperature",
            VitalField::GcsE => "gcs_e",
            VitalField::GcsV => "gcs_v",
            VitalField::GcsM => "gcs_m",
        }
    }
}

/// Values recognised in one utterance for one vital.
///
/// Immutable once built; re-parsing produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedVital {
    kind: VitalKind,
    values: Vec<f64>,
    raw_text: String,
}

impl ParsedVital {
    /// Returns `None` unless `values` has exactly the arity of `kind`.
    pub fn new(kind: VitalKind, values: Vec<f64>, raw_text: impl Into<String>) -> Option<Self> {
        if values.len() != kind.arity() {
            return None;
        }
        Some(Self {
            kind,
            values,
            raw_text: raw_text.into(),
        })
    }

    pub fn kind(&self) -> VitalKind {
        self.kind
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}

/// Vitals captured so far, keyed by case-sheet field name.
///
/// Serializes without the uncaptured fields, so an empty record is `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalsRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bp_systolic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bp_diastolic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spo2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs_e: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs_v: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs_m: Option<f64>,
}

impl VitalsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: VitalField) -> Option<f64> {
        match field {
            VitalField::Hr => self.hr,
            VitalField::BpSystolic => self.bp_systolic,
            VitalField::BpDiastolic => self.bp_diastolic,
            VitalField::Rr => self.rr,
            VitalField::Spo2 => self.spo2,
            VitalField::Temperature => self.temperature,
            VitalField::GcsE => self.gcs_e,
            VitalField::GcsV => self.gcs_v,
            VitalField::GcsM => self.gcs_m,
        }
    }

    pub fn set(&mut self, field: VitalField, value: Option<f64>) {
        let slot = match field {
            VitalField::Hr => &mut self.hr,
            VitalField::BpSystolic => &mut self.bp_systolic,
            VitalField::BpDiastolic => &mut self.bp_diastolic,
            VitalField::Rr => &mut self.rr,
            VitalField::Spo2 => &mut self.spo2,
            VitalField::Temperature => &mut self.temperature,
            VitalField::GcsE => &mut self.gcs_e,
            VitalField::GcsV => &mut self.gcs_v,
            VitalField::GcsM => &mut self.gcs_m,
        };
        *slot = value;
    }

    /// Fold a parsed vital in; the latest capture of a field wins.
    pub fn merge(&mut self, parsed: &ParsedVital) {
        for (field, value) in parsed.kind().fields().iter().zip(parsed.values()) {
            self.set(*field, Some(*value));
        }
    }

    /// Values for `kind`, only if every sub-field is present.
    pub fn values_for(&self, kind: VitalKind) -> Option<Vec<f64>> {
        kind.fields().iter().map(|f| self.get(*f)).collect()
    }

    /// E+V+M, or `None` when any component is missing.
    pub fn gcs_total(&self) -> Option<f64> {
        Some(self.gcs_e? + self.gcs_v? + self.gcs_m?)
    }

    pub fn captured_count(&self) -> usize {
        VitalField::ALL
            .iter()
            .filter(|f| self.get(**f).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.captured_count() == 0
    }
}

/// Render a reading without a trailing `.0` for whole numbers.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}
