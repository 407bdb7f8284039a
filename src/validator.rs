//! Range validation of parsed vitals against the age-banded reference table.
//!
//! Out-of-range values are reported as [`Alert`]s, never errors. The clinician
//! always gets the value recorded; the alert only draws attention to it.

use crate::age_band::AgeBand;
use crate::reference::{ReferenceRange, ReferenceTable, ReferenceVital};
use crate::vitals::{format_number, VitalKind, VitalsRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// GCS totals below this are severe impairment
const GCS_SEVERE_BELOW: f64 = 9.0;
/// GCS totals below this are moderate impairment
const GCS_MODERATE_BELOW: f64 = 13.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

/// A flagged reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    severity: Severity,
    vital: VitalKind,
    message: String,
}

impl Alert {
    pub fn new(severity: Severity, vital: VitalKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            vital,
            message: message.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn vital(&self) -> VitalKind {
        self.vital
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }

    /// Warning line as handed to the case sheet.
    pub fn to_warning_string(&self) -> String {
        match self.severity {
            Severity::Critical => format!("CRITICAL: {}", self.message),
            Severity::Warning => self.message.clone(),
        }
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_warning_string())
    }
}

/// Classifies readings for one reference table
#[derive(Debug, Clone, Copy)]
pub struct RangeValidator<'a> {
    table: &'a ReferenceTable,
}

impl Default for RangeValidator<'static> {
    fn default() -> Self {
        Self::new(ReferenceTable::standard())
    }
}

impl<'a> RangeValidator<'a> {
    pub fn new(table: &'a ReferenceTable) -> Self {
        Self { table }
    }

    /// Alerts for `values` of `kind` in the given age band.
    ///
    /// `values` follows the parser layout: one value for scalars, systolic
    /// then diastolic for BP, E/V/M for GCS. A value with no reference row
    /// is skipped.
    pub fn validate(&self, kind: VitalKind, values: &[f64], band: AgeBand) -> Vec<Alert> {
        let mut alerts = Vec::new();
        match kind {
            VitalKind::Hr => self.check_both(&mut alerts, kind, ReferenceVital::Hr, values.first(), band),
            VitalKind::Rr => self.check_both(&mut alerts, kind, ReferenceVital::Rr, values.first(), band),
            VitalKind::Temperature => {
                self.check_both(&mut alerts, kind, ReferenceVital::Temp, values.first(), band)
            }
            VitalKind::Bp => {
                self.check_both(&mut alerts, kind, ReferenceVital::Sbp, values.first(), band);
                self.check_both(&mut alerts, kind, ReferenceVital::Dbp, values.get(1), band);
            }
            VitalKind::Spo2 => self.check_spo2(&mut alerts, values.first(), band),
            VitalKind::Gcs => {
                if let Some(alert) = gcs_alert(values) {
                    alerts.push(alert);
                }
            }
        }

        if !alerts.is_empty() {
            debug!("{} produced {} alert(s) for band {}", kind, alerts.len(), band);
        }
        alerts
    }

    /// Alerts for every complete vital present in `record`.
    pub fn validate_record(&self, record: &VitalsRecord, band: AgeBand) -> Vec<Alert> {
        VitalKind::ALL
            .iter()
            .filter_map(|kind| record.values_for(*kind).map(|v| (*kind, v)))
            .flat_map(|(kind, values)| self.validate(kind, &values, band))
            .collect()
    }

    fn range(&self, vital: ReferenceVital, band: AgeBand) -> Option<&ReferenceRange> {
        self.table.lookup(band, vital)
    }

    fn check_both(
        &self,
        alerts: &mut Vec<Alert>,
        kind: VitalKind,
        vital: ReferenceVital,
        value: Option<&f64>,
        band: AgeBand,
    ) {
        let (Some(&value), Some(range)) = (value, self.range(vital, band)) else {
            return;
        };
        let name = if value < range.min {
            vital.low_name()
        } else if value > range.max {
            vital.high_name()
        } else {
            return;
        };
        alerts.push(Alert::new(
            Severity::Warning,
            kind,
            range_message(name, vital, value, range),
        ));
    }

    fn check_spo2(&self, alerts: &mut Vec<Alert>, value: Option<&f64>, band: AgeBand) {
        let (Some(&value), Some(range)) = (value, self.range(ReferenceVital::Spo2, band)) else {
            return;
        };
        if value < range.min {
            let message = format!(
                "{} - consider oxygen supplementation",
                range_message(ReferenceVital::Spo2.low_name(), ReferenceVital::Spo2, value, range)
            );
            alerts.push(Alert::new(Severity::Critical, VitalKind::Spo2, message));
        }
    }
}

/// "110 bpm" but "88%" and "22/min"
fn with_unit(value: impl std::fmt::Display, unit: &str) -> String {
    if unit.starts_with(|c: char| c.is_ascii_alphabetic()) {
        format!("{} {}", value, unit)
    } else {
        format!("{}{}", value, unit)
    }
}

fn range_message(name: &str, vital: ReferenceVital, value: f64, range: &ReferenceRange) -> String {
    format!(
        "{}: {} {} (normal {} for {})",
        name,
        vital.display_name(),
        with_unit(format_number(value), &range.unit),
        with_unit(
            format!("{}-{}", format_number(range.min), format_number(range.max)),
            &range.unit
        ),
        range.band.range_label(),
    )
}

fn gcs_alert(values: &[f64]) -> Option<Alert> {
    let [e, v, m] = values else {
        return None;
    };
    let total = e + v + m;
    let components = format!(
        "GCS {} (E{}V{}M{})",
        format_number(total),
        format_number(*e),
        format_number(*v),
        format_number(*m)
    );
    if total < GCS_SEVERE_BELOW {
        Some(Alert::new(
            Severity::Critical,
            VitalKind::Gcs,
            format!("{} - severe impairment (normal 13-15)", components),
        ))
    } else if total < GCS_MODERATE_BELOW {
        Some(Alert::new(
            Severity::Warning,
            VitalKind::Gcs,
            format!("{} - moderate impairment (normal 13-15)", components),
        ))
    } else {
        None
    }
}

/// Validate against the standard reference table.
pub fn validate(kind: VitalKind, values: &[f64], band: AgeBand) -> Vec<Alert> {
    RangeValidator::default().validate(kind, values, band)
}
