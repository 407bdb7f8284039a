//! Voice-driven vitals capture with age-banded clinical alerts.
//!
//! Spoken or typed readings are normalized, parsed per vital, checked against
//! the pediatric reference table for the patient's age band, and accumulated
//! by a step-by-step [`CaptureSession`]. AI-extracted batches go through
//! [`ExtractionReviewBuffer`] for all-or-nothing clinician review.

pub mod age_band;
pub mod audio;
pub mod config;
pub mod extraction;
#[cfg(feature = "microphone")]
pub mod microphone;
pub mod parser;
pub mod reference;
pub mod retry;
pub mod review;
pub mod session;
pub mod spoken_numbers;
pub mod symptoms;
pub mod transcription;
pub mod validator;
pub mod vitals;
pub mod wizard;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod test_support;

pub use age_band::AgeBand;
pub use audio::{AudioCapture, AudioClip, CaptureError};
pub use config::Config;
pub use extraction::{ExtractionBatch, ExtractionClient, ExtractionError, ExtractionService};
pub use parser::{TemperatureInference, VitalParser};
pub use reference::{ReferenceRange, ReferenceTable, ReferenceVital};
pub use review::{ExtractionReviewBuffer, PreviewModel, ReviewError};
pub use session::{CaptureOutcome, CaptureSession, SessionError, SessionState, StepResult};
pub use symptoms::{Symptom, SymptomCategory};
pub use transcription::{TranscriptionClient, TranscriptionError, TranscriptionService};
pub use validator::{Alert, RangeValidator, Severity};
pub use vitals::{ParsedVital, VitalField, VitalKind, VitalsRecord};
pub use wizard::{VitalsWizard, WizardError};

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// Honors `RUST_LOG`, defaulting to `info`. Safe to call more than once; only
/// the first call installs a subscriber.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
