//! Clinician review of AI-extracted triage data.
//!
//! A staged batch is all-or-nothing: the clinician sees a preview and either
//! accepts everything or discards everything. The staged vitals go through
//! the same range validation as dictated ones so the preview carries alerts.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::age_band::AgeBand;
use crate::audio::AudioClip;
use crate::extraction::{ExtractedVitals, ExtractionBatch, ExtractionError, ExtractionService};
use crate::parser::celsius_from_unitless;
use crate::symptoms::Symptom;
use crate::transcription::{TranscriptionError, TranscriptionService};
use crate::validator::{Alert, RangeValidator};
use crate::vitals::format_number;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("No speech detected")]
    EmptyTranscript,
}

/// What the review screen shows for a staged batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreviewModel {
    /// One formatted line per present vital ("HR: 110 bpm")
    pub vitals: Vec<String>,
    /// Labels of symptoms flagged present, in clinical order
    pub symptoms: Vec<String>,
    pub alerts: Vec<Alert>,
}

impl PreviewModel {
    pub fn is_empty(&self) -> bool {
        self.vitals.is_empty() && self.symptoms.is_empty()
    }
}

fn format_vital_lines(vitals: &ExtractedVitals) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(hr) = vitals.hr {
        lines.push(format!("HR: {} bpm", format_number(hr)));
    }
    if let (Some(sys), Some(dia)) = (vitals.bp_systolic, vitals.bp_diastolic) {
        lines.push(format!("BP: {}/{} mmHg", format_number(sys), format_number(dia)));
    }
    if let Some(rr) = vitals.rr {
        lines.push(format!("RR: {}/min", format_number(rr)));
    }
    if let Some(spo2) = vitals.spo2 {
        lines.push(format!("SpO2: {}%", format_number(spo2)));
    }
    if let Some(temp) = vitals.temperature.map(celsius_from_unitless) {
        lines.push(format!("Temp: {}°C", format_number(temp)));
    }
    if vitals.gcs_e.is_some() || vitals.gcs_v.is_some() || vitals.gcs_m.is_some() {
        let part = |v: Option<f64>| v.map(format_number).unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "GCS: E{}/V{}/M{}",
            part(vitals.gcs_e),
            part(vitals.gcs_v),
            part(vitals.gcs_m)
        ));
    }
    if let Some(crt) = vitals.capillary_refill {
        lines.push(format!("CRT: {}s", format_number(crt)));
    }

    lines
}

/// Build the preview for a batch against the patient's age band.
pub fn build_preview(batch: &ExtractionBatch, band: AgeBand) -> PreviewModel {
    PreviewModel {
        vitals: format_vital_lines(&batch.vitals),
        symptoms: batch
            .present_symptoms()
            .map(|s: &Symptom| s.label().to_string())
            .collect(),
        alerts: RangeValidator::default().validate_record(&batch.vitals.to_record(), band),
    }
}

/// A staged batch awaiting accept or reject.
#[derive(Debug, Clone)]
pub struct ExtractionReviewBuffer {
    batch: ExtractionBatch,
    preview: PreviewModel,
}

impl ExtractionReviewBuffer {
    pub fn stage(batch: ExtractionBatch, band: AgeBand) -> Self {
        let preview = build_preview(&batch, band);
        info!(
            "Staged extraction: {} vitals, {} symptoms, {} alerts",
            preview.vitals.len(),
            preview.symptoms.len(),
            preview.alerts.len()
        );
        Self { batch, preview }
    }

    pub fn preview(&self) -> &PreviewModel {
        &self.preview
    }

    pub fn batch(&self) -> &ExtractionBatch {
        &self.batch
    }

    /// Hand the whole batch to the host for merging into the case record.
    pub fn accept(self) -> ExtractionBatch {
        info!("Extraction accepted");
        self.batch
    }

    /// Discard the batch.
    pub fn reject(self) {
        info!("Extraction rejected");
    }

    /// Transcribe a dictation, extract from it, and stage the result.
    pub async fn stage_from_audio<T, E>(
        clip: &AudioClip,
        transcriber: &T,
        extractor: &E,
        band: AgeBand,
    ) -> Result<Self, ReviewError>
    where
        T: TranscriptionService + ?Sized,
        E: ExtractionService + ?Sized,
    {
        let transcript = transcriber.transcribe(clip).await?;
        if transcript.trim().is_empty() {
            return Err(ReviewError::EmptyTranscript);
        }
        let batch = extractor.extract(&transcript).await?;
        Ok(Self::stage(batch, band))
    }
}
