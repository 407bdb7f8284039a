use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::age_band::AgeBand;
use crate::audio::CaptureError;
use crate::parser::VitalParser;
use crate::validator::{Alert, RangeValidator};
use crate::vitals::{ParsedVital, VitalKind, VitalsRecord};

/// Capture session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Prompting,
    Recording,
    Transcribing,
    Completed,
}

/// Session error types
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum SessionError {
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),
    #[error("Response belongs to a superseded step")]
    StaleResponse,
    #[error("Session already completed")]
    Completed,
    #[error("Session was cancelled")]
    Cancelled,
}

/// What the host shows for one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VitalPrompt {
    pub kind: VitalKind,
    pub prompt: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
}

impl VitalPrompt {
    pub fn for_kind(kind: VitalKind) -> Self {
        Self {
            kind,
            prompt: kind.prompt(),
            label: kind.label(),
            unit: kind.unit(),
        }
    }
}

/// Progress indicator for the host UI
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepProgress {
    /// 1-based step number
    pub step: usize,
    pub total: usize,
    pub percent: f64,
}

impl std::fmt::Display for StepProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Step {} of {}", self.step, self.total)
    }
}

/// Identifies the step an in-flight transcription was started for.
///
/// A response is applied only if its ticket still matches the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptionTicket {
    generation: u64,
    step_index: usize,
    kind: VitalKind,
}

impl TranscriptionTicket {
    pub fn kind(&self) -> VitalKind {
        self.kind
    }
}

/// Result of feeding text to the current step
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    Captured { parsed: ParsedVital, alerts: Vec<Alert> },
    NoMatch { transcript: String },
}

impl StepResult {
    pub fn is_captured(&self) -> bool {
        matches!(self, StepResult::Captured { .. })
    }
}

/// Payload handed to the case sheet on completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub vitals: VitalsRecord,
    pub warnings: Vec<String>,
}

/// Last transcript heard for the current step ("Heard: ...")
#[derive(Debug, Clone, Default)]
pub struct TranscriptBuffer {
    text: Option<String>,
    heard_at: Option<DateTime<Utc>>,
}

impl TranscriptBuffer {
    fn set(&mut self, text: &str) {
        self.text = Some(text.to_string());
        self.heard_at = Some(Utc::now());
    }

    fn clear(&mut self) {
        self.text = None;
        self.heard_at = None;
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn heard_at(&self) -> Option<DateTime<Utc>> {
        self.heard_at
    }
}

/// One vitals capture workflow: a fixed list of prompts walked one at a time.
///
/// The session is a plain owned value. Audio and network work happen
/// outside it; the session hands out a [`TranscriptionTicket`] when a
/// recording stops and only accepts the transcript back if the ticket is
/// still current. Cancelling bumps the generation, so late responses are
/// dropped.
#[derive(Debug)]
pub struct CaptureSession {
    id: String,
    state: SessionState,
    step_index: usize,
    prompts: Vec<VitalPrompt>,
    record: VitalsRecord,
    alerts: Vec<Alert>,
    transcript: TranscriptBuffer,
    band: AgeBand,
    parser: VitalParser,
    generation: u64,
    cancelled: bool,
    last_error: Option<String>,
    started_at: DateTime<Utc>,
}

impl CaptureSession {
    pub fn new(kinds: impl IntoIterator<Item = VitalKind>, band: AgeBand) -> Self {
        let prompts: Vec<VitalPrompt> = kinds.into_iter().map(VitalPrompt::for_kind).collect();
        let id = uuid::Uuid::new_v4().to_string();
        info!(
            "Capture session {} created with {} steps for band {}",
            id,
            prompts.len(),
            band
        );
        Self {
            id,
            state: SessionState::Idle,
            step_index: 0,
            prompts,
            record: VitalsRecord::new(),
            alerts: Vec::new(),
            transcript: TranscriptBuffer::default(),
            band,
            parser: VitalParser::default(),
            generation: 0,
            cancelled: false,
            last_error: None,
            started_at: Utc::now(),
        }
    }

    /// Session over every vital in the default order.
    pub fn standard(band: AgeBand) -> Self {
        Self::new(VitalKind::ALL, band)
    }

    pub fn with_parser(mut self, parser: VitalParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn band(&self) -> AgeBand {
        self.band
    }

    pub fn prompts(&self) -> &[VitalPrompt] {
        &self.prompts
    }

    pub fn current_prompt(&self) -> Option<&VitalPrompt> {
        self.prompts.get(self.step_index)
    }

    pub fn record(&self) -> &VitalsRecord {
        &self.record
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn heard(&self) -> &TranscriptBuffer {
        &self.transcript
    }

    /// User-facing message from the last failed capture or transcription
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    pub fn progress(&self) -> StepProgress {
        let total = self.prompts.len();
        let step = (self.step_index + 1).min(total);
        let percent = if total == 0 {
            100.0
        } else {
            step as f64 * 100.0 / total as f64
        };
        StepProgress {
            step,
            total,
            percent,
        }
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.cancelled {
            return Err(SessionError::Cancelled);
        }
        if self.state == SessionState::Completed {
            return Err(SessionError::Completed);
        }
        Ok(())
    }

    fn ensure_navigable(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        match self.state {
            SessionState::Recording | SessionState::Transcribing => {
                Err(SessionError::InvalidTransition(format!(
                    "Cannot navigate from state {:?}",
                    self.state
                )))
            }
            _ => Ok(()),
        }
    }

    fn ensure_current(&self, ticket: &TranscriptionTicket) -> Result<(), SessionError> {
        if self.cancelled
            || ticket.generation != self.generation
            || ticket.step_index != self.step_index
            || self.state != SessionState::Transcribing
        {
            debug!(
                "Ignoring stale transcription (ticket gen {}, session gen {})",
                ticket.generation, self.generation
            );
            return Err(SessionError::StaleResponse);
        }
        Ok(())
    }

    /// Transition to recording state.
    ///
    /// Returns `Ok(false)` when already recording.
    pub fn begin_recording(&mut self) -> Result<bool, SessionError> {
        self.ensure_open()?;
        match self.state {
            SessionState::Recording => Ok(false),
            SessionState::Idle | SessionState::Prompting => {
                info!("Session {} recording step {}", self.id, self.step_index + 1);
                self.state = SessionState::Recording;
                self.last_error = None;
                Ok(true)
            }
            state => Err(SessionError::InvalidTransition(format!(
                "Cannot record from state {:?}",
                state
            ))),
        }
    }

    /// The device failed to start or stop; back to prompting with data intact.
    pub fn recording_failed(&mut self, error: &CaptureError) {
        if self.state == SessionState::Recording {
            warn!("Session {} capture failed: {}", self.id, error);
            self.state = SessionState::Prompting;
            self.last_error = Some(error.to_string());
        }
    }

    /// Transition to transcribing state and issue a ticket for the response.
    pub fn begin_transcription(&mut self) -> Result<TranscriptionTicket, SessionError> {
        self.ensure_open()?;
        if self.state != SessionState::Recording {
            return Err(SessionError::InvalidTransition(format!(
                "Cannot transcribe from state {:?}",
                self.state
            )));
        }
        let kind = self
            .current_prompt()
            .map(|p| p.kind)
            .ok_or_else(|| SessionError::InvalidTransition("No current step".to_string()))?;

        info!("Session {} transcribing step {}", self.id, self.step_index + 1);
        self.state = SessionState::Transcribing;
        Ok(TranscriptionTicket {
            generation: self.generation,
            step_index: self.step_index,
            kind,
        })
    }

    /// Apply a transcription result for the step named by `ticket`.
    pub fn apply_transcript(
        &mut self,
        ticket: &TranscriptionTicket,
        text: &str,
    ) -> Result<StepResult, SessionError> {
        self.ensure_current(ticket)?;
        self.state = SessionState::Prompting;
        Ok(self.apply_text(ticket.kind, text))
    }

    /// The transcription call failed; back to prompting with data intact.
    pub fn fail_transcription(
        &mut self,
        ticket: &TranscriptionTicket,
        message: impl std::fmt::Display,
    ) -> Result<(), SessionError> {
        self.ensure_current(ticket)?;
        warn!("Session {} transcription failed: {}", self.id, message);
        self.state = SessionState::Prompting;
        self.last_error = Some(message.to_string());
        Ok(())
    }

    /// Typed entry for the current step; parsed exactly like a transcript.
    pub fn enter_manual(&mut self, text: &str) -> Result<StepResult, SessionError> {
        self.ensure_navigable()?;
        let kind = self
            .current_prompt()
            .map(|p| p.kind)
            .ok_or_else(|| SessionError::InvalidTransition("No current step".to_string()))?;
        self.state = SessionState::Prompting;
        Ok(self.apply_text(kind, text))
    }

    fn apply_text(&mut self, kind: VitalKind, text: &str) -> StepResult {
        self.transcript.set(text);
        self.last_error = None;

        let Some(parsed) = self.parser.parse(kind, text) else {
            debug!("Session {} heard no {} reading", self.id, kind);
            return StepResult::NoMatch {
                transcript: text.to_string(),
            };
        };

        let alerts = RangeValidator::default().validate(kind, parsed.values(), self.band);
        self.record.merge(&parsed);
        self.alerts.extend(alerts.iter().cloned());
        info!(
            "Session {} captured {} ({} alert(s))",
            self.id,
            kind,
            alerts.len()
        );
        StepResult::Captured { parsed, alerts }
    }

    fn move_to(&mut self, step_index: usize) {
        self.step_index = step_index;
        self.state = SessionState::Prompting;
        self.transcript.clear();
        self.last_error = None;
        self.generation += 1;
    }

    fn advance(&mut self, action: &str) -> Result<Option<CaptureOutcome>, SessionError> {
        self.ensure_navigable()?;
        if self.step_index + 1 >= self.prompts.len() {
            info!("Session {} completed via {}", self.id, action);
            self.state = SessionState::Completed;
            self.generation += 1;
            return Ok(Some(self.outcome()));
        }
        debug!("Session {} {} to step {}", self.id, action, self.step_index + 2);
        self.move_to(self.step_index + 1);
        Ok(None)
    }

    /// Go to the next step; on the last step this completes the session.
    pub fn next(&mut self) -> Result<Option<CaptureOutcome>, SessionError> {
        self.advance("next")
    }

    /// Leave the current vital uncaptured and move on.
    pub fn skip(&mut self) -> Result<Option<CaptureOutcome>, SessionError> {
        self.advance("skip")
    }

    pub fn previous(&mut self) -> Result<(), SessionError> {
        self.ensure_navigable()?;
        if self.step_index == 0 {
            return Err(SessionError::InvalidTransition(
                "Already at the first step".to_string(),
            ));
        }
        self.move_to(self.step_index - 1);
        Ok(())
    }

    /// Discard everything and invalidate in-flight work. Terminal.
    pub fn cancel(&mut self) {
        info!("Session {} cancelled", self.id);
        self.cancelled = true;
        self.state = SessionState::Idle;
        self.generation += 1;
        self.record = VitalsRecord::new();
        self.alerts.clear();
        self.transcript.clear();
        self.last_error = None;
    }

    /// Snapshot of what has been captured so far.
    pub fn outcome(&self) -> CaptureOutcome {
        CaptureOutcome {
            vitals: self.record.clone(),
            warnings: self.alerts.iter().map(Alert::to_warning_string).collect(),
        }
    }
}
