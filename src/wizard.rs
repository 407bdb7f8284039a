//! Voice-driven vitals wizard: a capture session wired to a recording device
//! and a transcription service.
//!
//! Cancelling an in-flight `stop_recording` is done by dropping its future
//! and calling [`VitalsWizard::cancel`]; the session's ticket check makes
//! sure nothing from the abandoned call is ever applied.

use thiserror::Error;
use tracing::{info, warn};

use crate::audio::{AudioCapture, CaptureError};
use crate::session::{CaptureOutcome, CaptureSession, SessionError, StepResult};
use crate::transcription::{TranscriptionError, TranscriptionService};

#[derive(Debug, Error)]
pub enum WizardError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
}

pub struct VitalsWizard<C: AudioCapture, T: TranscriptionService> {
    session: CaptureSession,
    capture: C,
    transcriber: T,
}

impl<C: AudioCapture, T: TranscriptionService> VitalsWizard<C, T> {
    pub fn new(session: CaptureSession, capture: C, transcriber: T) -> Self {
        Self {
            session,
            capture,
            transcriber,
        }
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    pub fn transcriber(&self) -> &T {
        &self.transcriber
    }

    /// Start recording the current step. A second call while recording does
    /// nothing.
    pub async fn start_recording(&mut self) -> Result<(), WizardError> {
        if !self.session.begin_recording()? {
            return Ok(());
        }
        if let Err(e) = self.capture.start().await {
            self.capture.release();
            self.session.recording_failed(&e);
            return Err(e.into());
        }
        Ok(())
    }

    /// Stop recording, transcribe, and apply the result to the current step.
    ///
    /// Device and transport failures return the session to prompting with
    /// its data untouched, and surface as `Err` for the host to display.
    pub async fn stop_recording(&mut self) -> Result<StepResult, WizardError> {
        if !self.session.is_recording() {
            return Err(SessionError::InvalidTransition(format!(
                "Cannot stop recording from state {:?}",
                self.session.state()
            ))
            .into());
        }

        let clip = match self.capture.stop() {
            Ok(clip) => clip,
            Err(e) => {
                self.capture.release();
                self.session.recording_failed(&e);
                return Err(e.into());
            }
        };

        let ticket = self.session.begin_transcription()?;
        match self.transcriber.transcribe(&clip).await {
            Ok(text) => Ok(self.session.apply_transcript(&ticket, &text)?),
            Err(e) => {
                self.session.fail_transcription(&ticket, &e)?;
                Err(e.into())
            }
        }
    }

    pub fn enter_manual(&mut self, text: &str) -> Result<StepResult, WizardError> {
        Ok(self.session.enter_manual(text)?)
    }

    pub fn next(&mut self) -> Result<Option<CaptureOutcome>, WizardError> {
        Ok(self.session.next()?)
    }

    pub fn skip(&mut self) -> Result<Option<CaptureOutcome>, WizardError> {
        Ok(self.session.skip()?)
    }

    pub fn previous(&mut self) -> Result<(), WizardError> {
        Ok(self.session.previous()?)
    }

    /// Stop any capture, free the microphone, and discard the session.
    pub fn cancel(&mut self) {
        self.capture.release();
        self.session.cancel();
        info!("Wizard cancelled");
    }
}

impl<C: AudioCapture, T: TranscriptionService> Drop for VitalsWizard<C, T> {
    fn drop(&mut self) {
        if self.capture.is_active() {
            warn!("Wizard dropped while recording; releasing microphone");
            self.capture.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::age_band::AgeBand;
    use crate::session::SessionState;
    use crate::test_support::{MockCapture, ScriptedTranscriber};
    use crate::vitals::VitalKind;

    fn wizard(
        kinds: &[VitalKind],
        capture: MockCapture,
        transcripts: Vec<Result<String, TranscriptionError>>,
    ) -> VitalsWizard<MockCapture, ScriptedTranscriber> {
        VitalsWizard::new(
            CaptureSession::new(kinds.iter().copied(), AgeBand::Adult),
            capture,
            ScriptedTranscriber::new(transcripts),
        )
    }

    #[tokio::test]
    async fn test_record_transcribe_apply() {
        let mut wizard = wizard(
            &[VitalKind::Hr],
            MockCapture::new(),
            vec![Ok("heart rate one ten".to_string())],
        );

        wizard.start_recording().await.unwrap();
        assert!(wizard.capture().is_active());
        assert_eq!(wizard.session().state(), SessionState::Recording);

        let result = wizard.stop_recording().await.unwrap();
        assert!(result.is_captured());
        assert!(!wizard.capture().is_active());
        assert_eq!(wizard.session().record().hr, Some(110.0));
        assert_eq!(wizard.session().state(), SessionState::Prompting);
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let capture = MockCapture::new();
        let starts = capture.start_count();
        let mut wizard = wizard(&[VitalKind::Hr], capture, vec![]);

        wizard.start_recording().await.unwrap();
        wizard.start_recording().await.unwrap();
        assert_eq!(starts.get(), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_returns_to_prompting() {
        let mut wizard = wizard(
            &[VitalKind::Hr],
            MockCapture::failing_start(CaptureError::PermissionDenied),
            vec![],
        );
        wizard.enter_manual("72").unwrap();

        let err = wizard.start_recording().await.unwrap_err();
        assert!(matches!(err, WizardError::Capture(CaptureError::PermissionDenied)));
        assert_eq!(wizard.session().state(), SessionState::Prompting);
        assert_eq!(wizard.session().record().hr, Some(72.0));
        assert!(!wizard.capture().is_active());
    }

    #[tokio::test]
    async fn test_empty_audio_returns_to_prompting() {
        let mut wizard = wizard(
            &[VitalKind::Hr],
            MockCapture::failing_stop(CaptureError::EmptyAudio),
            vec![],
        );
        wizard.start_recording().await.unwrap();

        let err = wizard.stop_recording().await.unwrap_err();
        assert!(matches!(err, WizardError::Capture(CaptureError::EmptyAudio)));
        assert_eq!(wizard.session().state(), SessionState::Prompting);
        assert!(!wizard.capture().is_active());
        assert_eq!(wizard.transcriber().call_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_error_keeps_data() {
        let mut wizard = wizard(
            &[VitalKind::Hr],
            MockCapture::new(),
            vec![
                Ok("96".to_string()),
                Err(TranscriptionError::Request("connection refused".to_string())),
            ],
        );
        wizard.start_recording().await.unwrap();
        wizard.stop_recording().await.unwrap();

        wizard.start_recording().await.unwrap();
        let err = wizard.stop_recording().await.unwrap_err();
        assert!(matches!(err, WizardError::Transcription(_)));
        assert_eq!(wizard.session().state(), SessionState::Prompting);
        assert_eq!(wizard.session().record().hr, Some(96.0));
        assert!(wizard
            .session()
            .last_error()
            .unwrap()
            .contains("connection refused"));

        // Navigation is available again after the failure
        assert!(wizard.next().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_error() {
        let mut wizard = wizard(&[VitalKind::Hr], MockCapture::new(), vec![]);
        assert!(matches!(
            wizard.stop_recording().await,
            Err(WizardError::Session(SessionError::InvalidTransition(_)))
        ));
    }

    #[tokio::test]
    async fn test_cancel_releases_microphone() {
        let capture = MockCapture::new();
        let active = capture.active_flag();
        let releases = capture.release_count();
        let mut wizard = wizard(&[VitalKind::Hr, VitalKind::Bp], capture, vec![]);

        wizard.start_recording().await.unwrap();
        assert!(active.get());

        wizard.cancel();
        assert!(!active.get());
        assert_eq!(releases.get(), 1);
        assert!(wizard.session().is_cancelled());
        assert!(matches!(
            wizard.start_recording().await,
            Err(WizardError::Session(SessionError::Cancelled))
        ));
    }

    #[tokio::test]
    async fn test_drop_releases_microphone() {
        let capture = MockCapture::new();
        let active = capture.active_flag();
        {
            let mut wizard = wizard(&[VitalKind::Hr], capture, vec![]);
            wizard.start_recording().await.unwrap();
            assert!(active.get());
        }
        assert!(!active.get());
    }
}
