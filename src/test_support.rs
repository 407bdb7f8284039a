//! Scripted collaborators for session, wizard and review tests.

use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::audio::{AudioCapture, AudioClip, CaptureError};
use crate::extraction::{ExtractionBatch, ExtractionError, ExtractionService};
use crate::transcription::{TranscriptionError, TranscriptionService};

/// Capture device whose state is observable after it has been moved into a
/// wizard.
#[derive(Debug, Default)]
pub struct MockCapture {
    active: Rc<Cell<bool>>,
    starts: Rc<Cell<usize>>,
    releases: Rc<Cell<usize>>,
    fail_start: Option<CaptureError>,
    fail_stop: Option<CaptureError>,
}

impl MockCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_start(error: CaptureError) -> Self {
        Self {
            fail_start: Some(error),
            ..Self::default()
        }
    }

    pub fn failing_stop(error: CaptureError) -> Self {
        Self {
            fail_stop: Some(error),
            ..Self::default()
        }
    }

    pub fn active_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.active)
    }

    pub fn start_count(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.starts)
    }

    /// Number of releases that actually freed an open device
    pub fn release_count(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.releases)
    }
}

#[async_trait(?Send)]
impl AudioCapture for MockCapture {
    async fn start(&mut self) -> Result<(), CaptureError> {
        self.starts.set(self.starts.get() + 1);
        if let Some(error) = self.fail_start.clone() {
            return Err(error);
        }
        self.active.set(true);
        Ok(())
    }

    fn stop(&mut self) -> Result<AudioClip, CaptureError> {
        if !self.active.get() {
            return Err(CaptureError::NotRecording);
        }
        self.active.set(false);
        if let Some(error) = self.fail_stop.clone() {
            return Err(error);
        }
        Ok(AudioClip::new(vec![0u8; 64], "audio/wav", 500))
    }

    fn release(&mut self) {
        if self.active.get() {
            self.releases.set(self.releases.get() + 1);
        }
        self.active.set(false);
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }
}

/// Returns queued transcripts in order.
#[derive(Debug, Default)]
pub struct ScriptedTranscriber {
    responses: RefCell<VecDeque<Result<String, TranscriptionError>>>,
    calls: Cell<usize>,
}

impl ScriptedTranscriber {
    pub fn new(responses: Vec<Result<String, TranscriptionError>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            calls: Cell::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.get()
    }
}

#[async_trait(?Send)]
impl TranscriptionService for ScriptedTranscriber {
    async fn transcribe(&self, _clip: &AudioClip) -> Result<String, TranscriptionError> {
        self.calls.set(self.calls.get() + 1);
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TranscriptionError::Request("no scripted response".to_string())))
    }
}

/// Returns the same extraction result for every call.
#[derive(Debug)]
pub struct StaticExtractor {
    result: Result<ExtractionBatch, ExtractionError>,
    calls: RefCell<Vec<String>>,
}

impl StaticExtractor {
    pub fn new(result: Result<ExtractionBatch, ExtractionError>) -> Self {
        Self {
            result,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Texts the extractor was called with
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

#[async_trait(?Send)]
impl ExtractionService for StaticExtractor {
    async fn extract(&self, text: &str) -> Result<ExtractionBatch, ExtractionError> {
        self.calls.borrow_mut().push(text.to_string());
        self.result.clone()
    }
}
