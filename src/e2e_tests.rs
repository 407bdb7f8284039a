//! End-to-end wizard scenarios.
//!
//! The scripted tests drive the full path (capture → transcription → parse →
//! validate → accumulate → outcome) with a mock microphone and canned
//! transcripts. The `#[ignore]` tests talk to live services:
//!
//! ```bash
//! cargo test e2e_live -- --ignored --nocapture
//! ```

#[cfg(test)]
mod tests {
    use crate::age_band::{self, AgeBand};
    use crate::audio::AudioCapture;
    use crate::config::Config;
    use crate::extraction::{parse_extraction_response, ExtractionService};
    use crate::review::ExtractionReviewBuffer;
    use crate::session::{CaptureSession, SessionState};
    use crate::test_support::{MockCapture, ScriptedTranscriber};
    use crate::transcription::TranscriptionService;
    use crate::validator::Severity;
    use crate::vitals::{VitalKind, VitalsRecord};
    use crate::wizard::VitalsWizard;
    use crate::AudioClip;

    const SCENARIO_TRANSCRIPTS: [&str; 6] = [
        "heart rate one ten",
        "one thirty over ninety",
        "rate twenty two",
        "spO2 eighty eight",
        "one hundred one",
        "E four V five M six",
    ];

    fn scripted_wizard(
        band: AgeBand,
        transcripts: &[&str],
    ) -> VitalsWizard<MockCapture, ScriptedTranscriber> {
        VitalsWizard::new(
            CaptureSession::standard(band),
            MockCapture::new(),
            ScriptedTranscriber::new(transcripts.iter().map(|t| Ok(t.to_string())).collect()),
        )
    }

    #[tokio::test]
    async fn e2e_full_adult_scenario() {
        let mut wizard = scripted_wizard(age_band::resolve("45y"), &SCENARIO_TRANSCRIPTS);

        let mut outcome = None;
        for _ in 0..SCENARIO_TRANSCRIPTS.len() {
            wizard.start_recording().await.unwrap();
            let result = wizard.stop_recording().await.unwrap();
            assert!(result.is_captured(), "step {} not captured", wizard.session().progress());
            outcome = wizard.next().unwrap();
        }

        let outcome = outcome.expect("last next() completes the session");
        assert_eq!(wizard.session().state(), SessionState::Completed);

        let expected = VitalsRecord {
            hr: Some(110.0),
            bp_systolic: Some(130.0),
            bp_diastolic: Some(90.0),
            rr: Some(22.0),
            spo2: Some(88.0),
            temperature: Some(38.3),
            gcs_e: Some(4.0),
            gcs_v: Some(5.0),
            gcs_m: Some(6.0),
        };
        assert_eq!(outcome.vitals, expected);

        let critical: Vec<&String> = outcome
            .warnings
            .iter()
            .filter(|w| w.starts_with("CRITICAL: "))
            .collect();
        assert_eq!(critical.len(), 1);
        assert!(critical[0].contains("SpO2 88"));

        let session_critical = wizard
            .session()
            .alerts()
            .iter()
            .filter(|a| a.severity() == Severity::Critical)
            .count();
        assert_eq!(session_critical, 1);

        // GCS 15 is normal
        assert!(outcome.warnings.iter().all(|w| !w.contains("GCS")));
        assert!(wizard
            .session()
            .alerts()
            .iter()
            .all(|a| a.vital() != VitalKind::Gcs));
        assert!(!wizard.capture().is_active());
    }

    #[tokio::test]
    async fn e2e_skip_all_yields_empty_payload() {
        let mut wizard = scripted_wizard(AgeBand::Adult, &[]);
        let mut outcome = None;
        for _ in 0..VitalKind::ALL.len() {
            outcome = wizard.skip().unwrap();
        }
        let outcome = outcome.unwrap();
        assert!(outcome.vitals.is_empty());
        assert!(outcome.warnings.is_empty());
        assert_eq!(wizard.transcriber().call_count(), 0);
    }

    #[tokio::test]
    async fn e2e_cancel_mid_recording_releases_stream() {
        let capture = MockCapture::new();
        let active = capture.active_flag();
        let mut wizard = VitalsWizard::new(
            CaptureSession::standard(AgeBand::Adult),
            capture,
            ScriptedTranscriber::new(vec![Ok("110".to_string())]),
        );

        wizard.start_recording().await.unwrap();
        assert!(active.get());
        wizard.cancel();

        assert!(!active.get());
        assert!(wizard.session().record().is_empty());
        assert_eq!(wizard.transcriber().call_count(), 0);
    }

    #[tokio::test]
    async fn e2e_pediatric_band_changes_alerts() {
        // 110 bpm and RR 22 are normal for a toddler
        let mut wizard = scripted_wizard(age_band::resolve("2 years"), &SCENARIO_TRANSCRIPTS[..1]);
        wizard.start_recording().await.unwrap();
        wizard.stop_recording().await.unwrap();
        assert!(wizard.session().alerts().is_empty());

        wizard.next().unwrap();
        wizard.next().unwrap();
        wizard.enter_manual("rate twenty two").unwrap();
        assert!(wizard.session().alerts().is_empty());
        assert_eq!(wizard.session().record().rr, Some(22.0));
    }

    #[tokio::test]
    async fn e2e_manual_entry_matches_voice_path() {
        let mut wizard = scripted_wizard(AgeBand::Adult, &[]);
        for transcript in SCENARIO_TRANSCRIPTS {
            assert!(wizard.enter_manual(transcript).unwrap().is_captured());
            wizard.next().unwrap();
        }
        assert_eq!(wizard.session().state(), SessionState::Completed);
        assert_eq!(wizard.session().record().temperature, Some(38.3));
    }

    #[tokio::test]
    async fn e2e_extraction_reply_to_review() {
        let reply = "```json\n{\"vitals\": {\"hr\": 110, \"bp_systolic\": 130, \"bp_diastolic\": 90, \"spo2\": 88}, \"symptoms\": {\"chest_pain\": true, \"fever\": false}}\n```";
        let batch = parse_extraction_response(reply).unwrap();
        let buffer = ExtractionReviewBuffer::stage(batch, AgeBand::Adult);

        assert_eq!(
            buffer.preview().vitals,
            vec!["HR: 110 bpm", "BP: 130/90 mmHg", "SpO2: 88%"]
        );
        assert_eq!(buffer.preview().symptoms, vec!["Chest Pain"]);
        assert_eq!(buffer.preview().alerts.len(), 2);

        let mut record = VitalsRecord::default();
        buffer.accept().merge_into(&mut record);
        assert_eq!(record.spo2, Some(88.0));
        assert!(record.rr.is_none());
    }

    #[tokio::test]
    #[ignore] // Requires live transcription server and LLM router
    async fn e2e_live_services() {
        crate::init_logging();
        let config = Config::load_or_default();

        let transcriber = config.transcription_client().unwrap();
        match transcriber.check_health().await {
            Ok(health) => println!("Transcription server: {}", health.status),
            Err(e) => println!("Transcription server unavailable: {}", e),
        }
        let samples: Vec<f32> = (0..32000)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16000.0).sin() * 0.3)
            .collect();
        let clip = AudioClip::from_samples(&samples, 16000).unwrap();
        println!("Transcript: {:?}", transcriber.transcribe(&clip).await);

        let extractor = config.extraction_client().unwrap();
        let batch = extractor
            .extract("Pulse one ten, BP one thirty over ninety, sats eighty eight on room air, complaining of chest pain.")
            .await;
        println!("Extraction: {:?}", batch);
    }
}
