use crate::TranscriptError;
use callsim_types::Speaker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// One utterance from either side of the call.
///
/// Records are append-only and written once. Agent turns carry the measured
/// utterance duration when the recognizer reported one; patient turns carry
/// `None` because synthesis length is not known at append time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub audio_duration_ms: Option<u64>,
}

/// The finalized transcript of one call, as serialized to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub call_sid: String,
    pub scenario_id: String,
    pub scenario_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub message_count: usize,
    pub turns: Vec<TurnRecord>,
}

/// Where a finalized transcript landed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptPaths {
    pub json: PathBuf,
    pub text: PathBuf,
}

/// Accumulates turns during a call and persists them on [`finalize`].
///
/// [`finalize`]: TranscriptRecorder::finalize
#[derive(Debug)]
pub struct TranscriptRecorder {
    root: PathBuf,
    call_sid: String,
    scenario_id: String,
    scenario_name: String,
    started_at: DateTime<Utc>,
    turns: Vec<TurnRecord>,
    written: Option<TranscriptPaths>,
}

impl TranscriptRecorder {
    pub fn new(
        root: impl Into<PathBuf>,
        call_sid: impl Into<String>,
        scenario_id: impl Into<String>,
        scenario_name: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            call_sid: call_sid.into(),
            scenario_id: scenario_id.into(),
            scenario_name: scenario_name.into(),
            started_at: Utc::now(),
            turns: Vec::new(),
            written: None,
        }
    }

    /// Appends one turn, stamped with the current time.
    ///
    /// Timestamps are clamped so the recorded sequence is non-decreasing
    /// even if the system clock steps backwards mid-call.
    pub fn record(&mut self, speaker: Speaker, text: impl Into<String>, duration_ms: Option<u64>) {
        let text = text.into();
        let mut timestamp = Utc::now();
        if let Some(last) = self.turns.last() {
            timestamp = timestamp.max(last.timestamp);
        }

        info!(speaker = %speaker, "[{}] {}", speaker.label(), text);
        self.turns.push(TurnRecord {
            speaker,
            text,
            timestamp,
            audio_duration_ms: duration_ms,
        });
    }

    pub fn turns(&self) -> &[TurnRecord] {
        &self.turns
    }

    /// Builds the serializable transcript as of now.
    pub fn snapshot(&self) -> Transcript {
        let ended_at = Utc::now().max(self.started_at);
        Transcript {
            call_sid: self.call_sid.clone(),
            scenario_id: self.scenario_id.clone(),
            scenario_name: self.scenario_name.clone(),
            started_at: self.started_at,
            ended_at,
            duration_seconds: (ended_at - self.started_at).num_milliseconds() as f64 / 1_000.0,
            message_count: self.turns.len(),
            turns: self.turns.clone(),
        }
    }

    /// Writes the JSON and text transcript files, creating the scenario
    /// directory as needed.
    ///
    /// Idempotent: a second call returns the paths from the first write
    /// without touching the files again.
    pub fn finalize(&mut self) -> Result<&TranscriptPaths, TranscriptError> {
        if self.written.is_some() {
            return Ok(self.written.as_ref().expect("checked above"));
        }

        let transcript = self.snapshot();
        let dir = self.root.join(&self.scenario_id);
        std::fs::create_dir_all(&dir)?;

        let base = format!(
            "{}_{}",
            self.started_at.format("%Y%m%d_%H%M%S"),
            self.scenario_id
        );
        let paths = TranscriptPaths {
            json: dir.join(format!("{base}.json")),
            text: dir.join(format!("{base}.txt")),
        };

        std::fs::write(&paths.json, serde_json::to_string_pretty(&transcript)?)?;
        std::fs::write(&paths.text, render_text(&transcript))?;

        info!(
            path = %paths.json.display(),
            messages = transcript.message_count,
            duration_seconds = transcript.duration_seconds,
            "transcript saved"
        );

        Ok(self.written.insert(paths))
    }
}

fn render_text(transcript: &Transcript) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Call Transcript - {}", transcript.scenario_name);
    let _ = writeln!(
        out,
        "Date     : {}",
        transcript.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "Duration : {:.1}s", transcript.duration_seconds);
    let _ = writeln!(out, "Scenario : {}", transcript.scenario_id);
    let _ = writeln!(out, "Call SID : {}", transcript.call_sid);
    let _ = writeln!(out, "{}", "=".repeat(64));
    out.push('\n');
    for turn in &transcript.turns {
        let _ = writeln!(out, "[{}]: {}\n", turn.speaker.label(), turn.text);
    }
    out
}

/// Parses a transcript previously written by [`TranscriptRecorder::finalize`].
pub fn read_transcript(path: &Path) -> Result<Transcript, TranscriptError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_non_decreasing() {
        let mut recorder = TranscriptRecorder::new("/tmp", "CA1", "lab_results", "Lab Results");
        for i in 0..20 {
            let speaker = if i % 2 == 0 {
                Speaker::Agent
            } else {
                Speaker::Patient
            };
            recorder.record(speaker, format!("turn {i}"), None);
        }

        let turns = recorder.turns();
        for pair in turns.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn snapshot_counts_messages() {
        let mut recorder = TranscriptRecorder::new("/tmp", "CA2", "billing_question", "Billing");
        recorder.record(Speaker::Agent, "Thank you for calling.", Some(1_800));
        recorder.record(Speaker::Patient, "Hi, about my bill.", None);

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.message_count, 2);
        assert_eq!(snapshot.turns.len(), 2);
        assert_eq!(snapshot.turns[0].audio_duration_ms, Some(1_800));
        assert!(snapshot.ended_at >= snapshot.started_at);
    }

    #[test]
    fn transcript_json_round_trips() {
        let mut recorder = TranscriptRecorder::new("/tmp", "CA3", "cancel_appointment", "Cancel");
        recorder.record(Speaker::Agent, "How can I help?", Some(900));
        recorder.record(Speaker::Patient, "I need to cancel my appointment.", None);
        recorder.record(Speaker::Agent, "Which day was it?", Some(700));

        let transcript = recorder.snapshot();
        let json = serde_json::to_string(&transcript).unwrap();
        let parsed: Transcript = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.message_count, transcript.message_count);
        assert_eq!(parsed.turns, transcript.turns);
    }

    #[test]
    fn rendered_text_lists_every_turn() {
        let mut recorder = TranscriptRecorder::new("/tmp", "CA4", "wrong_number", "Wrong Number");
        recorder.record(Speaker::Patient, "Large pepperoni pizza, please.", None);
        recorder.record(Speaker::Agent, "This is a medical office.", None);

        let text = render_text(&recorder.snapshot());
        assert!(text.contains("[Patient Bot]: Large pepperoni pizza, please."));
        assert!(text.contains("[AI Agent]: This is a medical office."));
        assert!(text.contains("Scenario : wrong_number"));
    }
}
