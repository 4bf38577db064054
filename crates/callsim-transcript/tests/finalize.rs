use callsim_transcript::{TranscriptRecorder, TurnRecord};
use callsim_types::Speaker;

fn populated_recorder(root: &std::path::Path) -> TranscriptRecorder {
    let mut recorder =
        TranscriptRecorder::new(root, "CA123", "new_patient_scheduling", "New Patient Scheduling");
    recorder.record(Speaker::Agent, "Thank you for calling, how can I help?", Some(2_100));
    recorder.record(Speaker::Patient, "Hi, I'm a new patient and I'd like to schedule an appointment.", None);
    recorder.record(Speaker::Agent, "Of course. Can I get your name?", Some(1_300));
    recorder
}

#[test]
fn finalize_writes_json_and_text_pair() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = populated_recorder(dir.path());

    let paths = recorder.finalize().unwrap().clone();
    assert!(paths.json.exists());
    assert!(paths.text.exists());
    assert!(paths
        .json
        .parent()
        .unwrap()
        .ends_with("new_patient_scheduling"));

    let transcript = callsim_transcript::read_transcript(&paths.json).unwrap();
    assert_eq!(transcript.call_sid, "CA123");
    assert_eq!(transcript.message_count, 3);
    assert_eq!(transcript.turns[0].speaker, Speaker::Agent);

    let text = std::fs::read_to_string(&paths.text).unwrap();
    assert!(text.contains("Call Transcript - New Patient Scheduling"));
    assert!(text.contains("[Patient Bot]:"));
}

#[test]
fn duplicate_finalize_writes_nothing_new() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = populated_recorder(dir.path());

    let first = recorder.finalize().unwrap().clone();
    let json_before = std::fs::read_to_string(&first.json).unwrap();

    // A late turn plus a duplicate end-of-call signal must not produce a
    // second file pair or rewrite the first.
    recorder.record(Speaker::Patient, "straggler", None);
    let second = recorder.finalize().unwrap().clone();

    assert_eq!(first, second);
    assert_eq!(json_before, std::fs::read_to_string(&second.json).unwrap());

    let entries: Vec<_> = std::fs::read_dir(first.json.parent().unwrap())
        .unwrap()
        .collect();
    assert_eq!(entries.len(), 2, "expected exactly one json + txt pair");
}

#[test]
fn round_trip_preserves_turn_order_and_count() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = populated_recorder(dir.path());
    let snapshot = recorder.snapshot();

    let paths = recorder.finalize().unwrap().clone();
    let parsed = callsim_transcript::read_transcript(&paths.json).unwrap();

    assert_eq!(parsed.message_count, snapshot.message_count);
    let texts: Vec<&str> = parsed.turns.iter().map(|t: &TurnRecord| t.text.as_str()).collect();
    let expected: Vec<&str> = snapshot.turns.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, expected);
}
