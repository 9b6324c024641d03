use std::path::{Path, PathBuf};

use phi_model::{Note, NoteKind, ParseOptions, Viewport, decode_chart_file};
use phi_rule::{Grade, JudgeConfig, JudgeEvent, JudgeSession, MAX_SCORE};
use proptest::prelude::*;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../phi-model/tests/fixtures")
        .join(name)
}

fn perfect_run(notes: &[Note]) -> JudgeSession {
    let mut session = JudgeSession::new(notes, JudgeConfig::default());
    let end = notes.iter().map(|n| n.end_time).fold(0.0, f64::max) + 1.0;
    for (i, n) in notes.iter().enumerate() {
        session.tick(n.hit_time);
        session.try_hit(i, n.hit_time);
    }
    session.tick(end);
    session
}

// --- Fixture charts ---

#[test]
fn perfect_run_on_every_fixture_scores_max() {
    for name in ["official_v3.json", "rpe_layers.json", "sample.pec"] {
        let chart = decode_chart_file(&fixture(name), Viewport::default(), ParseOptions::default()).unwrap();
        let session = perfect_run(&chart.notes);
        let summary = session.summary();
        assert_eq!(summary.score, MAX_SCORE, "{name}");
        assert_eq!(summary.classic_score, MAX_SCORE, "{name}");
        assert_eq!(summary.total as usize, chart.judgeable_count(), "{name}");
        assert_eq!(summary.max_combo, summary.total, "{name}");
        assert!(summary.is_all_perfect(), "{name}");
        assert_eq!(summary.suggested_offset, Some(0.0), "{name}");
    }
}

#[test]
fn idle_run_misses_everything() {
    let chart = decode_chart_file(&fixture("official_v3.json"), Viewport::default(), ParseOptions::default()).unwrap();
    let mut session = JudgeSession::new(&chart.notes, JudgeConfig::default());
    let events = session.tick(chart.duration + 10.0);
    assert_eq!(events.len(), chart.judgeable_count());
    assert!(events.iter().all(|e| matches!(e, JudgeEvent::Miss { .. })));
    let summary = session.summary();
    assert_eq!(summary.score, 0);
    assert_eq!(summary.counts.miss, summary.total);
    assert_eq!(session.cursor(), chart.notes.len());
}

// --- Hold release ---

#[test]
fn hold_release_at_seventy_percent_is_a_miss() {
    let mut hold = Note::new(0, 0, NoteKind::Hold, 10.0);
    hold.end_time = 12.0;
    let mut session = JudgeSession::new(&[hold], JudgeConfig::default());
    assert_eq!(session.try_hit(0, 10.0), Some(Grade::Perfect));
    session.tick(11.0);
    let event = session.release_hold(0, 11.4);
    assert!(matches!(event, Some(JudgeEvent::Miss { hold_failed: true, .. })));
    assert_eq!(session.combo(), 0);
    assert_eq!(session.score(), 0);
    assert_eq!(session.counts().miss, 1);
}

fn offsets() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.3..0.3f64, 1..64)
}

proptest! {
    #[test]
    fn score_stays_in_range(dts in offsets()) {
        let notes: Vec<Note> = (0..dts.len())
            .map(|i| Note::new(i as u64, 0, NoteKind::Tap, i as f64))
            .collect();
        let mut session = JudgeSession::new(&notes, JudgeConfig::default());
        for (i, dt) in dts.iter().enumerate() {
            session.try_hit(i, i as f64 + dt);
        }
        session.tick(notes.len() as f64 + 1.0);
        let s = session.summary();
        prop_assert!(s.score <= MAX_SCORE);
        prop_assert!(s.classic_score <= MAX_SCORE);
        prop_assert_eq!(s.judged, s.total);
        prop_assert_eq!(s.counts.total(), s.total);
        prop_assert!(s.max_combo <= s.total);
        prop_assert!((0.0..=100.0).contains(&s.accuracy));
    }

    #[test]
    fn hits_never_score_below_misses(dts in offsets()) {
        let notes: Vec<Note> = (0..dts.len())
            .map(|i| Note::new(i as u64, 0, NoteKind::Tap, i as f64))
            .collect();
        let mut hit = JudgeSession::new(&notes, JudgeConfig::default());
        for (i, dt) in dts.iter().enumerate() {
            hit.try_hit(i, i as f64 + dt);
        }
        let mut idle = JudgeSession::new(&notes, JudgeConfig::default());
        idle.tick(notes.len() as f64 + 1.0);
        prop_assert!(hit.score() >= idle.score());
    }
}
