use std::path::{Path, PathBuf};

use phi_input::{HitOutcome, MatcherConfig, PlayField, autoplay_script, play_script};
use phi_model::{ParseOptions, Viewport, decode_chart_file};
use phi_rule::JudgeConfig;
use phi_scene::KinematicsOptions;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../phi-model/tests/fixtures")
        .join(name)
}

#[test]
fn autoplay_scores_max_on_every_fixture() {
    let viewport = Viewport::new(1280.0, 720.0);
    let options = KinematicsOptions::default();
    for name in ["official_v3.json", "rpe_layers.json", "sample.pec"] {
        let chart = decode_chart_file(&fixture(name), viewport, ParseOptions::default()).unwrap();
        let script = autoplay_script(&chart, &options, viewport);
        let mut field = PlayField::new(
            &chart,
            viewport,
            JudgeConfig::default(),
            MatcherConfig::default(),
            options.clone(),
        );
        let events = play_script(&mut field, &script, 60.0, chart.duration + 1.0);

        let summary = field.summary();
        assert_eq!(summary.score, 1_000_000, "{name}: {events:?}");
        assert_eq!(summary.max_combo as usize, chart.judgeable_count(), "{name}");
        assert_eq!(summary.judged, summary.total, "{name}");
        assert!(events.iter().all(|e| e.outcome != HitOutcome::Miss), "{name}");
    }
}

#[test]
fn autoplay_is_independent_of_frame_rate() {
    let viewport = Viewport::default();
    let chart = decode_chart_file(&fixture("rpe_layers.json"), viewport, ParseOptions::default()).unwrap();
    let script = autoplay_script(&chart, &KinematicsOptions::default(), viewport);
    for fps in [24.0, 144.0] {
        let mut field = PlayField::new(
            &chart,
            viewport,
            JudgeConfig::default(),
            MatcherConfig::default(),
            KinematicsOptions::default(),
        );
        play_script(&mut field, &script, fps, chart.duration + 1.0);
        assert_eq!(field.summary().score, 1_000_000, "fps {fps}");
    }
}
