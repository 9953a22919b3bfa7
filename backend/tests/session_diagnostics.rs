//! Log-driven diagnostics across parsers and services.

mod support;

use astro_planner::models::{trigger_events, BurstTag, TriggerKind};
use astro_planner::parsing::{apply_rejections, parse_debug_log, parse_nina_log, parse_rejection_log};
use astro_planner::services::session::{analyze_session, SessionOptions};
use astro_planner::services::settle::{correlate_dithers, settle_statistics};
use astro_planner::services::validation::{score_frames, FrameQuality, QualityThreshold, ValidationOutcome};
use support::{light, nina_line, ts};

fn nina_log() -> String {
    [
        nina_line("21:00:00", "Starting Category: Telescope, Item: Center"),
        nina_line("21:01:00", "Finishing Category: Telescope, Item: Center"),
        nina_line("21:01:30", "Starting Exposure - Exposure Time: 60s"),
        "garbage line without a timestamp".to_string(),
        nina_line("21:02:35", "Starting Category: Guider, Item: Dither"),
        nina_line("21:02:50", "Starting Exposure - Exposure Time: 60s"),
        nina_line("21:04:00", "Camera temperature 5.0"),
    ]
    .join("\n")
}

const GUIDE_LOG: &str = "\
PHD2 version 2.6.11, Log version 2.5. Log enabled at 2024-03-01 21:00:00
Guiding Begins at 2024-03-01 21:02:00
Frame,Time,mount,dx,dy,RARawDistance,DECRawDistance,RADuration
1,30.0,\"Mount\",0,0,0.3,0.4,0
2,36.0,\"Mount\",0,0,1.2,1.6,0
3,37.0,\"Mount\",0,0,1.8,2.4,0
4,38.0,\"Mount\",0,0,1.2,-1.6,0
5,60.0,\"Mount\",0,0,0.3,0.4,0
Guiding Ends at 2024-03-01 21:03:10
";

const DEBUG_LOG: &str = r#"21:02:35.100 00.001 100 evsrv: cli 1A2B request: {"method":"dither","params":{"amount":3,"raOnly":false,"settle":{"pixels":1.5,"time":10,"timeout":60}},"id":7}
21:02:50.000 00.010 100 evsrv: {"Event":"SettleDone","Status":0,"TotalFrames":5,"DroppedFrames":0}
21:20:00.000 00.010 100 evsrv: {"Event":"SettleDone","Status":1,"TotalFrames":20,"DroppedFrames":1,"Error":"lost star"}
"#;

#[test]
fn test_session_timeline_is_contiguous() {
    let analysis = analyze_session(&nina_log(), Some(GUIDE_LOG), &SessionOptions::default()).unwrap();

    assert_eq!(analysis.counters.lines_total, 7);
    assert_eq!(analysis.counters.lines_matched, 6);

    let segments = &analysis.segmentation.segments;
    assert!(!segments.is_empty());
    for pair in segments.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
    let total: f64 = segments.iter().map(|s| s.duration_seconds).sum();
    assert!((total - analysis.segmentation.span_seconds()).abs() < 1e-6);
    assert_eq!(analysis.segmentation.start, Some(ts("2024-03-01T21:00:00")));
    assert_eq!(analysis.segmentation.end, Some(ts("2024-03-01T21:04:00")));
    assert_eq!(analysis.segmentation.totals_seconds["capture"], 120.0);
}

#[test]
fn test_guiding_burst_near_dither() {
    let analysis = analyze_session(&nina_log(), Some(GUIDE_LOG), &SessionOptions::default()).unwrap();

    assert_eq!(analysis.triggers.len(), 1);
    assert_eq!(analysis.triggers[0].kind, TriggerKind::Dither);

    let guiding = analysis.guiding.expect("guide log supplied");
    assert_eq!(guiding.summary.unwrap().sample_count, 5);

    let report = guiding.bursts;
    assert_eq!(report.bursts.len(), 1);
    let burst = &report.bursts[0];
    assert_eq!(burst.start, ts("2024-03-01T21:02:36"));
    assert_eq!(burst.end, ts("2024-03-01T21:02:38"));
    assert_eq!(burst.event_count, 3);
    assert!((burst.peak_rms - 3.0).abs() < 1e-9);
    assert!(burst.has_tag(BurstTag::NearDither));
    assert!(!burst.has_tag(BurstTag::NearAutofocus));
    assert_eq!(report.stats.percent_bursts_near_dither, 100.0);
}

#[test]
fn test_settle_matches_acquisition_dither() {
    let debug = parse_debug_log(DEBUG_LOG, Some("PHD2_DebugLog_2024-03-01_210000.txt"));
    assert_eq!(debug.dithers.len(), 1);
    assert_eq!(debug.settles.len(), 2);

    let stats = settle_statistics(&debug.settles);
    assert_eq!(stats.total_attempts, 2);
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.success_rate, 50.0);

    let dither_times: Vec<_> = trigger_events(&parse_nina_log(&nina_log()).events)
        .into_iter()
        .filter(|t| t.kind == TriggerKind::Dither)
        .map(|t| t.timestamp)
        .collect();
    let matched = correlate_dithers(&dither_times, &debug.settles, 70.0);
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].time_delta_sec, Some(15.0));
    assert!(matched[0].settle.as_ref().unwrap().success());
}

#[test]
fn test_rejection_log_feeds_validation() {
    let log = parse_rejection_log(
        "Integration of 4 frames\n\
         DSS: rejected frame M42_Ha_002.fits\n\
         Excluded [/stack/M42_Ha_003_c.xisf] high noise\n",
    );
    assert_eq!(log.rejected.len(), 2);

    let mut frames: Vec<_> = (1..=4)
        .map(|i| {
            light("M42", "Ha", 300.0, &format!("22:0{}:00", i))
                .with_file_name(format!("M42_Ha_00{}.fits", i))
        })
        .collect();
    assert_eq!(apply_rejections(&mut frames, &log.rejected), 2);

    let scores = [0.9, 0.2, 0.8, 0.3];
    let qualities: Vec<_> = frames
        .iter()
        .zip(scores)
        .map(|(frame, score)| FrameQuality::new(frame.rejected, score).with_filter(&frame.filter))
        .collect();
    let summary = score_frames(&qualities, &QualityThreshold::Global(0.5)).unwrap();

    assert_eq!(
        summary.outcomes,
        vec![
            ValidationOutcome::CorrectAccept,
            ValidationOutcome::CorrectReject,
            ValidationOutcome::FalsePositive,
            ValidationOutcome::FalseNegative,
        ]
    );
    assert_eq!(summary.accuracy, 0.5);
    assert!((summary.mean_quality_rejected.unwrap() - 0.5).abs() < 1e-9);
    assert!((summary.mean_quality_accepted.unwrap() - 0.6).abs() < 1e-9);
}

#[test]
fn test_hostile_log_values_do_not_abort_analysis() {
    let nina = [
        nina_line("21:00:00", "Starting Exposure - Exposure Time: 99999999999999s"),
        nina_line("21:00:10", "Starting Exposure - Exposure Time: 60s"),
        nina_line("21:01:20", "Camera temperature 5.0"),
    ]
    .join("\n");
    let guide = "\
Guiding Begins at 2024-03-01 21:00:00
Frame,Time,mount,dx,dy,RARawDistance,DECRawDistance
1,10.0,\"Mount\",0,0,0.3,0.4
2,12.0,\"Mount\",0,0,NaN,0.5
3,inf,\"Mount\",0,0,0.3,0.4
4,99999999999999,\"Mount\",0,0,0.3,0.4
5,14.0,\"Mount\",0,0,1.2,1.6
";

    let analysis = analyze_session(&nina, Some(guide), &SessionOptions::default()).unwrap();
    assert_eq!(analysis.counters.lines_skipped_for_exposure, 1);
    assert_eq!(analysis.segmentation.totals_seconds["capture"], 60.0);

    let guiding = analysis.guiding.unwrap();
    assert_eq!(guiding.rows_skipped, 3);
    assert_eq!(guiding.summary.unwrap().sample_count, 2);
}
