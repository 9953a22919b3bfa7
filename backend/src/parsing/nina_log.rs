//! NINA session log parser.
//!
//! Lines follow `TIMESTAMP|LEVEL|source|member|line|message`. Every line with
//! that layout becomes exactly one [`SessionEvent`]; everything else is only
//! counted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::time::{checked_add_seconds, parse_log_timestamp};
use crate::models::{Activity, Phase, SessionEvent};

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<ts>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?)\|[A-Z]+\|[^|]*\|[^|]*\|\d+\|(?P<msg>.*)$",
    )
    .expect("valid NINA line pattern")
});

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("valid NINA message pattern")
}

struct Patterns {
    autofocus_start: Regex,
    autofocus_done: Regex,
    center_start: Regex,
    center_finish: Regex,
    wait_time: Regex,
    wait_altitude: Regex,
    wait_safe: Regex,
    wait_end: Regex,
    exposure: Regex,
    dither: Regex,
    flip_start: Regex,
    flip_physical_start: Regex,
    flip_done: Regex,
}

static PATTERNS: Lazy<Patterns> = Lazy::new(|| Patterns {
    autofocus_start: pattern(r"\bStarting Category:\s*Focuser,\s*Item:\s*RunAutofocus\b"),
    autofocus_done: pattern(r"\bAutoFocus completed\b"),
    center_start: pattern(r"\bStarting Category:\s*Telescope,\s*Item:\s*Center\b"),
    center_finish: pattern(r"\bFinishing Category:\s*Telescope,\s*Item:\s*Center\b"),
    wait_time: pattern(r"\bStarting Category:\s*Utility,\s*Item:\s*WaitForTime\b"),
    wait_altitude: pattern(r"\bStarting Category:\s*Utility,\s*Item:\s*WaitForAltitude\b"),
    wait_safe: pattern(r"\bStarting Category:\s*Safety Monitor,\s*Item:\s*WaitUntilSafe\b"),
    wait_end: pattern(r"\bFinishing Category:\s*(?P<category>Utility|Safety Monitor),"),
    exposure: pattern(r"\bStarting Exposure - Exposure Time:\s*(?P<exp>[0-9]+(?:\.[0-9]+)?)s\b"),
    dither: pattern(
        r"\b(?:Starting Category:\s*Guider,\s*Item:\s*Dither|Starting Trigger:\s*DitherAfterExposures|Dithering)\b",
    ),
    flip_start: pattern(
        r"(?i)(?:Meridian Flip.*(?:Initializing Meridian Flip|Starting Meridian Flip|DoMeridianFlip|DoFlip|Starting Trigger: MeridianFlipTrigger)|Initializing Meridian Flip)",
    ),
    flip_physical_start: pattern(
        r"(?i)(?:AscomTelescope\.cs\|MeridianFlip.*Slewing to coordinates|Meridian Flip - Scope will flip to coordinates|MeridianFlipVM\.cs\|DoFlip)",
    ),
    flip_done: pattern(
        r"(?i)(?:Meridian Flip.*(?:Recenter after meridian flip|Resuming Autoguider|completed|finished|Exiting meridian flip)|ResumeAutoguider|Exiting meridian flip)",
    ),
});

/// Line accounting for a parsed log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineCounters {
    pub lines_total: usize,
    pub lines_matched: usize,
    pub lines_skipped_for_timestamp: usize,
    /// Exposure lines whose duration does not fit on the timeline.
    #[serde(default)]
    pub lines_skipped_for_exposure: usize,
}

/// A NINA log reduced to typed events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NinaLog {
    pub events: Vec<SessionEvent>,
    pub counters: LineCounters,
}

/// Classify the message of one log line. `None` for an exposure too long to
/// place on the timeline.
///
/// `line` is the whole raw line; flip markers reference source files and
/// members, so they are matched against it rather than the message alone.
fn classify(ts: chrono::NaiveDateTime, line: &str, msg: &str) -> Option<SessionEvent> {
    let p = &*PATTERNS;
    let activity = |activity: Activity, phase: Phase| SessionEvent::Activity {
        timestamp: ts,
        activity,
        phase,
    };

    if p.autofocus_start.is_match(msg) {
        return Some(SessionEvent::Autofocus {
            timestamp: ts,
            phase: Phase::Start,
        });
    }
    if p.autofocus_done.is_match(msg) {
        return Some(SessionEvent::Autofocus {
            timestamp: ts,
            phase: Phase::Finish,
        });
    }
    if p.center_start.is_match(msg) {
        return Some(activity(Activity::Center, Phase::Start));
    }
    if p.center_finish.is_match(msg) {
        return Some(activity(Activity::Center, Phase::Finish));
    }
    if p.wait_time.is_match(msg) {
        return Some(activity(Activity::Wait("WaitForTime".into()), Phase::Start));
    }
    if p.wait_altitude.is_match(msg) {
        return Some(activity(Activity::Wait("WaitForAltitude".into()), Phase::Start));
    }
    if p.wait_safe.is_match(msg) {
        return Some(activity(Activity::Wait("WaitUntilSafe".into()), Phase::Start));
    }
    if let Some(caps) = p.wait_end.captures(msg) {
        return Some(activity(Activity::Wait(caps["category"].to_string()), Phase::Finish));
    }
    if let Some(caps) = p.exposure.captures(msg) {
        if let Ok(seconds) = caps["exp"].parse::<f64>() {
            checked_add_seconds(ts, seconds)?;
            return Some(activity(Activity::Exposure(seconds), Phase::Start));
        }
    }
    if p.dither.is_match(msg) {
        return Some(SessionEvent::Dither { timestamp: ts });
    }
    if p.flip_physical_start.is_match(line) {
        return Some(activity(Activity::MeridianFlip { physical: true }, Phase::Start));
    }
    if p.flip_start.is_match(line) {
        return Some(activity(Activity::MeridianFlip { physical: false }, Phase::Start));
    }
    if p.flip_done.is_match(line) {
        return Some(activity(Activity::MeridianFlip { physical: false }, Phase::Finish));
    }

    Some(SessionEvent::Unrecognized {
        timestamp: ts,
        message: msg.to_string(),
    })
}

/// Parse NINA log text into typed events.
///
/// Lines without the NINA layout are counted in `lines_total` only. Lines
/// with the layout but an invalid timestamp are counted as matched and as
/// skipped. No line is ever fatal.
pub fn parse_nina_log(text: &str) -> NinaLog {
    let mut log = NinaLog::default();
    for line in text.lines() {
        log.counters.lines_total += 1;
        let line = line.trim_end_matches('\r');
        let Some(caps) = LINE_RE.captures(line) else {
            continue;
        };
        log.counters.lines_matched += 1;
        let Some(ts) = parse_log_timestamp(&caps["ts"]) else {
            log.counters.lines_skipped_for_timestamp += 1;
            log::debug!("Skipping NINA line with bad timestamp: {}", &caps["ts"]);
            continue;
        };
        match classify(ts, line, &caps["msg"]) {
            Some(event) => log.events.push(event),
            None => {
                log.counters.lines_skipped_for_exposure += 1;
                log::debug!("Skipping NINA exposure line out of range: {}", line);
            }
        }
    }
    log::info!(
        "Parsed NINA log: {} lines, {} matched, {} skipped for timestamp",
        log.counters.lines_total,
        log.counters.lines_matched,
        log.counters.lines_skipped_for_timestamp
    );
    log
}
