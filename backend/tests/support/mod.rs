//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use astro_planner::models::time::parse_log_timestamp;
use astro_planner::models::Frame;
use chrono::NaiveDateTime;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with `PLANNER_*` (or any other) variables temporarily set.
///
/// Holds a process-wide lock so parallel tests never observe each other's
/// variables, and restores the previous values even if `f` panics.
///
/// `Some(v)` sets a variable, `None` removes it.
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    saved: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let saved = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { saved }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.saved.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

pub fn ts(raw: &str) -> NaiveDateTime {
    parse_log_timestamp(raw).unwrap()
}

/// Light frame taken on 2024-03-01 at `time` (`HH:MM:SS`).
pub fn light(target: &str, filter: &str, seconds: f64, time: &str) -> Frame {
    Frame::light(target, filter, seconds, ts(&format!("2024-03-01T{}", time)))
}

/// One NINA log line on 2024-03-01.
pub fn nina_line(time: &str, message: &str) -> String {
    format!("2024-03-01T{}|INFO|Sequence.cs|Run|1|{}", time, message)
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}
