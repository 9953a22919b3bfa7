//! Drains scan messages into a [`FrameCollection`].

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::collection::FrameCollection;
use super::messages::{parse_message, IngestMessage};

/// Why ingestion stopped. Frames received before stopping are kept in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestOutcome {
    /// A `done` message arrived.
    Completed,
    /// The caller cancelled the scan.
    Cancelled,
    /// The producer went away without `done`.
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub outcome: IngestOutcome,
    pub frames_received: usize,
    pub malformed_lines: usize,
    pub frames_rejected: usize,
}

impl IngestReport {
    fn new() -> Self {
        Self {
            outcome: IngestOutcome::Disconnected,
            frames_received: 0,
            malformed_lines: 0,
            frames_rejected: 0,
        }
    }
}

/// Apply one message. Returns `true` once the message ends the scan.
pub fn apply_message(
    collection: &FrameCollection,
    message: IngestMessage,
    report: &mut IngestReport,
) -> bool {
    collection.set_progress(message.progress());
    match message {
        IngestMessage::Progress { .. } => false,
        IngestMessage::Frame { frame, .. } => {
            collection.push(frame);
            report.frames_received += 1;
            false
        }
        IngestMessage::Done {
            frames,
            rejection_data,
            ..
        } => {
            report.frames_received += frames.len();
            collection.extend(frames);
            if let Some(data) = rejection_data {
                report.frames_rejected += collection.apply_rejections(&data.rejected_frames);
            }
            report.outcome = IngestOutcome::Completed;
            true
        }
    }
}

/// Ingest a complete NDJSON body.
///
/// Lines after `done` are ignored. Without a `done` line the outcome is
/// [`IngestOutcome::Disconnected`] but every frame read so far is kept.
pub fn ingest_text(text: &str, collection: &FrameCollection) -> IngestReport {
    let mut report = IngestReport::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_message(line) {
            Some(message) => {
                if apply_message(collection, message, &mut report) {
                    break;
                }
            }
            None => report.malformed_lines += 1,
        }
    }
    log_report(&report);
    report
}

/// Consume lines from a channel until `done`, channel closure or cancellation.
pub async fn consume_lines(
    mut lines: mpsc::Receiver<String>,
    collection: FrameCollection,
    cancel: CancellationToken,
) -> IngestReport {
    let mut report = IngestReport::new();
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                report.outcome = IngestOutcome::Cancelled;
                break;
            }

            line = lines.recv() => {
                let Some(line) = line else {
                    report.outcome = IngestOutcome::Disconnected;
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_message(&line) {
                    Some(message) => {
                        if apply_message(&collection, message, &mut report) {
                            break;
                        }
                    }
                    None => report.malformed_lines += 1,
                }
            }
        }
    }
    log_report(&report);
    report
}

fn log_report(report: &IngestReport) {
    match report.outcome {
        IngestOutcome::Completed => log::info!(
            "Ingest completed: {} frames, {} malformed lines, {} rejected",
            report.frames_received,
            report.malformed_lines,
            report.frames_rejected
        ),
        IngestOutcome::Cancelled => log::info!(
            "Ingest cancelled after {} frames",
            report.frames_received
        ),
        IngestOutcome::Disconnected => log::warn!(
            "Ingest stream ended without done after {} frames",
            report.frames_received
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_line(target: &str, scanned: u64) -> String {
        format!(
            r#"{{"type":"frame","frame":{{"target":"{}","filter":"Ha","exposure_s":300,"date":"2024-03-01T22:00:00","frameType":"LIGHT"}},"files_scanned":{},"files_matched":{}}}"#,
            target, scanned, scanned
        )
    }

    #[test]
    fn test_ingest_text_counts_malformed() {
        let text = format!(
            "{}\n{{broken\n{}\n{}\n",
            frame_line("M42", 1),
            frame_line("M31", 2),
            r#"{"type":"done","files_scanned":2,"files_matched":2}"#
        );
        let collection = FrameCollection::new();
        let report = ingest_text(&text, &collection);
        assert_eq!(report.outcome, IngestOutcome::Completed);
        assert_eq!(report.frames_received, 2);
        assert_eq!(report.malformed_lines, 1);
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.progress().files_scanned, 2);
    }

    #[test]
    fn test_ingest_text_without_done_keeps_frames() {
        let collection = FrameCollection::new();
        let report = ingest_text(&frame_line("M42", 1), &collection);
        assert_eq!(report.outcome, IngestOutcome::Disconnected);
        assert_eq!(collection.len(), 1);
    }

    #[tokio::test]
    async fn test_consume_until_done() {
        let (tx, rx) = mpsc::channel(8);
        let collection = FrameCollection::new();
        let task = tokio::spawn(consume_lines(rx, collection.clone(), CancellationToken::new()));

        tx.send(frame_line("M42", 1)).await.unwrap();
        tx.send(String::new()).await.unwrap();
        tx.send(r#"{"type":"done","filesScanned":1,"filesMatched":1}"#.to_string())
            .await
            .unwrap();

        let report = task.await.unwrap();
        assert_eq!(report.outcome, IngestOutcome::Completed);
        assert_eq!(collection.len(), 1);
    }

    #[tokio::test]
    async fn test_consume_disconnected() {
        let (tx, rx) = mpsc::channel(8);
        let collection = FrameCollection::new();
        tx.send(frame_line("M42", 1)).await.unwrap();
        drop(tx);
        let report = consume_lines(rx, collection.clone(), CancellationToken::new()).await;
        assert_eq!(report.outcome, IngestOutcome::Disconnected);
        assert_eq!(report.frames_received, 1);
        assert_eq!(collection.len(), 1);
    }

    #[tokio::test]
    async fn test_consume_cancelled_keeps_partial_frames() {
        let (tx, rx) = mpsc::channel(8);
        let collection = FrameCollection::new();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(consume_lines(rx, collection.clone(), cancel.clone()));

        tx.send(frame_line("M42", 1)).await.unwrap();
        // Wait until the frame has been applied before cancelling.
        while collection.is_empty() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();

        let report = task.await.unwrap();
        assert_eq!(report.outcome, IngestOutcome::Cancelled);
        assert_eq!(collection.len(), 1);
        drop(tx);
    }
}
