// Derived batch views: progress snapshot and terminal summary

use progress_mirror::BatchProgress;
use recon_store::models::{BatchStatus, ReconciliationBatch};
use serde::Serialize;

/// Live status + progress percentage for one batch. Served from the
/// mirror when it has the batch, from the store otherwise.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusView {
    pub batch_id: uuid::Uuid,
    pub filename: String,
    pub status: String,
    pub total_transactions: i64,
    pub processed_count: i64,
    pub auto_matched_count: i64,
    pub needs_review_count: i64,
    pub unmatched_count: i64,
    pub progress_percent: i32,
}

impl BatchStatusView {
    pub fn from_batch(batch: &ReconciliationBatch) -> Self {
        BatchStatusView {
            batch_id: batch.id,
            filename: batch.filename.clone(),
            status: batch.status.clone(),
            total_transactions: batch.total_transactions as i64,
            processed_count: batch.processed_count as i64,
            auto_matched_count: batch.auto_matched_count as i64,
            needs_review_count: batch.needs_review_count as i64,
            unmatched_count: batch.unmatched_count as i64,
            progress_percent: progress_percent(
                batch.processed_count as i64,
                batch.total_transactions as i64,
                BatchStatus::parse(&batch.status).is_some_and(|s| s.is_terminal()),
            ),
        }
    }

    /// Overlay mirror counters onto the authoritative row. The mirror is
    /// advisory: authoritative terminal counters always win.
    pub fn from_mirror(batch: &ReconciliationBatch, progress: &BatchProgress) -> Self {
        let terminal = BatchStatus::parse(&batch.status).is_some_and(|s| s.is_terminal());
        if terminal {
            return Self::from_batch(batch);
        }

        BatchStatusView {
            batch_id: batch.id,
            filename: batch.filename.clone(),
            status: if progress.status.is_empty() {
                batch.status.clone()
            } else {
                progress.status.clone()
            },
            total_transactions: progress.total,
            processed_count: progress.processed,
            auto_matched_count: progress.auto_matched,
            needs_review_count: progress.needs_review,
            unmatched_count: progress.unmatched,
            progress_percent: progress_percent(progress.processed, progress.total, false),
        }
    }
}

fn progress_percent(processed: i64, total: i64, terminal: bool) -> i32 {
    if terminal {
        return 100;
    }
    if total <= 0 {
        return 0;
    }
    ((processed as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as i32
}

/// Terminal summary combining counters and timing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: uuid::Uuid,
    pub filename: String,
    pub status: String,
    pub total_transactions: i32,
    pub processed_count: i32,
    pub auto_matched_count: i32,
    pub needs_review_count: i32,
    pub unmatched_count: i32,
    pub auto_matched_percent: i32,
    pub needs_review_percent: i32,
    pub unmatched_percent: i32,
    pub duration_ms: Option<i64>,
    pub duration_human: Option<String>,
    pub rows_per_sec: Option<f64>,
}

impl BatchSummary {
    pub fn from_batch(batch: &ReconciliationBatch) -> Self {
        let terminal = BatchStatus::parse(&batch.status).is_some_and(|s| s.is_terminal());

        let duration_ms = if terminal {
            batch
                .completed_at
                .map(|done| (done - batch.started_at).num_milliseconds().max(0))
        } else {
            None
        };

        let rows_per_sec = duration_ms.and_then(|ms| {
            if ms == 0 {
                None
            } else {
                Some(batch.processed_count as f64 / ms as f64 * 1000.0)
            }
        });

        BatchSummary {
            batch_id: batch.id,
            filename: batch.filename.clone(),
            status: batch.status.clone(),
            total_transactions: batch.total_transactions,
            processed_count: batch.processed_count,
            auto_matched_count: batch.auto_matched_count,
            needs_review_count: batch.needs_review_count,
            unmatched_count: batch.unmatched_count,
            auto_matched_percent: whole_percent(batch.auto_matched_count, batch.processed_count),
            needs_review_percent: whole_percent(batch.needs_review_count, batch.processed_count),
            unmatched_percent: whole_percent(batch.unmatched_count, batch.processed_count),
            duration_ms,
            duration_human: duration_ms.map(format_duration),
            rows_per_sec,
        }
    }
}

fn whole_percent(part: i32, whole: i32) -> i32 {
    if whole <= 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as i32
}

/// `ms` under a second, `Ns` under a minute, `Mm Ss` beyond.
fn format_duration(ms: i64) -> String {
    if ms < 1000 {
        return format!("{ms}ms");
    }

    let total_seconds = ms / 1000;
    if total_seconds < 60 {
        return format!("{total_seconds}s");
    }

    format!("{}m {}s", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn batch(status: &str, duration_ms: i64) -> ReconciliationBatch {
        let started = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        ReconciliationBatch {
            id: Uuid::from_u128(1),
            filename: "statement.csv".to_string(),
            status: status.to_string(),
            total_transactions: 200,
            processed_count: 200,
            auto_matched_count: 120,
            needs_review_count: 50,
            unmatched_count: 30,
            started_at: started,
            completed_at: Some(started + Duration::milliseconds(duration_ms)),
            created_at: started,
        }
    }

    #[test]
    fn test_summary_rates_and_duration() {
        let summary = BatchSummary::from_batch(&batch("completed", 4000));

        assert_eq!(summary.auto_matched_percent, 60);
        assert_eq!(summary.needs_review_percent, 25);
        assert_eq!(summary.unmatched_percent, 15);
        assert_eq!(summary.duration_ms, Some(4000));
        assert_eq!(summary.duration_human.as_deref(), Some("4s"));
        assert_eq!(summary.rows_per_sec, Some(50.0));
    }

    #[test]
    fn test_summary_nonterminal_has_no_timing() {
        let mut b = batch("processing", 4000);
        b.completed_at = None;
        let summary = BatchSummary::from_batch(&b);

        assert_eq!(summary.duration_ms, None);
        assert_eq!(summary.duration_human, None);
        assert_eq!(summary.rows_per_sec, None);
    }

    #[test]
    fn test_summary_zero_duration_has_no_rate() {
        let summary = BatchSummary::from_batch(&batch("completed", 0));
        assert_eq!(summary.duration_ms, Some(0));
        assert_eq!(summary.rows_per_sec, None);
        assert_eq!(summary.duration_human.as_deref(), Some("0ms"));
    }

    #[test]
    fn test_format_duration_bands() {
        assert_eq!(format_duration(850), "850ms");
        assert_eq!(format_duration(12_000), "12s");
        assert_eq!(format_duration(125_000), "2m 5s");
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 0, false), 0);
        assert_eq!(progress_percent(50, 200, false), 25);
        assert_eq!(progress_percent(0, 0, true), 100);
    }

    #[test]
    fn test_status_view_prefers_authoritative_when_terminal() {
        let b = batch("completed", 1000);
        let stale = BatchProgress {
            total: 100,
            processed: 40,
            auto_matched: 10,
            needs_review: 10,
            unmatched: 20,
            status: "processing".to_string(),
        };

        let view = BatchStatusView::from_mirror(&b, &stale);
        assert_eq!(view.status, "completed");
        assert_eq!(view.processed_count, 200);
        assert_eq!(view.progress_percent, 100);
    }

    #[test]
    fn test_status_view_uses_mirror_in_flight() {
        let mut b = batch("processing", 0);
        b.completed_at = None;
        let live = BatchProgress {
            total: 0,
            processed: 75,
            auto_matched: 40,
            needs_review: 20,
            unmatched: 15,
            status: "processing".to_string(),
        };

        let view = BatchStatusView::from_mirror(&b, &live);
        assert_eq!(view.processed_count, 75);
        // Total unknown until the stream ends
        assert_eq!(view.progress_percent, 0);
    }
}
