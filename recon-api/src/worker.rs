// Batch worker - consumes one job: stream rows, match, bulk-persist

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use job_queue::{BatchJob, JobHandler};
use match_engine::{match_transaction, CandidateInvoice, MatchClassification, TransactionFacts};
use progress_mirror::{ProgressDelta, ProgressMirror};
use recon_store::models::{
    AuditAction, BatchStatus, CandidateInvoiceRow, NewAuditEntry, NewBankTransaction,
};
use recon_store::ReconStore;
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::csv_stream::{CsvStream, ParsedRow};
use crate::error::WorkerError;
use crate::metrics::METRICS;
use crate::transitions::SYSTEM_ACTOR;

/// Rows buffered before each bulk write. Bounds worker memory and gives
/// one candidate query plus one insert per chunk.
pub const CHUNK_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, Default)]
struct RunningCounters {
    total: i32,
    auto_matched: i32,
    needs_review: i32,
    unmatched: i32,
}

pub struct BatchWorker {
    store: ReconStore,
    mirror: Arc<dyn ProgressMirror>,
}

impl BatchWorker {
    pub fn new(store: ReconStore, mirror: Arc<dyn ProgressMirror>) -> Self {
        BatchWorker { store, mirror }
    }

    /// Process one uploaded file. Terminal status, mirror update and file
    /// cleanup happen on every exit path; errors are rethrown so a
    /// persistent queue can redeliver.
    pub async fn process(&self, batch_id: Uuid, file_path: &Path) -> Result<(), WorkerError> {
        let started = Instant::now();
        info!("Processing batch {} from {}", batch_id, file_path.display());

        let result = self.run(batch_id, file_path).await;

        match &result {
            Ok(counters) => {
                METRICS.batches_completed_total.inc();
                METRICS
                    .batch_processing_duration_seconds
                    .observe(started.elapsed().as_secs_f64());
                info!(
                    "Batch {} completed: {} rows ({} auto, {} review, {} unmatched) in {:?}",
                    batch_id,
                    counters.total,
                    counters.auto_matched,
                    counters.needs_review,
                    counters.unmatched,
                    started.elapsed()
                );
            }
            Err(e) => {
                error!("Batch {} failed: {}", batch_id, e);
                METRICS.batches_failed_total.inc();

                if let Err(mark_err) = self.store.mark_batch_failed(batch_id).await {
                    error!("Failed to mark batch {} failed: {}", batch_id, mark_err);
                }
                self.mirror
                    .set_status(batch_id, BatchStatus::Failed.as_str())
                    .await;
            }
        }

        // The spool file is removed on success and failure alike
        if let Err(e) = std::fs::remove_file(file_path) {
            warn!(
                "Could not remove upload file {}: {}",
                file_path.display(),
                e
            );
        }

        result.map(|_| ())
    }

    async fn run(&self, batch_id: Uuid, file_path: &Path) -> Result<RunningCounters, WorkerError> {
        // Re-delivered jobs start from a clean slate
        self.store.reset_batch_for_processing(batch_id).await?;
        self.mirror.init(batch_id).await;

        let stream = CsvStream::open(file_path)?;

        let mut chunk: Vec<ParsedRow> = Vec::with_capacity(CHUNK_SIZE);
        let mut counters = RunningCounters::default();

        for row in stream {
            chunk.push(row);
            if chunk.len() == CHUNK_SIZE {
                self.flush_chunk(batch_id, &mut chunk, &mut counters).await?;
            }
        }
        if !chunk.is_empty() {
            self.flush_chunk(batch_id, &mut chunk, &mut counters).await?;
        }

        // One authoritative counter write: processed equals total
        self.store
            .finalize_batch_counters(
                batch_id,
                counters.total,
                counters.auto_matched,
                counters.needs_review,
                counters.unmatched,
            )
            .await?;
        self.mirror.set_total(batch_id, counters.total as i64).await;

        self.write_auto_match_audit(batch_id).await?;

        self.store.mark_batch_completed(batch_id).await?;
        self.mirror
            .set_status(batch_id, BatchStatus::Completed.as_str())
            .await;

        Ok(counters)
    }

    async fn flush_chunk(
        &self,
        batch_id: Uuid,
        chunk: &mut Vec<ParsedRow>,
        counters: &mut RunningCounters,
    ) -> Result<(), WorkerError> {
        // Unique amounts in the chunk, keyed by their 2-decimal string
        let mut unique_amounts: BTreeMap<String, Decimal> = BTreeMap::new();
        for row in chunk.iter() {
            unique_amounts
                .entry(format!("{:.2}", row.amount))
                .or_insert(row.amount);
        }
        let amounts: Vec<Decimal> = unique_amounts.values().copied().collect();

        let candidates_by_amount = self
            .store
            .find_candidate_invoices_by_amounts(&amounts)
            .await?;

        let mut rows: Vec<NewBankTransaction> = Vec::with_capacity(chunk.len());
        let mut delta = ProgressDelta::default();

        for parsed in chunk.drain(..) {
            let amount_key = format!("{:.2}", parsed.amount);
            let candidates: Vec<CandidateInvoice> = candidates_by_amount
                .get(&amount_key)
                .map(|rows| rows.iter().map(to_candidate).collect())
                .unwrap_or_default();

            let facts = TransactionFacts {
                description: parsed.description.clone(),
                transaction_date: parsed.transaction_date,
            };
            let outcome = match_transaction(&facts, &candidates);

            counters.total += 1;
            delta.processed += 1;
            match outcome.classification {
                MatchClassification::AutoMatched => {
                    counters.auto_matched += 1;
                    delta.auto_matched += 1;
                }
                MatchClassification::NeedsReview => {
                    counters.needs_review += 1;
                    delta.needs_review += 1;
                }
                MatchClassification::Unmatched => {
                    counters.unmatched += 1;
                    delta.unmatched += 1;
                }
            }
            METRICS
                .match_outcomes_total
                .with_label_values(&[outcome.classification.as_str()])
                .inc();

            let confidence = Decimal::from_f64_retain(outcome.confidence)
                .map(|score| score.round_dp(2));

            let match_details = serde_json::json!({
                "breakdown": outcome.breakdown,
                "explanation": outcome.explanation,
                "matchedInvoiceNumber": outcome.matched_invoice_number,
            });

            rows.push(NewBankTransaction {
                upload_batch_id: batch_id,
                transaction_date: parsed.transaction_date,
                description: parsed.description,
                amount: parsed.amount,
                reference_number: parsed.reference_number,
                status: outcome.classification.as_str().to_string(),
                matched_invoice_id: outcome.matched_invoice_id,
                confidence_score: confidence,
                match_details,
            });
        }

        let inserted = self.store.bulk_insert_transactions(&rows).await?;
        METRICS.rows_processed_total.inc_by(inserted);

        // Live progress is advisory; failures are logged inside the mirror
        self.mirror.increment(batch_id, &delta).await;

        Ok(())
    }

    /// Write one system audit row per auto-matched insert. Transaction
    /// ids are recovered with a bounded per-batch query, then appended in
    /// a single bulk insert.
    async fn write_auto_match_audit(&self, batch_id: Uuid) -> Result<(), WorkerError> {
        let auto_matched = self.store.find_auto_matched_for_audit(batch_id).await?;
        if auto_matched.is_empty() {
            return Ok(());
        }

        let entries: Vec<NewAuditEntry> = auto_matched
            .iter()
            .map(|row| {
                let confidence = row
                    .confidence_score
                    .map(|score| score.to_string())
                    .unwrap_or_else(|| "0".to_string());
                NewAuditEntry {
                    transaction_id: row.id,
                    action: AuditAction::AutoMatched.as_str().to_string(),
                    previous_invoice_id: None,
                    new_invoice_id: Some(row.matched_invoice_id),
                    performed_by: SYSTEM_ACTOR.to_string(),
                    reason: Some(format!("Auto-matched with {confidence}% confidence")),
                }
            })
            .collect();

        let written = self.store.bulk_insert_audit(&entries).await?;
        info!(
            "Wrote {} auto-match audit entries for batch {}",
            written, batch_id
        );
        Ok(())
    }
}

fn to_candidate(row: &CandidateInvoiceRow) -> CandidateInvoice {
    CandidateInvoice {
        id: row.id,
        invoice_number: row.invoice_number.clone(),
        customer_name: row.customer_name.clone(),
        due_date: row.due_date,
    }
}

#[async_trait]
impl JobHandler for BatchWorker {
    async fn handle(&self, job: BatchJob) -> anyhow::Result<()> {
        self.process(job.batch_id, Path::new(&job.file_path))
            .await
            .map_err(Into::into)
    }
}
