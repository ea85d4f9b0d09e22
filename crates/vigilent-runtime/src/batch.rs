//! Bounded-concurrency analysis of many contracts.
//!
//! One bad record never fails the batch: invalid facts are reported as
//! rejected and the rest keep going.

use futures::stream::{self, StreamExt};
use serde::Serialize;

use vigilent_core::{AnalysisResult, ContractFacts};

use crate::orchestrator::{AnalysisError, AnalysisOrchestrator, AnalyzeOptions};

/// What happened to one record.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Analyzed { result: Box<AnalysisResult> },

    /// The facts failed validation
    Rejected { error: String },

    /// Valid facts, but the pipeline could not produce a result
    Failed { error: String },
}

/// One record's outcome, at its input position.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub index: usize,
    pub contract_id: String,
    #[serde(flatten)]
    pub outcome: RecordOutcome,
}

/// Counts over a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub analyzed: usize,
    pub ai_powered: usize,
    pub cached: usize,
    pub rejected: usize,
    pub failed: usize,
    pub tokens_used: u64,
}

impl BatchSummary {
    fn record(&mut self, outcome: &RecordOutcome) {
        self.total += 1;
        match outcome {
            RecordOutcome::Analyzed { result } => {
                self.analyzed += 1;
                if result.ai_powered() {
                    self.ai_powered += 1;
                }
                if result.from_cache() == Some(true) {
                    self.cached += 1;
                }
                self.tokens_used += u64::from(result.tokens_used().unwrap_or(0));
            }
            RecordOutcome::Rejected { .. } => self.rejected += 1,
            RecordOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Items in input order plus the summary.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    pub summary: BatchSummary,
}

/// Analyze `contracts` with at most `concurrency` in flight.
pub async fn analyze_batch(
    orchestrator: &AnalysisOrchestrator,
    contracts: Vec<ContractFacts>,
    options: &AnalyzeOptions,
    concurrency: usize,
) -> BatchReport {
    let concurrency = concurrency.max(1);
    tracing::info!(
        contracts = contracts.len(),
        concurrency,
        "Starting batch analysis"
    );

    let mut items: Vec<BatchItem> = stream::iter(contracts.into_iter().enumerate())
        .map(|(index, facts)| async move {
            let outcome = match orchestrator.analyze(&facts, options).await {
                Ok(result) => RecordOutcome::Analyzed {
                    result: Box::new(result),
                },
                Err(AnalysisError::InvalidFacts(e)) => {
                    tracing::warn!(index, contract_id = %facts.contract_id, error = %e, "Record rejected");
                    RecordOutcome::Rejected {
                        error: e.to_string(),
                    }
                }
                Err(e) => {
                    tracing::error!(index, contract_id = %facts.contract_id, error = %e, "Record failed");
                    RecordOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            BatchItem {
                index,
                contract_id: facts.contract_id,
                outcome,
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    items.sort_by_key(|item| item.index);

    let mut summary = BatchSummary::default();
    for item in &items {
        summary.record(&item.outcome);
    }

    tracing::info!(
        total = summary.total,
        analyzed = summary.analyzed,
        ai_powered = summary.ai_powered,
        cached = summary.cached,
        rejected = summary.rejected,
        failed = summary.failed,
        tokens_used = summary.tokens_used,
        "Batch analysis complete"
    );

    BatchReport { items, summary }
}
