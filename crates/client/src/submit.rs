use bankfeed_core::ValidationError;
use bankfeed_import::DraftRow;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{LedgerApi, TransactionReceipt};
use crate::error::ClientError;

/// What to do with the remaining rows once one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitPolicy {
    #[default]
    BestEffort,
    StopOnError,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("Skipped after an earlier failure")]
    Skipped,
}

#[derive(Debug)]
pub struct RowOutcome {
    pub index: usize,
    pub result: Result<TransactionReceipt, SubmitError>,
}

/// Per-row results of one submission, in the order rows were sent.
#[derive(Debug, Default)]
pub struct SubmitReport {
    pub outcomes: Vec<RowOutcome>,
}

impl SubmitReport {
    pub fn created(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &RowOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Posts drafts one at a time. Nothing already created is rolled back.
pub async fn submit_drafts<A>(api: &A, drafts: Vec<DraftRow>, policy: SubmitPolicy) -> SubmitReport
where
    A: LedgerApi + ?Sized,
{
    let mut report = SubmitReport::default();
    let mut halted = false;

    for draft in drafts {
        let index = draft.index;
        let result = if halted {
            Err(SubmitError::Skipped)
        } else {
            match draft.result {
                Ok(transaction) => api
                    .create_transaction(&transaction)
                    .await
                    .map_err(SubmitError::from),
                Err(e) => Err(SubmitError::from(e)),
            }
        };

        match &result {
            Ok(receipt) => info!(row = index, id = ?receipt.id, "Created transaction"),
            Err(SubmitError::Skipped) => {}
            Err(e) => {
                warn!(row = index, error = %e, "Row not submitted");
                halted = policy == SubmitPolicy::StopOnError;
            }
        }
        report.outcomes.push(RowOutcome { index, result });
    }

    info!(
        created = report.created(),
        failed = report.failed_count(),
        "Submission finished"
    );
    report
}
