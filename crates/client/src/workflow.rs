//! Drives an [`ImportSession`] through the remote steps of an import.
//!
//! The session lock is held only while building a request and while
//! applying its response, never across the network call. A session that
//! was re-parsed in between rejects the late response.

use bankfeed_import::{ImportSession, PreviewSummary, WorkflowError};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::api::LedgerApi;
use crate::error::ClientError;
use crate::submit::{submit_drafts, SubmitPolicy, SubmitReport};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Asks the server to evaluate bank rules against every parsed row.
pub async fn preview_rules<A>(api: &A, session: &Mutex<ImportSession>) -> Result<PreviewSummary, FlowError>
where
    A: LedgerApi + ?Sized,
{
    let ticket = session.lock().await.begin_preview()?;
    let data = api.evaluate(&ticket.request).await?;
    let summary = session.lock().await.apply_preview(ticket.generation, data)?;
    Ok(summary)
}

/// Posts the edited transfer candidates. The session must already be
/// confirming transfers. Returns the server's created count.
pub async fn confirm_transfers<A>(api: &A, session: &Mutex<ImportSession>) -> Result<usize, FlowError>
where
    A: LedgerApi + ?Sized,
{
    let ticket = session.lock().await.transfer_confirmation()?;
    let response = api.confirm_transfers(&ticket.request).await?;
    session
        .lock()
        .await
        .mark_transfers_confirmed(ticket.generation, response.created_count)?;
    Ok(response.created_count)
}

/// Creates one ledger transaction per selected row.
pub async fn submit_selected<A>(
    api: &A,
    session: &Mutex<ImportSession>,
    policy: SubmitPolicy,
) -> Result<SubmitReport, FlowError>
where
    A: LedgerApi + ?Sized,
{
    let (generation, drafts) = {
        let session = session.lock().await;
        (session.generation(), session.drafts(api.company_id())?)
    };
    info!(rows = drafts.len(), ?policy, "Submitting selected rows");

    let report = submit_drafts(api, drafts, policy).await;

    let mut session = session.lock().await;
    if session.generation() == generation {
        session.mark_submitted()?;
    } else {
        warn!("Session changed during submission; leaving its stage untouched");
    }
    Ok(report)
}
