pub mod api;
pub mod client;
pub mod error;
pub mod submit;
pub mod workflow;

#[cfg(test)]
mod mock;

pub use api::{LedgerApi, TransactionReceipt};
pub use client::{ApiClient, ClientConfig, DEFAULT_TIMEOUT, TENANT_HEADER};
pub use error::ClientError;
pub use submit::{submit_drafts, RowOutcome, SubmitError, SubmitPolicy, SubmitReport};
pub use workflow::{confirm_transfers, preview_rules, submit_selected, FlowError};
