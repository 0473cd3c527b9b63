use async_trait::async_trait;
use bankfeed_core::{Account, BankRule, NewTransaction};
use bankfeed_import::{ConfirmTransfersRequest, ConfirmTransfersResponse, EvaluateData, EvaluateRequest};
use serde_json::Value;

use crate::error::ClientError;

/// What the ledger service returned for a created transaction. Only the id
/// is interpreted; the full body is kept for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionReceipt {
    pub id: Option<String>,
    pub raw: Value,
}

impl TransactionReceipt {
    /// Reads the id from either the top level or a `data` envelope.
    pub fn from_body(raw: Value) -> Self {
        let id = [raw.get("id"), raw.get("data").and_then(|d| d.get("id"))]
            .into_iter()
            .flatten()
            .find_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        Self { id, raw }
    }
}

/// The ledger endpoints the import workflow depends on.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Tenant every call is scoped to.
    fn company_id(&self) -> &str;

    async fn list_accounts(&self) -> Result<Vec<Account>, ClientError>;

    async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluateData, ClientError>;

    async fn confirm_transfers(
        &self,
        request: &ConfirmTransfersRequest,
    ) -> Result<ConfirmTransfersResponse, ClientError>;

    async fn create_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<TransactionReceipt, ClientError>;

    async fn list_rules(&self) -> Result<Vec<BankRule>, ClientError>;

    /// Creates the rule when it has no id, replaces it otherwise.
    async fn upsert_rule(&self, rule: &BankRule) -> Result<BankRule, ClientError>;

    async fn delete_rule(&self, id: &str) -> Result<(), ClientError>;
}
