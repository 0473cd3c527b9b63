//! In-memory ledger used by the workflow tests.

use async_trait::async_trait;
use bankfeed_core::{Account, BankRule, NewTransaction};
use bankfeed_import::{
    ConfirmTransfersRequest, ConfirmTransfersResponse, EvaluateData, EvaluateRequest,
    ImportSession, ParseOptions,
};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::{Arc, Mutex};

use crate::api::{LedgerApi, TransactionReceipt};
use crate::error::ClientError;

#[derive(Default)]
pub struct MockLedger {
    evaluate_data: EvaluateData,
    fail_memo: Option<String>,
    fail_confirm: bool,
    reparse: Option<(Arc<tokio::sync::Mutex<ImportSession>>, String)>,
    created: Mutex<Vec<NewTransaction>>,
    confirmed: Mutex<Vec<ConfirmTransfersRequest>>,
    evaluated: Mutex<Vec<EvaluateRequest>>,
}

impl MockLedger {
    pub fn with_evaluate(mut self, data: EvaluateData) -> Self {
        self.evaluate_data = data;
        self
    }

    pub fn fail_create_on(mut self, memo: &str) -> Self {
        self.fail_memo = Some(memo.to_string());
        self
    }

    pub fn fail_confirm(mut self) -> Self {
        self.fail_confirm = true;
        self
    }

    /// Re-parses `session` with `text` while an evaluate call is in flight.
    pub fn reparse_during_evaluate(
        mut self,
        session: Arc<tokio::sync::Mutex<ImportSession>>,
        text: &str,
    ) -> Self {
        self.reparse = Some((session, text.to_string()));
        self
    }

    pub fn created(&self) -> Vec<NewTransaction> {
        self.created.lock().unwrap().clone()
    }

    pub fn confirmed(&self) -> Vec<ConfirmTransfersRequest> {
        self.confirmed.lock().unwrap().clone()
    }

    pub fn evaluated(&self) -> Vec<EvaluateRequest> {
        self.evaluated.lock().unwrap().clone()
    }

    fn server_error() -> ClientError {
        ClientError::Server {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".to_string(),
        }
    }
}

#[async_trait]
impl LedgerApi for MockLedger {
    fn company_id(&self) -> &str {
        "co_test"
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, ClientError> {
        Ok(vec![
            Account::new("1", "Operating Checking"),
            Account::new("2", "Rent Expense"),
            Account::new("3", "Reserve Savings"),
        ])
    }

    async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluateData, ClientError> {
        self.evaluated.lock().unwrap().push(request.clone());
        if let Some((session, text)) = &self.reparse {
            session
                .lock()
                .await
                .parse(text, &ParseOptions::default())
                .unwrap();
        }
        Ok(self.evaluate_data.clone())
    }

    async fn confirm_transfers(
        &self,
        request: &ConfirmTransfersRequest,
    ) -> Result<ConfirmTransfersResponse, ClientError> {
        if self.fail_confirm {
            return Err(Self::server_error());
        }
        self.confirmed.lock().unwrap().push(request.clone());
        Ok(ConfirmTransfersResponse {
            created_count: request.pairs.len(),
        })
    }

    async fn create_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<TransactionReceipt, ClientError> {
        if self.fail_memo.as_deref() == Some(transaction.memo.as_str()) {
            return Err(Self::server_error());
        }
        let mut created = self.created.lock().unwrap();
        created.push(transaction.clone());
        Ok(TransactionReceipt::from_body(json!({ "id": created.len() })))
    }

    async fn list_rules(&self) -> Result<Vec<BankRule>, ClientError> {
        Ok(Vec::new())
    }

    async fn upsert_rule(&self, rule: &BankRule) -> Result<BankRule, ClientError> {
        Ok(rule.clone())
    }

    async fn delete_rule(&self, _id: &str) -> Result<(), ClientError> {
        Ok(())
    }
}
