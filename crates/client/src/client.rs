use async_trait::async_trait;
use bankfeed_core::{Account, BankRule, NewTransaction};
use bankfeed_import::{
    ConfirmTransfersRequest, ConfirmTransfersResponse, EvaluateData, EvaluateRequest,
    EvaluateResponse,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::{LedgerApi, TransactionReceipt};
use crate::error::ClientError;

pub const TENANT_HEADER: &str = "x-company-id";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ClientConfig {
    pub base_url: String,
    pub company_id: String,
    pub token: Option<SecretString>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            company_id: company_id.into(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// HTTP client for the ledger REST API. Every request carries the bearer
/// token (when set) and the tenant header.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    company_id: String,
    token: Option<SecretString>,
}

#[derive(Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    flat: Vec<Account>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RulesPayload {
    Wrapped { data: Vec<BankRule> },
    Bare(Vec<BankRule>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RulePayload {
    Wrapped { data: BankRule },
    Bare(BankRule),
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.company_id.trim().is_empty() {
            return Err(ClientError::Config("company id is empty".to_string()));
        }
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::Config(format!("base URL {:?}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "base URL {:?} cannot carry a path",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        let tenant = HeaderValue::from_str(&config.company_id)
            .map_err(|e| ClientError::Config(format!("company id: {e}")))?;
        headers.insert(TENANT_HEADER, tenant);

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            company_id: config.company_id,
            token: config.token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!(%method, %url, "Ledger API request");
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(%status, body = %body, "Ledger API request failed");
        Err(ClientError::Server { status, body })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let bytes = self.send(builder).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl LedgerApi for ApiClient {
    fn company_id(&self) -> &str {
        &self.company_id
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, ClientError> {
        let builder = self
            .request(Method::GET, &["api", "accounts"])
            .query(&[("companyId", self.company_id.as_str())]);
        let response: AccountsResponse = self.send_json(builder).await?;
        Ok(response.flat)
    }

    async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluateData, ClientError> {
        let builder = self
            .request(Method::POST, &["api", "bank-rules", &self.company_id, "evaluate"])
            .json(request);
        let response: EvaluateResponse = self.send_json(builder).await?;
        Ok(response.data)
    }

    async fn confirm_transfers(
        &self,
        request: &ConfirmTransfersRequest,
    ) -> Result<ConfirmTransfersResponse, ClientError> {
        let builder = self
            .request(
                Method::POST,
                &["api", "bank-rules", &self.company_id, "transfers", "confirm"],
            )
            .json(request);
        self.send_json(builder).await
    }

    async fn create_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<TransactionReceipt, ClientError> {
        let builder = self
            .request(Method::POST, &["api", "transactions"])
            .json(transaction);
        let bytes = self.send(builder).await?.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))?
        };
        Ok(TransactionReceipt::from_body(body))
    }

    async fn list_rules(&self) -> Result<Vec<BankRule>, ClientError> {
        let builder = self.request(Method::GET, &["api", "bank-rules", &self.company_id]);
        Ok(match self.send_json(builder).await? {
            RulesPayload::Wrapped { data } => data,
            RulesPayload::Bare(rules) => rules,
        })
    }

    async fn upsert_rule(&self, rule: &BankRule) -> Result<BankRule, ClientError> {
        let builder = match rule.id.as_deref() {
            Some(id) => self.request(Method::PUT, &["api", "bank-rules", &self.company_id, id]),
            None => self.request(Method::POST, &["api", "bank-rules", &self.company_id]),
        };
        Ok(match self.send_json(builder.json(rule)).await? {
            RulePayload::Wrapped { data } => data,
            RulePayload::Bare(rule) => rule,
        })
    }

    async fn delete_rule(&self, id: &str) -> Result<(), ClientError> {
        let builder = self.request(Method::DELETE, &["api", "bank-rules", &self.company_id, id]);
        self.send(builder).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankfeed_core::{Money, StatementLine};
    use bankfeed_import::{PreviewTransaction, TransferPair};
    use reqwest::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, token: Option<&str>) -> ApiClient {
        let mut config = ClientConfig::new(server.uri(), "co_1");
        config.token = token.map(|t| SecretString::new(t.to_string()));
        ApiClient::new(config).unwrap()
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(matches!(
            ApiClient::new(ClientConfig::new("not a url", "co_1")),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ApiClient::new(ClientConfig::new("http://localhost", " ")),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn endpoint_encodes_segments_and_keeps_base_path() {
        let api = ApiClient::new(ClientConfig::new("http://ledger.test/erp/", "co 1")).unwrap();
        let url = api.endpoint(&["api", "bank-rules", "co 1", "evaluate"]);
        assert_eq!(url.as_str(), "http://ledger.test/erp/api/bank-rules/co%201/evaluate");
    }

    #[tokio::test]
    async fn list_accounts_sends_auth_and_tenant() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/accounts"))
            .and(query_param("companyId", "co_1"))
            .and(header("authorization", "Bearer secret-token"))
            .and(header("x-company-id", "co_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "flat": [{"id": 1, "name": "Checking", "type": "bank"}, {"id": "2", "name": "Rent"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let accounts = client(&server, Some("secret-token")).list_accounts().await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id.as_str(), "1");
    }

    #[tokio::test]
    async fn evaluate_posts_rows_and_unwraps_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/bank-rules/co_1/evaluate"))
            .and(body_json(json!({
                "transactions": [{"date": "2024-01-01", "amount": -12.5, "description": "Lunch"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"items": [{"category": "Meals"}], "transfers": [{"i": 0, "j": 1}]}
            })))
            .mount(&server)
            .await;

        let request = EvaluateRequest {
            transactions: vec![PreviewTransaction {
                date: "2024-01-01".into(),
                amount: Money::from_cents(-1_250),
                description: "Lunch".into(),
            }],
        };
        let data = client(&server, None).evaluate(&request).await.unwrap();
        assert_eq!(data.verdicts()[0].category.as_deref(), Some("Meals"));
        assert_eq!(data.transfers, vec![TransferPair::new(0, 1)]);
    }

    #[tokio::test]
    async fn non_success_status_is_a_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/bank-rules/co_1/evaluate"))
            .respond_with(ResponseTemplate::new(503).set_body_string("rule engine offline"))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .evaluate(&EvaluateRequest { transactions: vec![] })
            .await
            .unwrap_err();
        match err {
            ClientError::Server { status, ref body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "rule engine offline");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/bank-rules/co_1/transfers/confirm"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .confirm_transfers(&ConfirmTransfersRequest { pairs: vec![] })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn create_transaction_posts_camel_case_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/transactions"))
            .and(body_json(json!({
                "transactionType": "withdrawal",
                "amount": 50.0,
                "currency": "USD",
                "transactionDate": "2024-01-02",
                "status": "posted",
                "companyId": "co_1",
                "memo": "Gas",
                "category": null
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "tx_9"})))
            .mount(&server)
            .await;

        let tx = NewTransaction::from_statement_line(
            StatementLine {
                date: "2024-01-02",
                amount: Money::from_cents(-5_000),
                description: "Gas",
                category: None,
                is_transfer: false,
            },
            "co_1",
            "USD",
        )
        .unwrap();
        let receipt = client(&server, None).create_transaction(&tx).await.unwrap();
        assert_eq!(receipt.id.as_deref(), Some("tx_9"));
    }

    #[tokio::test]
    async fn upsert_chooses_post_or_put() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/bank-rules/co_1"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "data": {"id": "r_new", "conditions": [], "actions": [], "order": 0}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/bank-rules/co_1/r_7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "r_7", "order": 3, "isActive": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server, None);
        let mut rule: BankRule = serde_json::from_value(json!({"order": 0})).unwrap();
        assert_eq!(api.upsert_rule(&rule).await.unwrap().id.as_deref(), Some("r_new"));

        rule.id = Some("r_7".into());
        let updated = api.upsert_rule(&rule).await.unwrap();
        assert_eq!(updated.order, 3);
        assert!(!updated.is_active);
    }

    #[tokio::test]
    async fn list_and_delete_rules() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/bank-rules/co_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "r1", "order": 1}, {"id": "r2", "order": 2}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/bank-rules/co_1/r1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server, None);
        let rules = api.list_rules().await.unwrap();
        assert_eq!(rules.len(), 2);
        api.delete_rule("r1").await.unwrap();
    }
}
