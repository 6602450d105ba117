//! HTTP client for the parking service

use async_trait::async_trait;
use parkdesk_api::{
    CollectionReceipt, DashboardData, EntryReceipt, ExitReceipt, HistoryPage, HistoryQuery,
    MonitorData, PricingRule, VehicleEntryInput,
};
use parkdesk_backend::{BackendError, BackendResult, ParkingBackend};
use parkdesk_util::{ChargeId, SessionId};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::documents;

#[derive(Serialize)]
struct GraphQlRequest<'a, V> {
    query: &'a str,
    #[serde(rename = "operationName")]
    operation_name: &'a str,
    variables: V,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

impl<T> GraphQlResponse<T> {
    fn error_messages(&mut self) -> Vec<String> {
        self.errors
            .take()
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.message)
            .collect()
    }
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct PricingRulesData {
    #[serde(rename = "pricingRules")]
    pricing_rules: Vec<PricingRule>,
}

#[derive(Deserialize)]
struct LogEntryData {
    #[serde(rename = "logVehicleEntry")]
    receipt: EntryReceipt,
}

#[derive(Deserialize)]
struct ProcessExitData {
    #[serde(rename = "processVehicleExit")]
    receipt: ExitReceipt,
}

#[derive(Deserialize)]
struct CollectPaymentData {
    #[serde(rename = "collectOverstayPayment")]
    receipt: CollectionReceipt,
}

#[derive(Deserialize)]
struct TransactionHistoryData {
    #[serde(rename = "transactionHistory")]
    page: HistoryPage,
}

/// Backend that talks to the parking service's GraphQL endpoint
pub struct GraphQlBackend {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl GraphQlBackend {
    /// Create a backend. `token` is sent as a bearer token when present.
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn execute<V, T>(&self, operation: &str, query: &str, variables: V) -> BackendResult<T>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        debug!(operation, endpoint = %self.endpoint, "Sending GraphQL request");

        let mut request = self.client.post(&self.endpoint).json(&GraphQlRequest {
            query,
            operation_name: operation,
            variables,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!(operation, error = %e, "GraphQL request failed");
            BackendError::Transport(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!(operation, status = status.as_u16(), "GraphQL request rejected");
            return Err(status_error(status, body));
        }

        let mut parsed: GraphQlResponse<T> = serde_json::from_str(&body).map_err(|e| {
            warn!(operation, error = %e, "Undecodable GraphQL response");
            BackendError::Protocol(format!("{operation}: {e}"))
        })?;

        let messages = parsed.error_messages();
        if !messages.is_empty() {
            warn!(operation, errors = ?messages, "GraphQL errors returned");
            return Err(BackendError::Remote(messages));
        }

        parsed
            .data
            .ok_or_else(|| BackendError::Protocol(format!("{operation}: response has no data")))
    }
}

/// Map a non-success status, preferring GraphQL error messages in the body
fn status_error(status: StatusCode, body: String) -> BackendError {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return BackendError::Unauthorized(body);
    }

    if let Ok(mut parsed) = serde_json::from_str::<GraphQlResponse<serde_json::Value>>(&body) {
        let messages = parsed.error_messages();
        if !messages.is_empty() {
            return BackendError::Remote(messages);
        }
    }

    BackendError::Status {
        status: status.as_u16(),
        body,
    }
}

#[async_trait]
impl ParkingBackend for GraphQlBackend {
    async fn fetch_monitor_data(&self) -> BackendResult<MonitorData> {
        self.execute("GetMonitorData", documents::GET_MONITOR_DATA, json!({}))
            .await
    }

    async fn fetch_pricing_rules(&self) -> BackendResult<Vec<PricingRule>> {
        let data: PricingRulesData = self
            .execute("GetPricingRules", documents::GET_PRICING_RULES, json!({}))
            .await?;
        Ok(data.pricing_rules)
    }

    async fn fetch_dashboard(&self) -> BackendResult<DashboardData> {
        self.execute("GetStatsData", documents::GET_STATS_DATA, json!({}))
            .await
    }

    async fn log_vehicle_entry(&self, input: &VehicleEntryInput) -> BackendResult<EntryReceipt> {
        let data: LogEntryData = self
            .execute("LogEntry", documents::LOG_ENTRY, json!({ "input": input }))
            .await?;
        Ok(data.receipt)
    }

    async fn process_vehicle_exit(&self, session_id: &SessionId) -> BackendResult<ExitReceipt> {
        let data: ProcessExitData = self
            .execute(
                "ProcessExit",
                documents::PROCESS_EXIT,
                json!({ "sessionId": session_id }),
            )
            .await?;
        Ok(data.receipt)
    }

    async fn collect_overstay_payment(
        &self,
        charge_id: &ChargeId,
    ) -> BackendResult<CollectionReceipt> {
        let data: CollectPaymentData = self
            .execute(
                "CollectPayment",
                documents::COLLECT_PAYMENT,
                json!({ "chargeId": charge_id }),
            )
            .await?;
        Ok(data.receipt)
    }

    async fn transaction_history(&self, query: &HistoryQuery) -> BackendResult<HistoryPage> {
        let data: TransactionHistoryData = self
            .execute("TransactionHistory", documents::TRANSACTION_HISTORY, query)
            .await?;
        Ok(data.page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_is_unauthorized() {
        let err = status_error(StatusCode::FORBIDDEN, "nope".into());
        assert!(matches!(err, BackendError::Unauthorized(_)));
    }

    #[test]
    fn error_body_on_bad_request_is_remote() {
        let body = r#"{"errors":[{"message":"Variable \"$sessionId\" is required"}]}"#;
        let err = status_error(StatusCode::BAD_REQUEST, body.into());
        match err {
            BackendError::Remote(messages) => assert_eq!(messages.len(), 1),
            other => panic!("Expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn plain_server_error_keeps_status() {
        let err = status_error(StatusCode::BAD_GATEWAY, "upstream down".into());
        assert!(matches!(err, BackendError::Status { status: 502, .. }));
    }

    #[test]
    fn request_envelope_shape() {
        let request = GraphQlRequest {
            query: documents::PROCESS_EXIT,
            operation_name: "ProcessExit",
            variables: json!({ "sessionId": "PS-1" }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["operationName"], "ProcessExit");
        assert_eq!(value["variables"]["sessionId"], "PS-1");
    }
}
