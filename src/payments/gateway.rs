use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-request ceiling; the poll loop has its own overall attempt ceiling.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushRequest {
    pub amount: i64,
    pub phone: String,
    /// Account reference shown to the payer; the booking id.
    pub reference: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Pending,
    Completed,
    Failed,
}

impl GatewayStatus {
    /// Maps the gateway's wording onto the three states the poller cares about.
    /// Anything unrecognised is inconclusive.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" | "success" | "successful" | "paid" => GatewayStatus::Completed,
            "failed" | "cancelled" | "canceled" | "declined" => GatewayStatus::Failed,
            _ => GatewayStatus::Pending,
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment gateway rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// The mobile-money push-payment service.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Sends the payment prompt to the payer's phone. `None` when the gateway
    /// accepted the call but returned no transaction reference.
    async fn initiate(&self, request: &PushRequest) -> Result<Option<String>, GatewayError>;

    async fn status(&self, reference: &str) -> Result<GatewayStatus, GatewayError>;
}

pub type SharedGateway = Arc<dyn PaymentGateway>;

#[derive(Deserialize)]
struct PushResponse {
    #[serde(default, alias = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
}

/// JSON-over-HTTP gateway: `POST {base}/push` and `GET {base}/status/{reference}`.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, GatewayError> {
        let client = reqwest::ClientBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(HttpGateway {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Rejected { status: status.as_u16(), body })
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn initiate(&self, request: &PushRequest) -> Result<Option<String>, GatewayError> {
        let response = self
            .authorize(self.client.post(format!("{}/push", self.base_url)))
            .json(request)
            .send()
            .await?;
        let body: PushResponse = Self::checked(response).await?.json().await?;

        Ok(body.checkout_request_id.filter(|reference| !reference.is_empty()))
    }

    async fn status(&self, reference: &str) -> Result<GatewayStatus, GatewayError> {
        let response = self
            .authorize(self.client.get(format!("{}/status/{reference}", self.base_url)))
            .send()
            .await?;
        let body: StatusResponse = Self::checked(response).await?.json().await?;

        Ok(GatewayStatus::from_wire(&body.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_wire_status_is_inconclusive() {
        assert_eq!(GatewayStatus::from_wire("COMPLETED"), GatewayStatus::Completed);
        assert_eq!(GatewayStatus::from_wire("failed"), GatewayStatus::Failed);
        assert_eq!(GatewayStatus::from_wire("processing"), GatewayStatus::Pending);
        assert_eq!(GatewayStatus::from_wire(""), GatewayStatus::Pending);
    }
}
