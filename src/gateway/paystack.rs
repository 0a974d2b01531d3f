//! Paystack-compatible HTTP client.
//!
//! Every response arrives wrapped as `{"status": bool, "message": str, "data": T}`.
//! `status: false` or a non-2xx code is a rejection carrying the gateway's
//! message; anything that prevents reading that envelope is a transport error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use url::Url;

use super::{
    Bank, CheckoutRequest, CheckoutSession, GatewayBalance, GatewayError, GatewayRefund,
    NewRecipient, PaymentGateway, RefundInstruction, ResolvedAccount, TransactionVerification,
    Transfer, TransferInstruction, TransferRecipient,
};

/// Response envelope shared by every gateway endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

/// Reqwest-backed [`PaymentGateway`].
#[derive(Debug, Clone)]
pub struct PaystackClient {
    http: Client,
    base_url: Url,
    secret_key: String,
}

impl PaystackClient {
    /// Build a client for `base_url` with a per-request `timeout`.
    pub fn new(base_url: &str, secret_key: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            secret_key: secret_key.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| GatewayError::Transport(format!("Invalid gateway path {path}: {e}")))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, GatewayError> {
        Ok(self
            .http
            .request(method, self.endpoint(path)?)
            .bearer_auth(&self.secret_key))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let request = self.request(Method::GET, path)?.query(query);
        send(request, path).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let request = self.request(Method::POST, path)?.json(body);
        send(request, path).await
    }
}

/// Ensure the base URL ends with `/` so relative joins append instead of replace.
fn normalize_base_url(base_url: &str) -> Result<Url, GatewayError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| GatewayError::Transport(format!("Invalid gateway URL: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn send<T: DeserializeOwned>(request: RequestBuilder, path: &str) -> Result<T, GatewayError> {
    let response = request.send().await.map_err(|e| {
        tracing::error!(path, error = %e, "gateway request failed");
        GatewayError::Transport(format!("Request failed: {}", e))
    })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::Transport(format!("Failed to read response: {}", e)))?;

    tracing::debug!(path, status = status.as_u16(), "gateway responded");
    decode_envelope(status.as_u16(), &body)
}

/// Turn a raw gateway response into its `data` or a classified error.
fn decode_envelope<T: DeserializeOwned>(http_status: u16, body: &str) -> Result<T, GatewayError> {
    let envelope = match serde_json::from_str::<Envelope<T>>(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            // A rejection body may not match `T`; salvage its message.
            if !(200..300).contains(&http_status) {
                return Err(GatewayError::Rejected(rejection_message(http_status, body)));
            }
            return Err(GatewayError::Transport(format!(
                "Unexpected gateway response: {}",
                e
            )));
        }
    };

    if !envelope.status || !(200..300).contains(&http_status) {
        let message = if envelope.message.is_empty() {
            format!("Gateway returned HTTP {http_status}")
        } else {
            envelope.message
        };
        return Err(GatewayError::Rejected(message));
    }

    envelope
        .data
        .ok_or_else(|| GatewayError::Transport("Gateway response had no data".to_string()))
}

fn rejection_message(http_status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Gateway returned HTTP {http_status}"))
}

/// Recipient `type` the gateway expects for bank accounts in `currency`.
fn recipient_type(currency: &str) -> &'static str {
    match currency {
        "KES" => "kepss",
        "GHS" => "ghipss",
        "ZAR" => "basa",
        _ => "nuban",
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn list_banks(&self, currency: &str) -> Result<Vec<Bank>, GatewayError> {
        self.get("bank", &[("currency", currency)]).await
    }

    async fn resolve_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount, GatewayError> {
        self.get(
            "bank/resolve",
            &[("account_number", account_number), ("bank_code", bank_code)],
        )
        .await
    }

    async fn create_transfer_recipient(
        &self,
        recipient: &NewRecipient,
    ) -> Result<TransferRecipient, GatewayError> {
        let body = json!({
            "type": recipient_type(&recipient.currency),
            "name": recipient.name,
            "account_number": recipient.account_number,
            "bank_code": recipient.bank_code,
            "currency": recipient.currency,
        });
        self.post("transferrecipient", &body).await
    }

    async fn initiate_transfer(
        &self,
        transfer: &TransferInstruction,
    ) -> Result<Transfer, GatewayError> {
        let body = json!({
            "source": "balance",
            "amount": transfer.amount_minor,
            "recipient": transfer.recipient_code,
            "reference": transfer.reference,
            "reason": transfer.reason,
            "currency": transfer.currency,
        });
        self.post("transfer", &body).await
    }

    async fn fetch_balance(&self) -> Result<Vec<GatewayBalance>, GatewayError> {
        self.get("balance", &[]).await
    }

    async fn initialize_transaction(
        &self,
        checkout: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let body = json!({
            "email": checkout.email,
            "amount": checkout.amount_minor,
            "reference": checkout.reference,
            "currency": checkout.currency,
        });
        self.post("transaction/initialize", &body).await
    }

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<TransactionVerification, GatewayError> {
        self.get(&format!("transaction/verify/{reference}"), &[])
            .await
    }

    async fn create_refund(
        &self,
        refund: &RefundInstruction,
    ) -> Result<GatewayRefund, GatewayError> {
        let body = json!({
            "transaction": refund.transaction,
            "amount": refund.amount_minor,
        });
        self.post("refund", &body).await
    }
}
