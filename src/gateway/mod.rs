//! Payment gateway seam.
//!
//! Everything the service needs from the third-party processor goes through
//! [`PaymentGateway`]. Production uses [`paystack::PaystackClient`]; tests use
//! the recording fake in `fake`. All amounts crossing this trait are minor
//! units, the gateway's own wire unit.

#[cfg(test)]
pub mod fake;
pub mod paystack;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Why a gateway call did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The gateway answered and said no. The message is the gateway's own.
    #[error("{0}")]
    Rejected(String),

    /// The call never produced a usable answer (network, timeout, decoding).
    #[error("{0}")]
    Transport(String),
}

/// A bank the gateway can pay out to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bank {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Result of resolving an account number at a bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedAccount {
    pub account_number: String,
    pub account_name: String,
}

/// Recipient to register before a transfer.
#[derive(Debug, Clone, Serialize)]
pub struct NewRecipient {
    pub name: String,
    pub account_number: String,
    pub bank_code: String,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferRecipient {
    pub recipient_code: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Instruction to move `amount_minor` from the platform balance to a recipient.
#[derive(Debug, Clone, Serialize)]
pub struct TransferInstruction {
    pub recipient_code: String,
    pub amount_minor: i64,
    pub reference: String,
    pub reason: String,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transfer {
    pub transfer_code: String,
    #[serde(default)]
    pub reference: Option<String>,
    /// `pending`, `success`, `failed`, `otp`, ...
    pub status: String,
    pub amount: i64,
}

impl Transfer {
    pub fn is_successful(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

/// Platform balance held at the gateway, per currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayBalance {
    pub currency: String,
    /// Minor units.
    pub balance: i64,
}

/// Checkout to open for a customer payment.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub email: String,
    pub amount_minor: i64,
    pub reference: String,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutSession {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// The gateway's view of a transaction, returned verbatim to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionVerification {
    pub reference: String,
    /// `success`, `failed`, `abandoned`, `ongoing`, `pending`, ...
    pub status: String,
    /// Minor units actually charged.
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
}

impl TransactionVerification {
    pub fn is_successful(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }

    /// Terminal states that will never turn into a successful charge.
    pub fn is_failed(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "failed" | "abandoned" | "reversed"
        )
    }
}

/// Refund of part or all of a charged transaction.
#[derive(Debug, Clone, Serialize)]
pub struct RefundInstruction {
    /// Reference of the original charge.
    pub transaction: String,
    pub amount_minor: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayRefund {
    pub id: i64,
    pub status: String,
    pub amount: i64,
}

/// Operations the settlement flow needs from the payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn list_banks(&self, currency: &str) -> Result<Vec<Bank>, GatewayError>;

    async fn resolve_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount, GatewayError>;

    async fn create_transfer_recipient(
        &self,
        recipient: &NewRecipient,
    ) -> Result<TransferRecipient, GatewayError>;

    async fn initiate_transfer(
        &self,
        transfer: &TransferInstruction,
    ) -> Result<Transfer, GatewayError>;

    async fn fetch_balance(&self) -> Result<Vec<GatewayBalance>, GatewayError>;

    async fn initialize_transaction(
        &self,
        checkout: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<TransactionVerification, GatewayError>;

    async fn create_refund(&self, refund: &RefundInstruction)
    -> Result<GatewayRefund, GatewayError>;
}
