//! Payout orchestration against the gateway.
//!
//! validate account → create recipient → initiate transfer.
//! Each step only runs if the previous one succeeded. A recipient created
//! before a failed transfer is left in place; the gateway reuses recipients.

use crate::{
    error::AppError,
    gateway::{
        GatewayError, NewRecipient, PaymentGateway, ResolvedAccount, Transfer,
        TransferInstruction,
    },
    models::event::AccountDetails,
};

/// Message surfaced when the gateway cannot resolve an account.
pub const INVALID_ACCOUNT_DETAILS: &str = "Invalid account details";

/// A transfer the gateway accepted.
#[derive(Debug, Clone)]
pub struct PayoutOutcome {
    pub account_name: String,
    pub recipient_code: String,
    pub transfer: Transfer,
}

/// Why a payout stopped.
#[derive(Debug)]
pub struct PayoutFailure {
    pub error: AppError,
    /// The transfer call was made; if it failed in transport, money may
    /// have moved anyway.
    pub transfer_attempted: bool,
}

impl PayoutFailure {
    fn before_transfer(error: AppError) -> Self {
        Self {
            error,
            transfer_attempted: false,
        }
    }

    /// Outcome unknown: the transfer request may have reached the gateway.
    pub fn is_indeterminate(&self) -> bool {
        self.transfer_attempted && matches!(self.error, AppError::GatewayUnavailable(_))
    }
}

/// Resolve `account` at the gateway. Any rejection reads as invalid details.
pub async fn validate_account(
    gateway: &dyn PaymentGateway,
    account: &AccountDetails,
) -> Result<ResolvedAccount, AppError> {
    account.validate()?;

    gateway
        .resolve_account(account.account_number.trim(), account.bank_code.trim())
        .await
        .map_err(|err| match err {
            GatewayError::Rejected(message) => {
                tracing::warn!(
                    bank_code = %account.bank_code,
                    gateway_message = %message,
                    "account validation rejected"
                );
                AppError::Gateway(INVALID_ACCOUNT_DETAILS.to_string())
            }
            transport => transport.into(),
        })
}

/// Send `amount_minor` to `account`, tagging the transfer with `reference`.
pub async fn execute_payout(
    gateway: &dyn PaymentGateway,
    account: &AccountDetails,
    amount_minor: i64,
    reference: &str,
    currency: &str,
) -> Result<PayoutOutcome, PayoutFailure> {
    let resolved = validate_account(gateway, account)
        .await
        .map_err(PayoutFailure::before_transfer)?;

    let account_name = Some(resolved.account_name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .or_else(|| account.account_name.clone())
        .unwrap_or_default();

    let recipient = gateway
        .create_transfer_recipient(&NewRecipient {
            name: account_name.clone(),
            account_number: account.account_number.trim().to_string(),
            bank_code: account.bank_code.trim().to_string(),
            currency: currency.to_string(),
        })
        .await
        .map_err(|err| PayoutFailure::before_transfer(err.into()))?;

    let transfer = gateway
        .initiate_transfer(&TransferInstruction {
            recipient_code: recipient.recipient_code.clone(),
            amount_minor,
            reference: reference.to_string(),
            reason: "Event collection withdrawal".to_string(),
            currency: currency.to_string(),
        })
        .await
        .map_err(|err| PayoutFailure {
            error: err.into(),
            transfer_attempted: true,
        })?;

    tracing::info!(
        reference,
        recipient_code = %recipient.recipient_code,
        transfer_code = %transfer.transfer_code,
        status = %transfer.status,
        "transfer initiated"
    );

    Ok(PayoutOutcome {
        account_name,
        recipient_code: recipient.recipient_code,
        transfer,
    })
}
