//! Recording in-memory gateway for tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    Bank, CheckoutRequest, CheckoutSession, GatewayBalance, GatewayError, GatewayRefund,
    NewRecipient, PaymentGateway, RefundInstruction, ResolvedAccount, TransactionVerification,
    Transfer, TransferInstruction, TransferRecipient,
};

pub struct FakeGateway {
    /// Names of the operations called, in order.
    pub calls: Mutex<Vec<&'static str>>,
    pub resolve: Mutex<Result<ResolvedAccount, GatewayError>>,
    pub recipient: Mutex<Result<TransferRecipient, GatewayError>>,
    pub transfer: Mutex<Result<Transfer, GatewayError>>,
    pub verification: Mutex<Result<TransactionVerification, GatewayError>>,
    pub refund: Mutex<Result<GatewayRefund, GatewayError>>,
    pub last_transfer: Mutex<Option<TransferInstruction>>,
    pub last_recipient: Mutex<Option<NewRecipient>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            resolve: Mutex::new(Ok(ResolvedAccount {
                account_number: "0123456789".to_string(),
                account_name: "JANE ORGANIZER".to_string(),
            })),
            recipient: Mutex::new(Ok(TransferRecipient {
                recipient_code: "RCP_test".to_string(),
                name: Some("JANE ORGANIZER".to_string()),
            })),
            transfer: Mutex::new(Ok(Transfer {
                transfer_code: "TRF_test".to_string(),
                reference: None,
                status: "pending".to_string(),
                amount: 0,
            })),
            verification: Mutex::new(Ok(TransactionVerification {
                reference: "pay_test".to_string(),
                status: "success".to_string(),
                amount: 10_000,
                currency: Some("KES".to_string()),
                gateway_response: Some("Approved".to_string()),
                paid_at: None,
            })),
            refund: Mutex::new(Ok(GatewayRefund {
                id: 1,
                status: "pending".to_string(),
                amount: 0,
            })),
            last_transfer: Mutex::new(None),
            last_recipient: Mutex::new(None),
        }
    }
}

impl FakeGateway {
    pub fn rejecting_accounts(message: &str) -> Self {
        let fake = Self::default();
        *fake.resolve.try_lock().unwrap() = Err(GatewayError::Rejected(message.to_string()));
        fake
    }

    pub async fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, name: &'static str) {
        self.calls.lock().await.push(name);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn list_banks(&self, currency: &str) -> Result<Vec<Bank>, GatewayError> {
        self.record("list_banks").await;
        Ok(vec![Bank {
            name: "Equity Bank".to_string(),
            code: "68".to_string(),
            slug: Some("equity-bank".to_string()),
            currency: Some(currency.to_string()),
            active: true,
        }])
    }

    async fn resolve_account(
        &self,
        _account_number: &str,
        _bank_code: &str,
    ) -> Result<ResolvedAccount, GatewayError> {
        self.record("resolve_account").await;
        self.resolve.lock().await.clone()
    }

    async fn create_transfer_recipient(
        &self,
        recipient: &NewRecipient,
    ) -> Result<TransferRecipient, GatewayError> {
        self.record("create_transfer_recipient").await;
        *self.last_recipient.lock().await = Some(recipient.clone());
        self.recipient.lock().await.clone()
    }

    async fn initiate_transfer(
        &self,
        transfer: &TransferInstruction,
    ) -> Result<Transfer, GatewayError> {
        self.record("initiate_transfer").await;
        *self.last_transfer.lock().await = Some(transfer.clone());
        self.transfer.lock().await.clone().map(|mut t| {
            t.amount = transfer.amount_minor;
            t.reference = Some(transfer.reference.clone());
            t
        })
    }

    async fn fetch_balance(&self) -> Result<Vec<GatewayBalance>, GatewayError> {
        self.record("fetch_balance").await;
        Ok(vec![GatewayBalance {
            currency: "KES".to_string(),
            balance: 500_000,
        }])
    }

    async fn initialize_transaction(
        &self,
        checkout: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        self.record("initialize_transaction").await;
        Ok(CheckoutSession {
            authorization_url: format!("https://checkout.test/{}", checkout.reference),
            access_code: "access_test".to_string(),
            reference: checkout.reference.clone(),
        })
    }

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<TransactionVerification, GatewayError> {
        self.record("verify_transaction").await;
        self.verification.lock().await.clone().map(|mut v| {
            v.reference = reference.to_string();
            v
        })
    }

    async fn create_refund(
        &self,
        refund: &RefundInstruction,
    ) -> Result<GatewayRefund, GatewayError> {
        self.record("create_refund").await;
        self.refund.lock().await.clone().map(|mut r| {
            r.amount = refund.amount_minor;
            r
        })
    }
}
