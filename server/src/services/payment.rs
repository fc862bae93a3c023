use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::time::Duration;
use thiserror::Error;

use crate::utils::error::AppError;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        AppError::ExternalServiceError(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InitializePayment {
    pub email: String,
    /// Amount in kobo.
    pub amount: i64,
    pub currency: String,
    pub reference: String,
    pub callback_url: String,
    pub metadata: serde_json::Value,
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedPayment {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedPayment {
    pub status: String,
    pub reference: String,
    /// Amount in kobo.
    pub amount: i64,
    #[serde(default)]
    pub channel: Option<String>,
}

impl VerifiedPayment {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// The payment provider as seen by order settlement.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, request: InitializePayment) -> Result<InitializedPayment, PaymentError>;

    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, PaymentError>;
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

impl<T> PaystackEnvelope<T> {
    fn into_data(self) -> Result<T, PaymentError> {
        match (self.status, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(PaymentError::Rejected(self.message)),
        }
    }
}

pub struct PaystackGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl PaystackGateway {
    pub fn new(base_url: &str, secret_key: &str) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().timeout(GATEWAY_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    async fn initialize(&self, request: InitializePayment) -> Result<InitializedPayment, PaymentError> {
        let envelope: PaystackEnvelope<InitializedPayment> = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;
        envelope.into_data()
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, PaymentError> {
        let envelope: PaystackEnvelope<VerifiedPayment> = self
            .client
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await?
            .json()
            .await?;
        envelope.into_data()
    }
}

/// Checks a hex HMAC-SHA512 signature of `body`. The comparison is
/// constant-time.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha512>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct ChargeData {
    pub reference: String,
    pub amount: i64,
    #[serde(default)]
    pub channel: Option<String>,
}
