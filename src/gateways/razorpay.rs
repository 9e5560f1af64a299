use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    map_transport_error, to_minor_units, PaymentGateway, PaymentProof, ProviderOrder,
    VerificationOutcome,
};
use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

const PROVIDER: &str = "Razorpay";
const CURRENCY: &str = "INR";

/// Signature-based aggregator. Initiation creates a provider order over
/// HTTP; verification recomputes an HMAC locally and needs no network call.
pub struct RazorpayGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayOrderResponse {
    id: String,
    amount: i64,
}

impl RazorpayGateway {
    pub fn new(
        base_url: String,
        key_id: String,
        key_secret: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Internal(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id,
            key_secret,
        })
    }

    /// Hex HMAC-SHA256 over `provider_order_id|payment_id` with the shared
    /// key secret. This is the value the provider hands the client after a
    /// successful capture.
    pub fn expected_signature(&self, provider_order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.key_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(provider_order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signature_matches(&self, provider_order_id: &str, payment_id: &str, supplied: &str) -> bool {
        let supplied_bytes = match hex::decode(supplied) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let mut mac = HmacSha256::new_from_slice(self.key_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(provider_order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        // verify_slice is constant-time
        mac.verify_slice(&supplied_bytes).is_ok()
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    #[instrument(skip(self), fields(provider = PROVIDER))]
    async fn initiate(
        &self,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<ProviderOrder, ServiceError> {
        let amount_minor = to_minor_units(amount)?;

        let body = json!({
            "amount": amount_minor,
            "currency": CURRENCY,
            "receipt": format!("receipt_{}", order_id),
            "payment_capture": 1,
        });

        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(provider = PROVIDER, %status, "order creation rejected");
            return Err(ServiceError::ExternalService(format!(
                "{} order creation failed with status {}",
                PROVIDER, status
            )));
        }

        let provider_order: RazorpayOrderResponse = response
            .json()
            .await
            .map_err(|e| map_transport_error(PROVIDER, e))?;

        Ok(ProviderOrder {
            provider_order_id: provider_order.id,
            amount_minor: provider_order.amount,
            currency: CURRENCY,
            client_secret: None,
        })
    }

    /// Recomputes the signature over the supplied ids and compares it
    /// byte-for-byte. Synchronous from the provider's point of view.
    #[instrument(skip(self, proof), fields(provider = PROVIDER))]
    async fn verify(&self, proof: &PaymentProof) -> Result<VerificationOutcome, ServiceError> {
        let provider_order_id = match proof.provider_order_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Ok(VerificationOutcome::Failed {
                    reason: "missing provider order id".to_string(),
                    hard_decline: false,
                })
            }
        };

        let signature = match proof.signature.as_deref() {
            Some(sig) if !sig.is_empty() => sig,
            _ => {
                return Ok(VerificationOutcome::Failed {
                    reason: "missing payment signature".to_string(),
                    hard_decline: false,
                })
            }
        };

        if self.signature_matches(provider_order_id, &proof.payment_id, signature) {
            Ok(VerificationOutcome::Verified {
                payment_id: proof.payment_id.clone(),
                provider_order_id: Some(provider_order_id.to_string()),
            })
        } else {
            Ok(VerificationOutcome::Failed {
                reason: "payment signature verification failed".to_string(),
                hard_decline: false,
            })
        }
    }
}
