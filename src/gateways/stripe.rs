use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    map_transport_error, to_minor_units, PaymentGateway, PaymentProof, ProviderOrder,
    VerificationOutcome,
};
use crate::errors::ServiceError;

const PROVIDER: &str = "Stripe";
const CURRENCY: &str = "USD";

/// Intent-based card network. Verification requires a fresh server-to-server
/// call to fetch the referenced payment object and check its status.
pub struct StripeGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    client_secret: Option<String>,
    amount: i64,
    status: String,
}

impl StripeGateway {
    pub fn new(
        base_url: String,
        secret_key: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Internal(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, ServiceError> {
        let response = self
            .client
            .get(format!("{}/payment_intents/{}", self.base_url, intent_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| map_transport_error(PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(provider = PROVIDER, %status, intent_id, "intent retrieval rejected");
            return Err(ServiceError::ExternalService(format!(
                "{} intent retrieval failed with status {}",
                PROVIDER, status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| map_transport_error(PROVIDER, e))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
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

        let params = [
            ("amount", amount_minor.to_string()),
            ("currency", CURRENCY.to_lowercase()),
            ("metadata[order_id]", order_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| map_transport_error(PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(provider = PROVIDER, %status, "intent creation rejected");
            return Err(ServiceError::ExternalService(format!(
                "{} intent creation failed with status {}",
                PROVIDER, status
            )));
        }

        let intent: PaymentIntent = response
            .json()
            .await
            .map_err(|e| map_transport_error(PROVIDER, e))?;

        Ok(ProviderOrder {
            provider_order_id: intent.id,
            amount_minor: intent.amount,
            currency: CURRENCY,
            client_secret: intent.client_secret,
        })
    }

    /// Retrieves the referenced intent and requires `succeeded` status plus
    /// an amount matching the order total. Anything else fails closed.
    #[instrument(skip(self, proof), fields(provider = PROVIDER))]
    async fn verify(&self, proof: &PaymentProof) -> Result<VerificationOutcome, ServiceError> {
        let intent = self.retrieve_intent(&proof.payment_id).await?;

        if intent.status != "succeeded" {
            let hard_decline = intent.status == "canceled";
            return Ok(VerificationOutcome::Failed {
                reason: format!("payment intent status is {}", intent.status),
                hard_decline,
            });
        }

        let expected_minor = to_minor_units(proof.expected_amount)?;
        if intent.amount != expected_minor {
            warn!(
                provider = PROVIDER,
                intent_amount = intent.amount,
                expected = expected_minor,
                "intent amount does not match order total"
            );
            return Ok(VerificationOutcome::Failed {
                reason: "payment amount does not match order total".to_string(),
                hard_decline: false,
            });
        }

        Ok(VerificationOutcome::Verified {
            payment_id: intent.id,
            provider_order_id: None,
        })
    }
}
