pub mod razorpay;
pub mod stripe;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{credential_configured, AppConfig};
use crate::entities::order::PaymentMethod;
use crate::errors::ServiceError;

pub use razorpay::RazorpayGateway;
pub use stripe::StripeGateway;

/// Provider-side handle returned by payment initiation. The client-side
/// widget needs this to collect funds.
#[derive(Debug, Clone)]
pub struct ProviderOrder {
    pub provider_order_id: String,
    /// Amount in the provider's minor unit (paise, cents)
    pub amount_minor: i64,
    pub currency: &'static str,
    /// Client secret for intent-based providers
    pub client_secret: Option<String>,
}

/// Proof of payment supplied by the client after completing the provider
/// flow out-of-band.
#[derive(Debug, Clone)]
pub struct PaymentProof {
    pub payment_id: String,
    pub provider_order_id: Option<String>,
    pub signature: Option<String>,
    /// The charge the order being verified is supposed to carry
    pub expected_amount: Decimal,
}

/// Result of independently confirming a claimed payment with the provider.
#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    Verified {
        payment_id: String,
        provider_order_id: Option<String>,
    },
    Failed {
        reason: String,
        /// True when the provider reports a definitive decline rather than a
        /// mismatch or a still-pending state
        hard_decline: bool,
    },
}

/// Uniform capability interface over heterogeneous payment providers.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Opens a payment with the external provider for the given order.
    async fn initiate(
        &self,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<ProviderOrder, ServiceError>;

    /// Confirms that the claimed payment actually succeeded. Fails closed:
    /// any mismatch or provider error yields `Failed`, never a false
    /// positive.
    async fn verify(&self, proof: &PaymentProof) -> Result<VerificationOutcome, ServiceError>;
}

/// The set of adapters configured at startup, injected into the checkout
/// orchestrator. A provider with missing or placeholder credentials is
/// simply absent; requests against it fail with a recoverable error.
#[derive(Clone, Default)]
pub struct PaymentGateways {
    razorpay: Option<Arc<dyn PaymentGateway>>,
    stripe: Option<Arc<dyn PaymentGateway>>,
}

impl PaymentGateways {
    pub fn new(
        razorpay: Option<Arc<dyn PaymentGateway>>,
        stripe: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        Self { razorpay, stripe }
    }

    /// Builds adapters for every provider with usable credentials.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, ServiceError> {
        let razorpay = if credential_configured(&cfg.razorpay_key_id)
            && credential_configured(&cfg.razorpay_key_secret)
        {
            let gateway = RazorpayGateway::new(
                cfg.razorpay_api_url.clone(),
                cfg.razorpay_key_id.clone().unwrap_or_default(),
                cfg.razorpay_key_secret.clone().unwrap_or_default(),
                std::time::Duration::from_secs(cfg.gateway_timeout_secs),
            )?;
            tracing::info!("Razorpay gateway configured");
            Some(Arc::new(gateway) as Arc<dyn PaymentGateway>)
        } else {
            tracing::info!("Razorpay credentials absent or placeholder; gateway disabled");
            None
        };

        let stripe = if credential_configured(&cfg.stripe_secret_key) {
            let gateway = StripeGateway::new(
                cfg.stripe_api_url.clone(),
                cfg.stripe_secret_key.clone().unwrap_or_default(),
                std::time::Duration::from_secs(cfg.gateway_timeout_secs),
            )?;
            tracing::info!("Stripe gateway configured");
            Some(Arc::new(gateway) as Arc<dyn PaymentGateway>)
        } else {
            tracing::info!("Stripe credentials absent or placeholder; gateway disabled");
            None
        };

        Ok(Self { razorpay, stripe })
    }

    /// Resolves the adapter for a payment method, or the user-actionable
    /// "not configured" error.
    pub fn for_method(&self, method: PaymentMethod) -> Result<Arc<dyn PaymentGateway>, ServiceError> {
        match method {
            PaymentMethod::Razorpay => self
                .razorpay
                .clone()
                .ok_or(ServiceError::GatewayUnavailable("Razorpay")),
            PaymentMethod::Stripe => self
                .stripe
                .clone()
                .ok_or(ServiceError::GatewayUnavailable("Stripe")),
            PaymentMethod::CashOnDelivery => Err(ServiceError::Validation(
                "Cash on delivery does not use a payment gateway".to_string(),
            )),
        }
    }
}

/// Converts a decimal major-unit amount into the provider's minor unit.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| {
            ServiceError::Validation(format!("amount {} is out of range", amount))
        })
}

/// Maps transport failures from a provider call onto the error taxonomy.
pub(crate) fn map_transport_error(provider: &'static str, err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        tracing::warn!(provider, "provider call timed out");
        ServiceError::GatewayTimeout
    } else {
        tracing::error!(provider, error = %err, "provider call failed");
        ServiceError::ExternalService(format!("{} request failed", provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minor_unit_conversion_rounds_to_nearest() {
        assert_eq!(to_minor_units(dec!(450)).unwrap(), 45000);
        assert_eq!(to_minor_units(dec!(19.99)).unwrap(), 1999);
        assert_eq!(to_minor_units(dec!(0.005)).unwrap(), 1);
        assert_eq!(to_minor_units(dec!(0)).unwrap(), 0);
    }

    #[test]
    fn unconfigured_providers_resolve_to_recoverable_errors() {
        let gateways = PaymentGateways::default();

        assert!(matches!(
            gateways.for_method(PaymentMethod::Razorpay),
            Err(ServiceError::GatewayUnavailable("Razorpay"))
        ));
        assert!(matches!(
            gateways.for_method(PaymentMethod::Stripe),
            Err(ServiceError::GatewayUnavailable("Stripe"))
        ));
        assert!(matches!(
            gateways.for_method(PaymentMethod::CashOnDelivery),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn placeholder_credentials_leave_provider_disabled() {
        let mut cfg = crate::config::AppConfig::new(
            "sqlite::memory:".into(),
            "test_secret_key_for_testing_purposes_only_32chars".into(),
            "127.0.0.1".into(),
            5000,
        );
        cfg.razorpay_key_id = Some("rzp_test_placeholder".into());
        cfg.razorpay_key_secret = Some("placeholder_secret".into());
        cfg.stripe_secret_key = Some("sk_live_abc123".into());

        let gateways = PaymentGateways::from_config(&cfg).unwrap();
        assert!(matches!(
            gateways.for_method(PaymentMethod::Razorpay),
            Err(ServiceError::GatewayUnavailable("Razorpay"))
        ));
        assert!(gateways.for_method(PaymentMethod::Stripe).is_ok());
    }
}
