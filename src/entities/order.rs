use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A placed order: an immutable snapshot of the cart at checkout time plus
/// shipping metadata and the payment/fulfillment status machines. Only the
/// status fields, tracking number and provider references change after
/// creation.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    #[sea_orm(column_type = "Json")]
    pub shipping_address: ShippingAddress,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub tracking_number: Option<String>,
    /// Provider-side payment reference, recorded on verification
    pub payment_id: Option<String>,
    /// Provider-side order/intent id, recorded on initiation or verification
    pub provider_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Structured shipping address, stored as a JSON column.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// How the buyer chose to pay.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "razorpay")]
    Razorpay,
    #[sea_orm(string_value = "stripe")]
    Stripe,
    #[sea_orm(string_value = "cash_on_delivery")]
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "razorpay" => Some(Self::Razorpay),
            "stripe" => Some(Self::Stripe),
            "cash_on_delivery" | "cod" => Some(Self::CashOnDelivery),
            _ => None,
        }
    }
}

/// Payment lifecycle: one-way, no reversal path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl PaymentStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Fulfillment lifecycle. `Delivered` and `Cancelled` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Cancellation is only permitted before the order leaves the warehouse.
    pub fn can_cancel(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_allowed_only_before_shipment() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::Confirmed.can_cancel());
        assert!(!OrderStatus::Shipped.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn status_parsing_accepts_both_spellings_of_cancelled() {
        assert_eq!(OrderStatus::parse("cancelled"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::parse("canceled"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::parse("SHIPPED"), Some(OrderStatus::Shipped));
        assert_eq!(OrderStatus::parse("unknown"), None);
    }

    #[test]
    fn payment_method_parsing() {
        assert_eq!(PaymentMethod::parse("razorpay"), Some(PaymentMethod::Razorpay));
        assert_eq!(PaymentMethod::parse("cod"), Some(PaymentMethod::CashOnDelivery));
        assert_eq!(PaymentMethod::parse("bitcoin"), None);
    }

    #[test]
    fn shipping_address_round_trips_as_camel_case_json() {
        let address = ShippingAddress {
            first_name: "Asha".into(),
            last_name: "Patel".into(),
            street: "12 MG Road".into(),
            city: "Pune".into(),
            postal_code: "411001".into(),
            country: "IN".into(),
            phone: Some("+91-9800000000".into()),
        };

        let json = serde_json::to_value(&address).unwrap();
        assert_eq!(json["firstName"], "Asha");
        assert_eq!(json["postalCode"], "411001");

        let back: ShippingAddress = serde_json::from_value(json).unwrap();
        assert_eq!(back, address);
    }
}
