//! Sales (vendas) and resellers (revendedores).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use agencia_check_core::{Email, Money, PaymentMethod, ProductId, ResellerId, SaleId, SaleStatus};

/// A recorded sale.
///
/// `reseller_id`, `customer` and `product_id` are loose references; nothing
/// checks that the other side exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub value: Money,
    pub date: DateTime<Utc>,
    pub status: SaleStatus,
    pub reseller_id: Option<ResellerId>,
    /// Free-form customer key (email, phone or document).
    pub customer: Option<String>,
    pub product_id: Option<ProductId>,
    pub quantity: u32,
    pub payment_method: PaymentMethod,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Input for registering a sale.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSale {
    pub value: Money,
    /// Defaults to now.
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: SaleStatus,
    pub reseller_id: Option<ResellerId>,
    pub customer: Option<String>,
    pub product_id: Option<ProductId>,
    /// Defaults to 1.
    pub quantity: Option<u32>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

/// Partial update of a sale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleUpdate {
    pub value: Option<Money>,
    pub status: Option<SaleStatus>,
    pub reseller_id: Option<ResellerId>,
    pub customer: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// A reseller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reseller {
    pub id: ResellerId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    /// Commission as a fraction (0.10 = 10%).
    pub commission_rate: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a reseller.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReseller {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub commission_rate: Decimal,
}

/// Partial update of a reseller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResellerUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub commission_rate: Option<Decimal>,
    pub is_active: Option<bool>,
}
