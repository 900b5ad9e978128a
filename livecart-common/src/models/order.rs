// File: livecart-common/src/models/order.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Upi,
    Cod,
    Card,
}

/// Body of the order service's create-order call. The live session id
/// travels as a query parameter, not in the body.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CreateOrderRequest {
    pub product_code: String,
    pub customer_name: String,
    /// Left blank for auto-orders; collected later over a messaging channel.
    pub phone_number: String,
    pub payment_method: PaymentMethod,
}

impl CreateOrderRequest {
    /// Request for an order placed by typing a keyword in a live comment.
    pub fn from_comment(product_code: &str, customer_name: &str) -> Self {
        Self {
            product_code: product_code.to_string(),
            customer_name: customer_name.to_string(),
            phone_number: String::new(),
            payment_method: PaymentMethod::default(),
        }
    }
}

/// Order as returned by the order service. This pipeline only creates and
/// references orders; unknown fields are carried through untouched so the
/// dashboard sees the full object.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub product_code: String,
    pub amount: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Catalog entry, read-only from this service's point of view.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    pub product_code: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
}
