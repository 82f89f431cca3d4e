//! Integration events consumed from outside the ordering context.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

/// A payment for an order was received.
///
/// The payment provider correlates on the order id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceived {
    pub order_id: OrderId,
    pub paid_amount: f64,
    pub merchant_id: String,
    pub received_at: DateTime<Utc>,
}

impl PaymentReceived {
    pub fn new(order_id: OrderId, paid_amount: f64, merchant_id: impl Into<String>) -> Self {
        Self {
            order_id,
            paid_amount,
            merchant_id: merchant_id.into(),
            received_at: Utc::now(),
        }
    }
}
