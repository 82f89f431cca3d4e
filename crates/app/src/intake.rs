//! Integration events arriving from other bounded contexts.
//!
//! Payloads are camelCase JSON. Anything that cannot be parsed into a
//! well-formed event is a `BadRequest` and is not retried.

use common::{ConferenceId, OrderId};
use saga::PaymentReceived;
use serde::Deserialize;

use crate::application::AppError;

/// A conference was published by the conference management context.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceCreated {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub available_tickets: u32,
}

impl ConferenceCreated {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::BadRequest(format!("malformed ConferenceCreated: {e}")))
    }

    pub fn conference_id(&self) -> Result<ConferenceId, AppError> {
        self.id
            .parse()
            .map_err(|e| AppError::BadRequest(format!("invalid conference id {:?}: {e}", self.id)))
    }
}

/// Payment confirmation from the payment provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceivedPayload {
    pub paid_amount: f64,
    pub merchant_id: String,
    pub correlation_id: Option<String>,
}

impl PaymentReceivedPayload {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::BadRequest(format!("malformed PaymentReceived: {e}")))
    }

    /// Converts the payload into the event the process manager consumes.
    ///
    /// The correlation id must be the order id.
    pub fn into_event(self) -> Result<PaymentReceived, AppError> {
        let correlation_id = self.correlation_id.ok_or_else(|| {
            AppError::BadRequest("PaymentReceived is missing correlationId".to_string())
        })?;
        let order_id: OrderId = correlation_id.parse().map_err(|e| {
            AppError::BadRequest(format!("invalid correlationId {correlation_id:?}: {e}"))
        })?;
        Ok(PaymentReceived::new(
            order_id,
            self.paid_amount,
            self.merchant_id,
        ))
    }
}
