//! Intake for integration events from other bounded contexts.
//!
//! Bodies are passed through raw; parsing and validation happen in the
//! application so every transport gets the same rules.

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use saga::CommandScheduler;
use serde::Serialize;

use super::{AppState, PublishedResponse, published};
use crate::error::ApiError;

#[derive(Serialize)]
pub struct ConferenceCreatedResponse {
    /// False when the conference was already known.
    pub created: bool,
    pub events: Vec<PublishedResponse>,
}

#[derive(Serialize)]
pub struct PaymentReceivedResponse {
    pub events: Vec<PublishedResponse>,
}

/// POST /integration/conference-created
#[tracing::instrument(skip(state, body))]
pub async fn conference_created<S, C>(
    State(state): State<AppState<S, C>>,
    body: String,
) -> Result<Json<ConferenceCreatedResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    C: CommandScheduler + 'static,
{
    let events = state.consume_conference_created(&body).await?;
    Ok(Json(ConferenceCreatedResponse {
        created: !events.is_empty(),
        events: published(&events),
    }))
}

/// POST /integration/payment-received
#[tracing::instrument(skip(state, body))]
pub async fn payment_received<S, C>(
    State(state): State<AppState<S, C>>,
    body: String,
) -> Result<Json<PaymentReceivedResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    C: CommandScheduler + 'static,
{
    let events = state.consume_payment_received(&body).await?;
    Ok(Json(PaymentReceivedResponse {
        events: published(&events),
    }))
}
