//! Order endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ConferenceId, OrderId};
use domain::PlaceOrder;
use event_store::EventStore;
use saga::CommandScheduler;
use serde::{Deserialize, Serialize};

use super::{AppState, PublishedResponse, parse_id, published};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    /// Client-chosen id, making the request safe to retry.
    pub order_id: Option<String>,
    pub conference_id: String,
    pub number_of_tickets: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub conference_id: String,
    pub number_of_tickets: u32,
    pub state: String,
    pub expired: bool,
    pub process_state: Option<String>,
}

#[derive(Serialize)]
pub struct OrderCommandResponse {
    pub order_id: String,
    pub events: Vec<PublishedResponse>,
}

#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub aggregate_type: String,
    pub version: i64,
    pub timestamp: String,
    pub correlation_id: Option<String>,
    pub payload: serde_json::Value,
}

// -- Handlers --

/// POST /orders: place an order and run the workflow up to the payment wait.
#[tracing::instrument(skip(state, req))]
pub async fn place<S, C>(
    State(state): State<AppState<S, C>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderCommandResponse>), ApiError>
where
    S: EventStore + Clone + 'static,
    C: CommandScheduler + 'static,
{
    let conference_id: ConferenceId = parse_id(&req.conference_id)?;
    let order_id: OrderId = match req.order_id.as_deref() {
        Some(id) => parse_id(id)?,
        None => OrderId::new(),
    };

    let events = state
        .place_order(PlaceOrder::new(order_id, conference_id, req.number_of_tickets))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCommandResponse {
            order_id: order_id.to_string(),
            events: published(&events),
        }),
    ))
}

/// GET /orders/{id}: the order and where its workflow stands.
#[tracing::instrument(skip(state))]
pub async fn get<S, C>(
    State(state): State<AppState<S, C>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    C: CommandScheduler + 'static,
{
    let order_id: OrderId = parse_id(&id)?;
    let order = state
        .order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;
    let process = state.process_state(order_id).await?;

    Ok(Json(OrderResponse {
        id: order_id.to_string(),
        conference_id: order
            .conference_id()
            .map(|c| c.to_string())
            .unwrap_or_default(),
        number_of_tickets: order.number_of_tickets(),
        state: order.state().to_string(),
        expired: order.is_expired(),
        process_state: process
            .and_then(|p| p.state())
            .map(|s| s.to_string()),
    }))
}

/// POST /orders/{id}/expire: expire an order that is waiting for payment.
#[tracing::instrument(skip(state))]
pub async fn expire<S, C>(
    State(state): State<AppState<S, C>>,
    Path(id): Path<String>,
) -> Result<Json<OrderCommandResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    C: CommandScheduler + 'static,
{
    let order_id: OrderId = parse_id(&id)?;
    let events = state.expire_order(order_id).await?;

    Ok(Json(OrderCommandResponse {
        order_id: order_id.to_string(),
        events: published(&events),
    }))
}

/// GET /orders/{id}/events: stored history of the order and its process.
#[tracing::instrument(skip(state))]
pub async fn events<S, C>(
    State(state): State<AppState<S, C>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError>
where
    S: EventStore + Clone + 'static,
    C: CommandScheduler + 'static,
{
    let order_id: OrderId = parse_id(&id)?;
    let envelopes = state.order_history(order_id).await?;
    if envelopes.is_empty() {
        return Err(ApiError::NotFound(format!("Order {id} not found")));
    }

    let responses = envelopes
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            event_id: e.event_id.to_string(),
            correlation_id: e.correlation_id().map(String::from),
            event_type: e.event_type,
            aggregate_type: e.aggregate_type,
            version: e.version.as_i64(),
            timestamp: e.timestamp.to_rfc3339(),
            payload: e.payload,
        })
        .collect();

    Ok(Json(responses))
}
