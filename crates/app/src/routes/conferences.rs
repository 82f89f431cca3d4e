//! Seat inventory endpoint.

use axum::Json;
use axum::extract::{Path, State};
use common::ConferenceId;
use event_store::EventStore;
use saga::CommandScheduler;
use serde::Serialize;

use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Serialize)]
pub struct SeatsResponse {
    pub conference_id: String,
    pub capacity: u32,
    pub available_tickets: u32,
    pub held_tickets: u32,
}

/// GET /conferences/{id}/seats: current inventory of a conference.
#[tracing::instrument(skip(state))]
pub async fn seats<S, C>(
    State(state): State<AppState<S, C>>,
    Path(id): Path<String>,
) -> Result<Json<SeatsResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    C: CommandScheduler + 'static,
{
    let conference_id: ConferenceId = parse_id(&id)?;
    let seats = state
        .seats_availability(conference_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Conference {id} not found")))?;

    Ok(Json(SeatsResponse {
        conference_id: conference_id.to_string(),
        capacity: seats.capacity(),
        available_tickets: seats.available_tickets(),
        held_tickets: seats.held_tickets(),
    }))
}
