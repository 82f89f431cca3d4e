//! HTTP route handlers.

pub mod conferences;
pub mod integration;
pub mod orders;
pub mod system;

use std::str::FromStr;

use serde::Serialize;

use crate::dispatch::Published;
use crate::error::ApiError;

/// Shorthand for the shared application handle held by the router.
pub type AppState<S, C> = std::sync::Arc<crate::application::Application<S, C>>;

/// Events published while handling a request.
#[derive(Serialize)]
pub struct PublishedResponse {
    pub event_type: &'static str,
    pub order_id: Option<String>,
}

pub(crate) fn published(events: &[Published]) -> Vec<PublishedResponse> {
    events
        .iter()
        .map(|event| PublishedResponse {
            event_type: event.event_type(),
            order_id: event.order_id().map(|id| id.to_string()),
        })
        .collect()
}

pub(crate) fn parse_id<T>(id: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = uuid::Error>,
{
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
