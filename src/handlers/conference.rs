use axum::extract::{Path, State};
use axum::response::Response;
use serde::Serialize;

use crate::models::{Conference, TicketType};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConferenceDetail {
    conference: Conference,
    ticket_types: Vec<TicketType>,
}

/// GET /api/conference/:slug
///
/// The booking page's data source: a published conference with its enabled
/// ticket types. Unpublished conferences are indistinguishable from
/// missing ones.
pub async fn get_conference(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let detail = state
        .store
        .read(|doc| {
            let conference = doc.conference_by_slug(&slug).filter(|c| c.published)?;
            let ticket_types = doc
                .conference_ticket_types
                .iter()
                .filter(|t| t.conference_id == conference.id && t.enabled)
                .cloned()
                .collect();
            Some(ConferenceDetail {
                conference: conference.clone(),
                ticket_types,
            })
        })
        .await
        .ok_or_else(|| AppError::NotFound(format!("conference '{slug}'")))?;

    Ok(success(detail))
}
