//! Chat session handlers
//!
//! A browser creates a session, posts commands to it and follows its events
//! over Server-Sent Events.

use std::{convert::Infallible, sync::Arc, time::Duration};

use application::SessionController;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use domain::{SessionCommand, SessionEvent, SessionId, SessionSnapshot};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{debug, instrument, warn};

use crate::{error::ApiError, state::AppState};

const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Response to session creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    /// Session identifier
    pub id: SessionId,
    /// Current state
    pub snapshot: SessionSnapshot,
}

fn parse_id(raw: &str) -> Result<SessionId, ApiError> {
    SessionId::parse(raw).map_err(|_| ApiError::BadRequest(format!("Invalid session id: {raw}")))
}

fn lookup(state: &AppState, raw: &str) -> Result<Arc<SessionController>, ApiError> {
    let id = parse_id(raw)?;
    state
        .sessions
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("session {id}")))
}

/// Create a session over the live model listing
#[instrument(skip(state))]
pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionResponse>) {
    let controller = state.open_session().await;
    (
        StatusCode::CREATED,
        Json(SessionResponse {
            id: controller.id(),
            snapshot: controller.snapshot(),
        }),
    )
}

/// Current state of a session
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let controller = lookup(&state, &id)?;
    Ok(Json(SessionResponse {
        id: controller.id(),
        snapshot: controller.snapshot(),
    }))
}

/// Close a session and everything it is running
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if state.sessions.remove(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session {id}")))
    }
}

/// Queue a command; its effects arrive as events
#[instrument(skip(state, command), fields(command = command.name()))]
pub async fn post_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(command): Json<SessionCommand>,
) -> Result<StatusCode, ApiError> {
    let controller = lookup(&state, &id)?;
    if let Err(e) = controller.send(command).await {
        state.sessions.remove(controller.id());
        return Err(e.into());
    }
    Ok(StatusCode::ACCEPTED)
}

/// Follow a session's events
pub async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let controller = lookup(&state, &id)?;
    debug!(session_id = %controller.id(), "Event stream opened");

    let stream = event_stream(&controller).map(|event| Ok(to_sse(&event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE)))
}

/// Events of `controller`, starting with a snapshot.
///
/// A subscriber that falls behind gets a fresh snapshot in place of the
/// events it missed. The stream ends when the session stops.
pub fn event_stream(controller: &SessionController) -> impl Stream<Item = SessionEvent> + use<> {
    let updates = BroadcastStream::new(controller.subscribe());
    let snapshots = controller.snapshots();
    let initial = SessionEvent::Snapshot(controller.snapshot());

    stream::once(async move { initial }).chain(updates.map(move |item| match item {
        Ok(event) => event,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "Event subscriber lagged, resending snapshot");
            SessionEvent::Snapshot(snapshots.borrow().clone())
        },
    }))
}

fn to_sse(event: &SessionEvent) -> Event {
    Event::default()
        .event(event.kind())
        .json_data(event)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}
