//! Services module - Coordinatore per tutti i service handler HTTP
//!
//! Questo modulo organizza i service handlers in sotto-moduli separati per
//! una migliore manutenibilità. Ogni modulo gestisce gli endpoint HTTP per
//! una specifica funzionalità.

pub mod connection;
pub mod event;
pub mod membership;
pub mod playlist;
pub mod voting;

// Re-exports per facilitare l'import
pub use connection::{
    list_connections, remove_connection, request_connection, respond_connection,
};
pub use event::{
    add_host, check_access, create_event, get_event, list_events, remove_host, update_event,
};
pub use membership::{
    invite, leave_entity, list_members, list_pending_invitations, remove_member,
    respond_to_invitation, transfer_ownership,
};
pub use playlist::{
    add_track, create_playlist, get_playlist, list_playlists, move_track, remove_playlist_track,
    update_playlist,
};
pub use voting::{queue_track, remove_queued_track, set_now_playing, toggle_vote};

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

/// Root endpoint - health check
pub async fn root(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, "Server is running!")
}
