//! Server library - espone i moduli principali per i test

pub mod core;
pub mod dtos;
pub mod entities;
pub mod geofence;
pub mod notify;
pub mod repositories;
pub mod services;
pub mod store;
pub mod sync;

// Re-export dei tipi principali per facilitare l'import
pub use crate::core::{AppError, AppState, auth, config};
pub use crate::services::root;

use axum::{
    Router, middleware,
    routing::{any, delete, get, patch, post},
};
use std::sync::Arc;

/// Crea il router principale dell'applicazione
pub fn create_router(state: Arc<AppState>) -> Router {
    use crate::core::authentication_middleware;
    use crate::sync::ws_handler;

    Router::new()
        .route("/", get(root))
        .nest("/playlists", configure_playlist_routes(state.clone()))
        .nest("/events", configure_event_routes(state.clone()))
        .nest("/invitations", configure_invitation_routes(state.clone()))
        .nest("/connections", configure_connection_routes(state.clone()))
        .route(
            "/ws",
            any(ws_handler).layer(middleware::from_fn_with_state(
                state.clone(),
                authentication_middleware,
            )),
        )
        .with_state(state)
}

/// Configura le routes per la gestione delle playlist
fn configure_playlist_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::core::{authentication_middleware, playlist_membership_middleware};
    use crate::services::*;

    // Rotte che NON richiedono la partecipazione (solo autenticazione):
    // la lettura di dettaglio resta fuori dal membership middleware perché
    // le playlist pubbliche sono leggibili da chiunque sia autenticato
    let public_routes = Router::new()
        .route("/", get(list_playlists).post(create_playlist))
        .route("/{playlist_id}", get(get_playlist).patch(update_playlist))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            authentication_middleware,
        ));

    // Rotte che richiedono la partecipazione (autenticazione + membership)
    let member_routes = Router::new()
        .route("/{playlist_id}/members", get(list_members))
        .route("/{playlist_id}/members/{user_id}", delete(remove_member))
        .route("/{playlist_id}/invite", post(invite))
        .route("/{playlist_id}/leave", post(leave_entity))
        .route(
            "/{playlist_id}/transfer_ownership/{user_id}",
            patch(transfer_ownership),
        )
        .route("/{playlist_id}/tracks", post(add_track))
        .route(
            "/{playlist_id}/tracks/{track_id}",
            delete(remove_playlist_track),
        )
        .route(
            "/{playlist_id}/tracks/{track_id}/position",
            patch(move_track),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            playlist_membership_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ));

    public_routes.merge(member_routes)
}

/// Configura le routes per la gestione degli eventi
fn configure_event_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::core::{authentication_middleware, event_membership_middleware};
    use crate::services::*;

    // Voto e controllo di ammissione restano fuori dal membership
    // middleware: con vote_license = Anyone votano anche i non
    // partecipanti, e l'ammissione serve proprio a chi non è dentro
    let public_routes = Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/{event_id}", get(get_event).patch(update_event))
        .route("/{event_id}/access", get(check_access))
        .route("/{event_id}/tracks/{track_id}/vote", post(toggle_vote))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            authentication_middleware,
        ));

    // Rotte che richiedono la partecipazione (autenticazione + membership)
    let member_routes = Router::new()
        .route("/{event_id}/members", get(list_members))
        .route("/{event_id}/members/{user_id}", delete(remove_member))
        .route("/{event_id}/invite", post(invite))
        .route("/{event_id}/leave", post(leave_entity))
        .route(
            "/{event_id}/transfer_ownership/{user_id}",
            patch(transfer_ownership),
        )
        .route("/{event_id}/tracks", post(queue_track))
        .route("/{event_id}/tracks/{track_id}", delete(remove_queued_track))
        .route("/{event_id}/now_playing", patch(set_now_playing))
        .route(
            "/{event_id}/hosts/{user_id}",
            post(add_host).delete(remove_host),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            event_membership_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ));

    public_routes.merge(member_routes)
}

/// Configura le routes per la gestione degli inviti
fn configure_invitation_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::core::authentication_middleware;
    use crate::services::*;

    Router::new()
        .route("/pending", get(list_pending_invitations))
        .route("/{invite_id}/{action}", post(respond_to_invitation))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

/// Configura le routes per la gestione delle amicizie
fn configure_connection_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::core::authentication_middleware;
    use crate::services::*;

    Router::new()
        .route("/", get(list_connections))
        .route("/{id}", post(request_connection).delete(remove_connection))
        .route("/{id}/{action}", post(respond_connection))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}
