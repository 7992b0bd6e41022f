//! Playlist services - Gestione operazioni sulle playlist

use crate::core::{AppError, AppState, CurrentUser, Membership};
use crate::dtos::{
    AddTrackDTO, CreatePlaylistDTO, MoveTrackDTO, PlaylistDTO, UpdatePlaylistDTO,
};
use crate::entities::{TrackRef, Visibility};
use crate::repositories::Read;
use crate::store::Commit;
use axum::{
    Extension,
    extract::{Json, Path, State},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn list_playlists(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<Vec<PlaylistDTO>>, AppError> {
    debug!("Listing playlists for user");
    // 1. Recuperare tutte le playlist di cui l'utente è partecipante
    // 2. Convertire in PlaylistDTO (senza la sequenza brani, solo contatori)
    // 3. Ritornare la lista come risposta JSON
    let playlists = state
        .playlists
        .find_for_participant(&current_user.user_id)
        .await?;

    let playlists_dto: Vec<PlaylistDTO> = playlists.into_iter().map(PlaylistDTO::from).collect();

    info!("Successfully retrieved {} playlists", playlists_dto.len());
    Ok(Json(playlists_dto))
}

#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn create_playlist(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>, // ottenuto dall'autenticazione tramite token jwt
    Json(body): Json<CreatePlaylistDTO>,
) -> Result<Json<PlaylistDTO>, AppError> {
    debug!("Creating new playlist");
    // 1. Validare il body con validator
    // 2. Salvare la playlist: il creatore è owner e unico partecipante
    // 3. Ritornare il PlaylistDTO come risposta JSON

    body.validate()?;

    let playlist = state.playlists.create(&current_user.user_id, &body).await?;

    info!(
        "Playlist '{}' created successfully by user {}",
        playlist.core.name, current_user.user_id
    );
    Ok(Json(PlaylistDTO::from(playlist)))
}

#[instrument(skip(state, current_user), fields(playlist_id = %playlist_id, user_id = %current_user.user_id))]
pub async fn get_playlist(
    State(state): State<Arc<AppState>>,
    Path(playlist_id): Path<Uuid>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<PlaylistDTO>, AppError> {
    debug!("Fetching playlist detail");
    // Le playlist private sono leggibili solo dai partecipanti
    let playlist = state
        .playlists
        .read(&playlist_id)
        .await?
        .ok_or_else(|| {
            warn!("Playlist not found: {}", playlist_id);
            AppError::not_found("Playlist not found")
        })?;

    if playlist.core.visibility == Visibility::Private
        && !playlist.core.is_participant(&current_user.user_id)
    {
        warn!("User is not allowed to read private playlist");
        return Err(AppError::permission_denied(
            "This playlist is private",
        ));
    }

    Ok(Json(PlaylistDTO::detailed(playlist)))
}

#[instrument(skip(state, current_user, body), fields(playlist_id = %playlist_id, user_id = %current_user.user_id))]
pub async fn update_playlist(
    State(state): State<Arc<AppState>>,
    Path(playlist_id): Path<Uuid>,
    Extension(current_user): Extension<CurrentUser>,
    Json(body): Json<UpdatePlaylistDTO>,
) -> Result<Json<PlaylistDTO>, AppError> {
    debug!("Updating playlist metadata");
    // 1. Validare il body
    // 2. Mutazione atomica: il controllo dei diritti avviene dentro la
    //    closure (owner sempre; partecipanti solo se edit aperto a tutti)
    // 3. Applicare solo i campi Some(_) e bumpare updated_at
    // 4. Ritornare la playlist aggiornata

    body.validate()?;

    let now = Utc::now();
    let actor_id = current_user.user_id.clone();

    let (playlist, _version) = state.playlists.mutate(&playlist_id, |playlist| {
        if !playlist.can_edit(&actor_id) {
            warn!("User {} lacks edit rights on playlist", actor_id);
            return Err(AppError::permission_denied(
                "You are not allowed to edit this playlist",
            ));
        }
        if let Some(ref name) = body.name {
            playlist.core.name = name.clone();
        }
        if let Some(ref description) = body.description {
            playlist.core.description = Some(description.clone());
        }
        if let Some(visibility) = body.visibility {
            playlist.core.visibility = visibility;
        }
        if let Some(edit_permissions) = body.edit_permissions {
            playlist.edit_permissions = edit_permissions;
        }
        playlist.core.touch(now);
        Ok(Commit::Write(playlist.clone()))
    })?;

    info!("Playlist metadata updated successfully");
    Ok(Json(PlaylistDTO::from(playlist)))
}

#[instrument(skip(state, membership, body), fields(playlist_id = %membership.entity_id, user_id = %membership.user_id))]
pub async fn add_track(
    State(state): State<Arc<AppState>>,
    Extension(membership): Extension<Membership>, // ottenuto dal membership middleware
    Json(body): Json<AddTrackDTO>,
) -> Result<Json<PlaylistDTO>, AppError> {
    debug!("Adding track to playlist");
    // 1. Validare il body (formato track_id, durata)
    // 2. Mutazione atomica: diritti di edit dentro la closure, append in
    //    coda alla sequenza, ricalcolo dei campi derivati
    // 3. Ritornare la playlist aggiornata con la sequenza completa

    body.validate()?;

    let now = Utc::now();
    let actor_id = membership.user_id.clone();

    let (playlist, _version) = state.playlists.mutate(&membership.entity_id, |playlist| {
        if !playlist.can_edit(&actor_id) {
            warn!("User {} lacks edit rights on playlist", actor_id);
            return Err(AppError::permission_denied(
                "You are not allowed to edit this playlist",
            ));
        }
        playlist.tracks.push(TrackRef {
            track_id: body.track_id.clone(),
            title: body.title.clone(),
            artist: body.artist.clone(),
            duration_seconds: body.duration_seconds,
            added_by: actor_id.clone(),
            added_at: now,
        });
        playlist.recount();
        playlist.core.touch(now);
        Ok(Commit::Write(playlist.clone()))
    })?;

    info!("Track added to playlist");
    Ok(Json(PlaylistDTO::detailed(playlist)))
}

#[instrument(skip(state, membership), fields(playlist_id = %membership.entity_id, track_id = %track_id, user_id = %membership.user_id))]
pub async fn remove_playlist_track(
    State(state): State<Arc<AppState>>,
    Path((_playlist_id, track_id)): Path<(Uuid, String)>,
    Extension(membership): Extension<Membership>, // ottenuto dal membership middleware
) -> Result<Json<PlaylistDTO>, AppError> {
    debug!("Removing track from playlist");
    // Rimuove la prima occorrenza del brano; contatori ricalcolati

    let now = Utc::now();
    let actor_id = membership.user_id.clone();

    let (playlist, _version) = state.playlists.mutate(&membership.entity_id, |playlist| {
        if !playlist.can_edit(&actor_id) {
            warn!("User {} lacks edit rights on playlist", actor_id);
            return Err(AppError::permission_denied(
                "You are not allowed to edit this playlist",
            ));
        }
        let Some(position) = playlist
            .tracks
            .iter()
            .position(|t| t.track_id == track_id)
        else {
            warn!("Track not found in playlist: {}", track_id);
            return Err(AppError::not_found("Track not found in playlist"));
        };
        playlist.tracks.remove(position);
        playlist.recount();
        playlist.core.touch(now);
        Ok(Commit::Write(playlist.clone()))
    })?;

    info!("Track removed from playlist");
    Ok(Json(PlaylistDTO::detailed(playlist)))
}

#[instrument(skip(state, membership, body), fields(playlist_id = %membership.entity_id, track_id = %track_id, user_id = %membership.user_id))]
pub async fn move_track(
    State(state): State<Arc<AppState>>,
    Path((_playlist_id, track_id)): Path<(Uuid, String)>,
    Extension(membership): Extension<Membership>, // ottenuto dal membership middleware
    Json(body): Json<MoveTrackDTO>,
) -> Result<Json<PlaylistDTO>, AppError> {
    debug!("Moving track inside playlist");
    // L'ordine della sequenza è significativo (ordine di riproduzione):
    // sposta la prima occorrenza del brano alla posizione richiesta

    let now = Utc::now();
    let actor_id = membership.user_id.clone();

    let (playlist, _version) = state.playlists.mutate(&membership.entity_id, |playlist| {
        if !playlist.can_edit(&actor_id) {
            warn!("User {} lacks edit rights on playlist", actor_id);
            return Err(AppError::permission_denied(
                "You are not allowed to edit this playlist",
            ));
        }
        let Some(position) = playlist
            .tracks
            .iter()
            .position(|t| t.track_id == track_id)
        else {
            warn!("Track not found in playlist: {}", track_id);
            return Err(AppError::not_found("Track not found in playlist"));
        };
        if body.position >= playlist.tracks.len() {
            warn!("Target position {} out of bounds", body.position);
            return Err(AppError::validation("Target position is out of bounds"));
        }
        let track = playlist.tracks.remove(position);
        playlist.tracks.insert(body.position, track);
        playlist.core.touch(now);
        Ok(Commit::Write(playlist.clone()))
    })?;

    info!("Track moved successfully");
    Ok(Json(PlaylistDTO::detailed(playlist)))
}
