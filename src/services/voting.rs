//! Voting services - Coda votabile degli eventi
//!
//! Tutte le scritture su coda e votanti avvengono dentro la mutazione
//! atomica del documento evento: due votanti concorrenti vengono
//! serializzati dallo store e nessun voto va perso.

use crate::core::{AppError, AppState, CurrentUser, Membership, require_owner_or_host};
use crate::dtos::{EventDTO, NowPlayingDTO, QueueTrackDTO, SyncEventDTO, VoteResultDTO};
use crate::entities::QueuedTrack;
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

#[instrument(skip(state, membership, body), fields(event_id = %membership.entity_id, user_id = %membership.user_id))]
pub async fn queue_track(
    State(state): State<Arc<AppState>>,
    Extension(membership): Extension<Membership>, // ottenuto dal membership middleware
    Json(body): Json<QueueTrackDTO>,
) -> Result<Json<EventDTO>, AppError> {
    debug!("Queueing track for event");
    // 1. Validare il formato del track_id
    // 2. Mutazione atomica: a evento terminato la coda è congelata,
    //    un brano già in coda non viene duplicato
    // 3. Ritornare l'evento con la coda aggiornata

    body.validate()?;

    let now = Utc::now();
    let actor_id = membership.user_id.clone();

    let (event, _version) = state.events.mutate(&membership.entity_id, |event| {
        if now >= event.end_at {
            warn!("Attempted to queue a track on an ended event");
            return Err(AppError::invalid_state("Event has already ended"));
        }
        if event.queue.contains_key(&body.track_id) {
            warn!("Track {} is already queued", body.track_id);
            return Err(AppError::invalid_state("Track is already queued"));
        }
        event
            .queue
            .insert(body.track_id.clone(), QueuedTrack::new(&actor_id, now));
        event.core.touch(now);
        Ok(Commit::Write(event.clone()))
    })?;

    info!("Track queued successfully");
    Ok(Json(EventDTO::detailed(event)))
}

#[instrument(skip(state, current_user), fields(event_id = %event_id, track_id = %track_id, user_id = %current_user.user_id))]
pub async fn toggle_vote(
    State(state): State<Arc<AppState>>,
    Path((event_id, track_id)): Path<(Uuid, String)>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<VoteResultDTO>, AppError> {
    debug!("Toggling vote on queued track");
    // Precondizioni, verificate in ordine dentro la mutazione atomica:
    // 1. L'evento deve essere attivo (start_at <= now < end_at)
    // 2. Il brano in riproduzione è bloccato contro i cambi di voto
    // 3. Idoneità del chiamante secondo la vote_license
    // Poi: flip del voto sull'insieme dei votanti; il conteggio è sempre
    // ricalcolato da |voter_ids|, mai tenuto a parte.
    //
    // Attenzione lato client: il retry cieco di un toggle su errore di rete
    // può annullare il voto appena messo; per reti inaffidabili servono
    // intent distinti vote/unvote.

    let now = Utc::now();
    let actor_id = current_user.user_id.clone();

    let (result, _version) = state.events.mutate(&event_id, |event| {
        if !event.is_active(now) {
            warn!("Vote attempted outside the active window");
            return Err(AppError::invalid_state("Event is not currently active"));
        }
        if event.now_playing.as_deref() == Some(track_id.as_str()) {
            warn!("Vote attempted on the currently playing track");
            return Err(AppError::invalid_state(
                "The playing track is locked against vote changes",
            ));
        }
        if !event.may_vote(&actor_id) {
            warn!("User {} is not eligible to vote", actor_id);
            return Err(AppError::permission_denied(
                "Voting on this event is restricted to participants",
            ));
        }
        let Some(track) = event.queue.get_mut(&track_id) else {
            warn!("Track not found in queue: {}", track_id);
            return Err(AppError::not_found("Track not found in queue"));
        };
        let voted = track.toggle_vote(&actor_id);
        let vote_count = track.vote_count();
        event.core.touch(now);
        Ok(Commit::Write(VoteResultDTO { voted, vote_count }))
    })?;

    // Evento dedicato con il nuovo conteggio per gli osservatori
    let topic = event_id.to_string();
    let _ = state.topics.send(
        &topic,
        Arc::new(SyncEventDTO::VoteChanged {
            event_id: topic.clone(),
            track_id: track_id.clone(),
            vote_count: result.vote_count,
        }),
    );

    info!(
        voted = result.voted,
        vote_count = result.vote_count,
        "Vote toggled successfully"
    );
    Ok(Json(result))
}

#[instrument(skip(state, membership), fields(event_id = %membership.entity_id, track_id = %track_id, user_id = %membership.user_id))]
pub async fn remove_queued_track(
    State(state): State<Arc<AppState>>,
    Path((_event_id, track_id)): Path<(Uuid, String)>,
    Extension(membership): Extension<Membership>, // ottenuto dal membership middleware
) -> Result<Json<EventDTO>, AppError> {
    debug!("Removing track from event queue");
    // Solo chi ha aggiunto il brano può rimuoverlo, e solo finché non ha
    // voti: un brano votato non si rimuove unilateralmente

    let now = Utc::now();
    let actor_id = membership.user_id.clone();

    let (event, _version) = state.events.mutate(&membership.entity_id, |event| {
        let Some(track) = event.queue.get(&track_id) else {
            warn!("Track not found in queue: {}", track_id);
            return Err(AppError::not_found("Track not found in queue"));
        };
        if track.added_by != actor_id {
            warn!("User {} did not add track {}", actor_id, track_id);
            return Err(AppError::permission_denied(
                "Only the user who added the track can remove it",
            ));
        }
        if track.vote_count() > 0 {
            warn!("Track {} still has votes", track_id);
            return Err(AppError::invalid_state(
                "A track with votes cannot be removed",
            ));
        }
        if event.now_playing.as_deref() == Some(track_id.as_str()) {
            warn!("Track {} is currently playing", track_id);
            return Err(AppError::invalid_state(
                "The playing track cannot be removed",
            ));
        }
        event.queue.remove(&track_id);
        event.core.touch(now);
        Ok(Commit::Write(event.clone()))
    })?;

    info!("Track removed from queue");
    Ok(Json(EventDTO::detailed(event)))
}

#[instrument(skip(state, membership, body), fields(event_id = %membership.entity_id, user_id = %membership.user_id))]
pub async fn set_now_playing(
    State(state): State<Arc<AppState>>,
    Extension(membership): Extension<Membership>, // ottenuto dal membership middleware
    Json(body): Json<NowPlayingDTO>,
) -> Result<Json<EventDTO>, AppError> {
    debug!("Setting now playing track");
    // 1. Solo owner o host pilotano la riproduzione (fail-fast)
    // 2. Il brano deve essere in coda; None azzera la riproduzione
    // 3. Il brano impostato risulta bloccato per i cambi di voto

    require_owner_or_host(&membership)?;

    let now = Utc::now();

    let (event, _version) = state.events.mutate(&membership.entity_id, |event| {
        if let Some(ref track_id) = body.track_id {
            if !event.queue.contains_key(track_id) {
                warn!("Track not found in queue: {}", track_id);
                return Err(AppError::not_found("Track not found in queue"));
            }
        }
        event.now_playing = body.track_id.clone();
        event.core.touch(now);
        Ok(Commit::Write(event.clone()))
    })?;

    info!("Now playing updated");
    Ok(Json(EventDTO::detailed(event)))
}
