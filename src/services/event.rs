//! Event services - Gestione eventi live e ammissione geografica

use crate::core::{AppError, AppState, CurrentUser, Membership, require_owner};
use crate::dtos::{AccessDTO, AccessQuery, CreateEventDTO, EventDTO, UpdateEventDTO};
use crate::entities::Visibility;
use crate::geofence::{self, GeoPoint};
use crate::repositories::Read;
use crate::store::Commit;
use axum::{
    Extension,
    extract::{Json, Path, Query, State},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<Vec<EventDTO>>, AppError> {
    debug!("Listing events for user");
    let events = state
        .events
        .find_for_participant(&current_user.user_id)
        .await?;

    let events_dto: Vec<EventDTO> = events.into_iter().map(EventDTO::from).collect();

    info!("Successfully retrieved {} events", events_dto.len());
    Ok(Json(events_dto))
}

#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>, // ottenuto dall'autenticazione tramite token jwt
    Json(body): Json<CreateEventDTO>,
) -> Result<Json<EventDTO>, AppError> {
    debug!("Creating new event");
    // 1. Validare il body (nome, coordinate e raggio del geofence)
    // 2. Verificare che la finestra temporale sia sensata (start < end)
    // 3. Salvare l'evento: il creatore è owner, unico partecipante e
    //    unico host
    // 4. Ritornare l'EventDTO come risposta JSON

    body.validate()?;

    if body.start_at >= body.end_at {
        warn!("Event window is empty or inverted");
        return Err(AppError::validation("Event must start before it ends"));
    }

    let event = state.events.create(&current_user.user_id, &body).await?;

    info!(
        "Event '{}' created successfully by user {}",
        event.core.name, current_user.user_id
    );
    Ok(Json(EventDTO::from(event)))
}

#[instrument(skip(state, current_user), fields(event_id = %event_id, user_id = %current_user.user_id))]
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<EventDTO>, AppError> {
    debug!("Fetching event detail");
    // Gli eventi privati sono leggibili solo dai partecipanti
    let event = state.events.read(&event_id).await?.ok_or_else(|| {
        warn!("Event not found: {}", event_id);
        AppError::not_found("Event not found")
    })?;

    if event.core.visibility == Visibility::Private
        && !event.core.is_participant(&current_user.user_id)
    {
        warn!("User is not allowed to read private event");
        return Err(AppError::permission_denied("This event is private"));
    }

    Ok(Json(EventDTO::detailed(event)))
}

#[instrument(skip(state, current_user, body), fields(event_id = %event_id, user_id = %current_user.user_id))]
pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
    Extension(current_user): Extension<CurrentUser>,
    Json(body): Json<UpdateEventDTO>,
) -> Result<Json<EventDTO>, AppError> {
    debug!("Updating event metadata");
    // 1. Validare il body
    // 2. Mutazione atomica: possono modificare owner e host (gli host sono
    //    gli organizzatori), controllo dentro la closure
    // 3. Applicare solo i campi Some(_); geofence assente = non toccare,
    //    clear_geofence = rimozione esplicita
    // 4. La finestra risultante deve restare valida (start < end)
    // 5. Ritornare l'evento aggiornato

    body.validate()?;

    let now = Utc::now();
    let actor_id = current_user.user_id.clone();

    let (event, _version) = state.events.mutate(&event_id, |event| {
        if event.core.owner_id != actor_id && !event.is_host(&actor_id) {
            warn!("User {} lacks edit rights on event", actor_id);
            return Err(AppError::permission_denied(
                "Only the owner or a host can edit this event",
            ));
        }

        if let Some(ref name) = body.name {
            event.core.name = name.clone();
        }
        if let Some(ref description) = body.description {
            event.core.description = Some(description.clone());
        }
        if let Some(visibility) = body.visibility {
            event.core.visibility = visibility;
        }
        if let Some(vote_license) = body.vote_license {
            event.vote_license = vote_license;
        }

        let start_at = body.start_at.unwrap_or(event.start_at);
        let end_at = body.end_at.unwrap_or(event.end_at);
        if start_at >= end_at {
            warn!("Resulting event window is empty or inverted");
            return Err(AppError::validation("Event must start before it ends"));
        }
        event.start_at = start_at;
        event.end_at = end_at;

        if body.clear_geofence.unwrap_or(false) {
            event.geofence = None;
        } else if let Some(ref geofence) = body.geofence {
            event.geofence = Some(geofence.clone().into());
        }

        event.core.touch(now);
        Ok(Commit::Write(event.clone()))
    })?;

    info!("Event metadata updated successfully");
    Ok(Json(EventDTO::from(event)))
}

#[instrument(skip(state, current_user, params), fields(event_id = %event_id, user_id = %current_user.user_id))]
pub async fn check_access(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
    Query(params): Query<AccessQuery>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<AccessDTO>, AppError> {
    debug!("Checking geofence admission");
    // 1. Recuperare l'evento
    // 2. Costruire la posizione dal geolocation provider (query param;
    //    parametri assenti = posizione non disponibile)
    // 3. Delegare la decisione al gate puro: nessun geofence o
    //    partecipante esistente -> ammesso, bordo del raggio incluso
    // 4. Ritornare {can_access, reason?, distance_meters?}

    let event = state.events.read(&event_id).await?.ok_or_else(|| {
        warn!("Event not found: {}", event_id);
        AppError::not_found("Event not found")
    })?;

    let user_location = match (params.lat, params.lng) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
        }),
        _ => None,
    };

    let decision = geofence::check_access(
        user_location.as_ref(),
        event.geofence.as_ref(),
        event.core.is_participant(&current_user.user_id),
    );

    info!(
        can_access = decision.can_access,
        "Geofence admission decision computed"
    );
    Ok(Json(AccessDTO {
        can_access: decision.can_access,
        reason: decision.reason.map(|r| r.to_string()),
        distance_meters: decision.distance_meters,
    }))
}

#[instrument(skip(state, membership), fields(event_id = %event_id, target_user = %user_id))]
pub async fn add_host(
    State(state): State<Arc<AppState>>,
    Path((event_id, user_id)): Path<(Uuid, String)>,
    Extension(membership): Extension<Membership>, // ottenuto dal membership middleware
) -> Result<(), AppError> {
    debug!("Adding host to event");
    // 1. Solo l'owner gestisce gli host (fail-fast)
    // 2. L'host deve essere un partecipante (host ⊆ partecipanti)
    // 3. Aggiunta idempotente

    require_owner(&membership)?;

    let now = Utc::now();
    let target_id = user_id.clone();

    state.events.mutate(&event_id, |event| {
        if !event.core.is_participant(&target_id) {
            warn!("Host candidate {} is not a participant", target_id);
            return Err(AppError::validation("A host must be a participant"));
        }
        if event.add_host(&target_id) {
            event.core.touch(now);
            Ok(Commit::Write(()))
        } else {
            Ok(Commit::Keep(()))
        }
    })?;

    info!("Host added to event");
    Ok(())
}

#[instrument(skip(state, membership), fields(event_id = %event_id, target_user = %user_id))]
pub async fn remove_host(
    State(state): State<Arc<AppState>>,
    Path((event_id, user_id)): Path<(Uuid, String)>,
    Extension(membership): Extension<Membership>, // ottenuto dal membership middleware
) -> Result<(), AppError> {
    debug!("Removing host from event");
    // L'owner resta sempre host: non può essere degradato da qui

    require_owner(&membership)?;

    let now = Utc::now();
    let target_id = user_id.clone();

    state.events.mutate(&event_id, |event| {
        if event.core.owner_id == target_id {
            warn!("Attempted to remove the owner from the host set");
            return Err(AppError::invalid_state("The owner is always a host"));
        }
        if event.remove_host(&target_id) {
            event.core.touch(now);
            Ok(Commit::Write(()))
        } else {
            Ok(Commit::Keep(()))
        }
    })?;

    info!("Host removed from event");
    Ok(())
}
