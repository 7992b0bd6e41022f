//! Connection services - Gestione delle amicizie tra utenti
//!
//! Una coppia di utenti ha sempre un unico record canonico, con chiave
//! ordinata: richieste duplicate vengono riassorbite, mai duplicate.

use crate::core::{AppError, AppState, CurrentUser};
use crate::dtos::{ConnectionDTO, ConnectionsQuery, SyncEventDTO};
use crate::entities::{ConnectionStatus, pair_key};
use crate::notify::{NotificationPayload, notify_best_effort};
use crate::repositories::{Create, Delete, NewConnectionDTO, Read};
use crate::store::Commit;
use crate::sync::sessionmap::InternalSignal;
use axum::{
    Extension,
    extract::{Json, Path, Query, State},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[instrument(skip(state, current_user, params), fields(user_id = %current_user.user_id))]
pub async fn list_connections(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Query(params): Query<ConnectionsQuery>,
) -> Result<Json<Vec<ConnectionDTO>>, AppError> {
    debug!("Listing connections for user");
    let connections = state
        .connections
        .find_for_user(&current_user.user_id, params.status)
        .await?;

    let connections_dto: Vec<ConnectionDTO> =
        connections.into_iter().map(ConnectionDTO::from).collect();

    info!(
        "Successfully retrieved {} connections",
        connections_dto.len()
    );
    Ok(Json(connections_dto))
}

#[instrument(skip(state, current_user), fields(requester = %current_user.user_id, target = %user_id))]
pub async fn request_connection(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ConnectionDTO>, AppError> {
    debug!("Requesting connection");
    // 1. Rifiutare l'auto-connessione
    // 2. Cercare il record canonico della coppia:
    //    - accepted -> invalid_state (già amici)
    //    - pending dello stesso richiedente -> ritornare quello (merge)
    //    - pending dell'altro -> invalid_state (deve rispondere, non
    //      richiedere)
    //    - rejected -> riaprire a pending con il nuovo richiedente
    //    - assente -> creare il record
    // 3. Consegnare ConnectionRequested al destinatario + push best-effort

    if user_id == current_user.user_id {
        warn!("User attempted to connect with themselves");
        return Err(AppError::validation("You cannot connect with yourself"));
    }

    let key = pair_key(&current_user.user_id, &user_id);
    let requester_id = current_user.user_id.clone();

    let connection = match state.connections.read(&key).await? {
        Some(existing) => match existing.status {
            ConnectionStatus::Accepted => {
                warn!("Users are already connected");
                return Err(AppError::invalid_state("You are already connected"));
            }
            ConnectionStatus::Pending => {
                if existing.requested_by == requester_id {
                    info!("Pending request already exists, returning it");
                    return Ok(Json(existing.into()));
                }
                warn!("Counterpart already sent a pending request");
                return Err(AppError::invalid_state(
                    "This user already sent you a request: respond to it instead",
                ));
            }
            ConnectionStatus::Rejected => {
                // Una richiesta nuova riapre il record canonico
                let now = Utc::now();
                let (reopened, _version) = state.connections.mutate(&key, |conn| {
                    conn.status = ConnectionStatus::Pending;
                    conn.requested_by = requester_id.clone();
                    conn.responded_by = None;
                    conn.updated_at = now;
                    Ok::<_, AppError>(Commit::Write(conn.clone()))
                })?;
                reopened
            }
        },
        None => {
            state
                .connections
                .create(&NewConnectionDTO {
                    requester: requester_id.clone(),
                    target: user_id.clone(),
                })
                .await?
        }
    };

    state.sessions.send_if_online(
        &user_id,
        InternalSignal::Deliver(SyncEventDTO::ConnectionRequested(
            connection.clone().into(),
        )),
    );
    notify_best_effort(
        state.notifier.as_ref(),
        &user_id,
        NotificationPayload {
            title: "New connection request".to_string(),
            body: format!("{} wants to connect with you", current_user.username),
            entity_id: None,
        },
    );

    info!("Connection requested successfully");
    Ok(Json(connection.into()))
}

#[instrument(skip(state, current_user), fields(connection_id = %connection_id, action = %action, user_id = %current_user.user_id))]
pub async fn respond_connection(
    State(state): State<Arc<AppState>>,
    Path((connection_id, action)): Path<(String, String)>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ConnectionDTO>, AppError> {
    debug!("Responding to connection request");
    // 1. Validare che action sia "accept" o "reject"
    // 2. Transizione CAS dentro la mutazione atomica: solo il membro della
    //    coppia che NON ha richiesto può rispondere, solo su pending
    // 3. Consegnare ConnectionAnswered al richiedente + push best-effort

    let new_status = match action.as_str() {
        "accept" => ConnectionStatus::Accepted,
        "reject" => ConnectionStatus::Rejected,
        _ => {
            warn!("Invalid connection action: {}", action);
            return Err(AppError::validation("Action must be 'accept' or 'reject'"));
        }
    };

    let now = Utc::now();
    let actor_id = current_user.user_id.clone();

    let (connection, _version) = state
        .connections
        .mutate(&connection_id, |conn| {
            if conn.status != ConnectionStatus::Pending {
                warn!("Connection is already processed: {:?}", conn.status);
                return Err(AppError::invalid_state(
                    "Connection request is already processed",
                ));
            }
            if !conn.involves(&actor_id) || conn.requested_by == actor_id {
                warn!("User {} cannot respond to this request", actor_id);
                return Err(AppError::permission_denied(
                    "Only the requested user can respond",
                ));
            }
            conn.status = new_status;
            conn.responded_by = Some(actor_id.clone());
            conn.updated_at = now;
            Ok(Commit::Write(conn.clone()))
        })
        .map_err(|e: AppError| {
            if e.kind() == "not_found" {
                AppError::not_found("Connection not found")
            } else {
                e
            }
        })?;

    let requester = connection.requested_by.clone();
    state.sessions.send_if_online(
        &requester,
        InternalSignal::Deliver(SyncEventDTO::ConnectionAnswered(connection.clone().into())),
    );
    notify_best_effort(
        state.notifier.as_ref(),
        &requester,
        NotificationPayload {
            title: match new_status {
                ConnectionStatus::Accepted => "Connection accepted".to_string(),
                _ => "Connection declined".to_string(),
            },
            body: format!("{} responded to your request", current_user.username),
            entity_id: None,
        },
    );

    info!("Connection response processed successfully");
    Ok(Json(connection.into()))
}

#[instrument(skip(state, current_user), fields(connection_id = %connection_id, user_id = %current_user.user_id))]
pub async fn remove_connection(
    State(state): State<Arc<AppState>>,
    Path(connection_id): Path<String>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<(), AppError> {
    debug!("Removing connection");
    // Entrambi i membri possono troncare la relazione, nessun altro

    let connection = state
        .connections
        .read(&connection_id)
        .await?
        .ok_or_else(|| {
            warn!("Connection not found: {}", connection_id);
            AppError::not_found("Connection not found")
        })?;

    if !connection.involves(&current_user.user_id) {
        warn!("User is not part of this connection");
        return Err(AppError::permission_denied(
            "You are not part of this connection",
        ));
    }

    state.connections.delete(&connection_id).await?;

    info!("Connection removed successfully");
    Ok(())
}
