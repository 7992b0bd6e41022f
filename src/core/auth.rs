use crate::core::{AppError, AppState};
use crate::entities::EntityKind;
use crate::repositories::Read;
use axum::extract::State;
use axum::{Error, body::Body, extract::Request, http, http::Response, middleware::Next};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// struct che codifica il contenuto del token jwt emesso dall'identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub exp: usize, // Expiry time of the token
    pub iat: usize, // Issued at time of the token
    pub sub: String, // user id opaco assegnato dall'identity provider
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Utente autenticato risolto dal token, inserito nelle Extension
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
}

/// Membership dell'utente corrente nell'entità del path, inserita nelle
/// Extension dai membership middleware
#[derive(Debug, Clone)]
pub struct Membership {
    pub entity_id: Uuid,
    pub entity_kind: EntityKind,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    pub is_owner: bool,
    pub is_host: bool,
}

#[instrument(skip(secret, email), fields(username = %username, user_id = %user_id))]
pub fn encode_jwt(
    user_id: &str,
    username: &str,
    email: Option<String>,
    secret: &str,
) -> Result<String, Error> {
    debug!("Encoding JWT token for user");
    let now = Utc::now();
    let expire: chrono::TimeDelta = Duration::hours(24);
    let exp: usize = (now + expire).timestamp() as usize;
    let iat: usize = now.timestamp() as usize;
    let claim = Claims {
        iat,
        exp,
        sub: user_id.to_string(),
        username: username.to_string(),
        email,
    };

    encode(
        &Header::default(),
        &claim,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map(|token| {
        info!("JWT token encoded successfully");
        token
    })
    .map_err(|e| {
        error!("Failed to encode JWT token: {:?}", e);
        Error::new("Error in encoding jwt token")
    })
}

#[instrument(skip(jwt_token, secret))]
pub fn decode_jwt(jwt_token: &str, secret: &str) -> Result<TokenData<Claims>, Error> {
    debug!("Decoding JWT token");
    decode(
        jwt_token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map(|data: TokenData<Claims>| {
        info!(
            "JWT token decoded successfully for user: {}",
            data.claims.username
        );
        data
    })
    .map_err(|e| {
        error!("Failed to decode JWT token: {:?}", e);
        Error::new("Error in decoding jwt token")
    })
}

#[instrument(skip(state, req, next))]
pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running authentication middleware");
    let auth_header = req.headers().get(http::header::AUTHORIZATION);
    let auth_header = match auth_header {
        Some(header) => header.to_str().map_err(|_| {
            warn!("Invalid authorization header format");
            AppError::permission_denied("Empty header is not allowed")
        })?,
        None => {
            warn!("Missing authorization header");
            return Err(AppError::permission_denied(
                "Please add the JWT token to the header",
            ));
        }
    };

    let mut header = auth_header.split_whitespace();
    let (_bearer, token) = (header.next(), header.next());
    let token = token.ok_or_else(|| {
        warn!("Malformed authorization header");
        AppError::permission_denied("Malformed authorization header")
    })?;

    let token_data = match decode_jwt(token, &state.jwt_secret) {
        Ok(data) => data,
        Err(_) => {
            warn!("Failed to decode JWT token");
            return Err(AppError::unauthorized("Unable to decode token"));
        }
    };

    // L'identity provider è esterno: il token firmato è la fonte di verità
    let current_user = CurrentUser {
        user_id: token_data.claims.sub,
        username: token_data.claims.username,
        email: token_data.claims.email,
    };

    info!("User authenticated: {}", current_user.username);
    req.extensions_mut().insert(current_user);
    Ok(next.run(req).await)
}

/// Estrae il primo segmento del path che parsa come Uuid
fn entity_id_from_path(req: &Request) -> Result<Uuid, AppError> {
    req.uri()
        .path()
        .split('/')
        .find_map(|segment| segment.parse::<Uuid>().ok())
        .ok_or_else(|| {
            warn!("Entity id not found in path: {}", req.uri().path());
            AppError::validation("Entity id not found in path")
        })
}

fn current_user_from_extensions(req: &Request) -> Result<CurrentUser, AppError> {
    req.extensions()
        .get::<CurrentUser>()
        .cloned()
        .ok_or_else(|| {
            warn!("User not found in request extensions");
            AppError::unauthorized("User not authenticated")
        })
}

/// Middleware che verifica che l'utente corrente sia partecipante della
/// playlist nel path e inserisce la Membership nell'Extension
#[instrument(skip(state, req, next))]
pub async fn playlist_membership_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running playlist membership middleware");
    let current_user = current_user_from_extensions(&req)?;
    let playlist_id = entity_id_from_path(&req)?;

    let playlist = state
        .playlists
        .read(&playlist_id)
        .await?
        .ok_or_else(|| {
            warn!("Playlist not found: {}", playlist_id);
            AppError::not_found("Playlist not found")
        })?;

    let participant = playlist
        .core
        .participant(&current_user.user_id)
        .ok_or_else(|| {
            warn!(
                "User {} is not a participant of playlist {}",
                current_user.user_id, playlist_id
            );
            AppError::permission_denied("You are not a participant of this playlist")
        })?;

    let membership = Membership {
        entity_id: playlist_id,
        entity_kind: EntityKind::Playlist,
        user_id: current_user.user_id.clone(),
        joined_at: participant.joined_at,
        is_owner: playlist.core.owner_id == current_user.user_id,
        is_host: false,
    };

    info!(
        "User {} verified as participant of playlist {}",
        current_user.user_id, playlist_id
    );
    req.extensions_mut().insert(membership);
    Ok(next.run(req).await)
}

/// Middleware che verifica che l'utente corrente sia partecipante
/// dell'evento nel path e inserisce la Membership nell'Extension
#[instrument(skip(state, req, next))]
pub async fn event_membership_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running event membership middleware");
    let current_user = current_user_from_extensions(&req)?;
    let event_id = entity_id_from_path(&req)?;

    let event = state.events.read(&event_id).await?.ok_or_else(|| {
        warn!("Event not found: {}", event_id);
        AppError::not_found("Event not found")
    })?;

    let participant = event
        .core
        .participant(&current_user.user_id)
        .ok_or_else(|| {
            warn!(
                "User {} is not a participant of event {}",
                current_user.user_id, event_id
            );
            AppError::permission_denied("You are not a participant of this event")
        })?;

    let membership = Membership {
        entity_id: event_id,
        entity_kind: EntityKind::Event,
        user_id: current_user.user_id.clone(),
        joined_at: participant.joined_at,
        is_owner: event.core.owner_id == current_user.user_id,
        is_host: event.is_host(&current_user.user_id),
    };

    info!(
        "User {} verified as participant of event {}",
        current_user.user_id, event_id
    );
    req.extensions_mut().insert(membership);
    Ok(next.run(req).await)
}

/// Helper per verificare che l'attore sia l'owner dell'entità
#[instrument(skip(membership))]
pub fn require_owner(membership: &Membership) -> Result<(), AppError> {
    if !membership.is_owner {
        warn!(
            "User {} is not the owner of {} {}",
            membership.user_id,
            membership.entity_kind.as_str(),
            membership.entity_id
        );
        return Err(AppError::permission_denied(
            "This action requires entity ownership",
        ));
    }
    Ok(())
}

/// Helper per azioni riservate a owner o host (eventi)
#[instrument(skip(membership))]
pub fn require_owner_or_host(membership: &Membership) -> Result<(), AppError> {
    if !membership.is_owner && !membership.is_host {
        warn!(
            "User {} is neither owner nor host of {} {}",
            membership.user_id,
            membership.entity_kind.as_str(),
            membership.entity_id
        );
        return Err(AppError::permission_denied(
            "This action requires owner or host role",
        ));
    }
    Ok(())
}
