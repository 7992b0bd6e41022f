//! Event DTOs - Data Transfer Objects per eventi

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{Event, Geofence, Visibility, VoteLicense};

/// Struct per gestire io col client
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EventDTO {
    pub event_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner_id: String,
    pub visibility: Visibility,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub vote_license: VoteLicense,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geofence: Option<Geofence>,
    pub host_ids: Vec<String>,
    pub participant_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub now_playing: Option<String>,
    /// Popolata solo nella GET di dettaglio, ordinata per voti decrescenti
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<Vec<QueuedTrackDTO>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Event> for EventDTO {
    fn from(value: Event) -> Self {
        Self {
            event_id: value.event_id,
            name: value.core.name,
            description: value.core.description,
            owner_id: value.core.owner_id,
            visibility: value.core.visibility,
            start_at: value.start_at,
            end_at: value.end_at,
            vote_license: value.vote_license,
            geofence: value.geofence,
            host_ids: value.host_ids,
            participant_count: value.core.participants.len(),
            now_playing: value.now_playing,
            queue: None, // da popolare manualmente se necessario
            created_at: value.core.created_at,
            updated_at: value.core.updated_at,
        }
    }
}

impl EventDTO {
    /// Variante di dettaglio con la coda inclusa, voti decrescenti poi
    /// ordine di inserimento
    pub fn detailed(value: Event) -> Self {
        let mut queue: Vec<QueuedTrackDTO> = value
            .queue
            .iter()
            .map(|(track_id, track)| QueuedTrackDTO {
                track_id: track_id.clone(),
                added_by: track.added_by.clone(),
                added_at: track.added_at,
                vote_count: track.vote_count(),
            })
            .collect();
        queue.sort_by(|a, b| {
            b.vote_count
                .cmp(&a.vote_count)
                .then_with(|| a.added_at.cmp(&b.added_at))
        });
        let mut dto = Self::from(value);
        dto.queue = Some(queue);
        dto
    }
}

/// Vista client di un brano in coda: il conteggio è derivato dall'insieme
/// dei votanti, mai memorizzato a parte
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QueuedTrackDTO {
    pub track_id: String,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
    pub vote_count: usize,
}

/// DTO del geofence in ingresso
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct GeofenceDTO {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = 1.0, max = 100_000.0))]
    pub radius_meters: f64,
    #[validate(length(max = 200))]
    pub location_name: Option<String>,
}

impl From<GeofenceDTO> for Geofence {
    fn from(value: GeofenceDTO) -> Self {
        Geofence {
            latitude: value.latitude,
            longitude: value.longitude,
            radius_meters: value.radius_meters,
            location_name: value.location_name,
        }
    }
}

/// DTO per creare un nuovo evento
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateEventDTO {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub vote_license: Option<VoteLicense>,
    #[validate(nested)]
    pub geofence: Option<GeofenceDTO>,
}

/// DTO per aggiornare i metadati dell'evento.
/// `geofence` assente significa "non toccare"; per rimuovere il geofence
/// va inviato `clear_geofence: true` (assente e azzerato sono distinti).
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct UpdateEventDTO {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub vote_license: Option<VoteLicense>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    #[validate(nested)]
    pub geofence: Option<GeofenceDTO>,
    pub clear_geofence: Option<bool>,
}

/// DTO per accodare un brano alla coda dell'evento
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct QueueTrackDTO {
    #[validate(regex(path = *crate::dtos::TRACK_ID_RE))]
    pub track_id: String,
}

/// Esito del toggle di voto
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VoteResultDTO {
    pub voted: bool,
    pub vote_count: usize,
}

/// DTO per impostare (o azzerare con `None`) il brano in riproduzione
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NowPlayingDTO {
    pub track_id: Option<String>,
}

/// Esito del controllo di ammissione geografica
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccessDTO {
    pub can_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
}
