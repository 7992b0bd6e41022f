//! Playlist DTOs - Data Transfer Objects per playlist

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{EditPermissions, Playlist, TrackRef, Visibility};

/// Struct per gestire io col client
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlaylistDTO {
    pub playlist_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner_id: String,
    pub visibility: Visibility,
    pub edit_permissions: EditPermissions,
    pub participant_count: usize,
    pub track_count: u32,
    pub total_duration_seconds: u64,
    /// Popolata solo nella GET di dettaglio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<TrackRef>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Playlist> for PlaylistDTO {
    fn from(value: Playlist) -> Self {
        Self {
            playlist_id: value.playlist_id,
            name: value.core.name,
            description: value.core.description,
            owner_id: value.core.owner_id,
            visibility: value.core.visibility,
            edit_permissions: value.edit_permissions,
            participant_count: value.core.participants.len(),
            track_count: value.track_count,
            total_duration_seconds: value.total_duration_seconds,
            tracks: None, // da popolare manualmente se necessario
            created_at: value.core.created_at,
            updated_at: value.core.updated_at,
        }
    }
}

impl PlaylistDTO {
    /// Variante di dettaglio con la sequenza dei brani inclusa
    pub fn detailed(value: Playlist) -> Self {
        let tracks = value.tracks.clone();
        let mut dto = Self::from(value);
        dto.tracks = Some(tracks);
        dto
    }
}

/// DTO per creare una nuova playlist
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreatePlaylistDTO {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub edit_permissions: Option<EditPermissions>,
}

/// DTO per aggiornare i metadati (solo i campi `Some(_)` vengono applicati)
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct UpdatePlaylistDTO {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub edit_permissions: Option<EditPermissions>,
}

/// DTO per accodare un brano alla playlist
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct AddTrackDTO {
    #[validate(regex(path = *crate::dtos::TRACK_ID_RE))]
    pub track_id: String,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 200))]
    pub artist: Option<String>,
    #[validate(range(min = 1, max = 36000))]
    pub duration_seconds: u32,
}

/// DTO per spostare un brano in una nuova posizione (0-based)
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MoveTrackDTO {
    pub position: usize,
}
