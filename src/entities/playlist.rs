//! Playlist entity - Entità playlist collaborativa

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::collab::CollabCore;
use super::enums::EditPermissions;

/// Riferimento a un brano del catalogo, in posizione ordinata
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TrackRef {
    pub track_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    pub duration_seconds: u32,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Playlist {
    pub playlist_id: Uuid,
    #[serde(flatten)]
    pub core: CollabCore,
    pub edit_permissions: EditPermissions,
    /// Sequenza ordinata: l'ordine è quello di riproduzione
    pub tracks: Vec<TrackRef>,
    pub track_count: u32,
    pub total_duration_seconds: u64,
}

impl Playlist {
    pub fn new(core: CollabCore, edit_permissions: EditPermissions) -> Self {
        Playlist {
            playlist_id: Uuid::new_v4(),
            core,
            edit_permissions,
            tracks: Vec::new(),
            track_count: 0,
            total_duration_seconds: 0,
        }
    }

    /// Ricalcola i campi derivati dalla sequenza dei brani.
    /// Va chiamata dopo ogni mutazione di `tracks`: i contatori non vengono
    /// mai aggiornati in modo incrementale.
    pub fn recount(&mut self) {
        self.track_count = self.tracks.len() as u32;
        self.total_duration_seconds = self
            .tracks
            .iter()
            .map(|t| u64::from(t.duration_seconds))
            .sum();
    }

    /// Diritti di modifica: owner sempre; ogni partecipante se la playlist
    /// è aperta a tutti
    pub fn can_edit(&self, user_id: &str) -> bool {
        if self.core.owner_id == user_id {
            return true;
        }
        self.edit_permissions == EditPermissions::Everyone && self.core.is_participant(user_id)
    }
}
