//! Event entity - Entità evento live con coda votabile

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::collab::CollabCore;
use super::enums::VoteLicense;

/// Regione circolare che limita l'ingresso all'evento per i non partecipanti
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Geofence {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
}

/// Brano in coda con l'insieme dei votanti.
/// Il conteggio voti è sempre `voter_ids.len()`: non esiste un contatore
/// separato che possa divergere dall'insieme.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QueuedTrack {
    pub added_by: String,
    pub added_at: DateTime<Utc>,
    pub voter_ids: Vec<String>,
}

impl QueuedTrack {
    pub fn new(added_by: &str, now: DateTime<Utc>) -> Self {
        QueuedTrack {
            added_by: added_by.to_string(),
            added_at: now,
            voter_ids: Vec::new(),
        }
    }

    pub fn vote_count(&self) -> usize {
        self.voter_ids.len()
    }

    /// Inverte il voto dell'utente; ritorna true se dopo la chiamata il
    /// voto è presente
    pub fn toggle_vote(&mut self, user_id: &str) -> bool {
        if let Some(position) = self.voter_ids.iter().position(|v| v == user_id) {
            self.voter_ids.remove(position);
            false
        } else {
            self.voter_ids.push(user_id.to_string());
            true
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Event {
    pub event_id: Uuid,
    #[serde(flatten)]
    pub core: CollabCore,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub vote_license: VoteLicense,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geofence: Option<Geofence>,
    /// Organizzatori: sempre un sottoinsieme dei partecipanti
    pub host_ids: Vec<String>,
    pub queue: BTreeMap<String, QueuedTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub now_playing: Option<String>,
}

impl Event {
    pub fn new(
        core: CollabCore,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        vote_license: VoteLicense,
        geofence: Option<Geofence>,
    ) -> Self {
        let owner_id = core.owner_id.clone();
        Event {
            event_id: Uuid::new_v4(),
            core,
            start_at,
            end_at,
            vote_license,
            geofence,
            host_ids: vec![owner_id],
            queue: BTreeMap::new(),
            now_playing: None,
        }
    }

    /// Finestra attiva: `start_at <= now < end_at`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start_at <= now && now < self.end_at
    }

    pub fn is_host(&self, user_id: &str) -> bool {
        self.host_ids.iter().any(|h| h == user_id)
    }

    /// Aggiunge un host; idempotente, ritorna false se già presente
    pub fn add_host(&mut self, user_id: &str) -> bool {
        if self.is_host(user_id) {
            return false;
        }
        self.host_ids.push(user_id.to_string());
        true
    }

    pub fn remove_host(&mut self, user_id: &str) -> bool {
        let before = self.host_ids.len();
        self.host_ids.retain(|h| h != user_id);
        self.host_ids.len() != before
    }

    /// Idoneità al voto secondo la licenza dell'evento
    pub fn may_vote(&self, user_id: &str) -> bool {
        match self.vote_license {
            VoteLicense::Anyone => true,
            VoteLicense::InvitedOnly => self.core.is_participant(user_id),
        }
    }
}
