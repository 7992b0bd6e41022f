//! EventRepository - Repository per la gestione degli eventi

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::traits::{Delete, Read};
use crate::dtos::CreateEventDTO;
use crate::entities::{CollabCore, Event, Visibility, VoteLicense};
use crate::store::{Collection, Commit, DocChange, StoreError};

// EVENT REPOSITORY
pub struct EventRepository {
    collection: Arc<Collection<Event>>,
}

impl EventRepository {
    pub fn new(collection: Arc<Collection<Event>>) -> Self {
        Self { collection }
    }

    /// Crea un evento con il creatore come owner, unico partecipante e
    /// unico host
    pub async fn create(&self, owner_id: &str, data: &CreateEventDTO) -> Result<Event, StoreError> {
        let now = Utc::now();
        let core = CollabCore::new(
            data.name.clone(),
            data.description.clone(),
            owner_id,
            data.visibility.unwrap_or(Visibility::Public),
            now,
        );
        let event = Event::new(
            core,
            data.start_at,
            data.end_at,
            data.vote_license.unwrap_or(VoteLicense::InvitedOnly),
            data.geofence.clone().map(Into::into),
        );
        self.collection
            .insert(&event.event_id.to_string(), event.clone());
        Ok(event)
    }

    /// Tutti gli eventi di cui l'utente è partecipante
    pub async fn find_for_participant(&self, user_id: &str) -> Result<Vec<Event>, StoreError> {
        Ok(self.collection.find(|e| e.core.is_participant(user_id)))
    }

    /// Mutazione atomica read-modify-write sul documento dell'evento.
    /// Tutte le scritture su coda, votanti, host e partecipanti passano
    /// da qui: è la serializzazione richiesta dai votanti concorrenti.
    pub fn mutate<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut Event) -> Result<Commit<R>, E>,
    ) -> Result<(R, u64), E>
    where
        E: From<StoreError>,
    {
        self.collection.mutate(&id.to_string(), f)
    }

    /// Sottoscrive il feed delle modifiche della collezione
    pub fn watch(&self) -> broadcast::Receiver<DocChange> {
        self.collection.watch()
    }
}

impl Read<Event, Uuid> for EventRepository {
    async fn read(&self, id: &Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.collection.get(&id.to_string()))
    }
}

impl Delete<Uuid> for EventRepository {
    async fn delete(&self, id: &Uuid) -> Result<(), StoreError> {
        self.collection.delete(&id.to_string());
        Ok(())
    }
}
