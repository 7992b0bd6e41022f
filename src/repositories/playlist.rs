//! PlaylistRepository - Repository per la gestione delle playlist

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::traits::{Delete, Read};
use crate::dtos::CreatePlaylistDTO;
use crate::entities::{CollabCore, EditPermissions, Playlist, Visibility};
use crate::store::{Collection, Commit, DocChange, StoreError};

// PLAYLIST REPOSITORY
pub struct PlaylistRepository {
    collection: Arc<Collection<Playlist>>,
}

impl PlaylistRepository {
    pub fn new(collection: Arc<Collection<Playlist>>) -> Self {
        Self { collection }
    }

    /// Crea una playlist con il creatore come owner e unico partecipante
    pub async fn create(
        &self,
        owner_id: &str,
        data: &CreatePlaylistDTO,
    ) -> Result<Playlist, StoreError> {
        let now = Utc::now();
        let core = CollabCore::new(
            data.name.clone(),
            data.description.clone(),
            owner_id,
            data.visibility.unwrap_or(Visibility::Private),
            now,
        );
        let playlist = Playlist::new(
            core,
            data.edit_permissions.unwrap_or(EditPermissions::InvitedOnly),
        );
        self.collection
            .insert(&playlist.playlist_id.to_string(), playlist.clone());
        Ok(playlist)
    }

    /// Tutte le playlist di cui l'utente è partecipante
    pub async fn find_for_participant(&self, user_id: &str) -> Result<Vec<Playlist>, StoreError> {
        Ok(self.collection.find(|p| p.core.is_participant(user_id)))
    }

    /// Mutazione atomica read-modify-write sul documento della playlist
    pub fn mutate<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut Playlist) -> Result<Commit<R>, E>,
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

impl Read<Playlist, Uuid> for PlaylistRepository {
    async fn read(&self, id: &Uuid) -> Result<Option<Playlist>, StoreError> {
        Ok(self.collection.get(&id.to_string()))
    }
}

impl Delete<Uuid> for PlaylistRepository {
    async fn delete(&self, id: &Uuid) -> Result<(), StoreError> {
        self.collection.delete(&id.to_string());
        Ok(())
    }
}
