//! ConnectionRepository - Repository per la gestione delle amicizie

use std::sync::Arc;

use chrono::Utc;

use super::traits::{Create, Delete, Read};
use crate::entities::{Connection, ConnectionStatus};
use crate::store::{Collection, Commit, StoreError};

/// Dati per la creazione di una richiesta di amicizia
#[derive(Debug, Clone)]
pub struct NewConnectionDTO {
    pub requester: String,
    pub target: String,
}

// CONNECTION REPOSITORY
pub struct ConnectionRepository {
    collection: Arc<Collection<Connection>>,
}

impl ConnectionRepository {
    pub fn new(collection: Arc<Collection<Connection>>) -> Self {
        Self { collection }
    }

    /// Tutte le connessioni che coinvolgono l'utente, con filtro opzionale
    /// sullo stato
    pub async fn find_for_user(
        &self,
        user_id: &str,
        status: Option<ConnectionStatus>,
    ) -> Result<Vec<Connection>, StoreError> {
        Ok(self.collection.find(|conn| {
            conn.involves(user_id) && status.is_none_or(|wanted| conn.status == wanted)
        }))
    }

    /// Mutazione atomica read-modify-write sul record della coppia
    pub fn mutate<R, E>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Connection) -> Result<Commit<R>, E>,
    ) -> Result<(R, u64), E>
    where
        E: From<StoreError>,
    {
        self.collection.mutate(id, f)
    }
}

impl Create<Connection, NewConnectionDTO> for ConnectionRepository {
    async fn create(&self, data: &NewConnectionDTO) -> Result<Connection, StoreError> {
        let connection = Connection::new(&data.requester, &data.target, Utc::now());
        self.collection
            .insert(&connection.connection_id, connection.clone());
        Ok(connection)
    }
}

impl Read<Connection, String> for ConnectionRepository {
    async fn read(&self, id: &String) -> Result<Option<Connection>, StoreError> {
        Ok(self.collection.get(id))
    }
}

impl Delete<String> for ConnectionRepository {
    async fn delete(&self, id: &String) -> Result<(), StoreError> {
        self.collection.delete(id);
        Ok(())
    }
}
