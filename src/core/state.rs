//! Application State - Stato globale dell'applicazione
//!
//! Contiene tutti i repository, configurazioni e stato condiviso
//! necessario per gestire l'applicazione.

use std::sync::Arc;

use crate::notify::{LogNotifier, NotificationSender};
use crate::repositories::{
    ConnectionRepository, EventRepository, InvitationRepository, PlaylistRepository,
};
use crate::store::Collection;
use crate::sync::sessionmap::SessionMap;
use crate::sync::topicmap::TopicMap;

/// Stato globale dell'applicazione condiviso tra tutte le route e middleware
pub struct AppState {
    /// Repository per la gestione delle playlist
    pub playlists: PlaylistRepository,

    /// Repository per la gestione degli eventi
    pub events: EventRepository,

    /// Repository per la gestione degli inviti
    pub invitations: InvitationRepository,

    /// Repository per la gestione delle amicizie
    pub connections: ConnectionRepository,

    /// Secret key per JWT token
    pub jwt_secret: String,

    /// Mappa concorrente delle sessioni online con i loro canali WebSocket
    /// Key: user_id, Value: Sender per i segnali interni della sessione
    pub sessions: SessionMap,

    /// Canali broadcast per entità con almeno un osservatore
    pub topics: TopicMap,

    /// Collaboratore esterno per le push notification (best-effort)
    pub notifier: Arc<dyn NotificationSender>,
}

impl AppState {
    /// Crea una nuova istanza di AppState con collezioni in-memory fresche
    /// e il notifier di default che logga soltanto.
    pub fn new(jwt_secret: String) -> Self {
        Self::with_notifier(jwt_secret, Arc::new(LogNotifier))
    }

    /// Variante con notifier iniettabile (usata nei test)
    pub fn with_notifier(jwt_secret: String, notifier: Arc<dyn NotificationSender>) -> Self {
        Self {
            playlists: PlaylistRepository::new(Arc::new(Collection::new("playlists"))),
            events: EventRepository::new(Arc::new(Collection::new("events"))),
            invitations: InvitationRepository::new(Arc::new(Collection::new("invitations"))),
            connections: ConnectionRepository::new(Arc::new(Collection::new("connections"))),
            jwt_secret,
            sessions: SessionMap::new(),
            topics: TopicMap::new(),
            notifier,
        }
    }
}
