use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, instrument, warn};

use crate::dtos::SyncEventDTO;

/// Segnali interni alla sessione WebSocket di un utente
pub enum InternalSignal {
    Shutdown,
    /// Sottoscrivi il canale dell'entità (nuova membership o watch esplicito)
    Watch(String),
    /// Annulla la sottoscrizione (leave, rimozione, unwatch)
    Unwatch(String),
    /// Evento indirizzato al singolo utente (inviti, amicizie)
    Deliver(SyncEventDTO),
    Error(&'static str),
}

pub struct SessionMap {
    sessions: DashMap<String, UnboundedSender<InternalSignal>>,
}

impl SessionMap {
    pub fn new() -> Self {
        SessionMap {
            sessions: DashMap::new(),
        }
    }

    #[instrument(skip(self, tx), fields(user_id))]
    pub fn register_online(&self, user_id: &str, tx: UnboundedSender<InternalSignal>) {
        info!("Registering user {} as online", user_id);
        self.sessions.insert(user_id.to_string(), tx);
        info!("Total online users: {}", self.sessions.len());
    }

    #[instrument(skip(self), fields(user_id))]
    pub fn remove_from_online(&self, user_id: &str) {
        info!("Removing user from online");
        self.sessions.remove(user_id);
    }

    #[instrument(skip(self, signal), fields(user_id))]
    pub fn send_if_online(&self, user_id: &str, signal: InternalSignal) {
        let signal_type = match &signal {
            InternalSignal::Shutdown => "Shutdown",
            InternalSignal::Watch(entity_id) => {
                info!("Sending Watch signal for entity {}", entity_id);
                "Watch"
            }
            InternalSignal::Unwatch(entity_id) => {
                info!("Sending Unwatch signal for entity {}", entity_id);
                "Unwatch"
            }
            InternalSignal::Deliver(_) => "Deliver",
            InternalSignal::Error(_) => "Error",
        };

        if let Some(entry) = self.sessions.get(user_id) {
            let tx = entry.value();
            if let Err(e) = tx.send(signal) {
                warn!("Failed to send {} signal to user: {:?}", signal_type, e);
            } else {
                info!("{} signal sent to online user", signal_type);
            }
        } else {
            info!("User {} not online, {} signal not sent", user_id, signal_type);
        }
    }

    /// Get the count of online users
    pub fn online_count(&self) -> usize {
        self.sessions.len()
    }

    /// Check if a specific user is online
    pub fn is_online(&self, user_id: &str) -> bool {
        self.sessions.contains_key(user_id)
    }
}

impl Default for SessionMap {
    fn default() -> Self {
        Self::new()
    }
}
