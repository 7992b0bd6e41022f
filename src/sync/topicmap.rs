use crate::dtos::SyncEventDTO;
use crate::sync::BROADCAST_CHANNEL_CAPACITY;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::SendError;
use tokio::sync::broadcast::{Receiver, Sender};
use tracing::{info, instrument, warn};

pub struct TopicMap {
    /// Canale broadcast per entity_id: la testa tx viene creata alla prima
    /// sottoscrizione e rimossa quando non restano receiver
    channels: DashMap<String, Sender<Arc<SyncEventDTO>>>,
}

impl TopicMap {
    pub fn new() -> Self {
        TopicMap {
            channels: DashMap::new(),
        }
    }

    #[instrument(skip(self), fields(entity_id))]
    pub fn subscribe(&self, entity_id: &str) -> Receiver<Arc<SyncEventDTO>> {
        match self.channels.get(entity_id) {
            // richiesta sottoscrizione su un canale non ancora esistente
            None => {
                info!("Creating new broadcast channel for entity");
                // Arc<SyncEventDTO> per condividere il riferimento, non l'evento:
                // evita copie inutili per ogni receiver
                let (tx, rx) = broadcast::channel::<Arc<SyncEventDTO>>(BROADCAST_CHANNEL_CAPACITY);
                self.channels.insert(entity_id.to_string(), tx);
                rx
            }
            // sottoscrivere un canale esistente == ottenere una testa rx dal tx
            Some(channel) => {
                info!("Subscribing to existing broadcast channel");
                channel.value().subscribe()
            }
        }
    }

    #[instrument(skip(self, entity_ids))]
    pub fn subscribe_multiple(&self, entity_ids: Vec<String>) -> Vec<Receiver<Arc<SyncEventDTO>>> {
        info!(count = entity_ids.len(), "Subscribing to multiple entities");
        entity_ids.iter().map(|id| self.subscribe(id)).collect()
    }

    #[instrument(skip(self, event), fields(entity_id))]
    pub fn send(
        &self,
        entity_id: &str,
        event: Arc<SyncEventDTO>,
    ) -> Result<usize, SendError<Arc<SyncEventDTO>>> {
        if let Some(channel) = self.channels.get(entity_id) {
            match channel.send(event.clone()) {
                Ok(n) => {
                    info!(receivers = n, "Event broadcast to receivers");
                    Ok(n)
                }
                Err(e) => {
                    warn!("No active receivers, removing channel");
                    // Nessuno sta ascoltando, rimuovi il channel
                    drop(channel); // Rilascia il lock
                    self.channels.remove(entity_id);
                    Err(e)
                }
            }
        } else {
            // Nessun osservatore ha mai sottoscritto l'entità
            Err(SendError(event))
        }
    }
}

impl Default for TopicMap {
    fn default() -> Self {
        Self::new()
    }
}
