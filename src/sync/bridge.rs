//! Store bridge - Dal feed di modifiche dello store ai canali per entità
//!
//! Unico task che sottoscrive i feed delle collezioni playlist/eventi ed
//! emette l'evento generico `EntityUpdated`/`EntityDeleted` sul canale
//! dell'entità. I commit di una collezione vengono emessi sotto il lock del
//! documento e il bridge è single-task: per singola entità l'ordine di
//! consegna è l'ordine di commit.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, instrument, warn};

use crate::AppState;
use crate::dtos::SyncEventDTO;
use crate::store::DocChange;

#[instrument(skip(state))]
pub async fn run(state: Arc<AppState>) {
    info!("Sync bridge started");

    let mut playlist_changes = state.playlists.watch();
    let mut event_changes = state.events.watch();

    loop {
        tokio::select! {
            result = playlist_changes.recv() => {
                match result {
                    Ok(change) => forward(&state, change),
                    Err(RecvError::Lagged(skipped)) => {
                        // consegna at-least-once: i client riconciliano
                        // sulla version al prossimo evento
                        warn!(skipped, "Bridge lagged behind playlist changes");
                    }
                    Err(RecvError::Closed) => {
                        info!("Playlist change feed closed");
                        break;
                    }
                }
            }
            result = event_changes.recv() => {
                match result {
                    Ok(change) => forward(&state, change),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Bridge lagged behind event changes");
                    }
                    Err(RecvError::Closed) => {
                        info!("Event change feed closed");
                        break;
                    }
                }
            }
        }
    }

    info!("Sync bridge terminated");
}

fn forward(state: &Arc<AppState>, change: DocChange) {
    let event = if change.deleted {
        SyncEventDTO::EntityDeleted {
            id: change.id.clone(),
        }
    } else {
        SyncEventDTO::EntityUpdated {
            id: change.id.clone(),
            version: change.version,
        }
    };
    // Nessun osservatore sottoscritto non è un errore
    let _ = state.topics.send(&change.id, Arc::new(event));
}
