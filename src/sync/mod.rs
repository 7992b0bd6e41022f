//! Sync Module - Livello real-time per la propagazione delle modifiche
//!
//! Questo modulo gestisce le connessioni WebSocket per la comunicazione in
//! tempo reale tra client e server. Include:
//! - Gestione upgrade HTTP -> WebSocket
//! - Gestione connessioni (split sender/receiver)
//! - Registro sessioni per utente e canali broadcast per entità
//! - Bridge dal feed di modifiche del document store ai canali per entità
//!
//! Garanzie: consegna at-least-once; per singola entità gli eventi arrivano
//! in ordine di commit, tra entità diverse nessun ordinamento globale.

pub mod bridge;
pub mod connection;
pub mod sessionmap;
pub mod topicmap;

// Re-exports pubblici
pub use connection::handle_socket;

use crate::core::CurrentUser;
use crate::AppState;
use axum::{
    Extension,
    extract::{State, ws::WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;

/// Capacità dei canali broadcast per entità
pub const BROADCAST_CHANNEL_CAPACITY: usize = 64;
/// Intervallo di flush del batch in millisecondi
pub const BATCH_INTERVAL: u64 = 50;
/// Dimensione massima del batch prima del flush immediato
pub const BATCH_MAX_SIZE: usize = 10;
/// Intervallo minimo tra messaggi client in millisecondi
pub const RATE_LIMITER_MILLIS: u64 = 100;
/// Timeout di inattività della connessione in secondi
pub const TIMEOUT_DURATION_SECONDS: u64 = 300;

/// Entry point per gestire richieste di upgrade WebSocket
/// Operazioni:
/// 1. Ottenere l'utente corrente dall'autenticazione JWT
/// 2. Eseguire upgrade HTTP -> WebSocket
/// 3. Passare la connessione ad handle_socket
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>, // ottenuto dall'autenticazione JWT
) -> Response {
    // Gestisce automaticamente l'upgrade a WebSocket.
    // Se l'upgrade fallisce, ritorna un errore; altrimenti restituisce la
    // nuova connessione al client.
    ws.on_upgrade(move |socket| handle_socket(socket, state, current_user))
}
