//! WebSocket Connection Management - Gestione connessioni real-time

use crate::core::CurrentUser;
use crate::repositories::Read;
use crate::sync::sessionmap::InternalSignal;
use crate::sync::{BATCH_INTERVAL, BATCH_MAX_SIZE, RATE_LIMITER_MILLIS, TIMEOUT_DURATION_SECONDS};
use crate::{
    AppState,
    dtos::{ClientCommandDTO, SyncEventDTO},
    entities::Visibility,
};
use axum::extract::ws::Utf8Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::Duration;
use tokio::time::{interval, timeout};
use tokio_stream::StreamMap;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[instrument(skip(ws, state, current_user), fields(user_id = %current_user.user_id))]
pub async fn handle_socket(ws: WebSocket, state: Arc<AppState>, current_user: CurrentUser) {
    info!("WebSocket connection established");

    let user_id = current_user.user_id;

    // Dividiamo il WebSocket in due metà: sender e receiver
    let (ws_tx, ws_rx) = ws.split();

    // Canale unbounded per i segnali interni della sessione
    let (int_tx, int_rx) = unbounded_channel::<InternalSignal>();

    // Registriamo la sessione: i services usano questo sender per
    // consegnare inviti, amicizie e segnali di (un)watch
    state.sessions.register_online(&user_id, int_tx.clone());
    info!("User registered as online");

    // task in ascolto dei comandi del client sul websocket
    tokio::spawn(listen_ws(
        user_id.clone(),
        ws_rx,
        int_tx.clone(),
        state.clone(),
    ));

    // task che scrive verso il client gli eventi delle entità sottoscritte
    tokio::spawn(write_ws(user_id, ws_tx, int_rx, state));
}

#[instrument(skip(websocket_tx, internal_rx, state), fields(user_id))]
pub async fn write_ws(
    user_id: String,
    mut websocket_tx: SplitSink<WebSocket, Message>,
    mut internal_rx: UnboundedReceiver<InternalSignal>,
    state: Arc<AppState>,
) {
    info!("Write task started");

    // Alla connessione l'utente è sottoscritto a tutte le entità di cui è
    // partecipante (playlist ed eventi)
    let mut entity_ids: Vec<String> = Vec::new();
    match state.playlists.find_for_participant(&user_id).await {
        Ok(playlists) => {
            entity_ids.extend(playlists.iter().map(|p| p.playlist_id.to_string()));
        }
        Err(e) => {
            error!("Failed to load user playlists: {:?}", e);
            return; // Termina se lo store fallisce
        }
    }
    match state.events.find_for_participant(&user_id).await {
        Ok(events) => {
            entity_ids.extend(events.iter().map(|e| e.event_id.to_string()));
        }
        Err(e) => {
            error!("Failed to load user events: {:?}", e);
            return;
        }
    }
    info!(entity_count = entity_ids.len(), "User entities loaded");

    let mut stream_map = StreamMap::new();

    state
        .topics
        .subscribe_multiple(entity_ids.clone())
        .into_iter()
        .zip(entity_ids.iter())
        .for_each(|(rx, entity_id)| {
            stream_map.insert(entity_id.clone(), BroadcastStream::new(rx));
        });

    let mut batch: Vec<Arc<SyncEventDTO>> = Vec::new();
    let mut interval = tokio::time::interval(Duration::from_millis(BATCH_INTERVAL));
    interval.tick().await; // Consuma primo tick immediato

    'external: loop {
        tokio::select! {
            Some((_, result)) = tokio_stream::StreamExt::next(&mut stream_map) => {
                if let Ok(event) = result {
                    batch.push(event);
                    if batch.len() >= BATCH_MAX_SIZE {
                        if send_batch(&mut websocket_tx, &batch).await.is_err() {
                            warn!("Failed to send batch, closing connection");
                            break 'external;
                        }
                        info!(batch_size = batch.len(), "Batch sent");
                        batch.clear();
                    }
                }
            }

            // serve per inviare gli eventi anche se il batch non è pieno,
            // altrimenti aspetterei troppo
            _ = interval.tick() => {
                if !batch.is_empty() {
                    if send_batch(&mut websocket_tx, &batch).await.is_err() {
                        warn!("Failed to send batch on interval, closing connection");
                        break 'external;
                    }
                    info!(batch_size = batch.len(), "Batch sent on interval");
                    batch.clear();
                }
            }

            signal = internal_rx.recv() => {
                match signal {
                    Some(InternalSignal::Shutdown) => {
                        info!("Shutdown signal received");
                        break 'external;
                    }
                    Some(InternalSignal::Watch(entity_id)) => {
                        info!(entity_id, "Adding entity subscription");
                        let rx = state.topics.subscribe(&entity_id);
                        stream_map.insert(entity_id, BroadcastStream::new(rx));
                    }
                    Some(InternalSignal::Unwatch(entity_id)) => {
                        info!(entity_id, "Removing entity subscription");
                        stream_map.remove(&entity_id);
                    }
                    Some(InternalSignal::Error(err_msg)) => {
                        warn!(error_message = err_msg, "Sending error event to client");
                        let event = SyncEventDTO::Error { code: 400, message: err_msg.to_string() };
                        if send_event(&mut websocket_tx, &event).await.is_err() {
                            break 'external;
                        }
                    }
                    Some(InternalSignal::Deliver(event)) => {
                        info!("Delivering direct event to client");
                        if send_event(&mut websocket_tx, &event).await.is_err() {
                            break 'external;
                        }
                    }
                    None => {
                        info!("Internal channel closed");
                        break 'external; // canale chiuso, quindi listener chiuso: stacca tutto
                    }
                }
            }
        }
    }

    // Invia batch finale prima di terminare
    if !batch.is_empty() {
        info!(
            batch_size = batch.len(),
            "Sending final batch before shutdown"
        );
        let _ = send_batch(&mut websocket_tx, &batch).await;
    }

    info!("Write task terminated");
}

#[instrument(skip(websocket_tx, batch))]
async fn send_batch(
    websocket_tx: &mut SplitSink<WebSocket, Message>,
    batch: &[Arc<SyncEventDTO>],
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(&batch).map_err(|e| {
        error!("Failed to serialize batch: {:?}", e);
        axum::Error::new(e)
    })?;
    websocket_tx
        .send(Message::Text(Utf8Bytes::from(json)))
        .await
        .map_err(|e| {
            error!("Failed to send batch through WebSocket: {:?}", e);
            e
        })
}

#[instrument(skip(websocket_tx, event))]
async fn send_event(
    websocket_tx: &mut SplitSink<WebSocket, Message>,
    event: &SyncEventDTO,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(|e| {
        error!("Failed to serialize event: {:?}", e);
        axum::Error::new(e)
    })?;
    websocket_tx
        .send(Message::Text(Utf8Bytes::from(json)))
        .await
        .map_err(|e| {
            error!("Failed to send event through WebSocket: {:?}", e);
            e
        })
}

#[instrument(skip(websocket_rx, internal_tx, state), fields(user_id))]
pub async fn listen_ws(
    user_id: String,
    mut websocket_rx: SplitStream<WebSocket>,
    internal_tx: UnboundedSender<InternalSignal>,
    state: Arc<AppState>,
) {
    info!("Listen task started");

    let mut rate_limiter = interval(Duration::from_millis(RATE_LIMITER_MILLIS));
    let timeout_duration = Duration::from_secs(TIMEOUT_DURATION_SECONDS);

    loop {
        match timeout(timeout_duration, StreamExt::next(&mut websocket_rx)).await {
            Ok(Some(msg_result)) => {
                rate_limiter.tick().await;

                let msg = match msg_result {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("WebSocket error: {:?}", e);
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => {
                        if let Ok(command) = serde_json::from_str::<ClientCommandDTO>(&text) {
                            info!("Command received from client");
                            process_command(&state, &user_id, command, &internal_tx).await;
                        } else {
                            warn!("Failed to deserialize client command");
                        }
                    }
                    Message::Close(_) => {
                        info!("Close message received");
                        break;
                    }
                    _ => {}
                }
            }
            Ok(None) => {
                info!("WebSocket stream ended");
                break;
            }
            Err(_) => {
                warn!(
                    timeout_secs = TIMEOUT_DURATION_SECONDS,
                    "Connection timeout"
                );
                break;
            }
        }
    }

    // Cleanup
    info!("Cleaning up connection");
    let _ = internal_tx.send(InternalSignal::Shutdown);
    state.sessions.remove_from_online(&user_id);
    info!("Listen task terminated");
}

/// Gestisce un comando watch/unwatch del client.
/// Operazioni:
/// 1. Validare che entity_id sia un Uuid
/// 2. Per watch: verificare che l'entità esista e sia osservabile
///    dall'utente (pubblica, oppure lui è partecipante)
/// 3. Inoltrare il segnale Watch/Unwatch al task di scrittura
#[instrument(skip(state, internal_tx), fields(user_id))]
async fn process_command(
    state: &Arc<AppState>,
    user_id: &str,
    command: ClientCommandDTO,
    internal_tx: &UnboundedSender<InternalSignal>,
) {
    match command {
        ClientCommandDTO::Watch { entity_id } => {
            let Ok(parsed_id) = entity_id.parse::<Uuid>() else {
                warn!("Invalid entity id in watch command");
                let _ = internal_tx.send(InternalSignal::Error("Invalid entity id"));
                return;
            };

            if !may_watch(state, &parsed_id, user_id).await {
                warn!("Watch denied for entity {}", entity_id);
                let _ = internal_tx.send(InternalSignal::Error(
                    "Entity not found or not observable",
                ));
                return;
            }

            let _ = internal_tx.send(InternalSignal::Watch(entity_id));
        }
        ClientCommandDTO::Unwatch { entity_id } => {
            let _ = internal_tx.send(InternalSignal::Unwatch(entity_id));
        }
    }
}

/// Un'entità è osservabile se è pubblica oppure se l'utente è partecipante
async fn may_watch(state: &Arc<AppState>, entity_id: &Uuid, user_id: &str) -> bool {
    if let Ok(Some(playlist)) = state.playlists.read(entity_id).await {
        return playlist.core.visibility == Visibility::Public
            || playlist.core.is_participant(user_id);
    }
    if let Ok(Some(event)) = state.events.read(entity_id).await {
        return event.core.visibility == Visibility::Public
            || event.core.is_participant(user_id);
    }
    false
}
