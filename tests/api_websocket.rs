//! Integration tests per il livello real-time
//!
//! Test per:
//! - Connessione WebSocket con autenticazione valida
//! - Rifiuto della connessione senza token
//! - Consegna di EntityUpdated in ordine di commit tramite il bridge
//! - Consegna diretta di eventi alla sessione (Deliver)
//!
//! Questi test servono un listener reale e usano tokio-tungstenite come
//! client.

mod common;

#[cfg(test)]
mod ws_tests {
    use super::common::*;
    use futures_util::StreamExt;
    use jamlink::dtos::{CreatePlaylistDTO, SyncEventDTO};
    use jamlink::store::Commit;
    use jamlink::sync::sessionmap::InternalSignal;
    use serde_json::Value;
    use std::sync::Arc;
    use tokio::time::{Duration, sleep, timeout};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;

    /// Avvia il server su una porta effimera e ritorna (state, addr)
    async fn serve() -> (Arc<jamlink::AppState>, std::net::SocketAddr) {
        let state = create_test_state();
        tokio::spawn(jamlink::sync::bridge::run(state.clone()));

        let app = jamlink::create_router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server runs");
        });
        (state, addr)
    }

    async fn connect(
        addr: std::net::SocketAddr,
        token: &str,
    ) -> tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    > {
        let mut request = format!("ws://{}/ws", addr)
            .into_client_request()
            .expect("client request");
        request.headers_mut().insert(
            "authorization",
            HeaderValue::from_str(&bearer(token)).expect("header value"),
        );
        let (socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .expect("ws connect");
        socket
    }

    /// Attende che la sessione dell'utente risulti registrata e che il
    /// task di scrittura abbia sottoscritto i topic
    async fn wait_online(state: &Arc<jamlink::AppState>, user_id: &str) {
        for _ in 0..100 {
            if state.sessions.is_online(user_id) {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert!(state.sessions.is_online(user_id), "session registered");
        sleep(Duration::from_millis(100)).await;
    }

    async fn next_text(
        socket: &mut tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    ) -> Value {
        loop {
            let msg = timeout(Duration::from_secs(5), socket.next())
                .await
                .expect("event within timeout")
                .expect("stream open")
                .expect("no ws error");
            if let Message::Text(text) = msg {
                return serde_json::from_str(&text).expect("valid json");
            }
        }
    }

    #[tokio::test]
    async fn test_ws_requires_authentication() {
        let (_state, addr) = serve().await;

        let request = format!("ws://{}/ws", addr)
            .into_client_request()
            .expect("client request");
        let result = tokio_tungstenite::connect_async(request).await;
        assert!(result.is_err(), "handshake without token must fail");
    }

    #[tokio::test]
    async fn test_entity_updates_reach_subscribed_participant() {
        let (state, addr) = serve().await;
        let token = create_test_jwt("u1", "u1", None);

        // playlist creata prima della connessione: viene sottoscritta
        // automaticamente all'avvio della sessione
        let playlist = state
            .playlists
            .create(
                "u1",
                &CreatePlaylistDTO {
                    name: "Live".to_string(),
                    description: None,
                    visibility: None,
                    edit_permissions: None,
                },
            )
            .await
            .expect("playlist created");

        let mut socket = connect(addr, &token).await;
        wait_online(&state, "u1").await;

        // mutazione committata -> DocChange -> bridge -> topic -> batch
        state
            .playlists
            .mutate::<_, jamlink::AppError>(&playlist.playlist_id, |p| {
                p.core.name = "Renamed".to_string();
                Ok(Commit::Write(()))
            })
            .expect("rename committed");

        let batch = next_text(&mut socket).await;
        let events = batch.as_array().expect("batched events");
        let update = events
            .iter()
            .find(|e| e["type"] == "EntityUpdated")
            .expect("EntityUpdated delivered");
        assert_eq!(update["data"]["id"], playlist.playlist_id.to_string());
        assert_eq!(update["data"]["version"], 2);
    }

    #[tokio::test]
    async fn test_direct_delivery_to_session() {
        let (state, addr) = serve().await;
        let token = create_test_jwt("u1", "u1", None);

        let mut socket = connect(addr, &token).await;
        wait_online(&state, "u1").await;

        state.sessions.send_if_online(
            "u1",
            InternalSignal::Deliver(SyncEventDTO::InvitationAccepted {
                id: "inv-1".to_string(),
            }),
        );

        // gli eventi diretti arrivano come singolo oggetto, non in batch
        let event = next_text(&mut socket).await;
        assert_eq!(event["type"], "InvitationAccepted");
        assert_eq!(event["data"]["id"], "inv-1");
    }

    #[tokio::test]
    async fn test_deleted_entity_notifies_observers() {
        let (state, addr) = serve().await;
        let token = create_test_jwt("u1", "u1", None);

        let playlist = state
            .playlists
            .create(
                "u1",
                &CreatePlaylistDTO {
                    name: "Doomed".to_string(),
                    description: None,
                    visibility: None,
                    edit_permissions: None,
                },
            )
            .await
            .expect("playlist created");

        let mut socket = connect(addr, &token).await;
        wait_online(&state, "u1").await;

        // l'ultimo partecipante esce: il documento viene cancellato
        state
            .playlists
            .mutate::<_, jamlink::AppError>(&playlist.playlist_id, |p| {
                let removal = p.core.remove_participant("u1");
                assert_eq!(removal, jamlink::entities::Removal::Deleted);
                Ok(Commit::Delete(()))
            })
            .expect("delete committed");

        let batch = next_text(&mut socket).await;
        let events = batch.as_array().expect("batched events");
        let deleted = events
            .iter()
            .find(|e| e["type"] == "EntityDeleted")
            .expect("EntityDeleted delivered");
        assert_eq!(deleted["data"]["id"], playlist.playlist_id.to_string());
    }
}
