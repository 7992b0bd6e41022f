//! Integration tests per gli endpoints delle playlist

mod common;

#[cfg(test)]
mod playlist_tests {
    use super::common::*;
    use axum_test::http::{HeaderName, StatusCode};
    use serde_json::{Value, json};

    async fn create_playlist(
        server: &axum_test::TestServer,
        token: &str,
        body: Value,
    ) -> Value {
        let response = server
            .post("/playlists")
            .add_header(HeaderName::from_static("authorization"), bearer(token))
            .json(&body)
            .await;
        response.assert_status_ok();
        response.json()
    }

    // ============================================================
    // Test per GET /playlists - list_playlists
    // ============================================================

    #[tokio::test]
    async fn test_get_playlists_without_token() {
        let server = create_test_server(create_test_state());

        let response = server.get("/playlists").await;

        response.assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_get_playlists_with_invalid_token() {
        let server = create_test_server(create_test_state());

        let response = server
            .get("/playlists")
            .add_header(
                HeaderName::from_static("authorization"),
                "Bearer invalid_token_here",
            )
            .await;

        response.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_get_playlists_lists_only_own_entities() {
        let server = create_test_server(create_test_state());
        let alice = create_test_jwt("alice", "alice", None);
        let bob = create_test_jwt("bob", "bob", None);

        create_playlist(&server, &alice, json!({ "name": "Alice Mix" })).await;

        let response = server
            .get("/playlists")
            .add_header(HeaderName::from_static("authorization"), bearer(&bob))
            .await;
        response.assert_status_ok();
        let playlists: Vec<Value> = response.json();
        assert!(playlists.is_empty(), "Bob non partecipa a nessuna playlist");

        let response = server
            .get("/playlists")
            .add_header(HeaderName::from_static("authorization"), bearer(&alice))
            .await;
        response.assert_status_ok();
        let playlists: Vec<Value> = response.json();
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0]["name"], "Alice Mix");
    }

    // ============================================================
    // Test per POST /playlists - create_playlist
    // ============================================================

    #[tokio::test]
    async fn test_create_playlist_success() {
        let server = create_test_server(create_test_state());
        let token = create_test_jwt("alice", "alice", None);

        let playlist = create_playlist(
            &server,
            &token,
            json!({
                "name": "Road Trip",
                "description": "Long drives",
                "visibility": "Public",
                "edit_permissions": "Everyone"
            }),
        )
        .await;

        assert_eq!(playlist["name"], "Road Trip");
        assert_eq!(playlist["owner_id"], "alice");
        assert_eq!(playlist["participant_count"], 1);
        assert_eq!(playlist["track_count"], 0);
        assert_eq!(playlist["total_duration_seconds"], 0);
        assert!(playlist.get("playlist_id").is_some());
    }

    #[tokio::test]
    async fn test_create_playlist_empty_name_fails() {
        let server = create_test_server(create_test_state());
        let token = create_test_jwt("alice", "alice", None);

        let response = server
            .post("/playlists")
            .add_header(HeaderName::from_static("authorization"), bearer(&token))
            .json(&json!({ "name": "" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // ============================================================
    // Test per GET /playlists/{id} - visibilità
    // ============================================================

    #[tokio::test]
    async fn test_private_playlist_hidden_from_strangers() {
        let server = create_test_server(create_test_state());
        let alice = create_test_jwt("alice", "alice", None);
        let bob = create_test_jwt("bob", "bob", None);

        let playlist = create_playlist(&server, &alice, json!({ "name": "Secret" })).await;
        let playlist_id = playlist["playlist_id"].as_str().unwrap().to_string();

        let response = server
            .get(&format!("/playlists/{}", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&bob))
            .await;
        response.assert_status_forbidden();

        // il dettaglio per l'owner include la sequenza brani
        let response = server
            .get(&format!("/playlists/{}", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&alice))
            .await;
        response.assert_status_ok();
        let detail: Value = response.json();
        assert!(detail["tracks"].is_array());
    }

    #[tokio::test]
    async fn test_public_playlist_readable_by_strangers() {
        let server = create_test_server(create_test_state());
        let alice = create_test_jwt("alice", "alice", None);
        let bob = create_test_jwt("bob", "bob", None);

        let playlist = create_playlist(
            &server,
            &alice,
            json!({ "name": "Open Mix", "visibility": "Public" }),
        )
        .await;
        let playlist_id = playlist["playlist_id"].as_str().unwrap();

        let response = server
            .get(&format!("/playlists/{}", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&bob))
            .await;
        response.assert_status_ok();
    }

    // ============================================================
    // Test per PATCH /playlists/{id} - update_metadata
    // ============================================================

    #[tokio::test]
    async fn test_update_metadata_requires_edit_rights() {
        let server = create_test_server(create_test_state());
        let alice = create_test_jwt("alice", "alice", None);
        let bob = create_test_jwt("bob", "bob", None);

        let playlist = create_playlist(&server, &alice, json!({ "name": "Mix" })).await;
        let playlist_id = playlist["playlist_id"].as_str().unwrap().to_string();

        // il non partecipante non può modificare
        let response = server
            .patch(&format!("/playlists/{}", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&bob))
            .json(&json!({ "name": "Hijacked" }))
            .await;
        response.assert_status_forbidden();

        // l'owner sì, e updated_at viene bumpato
        let before = playlist["updated_at"].as_str().unwrap().to_string();
        let response = server
            .patch(&format!("/playlists/{}", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&alice))
            .json(&json!({ "name": "Renamed" }))
            .await;
        response.assert_status_ok();
        let updated: Value = response.json();
        assert_eq!(updated["name"], "Renamed");
        assert!(updated["updated_at"].as_str().unwrap() >= before.as_str());
    }

    // ============================================================
    // Test per le tracce: add / remove / move con contatori derivati
    // ============================================================

    #[tokio::test]
    async fn test_track_sequence_keeps_derived_counters() {
        let server = create_test_server(create_test_state());
        let alice = create_test_jwt("alice", "alice", None);

        let playlist = create_playlist(&server, &alice, json!({ "name": "Mix" })).await;
        let playlist_id = playlist["playlist_id"].as_str().unwrap().to_string();

        let response = server
            .post(&format!("/playlists/{}/tracks", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&alice))
            .json(&json!({ "track_id": "trk-1", "title": "One", "duration_seconds": 180 }))
            .await;
        response.assert_status_ok();

        let response = server
            .post(&format!("/playlists/{}/tracks", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&alice))
            .json(&json!({ "track_id": "trk-2", "title": "Two", "duration_seconds": 240 }))
            .await;
        response.assert_status_ok();
        let detail: Value = response.json();
        assert_eq!(detail["track_count"], 2);
        assert_eq!(detail["total_duration_seconds"], 420);

        // spostamento: trk-2 in testa (l'ordine è significativo)
        let response = server
            .patch(&format!(
                "/playlists/{}/tracks/trk-2/position",
                playlist_id
            ))
            .add_header(HeaderName::from_static("authorization"), bearer(&alice))
            .json(&json!({ "position": 0 }))
            .await;
        response.assert_status_ok();
        let detail: Value = response.json();
        assert_eq!(detail["tracks"][0]["track_id"], "trk-2");
        assert_eq!(detail["tracks"][1]["track_id"], "trk-1");

        // rimozione: contatori ricalcolati
        let response = server
            .delete(&format!("/playlists/{}/tracks/trk-1", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&alice))
            .await;
        response.assert_status_ok();
        let detail: Value = response.json();
        assert_eq!(detail["track_count"], 1);
        assert_eq!(detail["total_duration_seconds"], 240);
    }

    #[tokio::test]
    async fn test_add_track_with_malformed_id_fails() {
        let server = create_test_server(create_test_state());
        let alice = create_test_jwt("alice", "alice", None);

        let playlist = create_playlist(&server, &alice, json!({ "name": "Mix" })).await;
        let playlist_id = playlist["playlist_id"].as_str().unwrap();

        let response = server
            .post(&format!("/playlists/{}/tracks", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&alice))
            .json(&json!({ "track_id": "bad id with spaces", "duration_seconds": 100 }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // ============================================================
    // Scenario A: l'ultimo partecipante che esce cancella l'entità
    // ============================================================

    #[tokio::test]
    async fn test_last_participant_leave_deletes_playlist() {
        let server = create_test_server(create_test_state());
        let alice = create_test_jwt("u1", "u1", None);

        let playlist = create_playlist(&server, &alice, json!({ "name": "Solo" })).await;
        let playlist_id = playlist["playlist_id"].as_str().unwrap().to_string();

        let response = server
            .post(&format!("/playlists/{}/leave", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&alice))
            .await;
        response.assert_status_ok();
        let outcome: Value = response.json();
        assert_eq!(outcome["deleted"], true);

        // l'entità non esiste più nello store
        let response = server
            .get(&format!("/playlists/{}", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&alice))
            .await;
        response.assert_status_not_found();
    }

    // ============================================================
    // Scenario B: l'owner esce, l'ownership passa al primo entrato
    // ============================================================

    #[tokio::test]
    async fn test_owner_leave_transfers_to_earliest_joiner() {
        let server = create_test_server(create_test_state());
        let u1 = create_test_jwt("u1", "u1", None);
        let u2 = create_test_jwt("u2", "u2", None);
        let u3 = create_test_jwt("u3", "u3", None);

        let playlist = create_playlist(&server, &u1, json!({ "name": "Shared" })).await;
        let playlist_id = playlist["playlist_id"].as_str().unwrap().to_string();

        // u2 e u3 entrano in quest'ordine tramite invito
        for (invitee_id, invitee_token) in [("u2", &u2), ("u3", &u3)] {
            let response = server
                .post(&format!("/playlists/{}/invite", playlist_id))
                .add_header(HeaderName::from_static("authorization"), bearer(&u1))
                .json(&json!({ "invitee_id": invitee_id }))
                .await;
            response.assert_status_ok();
            let invitation: Value = response.json();
            let invite_id = invitation["invite_id"].as_str().unwrap();

            let response = server
                .post(&format!("/invitations/{}/accept", invite_id))
                .add_header(
                    HeaderName::from_static("authorization"),
                    bearer(invitee_token),
                )
                .await;
            response.assert_status_ok();
        }

        let response = server
            .post(&format!("/playlists/{}/leave", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&u1))
            .await;
        response.assert_status_ok();
        let outcome: Value = response.json();
        assert_eq!(outcome["deleted"], false);
        assert_eq!(outcome["new_owner_id"], "u2");

        // owner aggiornato e u1 fuori dai partecipanti
        let response = server
            .get(&format!("/playlists/{}/members", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&u2))
            .await;
        response.assert_status_ok();
        let members: Vec<Value> = response.json();
        assert_eq!(members.len(), 2);
        let owner = members.iter().find(|m| m["is_owner"] == true).unwrap();
        assert_eq!(owner["user_id"], "u2");
        assert!(members.iter().all(|m| m["user_id"] != "u1"));
    }

    // ============================================================
    // Test per transfer_ownership esplicito
    // ============================================================

    #[tokio::test]
    async fn test_explicit_transfer_requires_owner_and_participant_target() {
        let server = create_test_server(create_test_state());
        let u1 = create_test_jwt("u1", "u1", None);
        let u2 = create_test_jwt("u2", "u2", None);

        let playlist = create_playlist(&server, &u1, json!({ "name": "Shared" })).await;
        let playlist_id = playlist["playlist_id"].as_str().unwrap().to_string();

        // target non partecipante -> permission_denied
        let response = server
            .patch(&format!(
                "/playlists/{}/transfer_ownership/ghost",
                playlist_id
            ))
            .add_header(HeaderName::from_static("authorization"), bearer(&u1))
            .await;
        response.assert_status_forbidden();

        // u2 entra
        let response = server
            .post(&format!("/playlists/{}/invite", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&u1))
            .json(&json!({ "invitee_id": "u2" }))
            .await;
        let invitation: Value = response.json();
        let invite_id = invitation["invite_id"].as_str().unwrap();
        server
            .post(&format!("/invitations/{}/accept", invite_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&u2))
            .await
            .assert_status_ok();

        // un non-owner non può trasferire
        let response = server
            .patch(&format!("/playlists/{}/transfer_ownership/u2", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&u2))
            .await;
        response.assert_status_forbidden();

        // l'owner sì
        let response = server
            .patch(&format!("/playlists/{}/transfer_ownership/u2", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&u1))
            .await;
        response.assert_status_ok();

        let response = server
            .get(&format!("/playlists/{}", playlist_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&u1))
            .await;
        let detail: Value = response.json();
        assert_eq!(detail["owner_id"], "u2");
    }
}
