//! Integration tests per gli endpoints degli eventi e l'ammissione
//! geografica

mod common;

#[cfg(test)]
mod event_tests {
    use super::common::*;
    use axum_test::http::{HeaderName, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::{Value, json};

    /// Un grado di latitudine vale circa 111195 m: offset comodo per
    /// posizionare un punto a N metri dall'origine
    const METERS_PER_DEGREE: f64 = 111_195.0;

    async fn create_event(server: &axum_test::TestServer, token: &str, body: Value) -> Value {
        let response = server
            .post("/events")
            .add_header(HeaderName::from_static("authorization"), bearer(token))
            .json(&body)
            .await;
        response.assert_status_ok();
        response.json()
    }

    fn active_window() -> (String, String) {
        let now = Utc::now();
        (
            (now - Duration::hours(1)).to_rfc3339(),
            (now + Duration::hours(3)).to_rfc3339(),
        )
    }

    // ============================================================
    // Test per POST /events - create_event
    // ============================================================

    #[tokio::test]
    async fn test_create_event_success_creator_is_host() {
        let server = create_test_server(create_test_state());
        let token = create_test_jwt("host1", "host1", None);
        let (start_at, end_at) = active_window();

        let event = create_event(
            &server,
            &token,
            json!({
                "name": "Block Party",
                "start_at": start_at,
                "end_at": end_at,
                "vote_license": "Anyone"
            }),
        )
        .await;

        assert_eq!(event["name"], "Block Party");
        assert_eq!(event["owner_id"], "host1");
        assert_eq!(event["host_ids"], json!(["host1"]));
        assert_eq!(event["participant_count"], 1);
    }

    #[tokio::test]
    async fn test_create_event_with_inverted_window_fails() {
        let server = create_test_server(create_test_state());
        let token = create_test_jwt("host1", "host1", None);
        let now = Utc::now();

        let response = server
            .post("/events")
            .add_header(HeaderName::from_static("authorization"), bearer(&token))
            .json(&json!({
                "name": "Backwards",
                "start_at": (now + Duration::hours(2)).to_rfc3339(),
                "end_at": now.to_rfc3339()
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_event_with_zero_radius_geofence_fails() {
        let server = create_test_server(create_test_state());
        let token = create_test_jwt("host1", "host1", None);
        let (start_at, end_at) = active_window();

        let response = server
            .post("/events")
            .add_header(HeaderName::from_static("authorization"), bearer(&token))
            .json(&json!({
                "name": "Pinpoint",
                "start_at": start_at,
                "end_at": end_at,
                "geofence": { "latitude": 0.0, "longitude": 0.0, "radius_meters": 0.0 }
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // ============================================================
    // Scenario C: geofence {0,0,100m}; estraneo a ~150 m -> negato con
    // distanza, dentro il raggio -> ammesso
    // ============================================================

    #[tokio::test]
    async fn test_geofence_denies_outside_radius_with_distance() {
        let server = create_test_server(create_test_state());
        let host = create_test_jwt("host1", "host1", None);
        let guest = create_test_jwt("guest", "guest", None);
        let (start_at, end_at) = active_window();

        let event = create_event(
            &server,
            &host,
            json!({
                "name": "Fenced",
                "visibility": "Public",
                "start_at": start_at,
                "end_at": end_at,
                "geofence": { "latitude": 0.0, "longitude": 0.0, "radius_meters": 100.0 }
            }),
        )
        .await;
        let event_id = event["event_id"].as_str().unwrap().to_string();

        // ~150 m a nord del centro
        let lat = 150.0 / METERS_PER_DEGREE;
        let response = server
            .get(&format!("/events/{}/access?lat={}&lng=0.0", event_id, lat))
            .add_header(HeaderName::from_static("authorization"), bearer(&guest))
            .await;
        response.assert_status_ok();
        let access: Value = response.json();
        assert_eq!(access["can_access"], false);
        let distance = access["distance_meters"].as_f64().unwrap();
        assert!((distance - 150.0).abs() < 1.0, "got {}", distance);

        // ~50 m a nord: dentro il raggio
        let lat = 50.0 / METERS_PER_DEGREE;
        let response = server
            .get(&format!("/events/{}/access?lat={}&lng=0.0", event_id, lat))
            .add_header(HeaderName::from_static("authorization"), bearer(&guest))
            .await;
        let access: Value = response.json();
        assert_eq!(access["can_access"], true);
    }

    #[tokio::test]
    async fn test_geofence_missing_location_denies_with_reason() {
        let server = create_test_server(create_test_state());
        let host = create_test_jwt("host1", "host1", None);
        let guest = create_test_jwt("guest", "guest", None);
        let (start_at, end_at) = active_window();

        let event = create_event(
            &server,
            &host,
            json!({
                "name": "Fenced",
                "visibility": "Public",
                "start_at": start_at,
                "end_at": end_at,
                "geofence": { "latitude": 0.0, "longitude": 0.0, "radius_meters": 100.0 }
            }),
        )
        .await;
        let event_id = event["event_id"].as_str().unwrap();

        let response = server
            .get(&format!("/events/{}/access", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&guest))
            .await;
        let access: Value = response.json();
        assert_eq!(access["can_access"], false);
        assert_eq!(access["reason"], "location unavailable");
    }

    #[tokio::test]
    async fn test_geofence_grandfathers_participants() {
        let server = create_test_server(create_test_state());
        let host = create_test_jwt("host1", "host1", None);
        let (start_at, end_at) = active_window();

        let event = create_event(
            &server,
            &host,
            json!({
                "name": "Fenced",
                "start_at": start_at,
                "end_at": end_at,
                "geofence": { "latitude": 0.0, "longitude": 0.0, "radius_meters": 100.0 }
            }),
        )
        .await;
        let event_id = event["event_id"].as_str().unwrap();

        // il partecipante è ammesso anche senza posizione
        let response = server
            .get(&format!("/events/{}/access", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&host))
            .await;
        let access: Value = response.json();
        assert_eq!(access["can_access"], true);
    }

    #[tokio::test]
    async fn test_no_geofence_always_allows() {
        let server = create_test_server(create_test_state());
        let host = create_test_jwt("host1", "host1", None);
        let guest = create_test_jwt("guest", "guest", None);
        let (start_at, end_at) = active_window();

        let event = create_event(
            &server,
            &host,
            json!({
                "name": "Open Air",
                "visibility": "Public",
                "start_at": start_at,
                "end_at": end_at
            }),
        )
        .await;
        let event_id = event["event_id"].as_str().unwrap();

        let response = server
            .get(&format!("/events/{}/access", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&guest))
            .await;
        let access: Value = response.json();
        assert_eq!(access["can_access"], true);
    }

    // ============================================================
    // Test per PATCH /events/{id} - metadata e geofence
    // ============================================================

    #[tokio::test]
    async fn test_update_event_clear_geofence_is_explicit() {
        let server = create_test_server(create_test_state());
        let host = create_test_jwt("host1", "host1", None);
        let (start_at, end_at) = active_window();

        let event = create_event(
            &server,
            &host,
            json!({
                "name": "Fenced",
                "start_at": start_at,
                "end_at": end_at,
                "geofence": { "latitude": 0.0, "longitude": 0.0, "radius_meters": 100.0 }
            }),
        )
        .await;
        let event_id = event["event_id"].as_str().unwrap().to_string();

        // un PATCH senza campo geofence NON lo tocca
        let response = server
            .patch(&format!("/events/{}", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&host))
            .json(&json!({ "name": "Renamed" }))
            .await;
        response.assert_status_ok();
        let updated: Value = response.json();
        assert!(updated.get("geofence").is_some());

        // la rimozione è esplicita
        let response = server
            .patch(&format!("/events/{}", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&host))
            .json(&json!({ "clear_geofence": true }))
            .await;
        response.assert_status_ok();
        let updated: Value = response.json();
        assert!(updated.get("geofence").is_none());
    }

    #[tokio::test]
    async fn test_update_event_requires_owner_or_host() {
        let server = create_test_server(create_test_state());
        let host = create_test_jwt("host1", "host1", None);
        let stranger = create_test_jwt("stranger", "stranger", None);
        let (start_at, end_at) = active_window();

        let event = create_event(
            &server,
            &host,
            json!({ "name": "Party", "start_at": start_at, "end_at": end_at }),
        )
        .await;
        let event_id = event["event_id"].as_str().unwrap();

        let response = server
            .patch(&format!("/events/{}", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&stranger))
            .json(&json!({ "name": "Hijacked" }))
            .await;
        response.assert_status_forbidden();
    }

    // ============================================================
    // Test per la gestione degli host
    // ============================================================

    #[tokio::test]
    async fn test_host_management_rules() {
        let server = create_test_server(create_test_state());
        let owner = create_test_jwt("owner", "owner", None);
        let bob = create_test_jwt("bob", "bob", None);
        let (start_at, end_at) = active_window();

        let event = create_event(
            &server,
            &owner,
            json!({ "name": "Party", "start_at": start_at, "end_at": end_at }),
        )
        .await;
        let event_id = event["event_id"].as_str().unwrap().to_string();

        // un non partecipante non può diventare host
        let response = server
            .post(&format!("/events/{}/hosts/bob", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&owner))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        // bob entra tramite invito
        let response = server
            .post(&format!("/events/{}/invite", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&owner))
            .json(&json!({ "invitee_id": "bob" }))
            .await;
        let invitation: Value = response.json();
        server
            .post(&format!(
                "/invitations/{}/accept",
                invitation["invite_id"].as_str().unwrap()
            ))
            .add_header(HeaderName::from_static("authorization"), bearer(&bob))
            .await
            .assert_status_ok();

        // solo l'owner promuove host
        let response = server
            .post(&format!("/events/{}/hosts/bob", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&bob))
            .await;
        response.assert_status_forbidden();

        server
            .post(&format!("/events/{}/hosts/bob", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&owner))
            .await
            .assert_status_ok();

        let response = server
            .get(&format!("/events/{}/members", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&owner))
            .await;
        let members: Vec<Value> = response.json();
        let bob_member = members.iter().find(|m| m["user_id"] == "bob").unwrap();
        assert_eq!(bob_member["is_host"], true);

        // l'owner resta sempre host
        let response = server
            .delete(&format!("/events/{}/hosts/owner", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&owner))
            .await;
        response.assert_status(StatusCode::CONFLICT);

        // il degrado di bob funziona
        server
            .delete(&format!("/events/{}/hosts/bob", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&owner))
            .await
            .assert_status_ok();
    }

    // ============================================================
    // L'uscita dell'owner da un evento promuove il successore a host
    // ============================================================

    #[tokio::test]
    async fn test_owner_leave_keeps_host_invariant() {
        let server = create_test_server(create_test_state());
        let owner = create_test_jwt("owner", "owner", None);
        let bob = create_test_jwt("bob", "bob", None);
        let (start_at, end_at) = active_window();

        let event = create_event(
            &server,
            &owner,
            json!({ "name": "Party", "start_at": start_at, "end_at": end_at }),
        )
        .await;
        let event_id = event["event_id"].as_str().unwrap().to_string();

        let response = server
            .post(&format!("/events/{}/invite", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&owner))
            .json(&json!({ "invitee_id": "bob" }))
            .await;
        let invitation: Value = response.json();
        server
            .post(&format!(
                "/invitations/{}/accept",
                invitation["invite_id"].as_str().unwrap()
            ))
            .add_header(HeaderName::from_static("authorization"), bearer(&bob))
            .await
            .assert_status_ok();

        let response = server
            .post(&format!("/events/{}/leave", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&owner))
            .await;
        response.assert_status_ok();
        let outcome: Value = response.json();
        assert_eq!(outcome["new_owner_id"], "bob");

        // il nuovo owner è anche host; l'ex owner è fuori da entrambi
        let response = server
            .get(&format!("/events/{}", event_id))
            .add_header(HeaderName::from_static("authorization"), bearer(&bob))
            .await;
        let detail: Value = response.json();
        assert_eq!(detail["owner_id"], "bob");
        let hosts = detail["host_ids"].as_array().unwrap();
        assert!(hosts.iter().any(|h| h == "bob"));
        assert!(!hosts.iter().any(|h| h == "owner"));
    }
}
