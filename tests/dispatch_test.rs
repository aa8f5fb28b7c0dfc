//! Integration tests for the dispatch coordination engine: registration,
//! emergency submission, matching fan-out, acceptance, completion, and
//! disconnect cleanup over real WebSocket connections.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use dispatch_server::config::DispatchPolicy;
use dispatch_server::routes::build_router;
use dispatch_server::state::AppState;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;
type WsRead = futures_util::stream::SplitStream<WsStream>;
type WsWrite = futures_util::stream::SplitSink<WsStream, Message>;

/// Helper: start the server on a random port and return (base_url, addr).
async fn start_test_server() -> (String, SocketAddr) {
    let state = AppState::new(DispatchPolicy::default());
    let app = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let base_url = format!("http://{}", addr);
    (base_url, addr)
}

async fn connect_ws(addr: SocketAddr) -> (WsWrite, WsRead) {
    let ws_url = format!("ws://{}/ws", addr);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream.split()
}

async fn send_json(write: &mut WsWrite, value: Value) {
    write
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send frame");
}

/// Receive the next JSON frame, skipping transport ping/pong.
async fn recv_json(read: &mut WsRead) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .expect("Timed out waiting for frame")
            .expect("Stream ended")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("Invalid JSON frame")
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame: {:?}", other),
        }
    }
}

/// Assert no JSON frame arrives within the window.
async fn expect_silence(read: &mut WsRead, window: Duration) {
    let result = tokio::time::timeout(window, read.next()).await;
    assert!(result.is_err(), "Expected silence, got {:?}", result);
}

/// Register a responder and drain its own connected + available frames.
/// Returns the registry-assigned identity.
async fn register_responder(write: &mut WsWrite, read: &mut WsRead, name: &str) -> String {
    send_json(
        write,
        json!({
            "type": "responder_register",
            "location": {"lat": 28.6139, "lng": 77.2090},
            "name": name,
            "phone": "+919812345678",
            "vehicle": "ambulance"
        }),
    )
    .await;

    let connected = recv_json(read).await;
    assert_eq!(connected["type"], "responder_connected");
    let id = connected["responderId"].as_str().unwrap().to_string();

    // The registry broadcasts the new responder's available status to all
    // responders, including the one that just registered.
    let status = recv_json(read).await;
    assert_eq!(status["type"], "responder_status");
    assert_eq!(status["responderId"], id.as_str());
    assert_eq!(status["status"], "available");

    id
}

/// Register a volunteer at an offset north of the reference point.
async fn register_volunteer(
    write: &mut WsWrite,
    read: &mut WsRead,
    id: &str,
    km_north: f64,
    skills: &[&str],
    languages: &[&str],
) {
    send_json(
        write,
        json!({
            "type": "volunteer_register",
            "volunteerId": id,
            "location": {"lat": 28.6139 + km_north / 111.19, "lng": 77.2090},
            "skills": skills,
            "firstName": "Priya",
            "lastName": "Patel",
            "phone": "+919876543210",
            "languages": languages
        }),
    )
    .await;

    let reply = recv_json(read).await;
    assert_eq!(reply["type"], "registration_success");
    assert_eq!(reply["volunteerId"], id);
}

fn emergency_report(kind: &str, severity: &str) -> Value {
    json!({
        "name": "Ravi Kumar",
        "contact": "+919812345678",
        "location": "Connaught Place",
        "coordinates": {"lat": 28.6139, "lng": 77.2090, "verified": true},
        "type": kind,
        "severity": severity
    })
}

#[tokio::test]
async fn responder_registration_is_broadcast_to_peers() {
    let (_base_url, addr) = start_test_server().await;

    let (mut write_a, mut read_a) = connect_ws(addr).await;
    let id_a = register_responder(&mut write_a, &mut read_a, "Unit 1").await;
    assert!(!id_a.is_empty());

    let (mut write_b, mut read_b) = connect_ws(addr).await;
    let id_b = register_responder(&mut write_b, &mut read_b, "Unit 2").await;

    // The earlier responder sees the newcomer's available broadcast.
    let seen = recv_json(&mut read_a).await;
    assert_eq!(seen["type"], "responder_status");
    assert_eq!(seen["responderId"], id_b.as_str());
    assert_eq!(seen["status"], "available");
}

#[tokio::test]
async fn emergency_submission_notifies_available_responders() {
    let (base_url, addr) = start_test_server().await;
    let (mut write_a, mut read_a) = connect_ws(addr).await;
    register_responder(&mut write_a, &mut read_a, "Unit 1").await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/emergency", base_url))
        .json(&emergency_report("medical", "high"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    let id = created["id"].as_str().unwrap();
    assert_eq!(created["status"], "pending");
    assert_eq!(created["name"], "Ravi Kumar");

    let notification = recv_json(&mut read_a).await;
    assert_eq!(notification["type"], "new_emergency");
    assert_eq!(notification["data"]["id"], id);

    // The created emergency is retrievable afterwards.
    let fetched: Value = client
        .get(format!("{}/api/emergency/{}", base_url, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["id"], id);
}

#[tokio::test]
async fn invalid_reports_are_rejected() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    // Leading digit outside 6-9.
    let mut bad_phone = emergency_report("medical", "high");
    bad_phone["contact"] = json!("+911234567890");
    let resp = client
        .post(format!("{}/api/emergency", base_url))
        .json(&bad_phone)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Validation failed");
    assert!(!body["errors"].as_array().unwrap().is_empty());

    // Coordinates outside the service region.
    let mut bad_coords = emergency_report("medical", "high");
    bad_coords["coordinates"] = json!({"lat": 51.5072, "lng": -0.1276, "verified": true});
    let resp = client
        .post(format!("{}/api/emergency", base_url))
        .json(&bad_coords)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Unverified coordinates.
    let mut unverified = emergency_report("medical", "high");
    unverified["coordinates"] = json!({"lat": 28.6139, "lng": 77.2090, "verified": false});
    let resp = client
        .post(format!("{}/api/emergency", base_url))
        .json(&unverified)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Nothing was stored.
    let resp = client
        .get(format!("{}/api/emergency/does-not-exist", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn volunteer_registration_validates_credentials() {
    let (_base_url, addr) = start_test_server().await;

    let (mut write, mut read) = connect_ws(addr).await;
    register_volunteer(&mut write, &mut read, "vol-1", 2.0, &["cpr"], &["hi"]).await;

    // A malformed phone is rejected with field errors and the session
    // stays unregistered.
    let (mut write_bad, mut read_bad) = connect_ws(addr).await;
    send_json(
        &mut write_bad,
        json!({
            "type": "volunteer_register",
            "volunteerId": "vol-bad",
            "location": {"lat": 28.6139, "lng": 77.2090},
            "skills": ["cpr"],
            "phone": "12345",
            "languages": []
        }),
    )
    .await;
    let reply = recv_json(&mut read_bad).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["message"], "Validation failed");
    assert!(!reply["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn volunteers_are_alerted_by_radius_and_skill() {
    let (base_url, addr) = start_test_server().await;

    // Medical skills, 2 km out: matched.
    let (mut write_near, mut read_near) = connect_ws(addr).await;
    register_volunteer(&mut write_near, &mut read_near, "vol-near", 2.0, &["cpr"], &["hi"]).await;

    // Logistics only: filtered out of a medical emergency.
    let (mut write_wrong, mut read_wrong) = connect_ws(addr).await;
    register_volunteer(&mut write_wrong, &mut read_wrong, "vol-wrong", 2.0, &["driver"], &[]).await;

    // Medical skills but 30 km out: beyond even the high-severity radius.
    let (mut write_far, mut read_far) = connect_ws(addr).await;
    register_volunteer(&mut write_far, &mut read_far, "vol-far", 30.0, &["cpr"], &[]).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/emergency", base_url))
        .json(&emergency_report("medical", "high"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();

    let alert = recv_json(&mut read_near).await;
    assert_eq!(alert["type"], "emergency_alert");
    assert_eq!(alert["data"]["id"], created["id"]);
    assert_eq!(alert["data"]["preferredLanguage"], "hi");
    let distance = alert["data"]["distance"].as_f64().unwrap();
    assert!((1.8..=2.2).contains(&distance), "got {}", distance);

    expect_silence(&mut read_wrong, Duration::from_millis(500)).await;
    expect_silence(&mut read_far, Duration::from_millis(500)).await;
}

#[tokio::test]
async fn volunteer_acceptance_updates_all_parties() {
    let (base_url, addr) = start_test_server().await;

    let (mut write_r, mut read_r) = connect_ws(addr).await;
    register_responder(&mut write_r, &mut read_r, "Unit 1").await;

    let (mut write_v, mut read_v) = connect_ws(addr).await;
    register_volunteer(&mut write_v, &mut read_v, "vol-1", 2.0, &["cpr"], &["hi"]).await;

    let client = reqwest::Client::new();
    let created: Value = client
        .post(format!("{}/api/emergency", base_url))
        .json(&emergency_report("medical", "high"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let emergency_id = created["id"].as_str().unwrap();

    // Drain the submission fan-out.
    assert_eq!(recv_json(&mut read_r).await["type"], "new_emergency");
    assert_eq!(recv_json(&mut read_v).await["type"], "emergency_alert");

    send_json(
        &mut write_v,
        json!({
            "type": "volunteer_response",
            "emergencyId": emergency_id,
            "volunteerId": "vol-1",
            "response": "accepted"
        }),
    )
    .await;

    // Responders learn who is coming, with contact and distance.
    let response = recv_json(&mut read_r).await;
    assert_eq!(response["type"], "volunteer_response");
    assert_eq!(response["volunteerId"], "vol-1");
    assert_eq!(response["response"], "accepted");
    assert_eq!(response["volunteerDetails"]["name"], "Priya Patel");
    assert_eq!(response["volunteerDetails"]["phone"], "+919876543210");
    assert!(response["volunteerDetails"]["distance"].is_number());

    // The volunteer gets a confirmation carrying a responder contact.
    let confirmation = recv_json(&mut read_v).await;
    assert_eq!(confirmation["type"], "response_confirmation");
    assert_eq!(confirmation["status"], "accepted");
    assert_eq!(confirmation["responderContact"], "+919812345678");

    // The acceptance is recorded on the emergency.
    let fetched: Value = client
        .get(format!("{}/api/emergency/{}", base_url, emergency_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let accepted = fetched["acceptedVolunteers"].as_array().unwrap();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0]["id"], "vol-1");
    let recorded = accepted[0]["distance"].as_f64().unwrap();
    assert_eq!(recorded, (recorded * 10.0).round() / 10.0);
}

#[tokio::test]
async fn declined_response_confirms_without_contact() {
    let (base_url, addr) = start_test_server().await;

    let (mut write_v, mut read_v) = connect_ws(addr).await;
    register_volunteer(&mut write_v, &mut read_v, "vol-1", 2.0, &["cpr"], &[]).await;

    let client = reqwest::Client::new();
    let created: Value = client
        .post(format!("{}/api/emergency", base_url))
        .json(&emergency_report("medical", "high"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let emergency_id = created["id"].as_str().unwrap();

    assert_eq!(recv_json(&mut read_v).await["type"], "emergency_alert");

    send_json(
        &mut write_v,
        json!({
            "type": "volunteer_response",
            "emergencyId": emergency_id,
            "volunteerId": "vol-1",
            "response": "declined"
        }),
    )
    .await;

    let confirmation = recv_json(&mut read_v).await;
    assert_eq!(confirmation["type"], "response_confirmation");
    assert_eq!(confirmation["status"], "declined");
    assert!(confirmation.get("responderContact").is_none());

    // A decline records nothing on the emergency.
    let fetched: Value = client
        .get(format!("{}/api/emergency/{}", base_url, emergency_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(fetched["acceptedVolunteers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn acceptance_broadcast_reaches_all_responders() {
    let (base_url, addr) = start_test_server().await;

    let (mut write_a, mut read_a) = connect_ws(addr).await;
    register_responder(&mut write_a, &mut read_a, "Unit 1").await;
    let (mut write_b, mut read_b) = connect_ws(addr).await;
    let id_b = register_responder(&mut write_b, &mut read_b, "Unit 2").await;

    // Unit 1 sees Unit 2 come online.
    assert_eq!(recv_json(&mut read_a).await["type"], "responder_status");

    let client = reqwest::Client::new();
    let created: Value = client
        .post(format!("{}/api/emergency", base_url))
        .json(&emergency_report("rescue", "medium"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let emergency_id = created["id"].as_str().unwrap();

    assert_eq!(recv_json(&mut read_a).await["type"], "new_emergency");
    assert_eq!(recv_json(&mut read_b).await["type"], "new_emergency");

    send_json(
        &mut write_b,
        json!({
            "type": "emergency_accept",
            "emergencyId": emergency_id,
            "responderId": id_b
        }),
    )
    .await;

    let update = recv_json(&mut read_a).await;
    assert_eq!(update["type"], "emergency_update");
    assert_eq!(update["data"]["status"], "accepted");
    assert_eq!(update["data"]["assignedResponder"], id_b.as_str());
}

#[tokio::test]
async fn volunteer_completion_resolves_and_returns_to_pool() {
    let (base_url, addr) = start_test_server().await;

    let (mut write_r, mut read_r) = connect_ws(addr).await;
    register_responder(&mut write_r, &mut read_r, "Unit 1").await;
    let (mut write_v, mut read_v) = connect_ws(addr).await;
    register_volunteer(&mut write_v, &mut read_v, "vol-1", 2.0, &["cpr"], &[]).await;

    let client = reqwest::Client::new();
    let created: Value = client
        .post(format!("{}/api/emergency", base_url))
        .json(&emergency_report("medical", "high"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let emergency_id = created["id"].as_str().unwrap();

    assert_eq!(recv_json(&mut read_r).await["type"], "new_emergency");
    assert_eq!(recv_json(&mut read_v).await["type"], "emergency_alert");

    send_json(
        &mut write_v,
        json!({
            "type": "volunteer_response",
            "emergencyId": emergency_id,
            "volunteerId": "vol-1",
            "response": "accepted"
        }),
    )
    .await;
    assert_eq!(recv_json(&mut read_r).await["type"], "volunteer_response");
    assert_eq!(recv_json(&mut read_v).await["type"], "response_confirmation");

    send_json(
        &mut write_v,
        json!({
            "type": "volunteer_complete",
            "emergencyId": emergency_id,
            "volunteerId": "vol-1"
        }),
    )
    .await;

    let update = recv_json(&mut read_r).await;
    assert_eq!(update["type"], "volunteer_update");
    assert_eq!(update["volunteerId"], "vol-1");
    assert_eq!(update["status"], "completed");

    // The only accepted volunteer completed, so the emergency resolved.
    let fetched: Value = client
        .get(format!("{}/api/emergency/{}", base_url, emergency_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["status"], "resolved");
    assert_eq!(fetched["acceptedVolunteers"][0]["completed"], true);
}

#[tokio::test]
async fn responder_disconnect_broadcasts_offline_once() {
    let (_base_url, addr) = start_test_server().await;

    let (mut write_a, mut read_a) = connect_ws(addr).await;
    register_responder(&mut write_a, &mut read_a, "Unit 1").await;
    let (mut write_b, mut read_b) = connect_ws(addr).await;
    let id_b = register_responder(&mut write_b, &mut read_b, "Unit 2").await;

    assert_eq!(recv_json(&mut read_a).await["type"], "responder_status");

    write_b.send(Message::Close(None)).await.unwrap();
    drop(write_b);
    drop(read_b);

    let offline = recv_json(&mut read_a).await;
    assert_eq!(offline["type"], "responder_status");
    assert_eq!(offline["responderId"], id_b.as_str());
    assert_eq!(offline["status"], "offline");

    // Exactly one broadcast: nothing further arrives.
    expect_silence(&mut read_a, Duration::from_millis(500)).await;
}

#[tokio::test]
async fn sub_threshold_location_updates_are_silent() {
    let (_base_url, addr) = start_test_server().await;

    let (mut write_a, mut read_a) = connect_ws(addr).await;
    register_responder(&mut write_a, &mut read_a, "Unit 1").await;
    let (mut write_b, mut read_b) = connect_ws(addr).await;
    let id_b = register_responder(&mut write_b, &mut read_b, "Unit 2").await;

    assert_eq!(recv_json(&mut read_a).await["type"], "responder_status");

    // ~33 meters: below the 50 m threshold, discarded without broadcast.
    send_json(
        &mut write_b,
        json!({
            "type": "responder_location",
            "responderId": id_b,
            "location": {"lat": 28.6142, "lng": 77.2090}
        }),
    )
    .await;
    expect_silence(&mut read_a, Duration::from_millis(500)).await;

    // ~111 meters: applied and broadcast.
    send_json(
        &mut write_b,
        json!({
            "type": "responder_location",
            "responderId": id_b,
            "location": {"lat": 28.6149, "lng": 77.2090}
        }),
    )
    .await;
    let moved = recv_json(&mut read_a).await;
    assert_eq!(moved["type"], "responder_location");
    assert_eq!(moved["responderId"], id_b.as_str());
    assert_eq!(moved["location"]["lat"], 28.6149);
}

#[tokio::test]
async fn stale_identities_are_silently_ignored() {
    let (base_url, addr) = start_test_server().await;

    let (mut write, mut read) = connect_ws(addr).await;
    register_responder(&mut write, &mut read, "Unit 1").await;

    // Updates for unknown identities produce no reply and no broadcast.
    send_json(
        &mut write,
        json!({
            "type": "responder_status",
            "responderId": "ghost",
            "status": "busy"
        }),
    )
    .await;
    send_json(
        &mut write,
        json!({
            "type": "volunteer_response",
            "emergencyId": "no-such-emergency",
            "volunteerId": "ghost",
            "response": "accepted"
        }),
    )
    .await;
    // Unknown message types are tolerated too.
    send_json(&mut write, json!({"type": "mystery_probe"})).await;

    expect_silence(&mut read, Duration::from_millis(500)).await;

    // The connection is still healthy after all of that.
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/emergency", base_url))
        .json(&emergency_report("other", "low"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    assert_eq!(recv_json(&mut read).await["type"], "new_emergency");
}
