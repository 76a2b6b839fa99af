//! Integration tests for the HTTP API.

use std::net::SocketAddr;

use axum::http::StatusCode;
use chrono::{Duration, Local};
use serde_json::json;

use ferme_notify_protocol::{NotificationIntent, TAG_DUE_SOON, TAG_OVERDUE, WorkerCommand};

mod common;

use common::{
    app_for, app_from, body_bytes, body_json, empty_request, eventually, json_request, send,
    test_app, test_app_state,
};

fn day_offset(days: i64) -> String {
    (Local::now().date_naive() + Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

// ============================================================================
// Health Endpoints
// ============================================================================

#[tokio::test]
async fn test_livez() {
    let app = test_app().await;

    let response = send(&app, empty_request("GET", "/livez")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body_bytes(response).await[..], b"ok");
}

#[tokio::test]
async fn test_readyz() {
    let app = test_app().await;

    let response = send(&app, empty_request("GET", "/readyz")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["workspace"].is_string());
    assert_eq!(json["permission"], "default");
    assert_eq!(json["reminders"], "idle");
}

#[tokio::test]
async fn test_version() {
    let app = test_app().await;

    let response = send(&app, empty_request("GET", "/version")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json.get("version").is_some());
}

// ============================================================================
// Tasks API
// ============================================================================

#[tokio::test]
async fn test_list_tasks_empty() {
    let app = test_app().await;

    let response = send(&app, empty_request("GET", "/api/v1/tasks")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json, json!({"success": true, "data": []}));
}

#[tokio::test]
async fn test_task_lifecycle() {
    let app = test_app().await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/v1/tasks",
            json!({"titre": "Vermifuge brebis", "priorite": "haute", "dateEcheance": "2024-03-15"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["success"], true);
    let id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["statut"], "a_faire");
    assert!(created["data"]["dateCreation"].is_string());
    assert!(created["data"]["derniereMAJ"].is_string());

    let response = send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/v1/tasks/{}", id),
            json!({"statut": "en_cours", "dateEcheance": null}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["data"]["statut"], "en_cours");
    assert!(updated["data"].get("dateEcheance").is_none());

    let response = send(&app, empty_request("POST", &format!("/api/v1/tasks/{}/complete", id))).await;
    let done = body_json(response).await;
    assert_eq!(done["data"]["statut"], "terminee");
    assert!(done["data"]["dateTerminee"].is_string());

    let response = send(&app, empty_request("POST", &format!("/api/v1/tasks/{}/reopen", id))).await;
    let reopened = body_json(response).await;
    assert_eq!(reopened["data"]["statut"], "a_faire");
    assert!(reopened["data"].get("dateTerminee").is_none());

    let response = send(&app, empty_request("DELETE", &format!("/api/v1/tasks/{}", id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["data"],
        json!({"id": id, "deleted": true})
    );

    let response = send(&app, empty_request("GET", &format!("/api/v1/tasks/{}", id))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_tasks_filters_by_status() {
    let app = test_app().await;

    for (titre, statut) in [("Foin", "a_faire"), ("Clôture", "terminee")] {
        let response = send(
            &app,
            json_request("POST", "/api/v1/tasks", json!({"titre": titre, "statut": statut})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = send(&app, empty_request("GET", "/api/v1/tasks?statut=terminee")).await;
    let json = body_json(response).await;
    let tasks = json["data"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["titre"], "Clôture");

    let response = send(&app, empty_request("GET", "/api/v1/tasks?statut=bof")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_create_task_validation() {
    let app = test_app().await;

    let response = send(&app, json_request("POST", "/api/v1/tasks", json!({"titre": "  "}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/v1/tasks",
            json!({"titre": "Foin", "dateEcheance": "demain"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_enveloped() {
    let app = test_app().await;

    let request = axum::http::Request::post("/api/v1/tasks")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = send(&app, request).await;
    assert!(response.status().is_client_error());

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_get_task_not_found() {
    let app = test_app().await;

    let response = send(&app, empty_request("GET", "/api/v1/tasks/nonexistent")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("not found"));
}

// ============================================================================
// Reminders API
// ============================================================================

#[tokio::test]
async fn test_reminders_buckets() {
    let app = test_app().await;

    let tasks = [
        json!({"titre": "Vaccins", "dateEcheance": day_offset(-2)}),
        json!({"titre": "Foin", "dateEcheance": day_offset(0)}),
        json!({"titre": "Tonte", "dateEcheance": day_offset(10)}),
        json!({"titre": "Fait", "dateEcheance": day_offset(-1), "statut": "terminee"}),
        json!({"titre": "Sans date"}),
    ];
    for task in tasks {
        send(&app, json_request("POST", "/api/v1/tasks", task)).await;
    }

    let response = send(&app, empty_request("GET", "/api/v1/reminders")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];

    assert_eq!(data["permission"], "default");
    assert_eq!(data["due_soon_days"], 3);
    assert_eq!(data["overdue"].as_array().unwrap().len(), 1);
    assert_eq!(data["overdue"][0]["titre"], "Vaccins");
    assert_eq!(data["due_soon"].as_array().unwrap().len(), 1);
    assert_eq!(data["due_soon"][0]["titre"], "Foin");
    assert_eq!(data["scheduler"]["state"], "idle");
}

// ============================================================================
// Notifications API
// ============================================================================

#[tokio::test]
async fn test_permission_transitions() {
    let app = test_app().await;
    let uri = "/api/v1/notifications/permission";

    let response = send(&app, empty_request("GET", uri)).await;
    assert_eq!(body_json(response).await["data"]["permission"], "default");

    let response = send(&app, json_request("POST", uri, json!({"granted": true}))).await;
    assert_eq!(body_json(response).await["data"]["permission"], "granted");

    // Already decided: a second answer changes nothing.
    let response = send(&app, json_request("POST", uri, json!({"granted": false}))).await;
    assert_eq!(body_json(response).await["data"]["permission"], "granted");

    let response = send(&app, empty_request("DELETE", uri)).await;
    assert_eq!(body_json(response).await["data"]["permission"], "denied");

    // A refusal is final until reset.
    let response = send(&app, json_request("POST", uri, json!({"granted": true}))).await;
    assert_eq!(body_json(response).await["data"]["permission"], "denied");

    let response = send(&app, empty_request("POST", "/api/v1/notifications/permission/reset")).await;
    assert_eq!(body_json(response).await["data"]["permission"], "default");
}

#[tokio::test]
async fn test_displayed_notification_click() {
    let state = test_app_state().await;
    let worker = state.worker.clone();
    let app = app_for(state);

    worker
        .send(WorkerCommand::ShowNotification(NotificationIntent::new(
            "Tâches en retard",
            "\"Foin\" est en retard !",
            TAG_OVERDUE,
        )))
        .await
        .unwrap();
    assert!(eventually(|| !worker.displayed().is_empty()).await);

    let response = send(&app, empty_request("GET", "/api/v1/notifications")).await;
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["tag"], TAG_OVERDUE);
    assert_eq!(json["data"][0]["url"], "/taches");
    assert_eq!(json["data"][0]["requireInteraction"], true);

    let click = format!("/api/v1/notifications/{}/click", TAG_OVERDUE);
    let response = send(&app, json_request("POST", &click, json!({"action": "open"}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["data"],
        json!({"tag": TAG_OVERDUE, "route": {"type": "open_view", "url": "/taches"}})
    );

    assert!(worker.displayed().is_empty());
    let response = send(&app, empty_request("POST", &click)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_click_focuses_registered_view() {
    let state = test_app_state().await;
    let worker = state.worker.clone();
    let app = app_for(state);

    let view = json!({"viewId": "tab-1", "url": "http://localhost:8080/taches?filtre=retard"});
    let response = send(&app, json_request("POST", "/api/v1/views", view)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["viewId"], "tab-1");

    worker
        .send(WorkerCommand::ShowNotification(NotificationIntent::new(
            "Tâches en retard",
            "\"Foin\" est en retard !",
            TAG_OVERDUE,
        )))
        .await
        .unwrap();
    assert!(eventually(|| !worker.displayed().is_empty()).await);

    let click = format!("/api/v1/notifications/{}/click", TAG_OVERDUE);
    let response = send(&app, empty_request("POST", &click)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["data"]["route"],
        json!({
            "type": "focus_view",
            "viewId": "tab-1",
            "url": "http://localhost:8080/taches?filtre=retard"
        })
    );
}

#[tokio::test]
async fn test_click_dismiss_reports_route() {
    let state = test_app_state().await;
    let worker = state.worker.clone();
    let app = app_for(state);

    worker
        .send(WorkerCommand::ShowNotification(NotificationIntent::new(
            "Tâches à venir",
            "\"Foin\" arrive à échéance demain",
            TAG_DUE_SOON,
        )))
        .await
        .unwrap();
    assert!(eventually(|| !worker.displayed().is_empty()).await);

    let click = format!("/api/v1/notifications/{}/click", TAG_DUE_SOON);
    let response = send(&app, json_request("POST", &click, json!({"action": "dismiss"}))).await;
    assert_eq!(
        body_json(response).await["data"]["route"],
        json!({"type": "dismissed"})
    );
}

#[tokio::test]
async fn test_view_registration() {
    let app = test_app().await;

    let response = send(
        &app,
        json_request("POST", "/api/v1/views", json!({"url": "http://localhost:8080/taches"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let view_id = body_json(response).await["data"]["viewId"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(!view_id.is_empty());

    let response = send(&app, empty_request("GET", "/api/v1/views")).await;
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["viewId"], view_id.as_str());

    let path = format!("/api/v1/views/{}", view_id);
    let response = send(&app, empty_request("DELETE", &path)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&app, empty_request("DELETE", &path)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, json_request("POST", "/api/v1/views", json!({"url": " "}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Files API
// ============================================================================

#[tokio::test]
async fn test_file_upload_serve_delete() {
    let app = test_app().await;

    let upload = axum::http::Request::put("/api/v1/files/animaux/brebis.jpg")
        .body(axum::body::Body::from("jpegdata"))
        .unwrap();
    let response = send(&app, upload).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["url"], "/files/animaux/brebis.jpg");
    assert_eq!(json["data"]["storagePath"], "animaux/brebis.jpg");

    let response = send(&app, empty_request("GET", "/files/animaux/brebis.jpg")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body_bytes(response).await[..], b"jpegdata");

    // Objects are never overwritten.
    let again = axum::http::Request::put("/api/v1/files/animaux/brebis.jpg")
        .body(axum::body::Body::from("other"))
        .unwrap();
    assert_eq!(send(&app, again).await.status(), StatusCode::CONFLICT);

    let response = send(&app, empty_request("DELETE", "/api/v1/files/animaux/brebis.jpg")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, empty_request("GET", "/files/animaux/brebis.jpg")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_file_upload_too_large() {
    let state = test_app_state().await;
    let blobs_dir = state.blobs_dir.clone();
    let app = app_for(state);

    let oversized = vec![0u8; ferme::store::MAX_BLOB_SIZE as usize + 1];
    let upload = axum::http::Request::put("/api/v1/files/gros.bin")
        .body(axum::body::Body::from(oversized))
        .unwrap();
    let response = send(&app, upload).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        body_json(response).await["error"],
        "Le fichier dépasse la taille maximale de 10 MB"
    );
    assert!(!blobs_dir.join("gros.bin").exists());
}

#[tokio::test]
async fn test_file_upload_rejects_traversal() {
    let app = test_app().await;

    let upload = axum::http::Request::put("/api/v1/files/a/../../etc/passwd")
        .body(axum::body::Body::from("x"))
        .unwrap();
    assert_eq!(send(&app, upload).await.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_remote_caller_needs_token() {
    let state = test_app_state().await;
    let app = app_from(state, SocketAddr::from(([192, 168, 1, 20], 40000)));

    let response = send(&app, empty_request("GET", "/api/v1/tasks")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["success"], false);

    // Health stays open.
    let response = send(&app, empty_request("GET", "/livez")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_token() {
    let mut state = test_app_state().await;
    state.api_token = Some("s3cret".to_string());
    let app = app_for(state);

    let response = send(&app, empty_request("GET", "/api/v1/tasks")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = axum::http::Request::get("/api/v1/tasks")
        .header("authorization", "Bearer s3cret")
        .body(axum::body::Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::OK);
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn test_shutdown_once() {
    let app = test_app().await;

    let response = send(&app, empty_request("POST", "/api/admin/v1/shutdown")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["stopping"], true);

    let response = send(&app, empty_request("POST", "/api/admin/v1/shutdown")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "shutdown already in progress");
}

#[tokio::test]
async fn test_shutdown_requires_admin_token() {
    let mut state = test_app_state().await;
    state.admin_token = Some("admin".to_string());
    let app = app_for(state);

    let response = send(&app, empty_request("POST", "/api/admin/v1/shutdown")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "admin access denied");
}
