use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use clinic_api::create_app;
use shared_database::VerificationRepository;
use shared_utils::test_utils::{json_request, read_json, TestConfig};
use shared_utils::AppState;

async fn call(state: &Arc<AppState>, method: &str, uri: &str, auth: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let response = create_app(state.clone())
        .oneshot(json_request(method, uri, auth, body))
        .await
        .unwrap();
    read_json(response).await
}

async fn signup_and_login(state: &Arc<AppState>, name: &str, email: &str, role: &str) -> (String, Value) {
    let (status, _) = call(
        state,
        "POST",
        "/v1/auth/signup",
        None,
        Some(json!({ "name": name, "email": email, "password": "correct-horse", "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        state,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": "correct-horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["accessToken"].as_str().unwrap().to_string();
    (format!("Bearer {}", token), body["data"].clone())
}

#[tokio::test]
async fn test_greeting_and_root() {
    let state = TestConfig::default().to_state();

    let (status, body) = call(&state, "GET", "/greeting", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());

    let response = create_app(state).oneshot(json_request("GET", "/", None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_booking_lifecycle_end_to_end() {
    let state = TestConfig::default().to_state();
    let (doctor_auth, doctor) = signup_and_login(&state, "Dr Who", "who@example.com", "doctor").await;
    let (patient_auth, _) = signup_and_login(&state, "Rose", "rose@example.com", "patient").await;

    let (status, body) = call(&state, "GET", "/v1/user/doctors", Some(&patient_auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], doctor["id"]);

    let when = (Utc::now() + Duration::days(7)).to_rfc3339();
    let (status, body) = call(
        &state,
        "POST",
        "/v1/appointments/",
        Some(&patient_auth),
        Some(json!({ "doctorId": doctor["id"], "dateTime": when })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let appointment_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(&state, "GET", "/v1/appointments/doctor", Some(&doctor_auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["status"], "pending");

    let (status, body) = call(
        &state,
        "PUT",
        &format!("/v1/appointments/{}", appointment_id),
        Some(&doctor_auth),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "confirmed");

    let (_, body) = call(&state, "GET", "/v1/appointments/patient", Some(&patient_auth), None).await;
    assert_eq!(body["data"][0]["status"], "confirmed");
}

#[tokio::test]
async fn test_trailing_slash_profile_routes() {
    let state = TestConfig::default().to_state();
    let (auth, _) = signup_and_login(&state, "Martha", "martha@example.com", "patient").await;

    let (status, body) = call(&state, "PUT", "/v1/user/", Some(&auth), Some(json!({ "profile": { "age": 33 } }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["profile"]["age"], 33);

    let (status, body) = call(&state, "GET", "/v1/user", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "martha@example.com");
}

#[tokio::test]
async fn test_protected_routes_reject_missing_token() {
    let state = TestConfig::default().to_state();

    for (method, uri) in [
        ("POST", "/v1/auth/logout"),
        ("GET", "/v1/auth/email-verify/request"),
        ("GET", "/v1/user/"),
        ("GET", "/v1/appointments/patient"),
        ("POST", "/v1/appointments/"),
    ] {
        let (status, body) = call(&state, method, uri, None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", method, uri);
        assert_eq!(
            body,
            json!({ "message": "authentication failed", "error": "invalid access", "data": null })
        );
    }
}

async fn issued_code(state: &Arc<AppState>, auth: &str, user: &Value) -> String {
    let (status, _) = call(state, "GET", "/v1/auth/email-verify/request", Some(auth), None).await;
    assert_eq!(status, StatusCode::OK);

    let user_id: Uuid = user["id"].as_str().unwrap().parse().unwrap();
    state.verifications.find_verification(user_id).await.unwrap().unwrap().otp
}

#[tokio::test]
async fn test_code_for_old_address_cannot_verify_new_one() {
    let state = TestConfig::default().to_state();
    let (auth, user) = signup_and_login(&state, "Amy", "old@example.com", "patient").await;
    let otp = issued_code(&state, &auth, &user).await;

    let (status, body) = call(
        &state,
        "PUT",
        "/v1/user/",
        Some(&auth),
        Some(json!({ "email": "other-address@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["emailVerified"], false);

    let (status, body) = call(&state, "POST", "/v1/auth/email-verify/submit", Some(&auth), Some(json!({ "otp": otp }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid or expired otp");

    let (_, body) = call(&state, "GET", "/v1/user", Some(&auth), None).await;
    assert_eq!(body["data"]["email"], "other-address@example.com");
    assert_eq!(body["data"]["emailVerified"], false);
}

#[tokio::test]
async fn test_code_cannot_be_guessed_repeatedly() {
    let state = TestConfig::default().to_state();
    let (auth, user) = signup_and_login(&state, "Amy", "amy@example.com", "patient").await;
    let otp = issued_code(&state, &auth, &user).await;
    let wrong = if otp == "000000" { "111111" } else { "000000" };

    for _ in 0..20 {
        let (status, _) = call(&state, "POST", "/v1/auth/email-verify/submit", Some(&auth), Some(json!({ "otp": wrong }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = call(&state, "POST", "/v1/auth/email-verify/submit", Some(&auth), Some(json!({ "otp": otp }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&state, "GET", "/v1/user", Some(&auth), None).await;
    assert_eq!(body["data"]["emailVerified"], false);
}
