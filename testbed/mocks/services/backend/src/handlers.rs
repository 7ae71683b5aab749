use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::fixtures::{BackendFixture, RecordedRequest};

pub type SharedFixture = Arc<Mutex<BackendFixture>>;

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

fn record(fixture: &SharedFixture, request: RecordedRequest) {
    if let Ok(mut state) = fixture.lock() {
        state.requests.push(request);
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

fn authorized(fixture: &SharedFixture, headers: &HeaderMap) -> bool {
    let Some(token) = bearer(headers) else {
        return false;
    };
    fixture
        .lock()
        .map(|state| state.is_valid_token(&token))
        .unwrap_or(false)
}

/// Apply the configured delay and forced failure status for generation routes
async fn generation_gate(fixture: &SharedFixture) -> Option<Response> {
    let (delay, status) = {
        let state = fixture.lock().ok()?;
        (state.generation_delay, state.generation_status)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    status.map(|code| {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        detail(status, "Image Gen Failed: forced by mock")
    })
}

pub async fn health_check(State(fixture): State<SharedFixture>, headers: HeaderMap) -> impl IntoResponse {
    record(
        &fixture,
        RecordedRequest {
            method: "GET".to_string(),
            path: "/health".to_string(),
            headers: header_map(&headers),
            ..Default::default()
        },
    );

    Json(json!({
        "status": "online",
        "message": "Gen Jewels Backend is Live!"
    }))
}

pub async fn login(
    State(fixture): State<SharedFixture>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(
        &fixture,
        RecordedRequest {
            method: "POST".to_string(),
            path: "/auth/login".to_string(),
            headers: header_map(&headers),
            body: Some(body.clone()),
            ..Default::default()
        },
    );

    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let token = match fixture.lock() {
        Ok(mut state) => state.login(username, password),
        Err(_) => None,
    };

    match token {
        Some(token) => Json(json!({ "access_token": token, "token_type": "bearer" })).into_response(),
        None => detail(StatusCode::BAD_REQUEST, "Incorrect username or password"),
    }
}

pub async fn register(
    State(fixture): State<SharedFixture>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(
        &fixture,
        RecordedRequest {
            method: "POST".to_string(),
            path: "/auth/register".to_string(),
            headers: header_map(&headers),
            body: Some(body.clone()),
            ..Default::default()
        },
    );

    let username = body["username"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();

    let Ok(mut state) = fixture.lock() else {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "state poisoned");
    };

    if state.has_user(&username) {
        return detail(StatusCode::BAD_REQUEST, "Username already taken");
    }

    state.add_user(&username, &password);
    match state.login(&username, &password) {
        Some(token) => Json(json!({ "access_token": token, "token_type": "bearer" })).into_response(),
        None => detail(StatusCode::INTERNAL_SERVER_ERROR, "registration failed"),
    }
}

pub async fn generate(
    State(fixture): State<SharedFixture>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(
        &fixture,
        RecordedRequest {
            method: "POST".to_string(),
            path: "/generate/".to_string(),
            headers: header_map(&headers),
            body: Some(body.clone()),
            ..Default::default()
        },
    );

    if !authorized(&fixture, &headers) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }

    if let Some(failure) = generation_gate(&fixture).await {
        return failure;
    }

    let jewelry_type = body["jewelry_type"].as_str().unwrap_or("Ring");
    let material = body["material"].as_str().unwrap_or("Gold");
    let stone = body["stone"].as_str().unwrap_or("None");
    let prompt = format!(
        "A {} {} {} with {} stone, {} theme",
        body["style"].as_str().unwrap_or_default(),
        material,
        jewelry_type,
        stone,
        body["theme"].as_str().unwrap_or_default()
    );

    let Ok(mut state) = fixture.lock() else {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "state poisoned");
    };
    let design = state.record_design(jewelry_type, material, stone, prompt);

    Json(json!({
        "image_url": design["image_path"],
        "final_prompt": design["final_prompt"],
        "status": "success"
    }))
    .into_response()
}

pub async fn generate_from_image(
    State(fixture): State<SharedFixture>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut recorded = RecordedRequest {
        method: "POST".to_string(),
        path: "/generate/image-to-image".to_string(),
        headers: header_map(&headers),
        ..Default::default()
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if name == "init_image" {
            recorded.file_name = field.file_name().map(|s| s.to_string());
            recorded.file_size = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        } else if let Ok(text) = field.text().await {
            recorded.form_fields.insert(name, text);
        }
    }

    let jewelry_type = recorded
        .form_fields
        .get("jewelry_type")
        .cloned()
        .unwrap_or_default();
    let instruction = recorded.form_fields.get("prompt").cloned();
    let has_image = recorded.file_size > 0;
    record(&fixture, recorded);

    if !authorized(&fixture, &headers) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }

    if !has_image {
        return detail(StatusCode::BAD_REQUEST, "Invalid image file");
    }

    if let Some(failure) = generation_gate(&fixture).await {
        return failure;
    }

    let prompt = match instruction {
        Some(text) if !text.is_empty() => format!("{} variation: {}", jewelry_type, text),
        _ => format!("{} variation", jewelry_type),
    };

    let Ok(mut state) = fixture.lock() else {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "state poisoned");
    };
    let design = state.record_design(&jewelry_type, "Original", "Original", prompt);

    Json(json!({
        "image_url": design["image_path"],
        "final_prompt": design["final_prompt"],
        "status": "success"
    }))
    .into_response()
}

pub async fn history(State(fixture): State<SharedFixture>, headers: HeaderMap) -> Response {
    record(
        &fixture,
        RecordedRequest {
            method: "GET".to_string(),
            path: "/generate/history".to_string(),
            headers: header_map(&headers),
            ..Default::default()
        },
    );

    if !authorized(&fixture, &headers) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }

    match fixture.lock() {
        Ok(state) => Json(Value::Array(state.history().to_vec())).into_response(),
        Err(_) => detail(StatusCode::INTERNAL_SERVER_ERROR, "state poisoned"),
    }
}
