//! Scripted backend double
//!
//! Without scripting, `MockInferenceApi` behaves like a healthy backend: every
//! generation succeeds and writes a fresh record to the history feed, the same
//! way the real service does. Individual calls can be scripted to fail, and
//! generation or history fetches can be slowed down to line up with a paused
//! tokio clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gen_jewels_client::{
    ApiError, DesignId, DesignRecord, DesignRequest, GenerateResponse, ImageToImageRequest,
    InferenceApi, LoginRequest, RegisterRequest, TokenResponse,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Failure modes that can be replayed any number of times
#[derive(Debug, Clone, PartialEq)]
pub enum MockFailure {
    Unauthorized,
    NotFound,
    Network,
    Timeout,
    Status(u16),
}

impl MockFailure {
    pub fn to_error(&self) -> ApiError {
        match self {
            MockFailure::Unauthorized => ApiError::Unauthorized("Could not validate credentials".to_string()),
            MockFailure::NotFound => ApiError::NotFound("Not Found".to_string()),
            MockFailure::Network => ApiError::Network("connection refused".to_string()),
            MockFailure::Timeout => ApiError::Timeout("operation timed out".to_string()),
            MockFailure::Status(status) => ApiError::Status {
                status: *status,
                message: "Internal Server Error".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Login { username: String },
    Register { username: String },
    Generate { token: String, jewelry_type: String },
    GenerateFromImage { token: String, jewelry_type: String, file_name: String },
    History { token: String },
    HealthCheck,
}

#[derive(Default)]
pub struct MockInferenceApi {
    users: Mutex<HashMap<String, String>>,
    generate_script: Mutex<VecDeque<Result<GenerateResponse, ApiError>>>,
    generate_failure: Mutex<Option<MockFailure>>,
    generation_delay: Mutex<Option<Duration>>,
    history_script: Mutex<VecDeque<Result<Vec<DesignRecord>, ApiError>>>,
    history_failure: Mutex<Option<MockFailure>>,
    history_delay: Mutex<Option<Duration>>,
    history: Mutex<Vec<DesignRecord>>,
    healthy: Mutex<bool>,
    next_id: Mutex<i64>,
    calls: Mutex<Vec<ApiCall>>,
}

impl MockInferenceApi {
    pub fn new() -> Self {
        Self {
            healthy: Mutex::new(true),
            next_id: Mutex::new(1),
            ..Default::default()
        }
    }

    pub fn with_user(self, username: &str, password: &str) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(username.to_string(), password.to_string());
        self
    }

    /// Seed the history feed; records are kept newest first
    pub fn with_history(self, records: Vec<DesignRecord>) -> Self {
        *self.history.lock().unwrap() = records;
        self
    }

    pub fn with_generation_delay(self, delay: Duration) -> Self {
        *self.generation_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn with_history_delay(self, delay: Duration) -> Self {
        *self.history_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn unhealthy(self) -> Self {
        *self.healthy.lock().unwrap() = false;
        self
    }

    /// Queue the outcome of the next generation call
    pub fn push_generate_result(&self, result: Result<GenerateResponse, ApiError>) {
        self.generate_script.lock().unwrap().push_back(result);
    }

    /// Fail every generation call until cleared
    pub fn set_generate_failure(&self, failure: Option<MockFailure>) {
        *self.generate_failure.lock().unwrap() = failure;
    }

    /// Queue the outcome of the next history fetch
    pub fn push_history_result(&self, result: Result<Vec<DesignRecord>, ApiError>) {
        self.history_script.lock().unwrap().push_back(result);
    }

    /// Fail every history fetch until cleared
    pub fn set_history_failure(&self, failure: Option<MockFailure>) {
        *self.history_failure.lock().unwrap() = failure;
    }

    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock().unwrap() = healthy;
    }

    /// Add a record at the head of the feed, as a backend finishing a
    /// generation on its own would
    pub fn add_history_record(&self, record: DesignRecord) {
        self.history.lock().unwrap().insert(0, record);
    }

    pub fn history_snapshot(&self) -> Vec<DesignRecord> {
        self.history.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn history_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ApiCall::History { .. }))
            .count()
    }

    pub fn generate_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ApiCall::Generate { .. } | ApiCall::GenerateFromImage { .. }))
            .count()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }

    async fn run_generation(&self, final_prompt: String) -> Result<GenerateResponse, ApiError> {
        let delay = *self.generation_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(result) = self.generate_script.lock().unwrap().pop_front() {
            return result;
        }
        if let Some(failure) = self.generate_failure.lock().unwrap().clone() {
            return Err(failure.to_error());
        }

        let record = self.next_record(final_prompt, Utc::now());
        let response = GenerateResponse {
            image_url: record.image_path.clone(),
            final_prompt: record.final_prompt.clone(),
            status: "success".to_string(),
        };
        self.add_history_record(record);
        Ok(response)
    }

    fn next_record(&self, final_prompt: String, created_at: DateTime<Utc>) -> DesignRecord {
        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        DesignRecord {
            id: DesignId::from(id),
            created_at,
            image_path: format!("storage\\generated_image\\design_{}.png", id),
            final_prompt,
            jewelry_type: None,
            material: None,
            stone: None,
        }
    }
}

#[async_trait]
impl InferenceApi for MockInferenceApi {
    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, ApiError> {
        self.record(ApiCall::Login {
            username: request.username.clone(),
        });
        let users = self.users.lock().unwrap().clone();
        match users.get(&request.username) {
            Some(password) if password == &request.password => Ok(TokenResponse {
                access_token: format!("token-{}", request.username),
                token_type: "bearer".to_string(),
            }),
            _ => Err(ApiError::Status {
                status: 400,
                message: "Incorrect username or password".to_string(),
            }),
        }
    }

    async fn register(&self, request: &RegisterRequest) -> Result<TokenResponse, ApiError> {
        self.record(ApiCall::Register {
            username: request.username.clone(),
        });
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&request.username) {
            return Err(ApiError::Status {
                status: 400,
                message: "Username already registered".to_string(),
            });
        }
        users.insert(request.username.clone(), request.password.clone());
        Ok(TokenResponse {
            access_token: format!("token-{}", request.username),
            token_type: "bearer".to_string(),
        })
    }

    async fn generate(
        &self,
        token: &str,
        request: &DesignRequest,
    ) -> Result<GenerateResponse, ApiError> {
        self.record(ApiCall::Generate {
            token: token.to_string(),
            jewelry_type: request.jewelry_type.clone(),
        });
        let prompt = format!(
            "{} {} {} with {}",
            request.style, request.material, request.jewelry_type, request.stone
        );
        self.run_generation(prompt).await
    }

    async fn generate_from_image(
        &self,
        token: &str,
        request: &ImageToImageRequest,
    ) -> Result<GenerateResponse, ApiError> {
        self.record(ApiCall::GenerateFromImage {
            token: token.to_string(),
            jewelry_type: request.jewelry_type.clone(),
            file_name: request.file_name.clone(),
        });
        let prompt = request
            .prompt
            .clone()
            .unwrap_or_else(|| format!("a {} from a reference image", request.jewelry_type));
        self.run_generation(prompt).await
    }

    async fn history(&self, token: &str) -> Result<Vec<DesignRecord>, ApiError> {
        self.record(ApiCall::History {
            token: token.to_string(),
        });

        let delay = *self.history_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(result) = self.history_script.lock().unwrap().pop_front() {
            return result;
        }
        if let Some(failure) = self.history_failure.lock().unwrap().clone() {
            return Err(failure.to_error());
        }
        Ok(self.history_snapshot())
    }

    async fn health_check(&self) -> Result<(), ApiError> {
        self.record(ApiCall::HealthCheck);
        if *self.healthy.lock().unwrap() {
            Ok(())
        } else {
            Err(MockFailure::Network.to_error())
        }
    }
}

/// History record created `age` before now
pub fn record_aged(id: i64, age: chrono::Duration) -> DesignRecord {
    DesignRecord {
        id: DesignId::from(id),
        created_at: Utc::now() - age,
        image_path: format!("storage\\generated_image\\design_{}.png", id),
        final_prompt: format!("design {}", id),
        jewelry_type: Some("Ring".to_string()),
        material: Some("Gold".to_string()),
        stone: Some("Diamond".to_string()),
    }
}
