use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// A request as seen by the mock backend
#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    pub form_fields: HashMap<String, String>,
    pub file_name: Option<String>,
    pub file_size: usize,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }
}

/// In-memory backend state
#[derive(Debug, Default)]
pub struct BackendFixture {
    users: HashMap<String, String>,
    tokens: HashSet<String>,
    history: Vec<Value>,
    next_id: i64,
    pub generation_delay: Option<Duration>,
    pub generation_status: Option<u16>,
    pub requests: Vec<RecordedRequest>,
}

impl BackendFixture {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    pub fn add_user(&mut self, username: &str, password: &str) {
        self.users.insert(username.to_string(), password.to_string());
    }

    pub fn has_user(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    /// Returns a token when the credentials match
    pub fn login(&mut self, username: &str, password: &str) -> Option<String> {
        match self.users.get(username) {
            Some(stored) if stored == password => {
                let token = format!("mock-token-{}", username);
                self.tokens.insert(token.clone());
                Some(token)
            }
            _ => None,
        }
    }

    pub fn is_valid_token(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn issue_token(&mut self, token: &str) {
        self.tokens.insert(token.to_string());
    }

    /// Insert a history entry as-is, newest first
    pub fn seed_history(&mut self, record: Value) {
        self.history.insert(0, record);
    }

    pub fn history(&self) -> &[Value] {
        &self.history
    }

    /// Store a new design and return its history entry
    pub fn record_design(&mut self, jewelry_type: &str, material: &str, stone: &str, prompt: String) -> Value {
        let id = self.next_id;
        self.next_id += 1;

        let record = json!({
            "id": id,
            "jewelry_type": jewelry_type,
            "material": material,
            "stone": stone,
            "image_path": format!("storage\\generated_image\\design_{}.png", id),
            "final_prompt": prompt,
            "created_at": Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        });
        self.history.insert(0, record.clone());
        record
    }
}
