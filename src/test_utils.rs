use crate::config::ListConfig;
use crate::error::app_error::AppError;
use crate::gateway::transport::{ApiRequest, ApiResponse, HttpTransport, Method};
use crate::models::session::Session;
use crate::storage::session_store::SessionStore;
use crate::storage::token_storage::MemoryTokenStorage;
use crate::CrmClient;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const VALID_USERNAME: &str = "admin";
pub const VALID_PASSWORD: &str = "password";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    #[default]
    Accept,
    Deny,
    Unreachable,
}

/// One request as the backend saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
}

impl RecordedCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Default)]
pub struct BackendState {
    pub access_tokens: HashSet<String>,
    pub refresh_tokens: HashSet<String>,
    pub issued: u32,
    pub refresh_mode: RefreshMode,
    /// Refresh succeeds but the new access token is rejected anyway.
    pub reject_refreshed_tokens: bool,
    /// Login succeeds but the issued access token is rejected anyway.
    pub reject_login_tokens: bool,
    pub legacy_list: bool,
    pub list_fails: bool,
    pub me_fails: bool,
    pub unreachable: bool,
    /// Extra latency for `GET /contacts` by requested page number.
    pub slow_pages: HashMap<String, Duration>,
    pub contacts: Vec<Value>,
    pub next_id: i64,
    pub calls: Vec<RecordedCall>,
}

/// In-memory CRM backend speaking the same envelopes as the real API.
///
/// Every exchange yields to the scheduler before it is answered, so requests
/// started together interleave the way they would over a network.
pub struct MockBackend {
    state: Mutex<BackendState>,
}

impl MockBackend {
    pub fn new() -> Self {
        let contacts = (1..=30)
            .map(|id| {
                json!({
                    "id": id,
                    "first_name": format!("First{:02}", id),
                    "last_name": format!("Last{:02}", 31 - id),
                    "email": format!("contact{:02}@example.com", id),
                    "company": "Acme",
                    "created_at": format!("2024-01-{:02}T00:00:00Z", id)
                })
            })
            .collect();

        Self {
            state: Mutex::new(BackendState {
                contacts,
                next_id: 31,
                ..BackendState::default()
            }),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().expect("backend state poisoned")
    }

    /// Issues a token pair the backend accepts, as a successful sign-in would.
    pub fn issue_session(&self) -> Session {
        let mut state = self.state();
        let access_token = issue_access_token(&mut state);
        state.issued += 1;
        let refresh_token = format!("refresh-{}", state.issued);
        state.refresh_tokens.insert(refresh_token.clone());
        Session::new(access_token, refresh_token)
    }

    /// Makes every access token issued so far invalid; refresh tokens stay valid.
    pub fn expire_access_tokens(&self) {
        self.state().access_tokens.clear();
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }

    pub fn last_call_to(&self, method: Method, path: &str) -> Option<RecordedCall> {
        self.state()
            .calls
            .iter()
            .rev()
            .find(|call| call.method == method && call.path == path)
            .cloned()
    }

    fn delay_for(&self, request: &ApiRequest) -> Option<Duration> {
        if request.path != "/contacts" {
            return None;
        }
        let page = request.query.iter().find(|(key, _)| key == "page").map(|(_, value)| value)?;
        self.state().slow_pages.get(page).copied()
    }

    fn respond(&self, request: &ApiRequest) -> Result<ApiResponse, AppError> {
        let mut state = self.state();
        state.calls.push(RecordedCall {
            method: request.method,
            path: request.path.clone(),
            query: request.query.clone(),
            authorization: request.header("Authorization").map(str::to_string),
            request_id: request.header("X-Request-Id").map(str::to_string),
        });

        if state.unreachable {
            return Err(AppError::unreachable("Connection refused"));
        }

        let segments: Vec<&str> = request.path.trim_matches('/').split('/').collect();
        match (request.method, segments.as_slice()) {
            (Method::Get, ["health"]) => Ok(reply(200, json!({"success": true, "message": "CRM API is running"}))),
            (Method::Post, ["auth", "login"]) => Ok(login(&mut state, request)),
            (Method::Post, ["auth", "refresh"]) => refresh(&mut state, request),
            (_, ["auth", "me"] | ["contacts", ..]) if !authorized(&state, request) => {
                Ok(reply(401, json!({"success": false, "message": "Token expired"})))
            }
            (Method::Get, ["auth", "me"]) if state.me_fails => {
                Ok(reply(500, json!({"success": false, "message": "Identity service unavailable"})))
            }
            (Method::Get, ["auth", "me"]) => Ok(reply(
                200,
                json!({
                    "success": true,
                    "data": {
                        "id": "1",
                        "username": VALID_USERNAME,
                        "first_name": "Ada",
                        "last_name": "Admin",
                        "email": "admin@example.com",
                        "roles": ["admin", "sales"]
                    }
                }),
            )),
            (Method::Get, ["contacts"]) => Ok(list_contacts(&state, request)),
            (Method::Post, ["contacts"]) => Ok(create_contact(&mut state, request)),
            (method, ["contacts", id]) => Ok(contact_by_id(&mut state, method, id, request)),
            _ => Ok(reply(404, json!({"success": false, "message": "Not found"}))),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpTransport for MockBackend {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, AppError> {
        match self.delay_for(request) {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        self.respond(request)
    }
}

fn reply(status: u16, body: Value) -> ApiResponse {
    ApiResponse {
        status,
        body: body.to_string().into_bytes(),
    }
}

fn issue_access_token(state: &mut BackendState) -> String {
    state.issued += 1;
    let token = format!("access-{}", state.issued);
    state.access_tokens.insert(token.clone());
    token
}

fn authorized(state: &BackendState, request: &ApiRequest) -> bool {
    request
        .header("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| state.access_tokens.contains(token))
}

fn body_str<'a>(request: &'a ApiRequest, field: &str) -> Option<&'a str> {
    request.body.as_ref().and_then(|body| body.get(field)).and_then(Value::as_str)
}

fn login(state: &mut BackendState, request: &ApiRequest) -> ApiResponse {
    if body_str(request, "username") != Some(VALID_USERNAME) || body_str(request, "password") != Some(VALID_PASSWORD) {
        return reply(401, json!({"success": false, "message": "Invalid username or password"}));
    }

    let access_token = issue_access_token(state);
    if state.reject_login_tokens {
        state.access_tokens.remove(&access_token);
    }
    state.issued += 1;
    let refresh_token = format!("refresh-{}", state.issued);
    state.refresh_tokens.insert(refresh_token.clone());
    reply(
        200,
        json!({"success": true, "message": "Login successful", "access_token": access_token, "refresh_token": refresh_token}),
    )
}

fn refresh(state: &mut BackendState, request: &ApiRequest) -> Result<ApiResponse, AppError> {
    match state.refresh_mode {
        RefreshMode::Unreachable => Err(AppError::unreachable("Connection reset by peer")),
        RefreshMode::Deny => Ok(reply(401, json!({"success": false, "message": "Refresh token expired"}))),
        RefreshMode::Accept => {
            let known = body_str(request, "refresh_token").is_some_and(|token| state.refresh_tokens.contains(token));
            if !known {
                return Ok(reply(401, json!({"success": false, "message": "Invalid refresh token"})));
            }
            let access_token = issue_access_token(state);
            if state.reject_refreshed_tokens {
                state.access_tokens.remove(&access_token);
            }
            Ok(reply(200, json!({"access_token": access_token})))
        }
    }
}

fn text_field(contact: &Value, field: &str) -> String {
    match contact.get(field) {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Number(value)) => format!("{:08}", value.as_i64().unwrap_or_default()),
        _ => String::new(),
    }
}

fn list_contacts(state: &BackendState, request: &ApiRequest) -> ApiResponse {
    if state.list_fails {
        return reply(200, json!({"success": false, "message": "Database unavailable"}));
    }
    if state.legacy_list {
        return reply(200, json!({"success": true, "data": state.contacts}));
    }

    let param = |name: &str| request.query.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str());
    let page: usize = param("page").and_then(|value| value.parse().ok()).unwrap_or(1).max(1);
    let limit: usize = param("limit").and_then(|value| value.parse().ok()).unwrap_or(25).max(1);
    let sort = param("sort").unwrap_or("created_at");

    let mut rows = state.contacts.clone();
    rows.sort_by_key(|contact| text_field(contact, sort));
    if param("order") == Some("desc") {
        rows.reverse();
    }

    let total = rows.len();
    let total_pages = total.div_ceil(limit).max(1);
    let data: Vec<Value> = rows.into_iter().skip((page - 1) * limit).take(limit).collect();

    reply(
        200,
        json!({
            "success": true,
            "data": data,
            "pagination": {
                "current_page": page,
                "per_page": limit,
                "total": total,
                "total_pages": total_pages,
                "has_next": page < total_pages,
                "has_previous": page > 1
            }
        }),
    )
}

fn email_taken(state: &BackendState, email: Option<&str>, except_id: Option<i64>) -> bool {
    let Some(email) = email.filter(|email| !email.is_empty()) else {
        return false;
    };
    state
        .contacts
        .iter()
        .filter(|contact| contact.get("id").and_then(Value::as_i64) != except_id)
        .any(|contact| contact.get("email").and_then(Value::as_str) == Some(email))
}

fn create_contact(state: &mut BackendState, request: &ApiRequest) -> ApiResponse {
    if email_taken(state, body_str(request, "email"), None) {
        return reply(422, json!({"success": false, "message": "A contact with this email already exists"}));
    }

    let mut contact = request.body.clone().unwrap_or_else(|| json!({}));
    contact["id"] = json!(state.next_id);
    state.next_id += 1;
    state.contacts.push(contact.clone());
    reply(201, json!({"success": true, "message": "Contact created successfully", "data": contact}))
}

fn contact_by_id(state: &mut BackendState, method: Method, id: &str, request: &ApiRequest) -> ApiResponse {
    let not_found = || reply(404, json!({"success": false, "message": "Contact not found"}));
    let Ok(id) = id.parse::<i64>() else {
        return not_found();
    };
    let Some(index) = state.contacts.iter().position(|contact| contact.get("id").and_then(Value::as_i64) == Some(id)) else {
        return not_found();
    };

    match method {
        Method::Get => reply(200, json!({"success": true, "data": state.contacts[index]})),
        Method::Put => {
            if email_taken(state, body_str(request, "email"), Some(id)) {
                return reply(422, json!({"success": false, "message": "A contact with this email already exists"}));
            }
            let mut contact = request.body.clone().unwrap_or_else(|| json!({}));
            contact["id"] = json!(id);
            state.contacts[index] = contact;
            reply(200, json!({"success": true, "message": "Contact updated successfully"}))
        }
        Method::Delete => {
            state.contacts.remove(index);
            reply(200, json!({"success": true, "message": "Contact deleted successfully"}))
        }
        Method::Post => reply(405, json!({"success": false, "message": "Method not allowed"})),
    }
}

/// A client wired to a fresh [`MockBackend`] with in-memory token storage.
pub fn mock_client() -> (CrmClient, Arc<MockBackend>) {
    let backend = Arc::new(MockBackend::new());
    let client = CrmClient::from_parts(backend.clone(), Box::new(MemoryTokenStorage::new()), &ListConfig::default())
        .expect("default list config is valid");
    (client, backend)
}

/// Same as [`mock_client`], already holding a session the backend accepts.
pub fn signed_in_client() -> (CrmClient, Arc<MockBackend>) {
    let (client, backend) = mock_client();
    let session = backend.issue_session();
    store(client.session(), &session);
    (client, backend)
}

pub fn store(session_store: &SessionStore, session: &Session) {
    session_store.set(session).expect("memory storage never fails");
}
