//! In-process stand-in for the KV endpoint of a Consul agent.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::client::{INDEX_HEADER, TOKEN_HEADER};

/// Parameters of the last KV request the fake agent served.
#[derive(Debug, Clone, Default)]
pub(crate) struct SeenRequest {
    pub(crate) token: Option<String>,
    pub(crate) datacenter: Option<String>,
    pub(crate) index: Option<u64>,
    pub(crate) wait: Option<String>,
}

struct Entry {
    value: Vec<u8>,
    create_index: u64,
    modify_index: u64,
}

#[derive(Default)]
struct FakeState {
    last_index: u64,
    entries: HashMap<String, Entry>,
    denied: HashMap<String, String>,
    omit_index: bool,
    last_request: SeenRequest,
}

impl FakeState {
    /// Modify index of an existing key, the store-wide index otherwise.
    fn key_index(&self, key: &str) -> u64 {
        self.entries
            .get(key)
            .map_or(self.last_index, |entry| entry.modify_index)
            .max(1)
    }
}

/// Fake Consul agent serving `GET /v1/kv/{key}` with blocking queries.
#[derive(Clone)]
pub(crate) struct FakeConsul {
    address: SocketAddr,
    state: Arc<Mutex<FakeState>>,
    changes: watch::Sender<u64>,
}

impl FakeConsul {
    /// Starts the agent on an ephemeral local port.
    pub(crate) async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let fake = Self {
            address: listener.local_addr().unwrap(),
            state: Arc::default(),
            changes: watch::Sender::new(0),
        };

        let router = Router::new()
            .route("/v1/kv/{*key}", get(kv))
            .with_state(fake.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        fake
    }

    /// Returns a local address nothing listens on.
    pub(crate) async fn unused_address() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    }

    pub(crate) fn address(&self) -> String {
        self.address.to_string()
    }

    /// Writes `key` and returns its new modify index.
    pub(crate) fn put(&self, key: &str, value: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.last_index += 1;
        let index = state.last_index;
        let create_index = state
            .entries
            .get(key)
            .map_or(index, |entry| entry.create_index);
        state.entries.insert(
            key.to_owned(),
            Entry {
                value: value.as_bytes().to_vec(),
                create_index,
                modify_index: index,
            },
        );
        drop(state);

        self.changes.send_replace(index);
        index
    }

    /// Deletes `key` and returns the index of the deletion.
    pub(crate) fn delete(&self, key: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.last_index += 1;
        let index = state.last_index;
        state.entries.remove(key);
        drop(state);

        self.changes.send_replace(index);
        index
    }

    /// Answers every request for `key` with `403` and `body`.
    pub(crate) fn deny(&self, key: &str, body: &str) {
        let mut state = self.state.lock().unwrap();
        state.denied.insert(key.to_owned(), body.to_owned());
    }

    /// Stops sending the index header.
    pub(crate) fn omit_index(&self, omit: bool) {
        self.state.lock().unwrap().omit_index = omit;
    }

    pub(crate) fn last_request(&self) -> SeenRequest {
        self.state.lock().unwrap().last_request.clone()
    }

    fn respond(&self, key: &str) -> Response {
        let state = self.state.lock().unwrap();
        let index = state.key_index(key);

        let mut response = match state.entries.get(key) {
            Some(entry) => {
                let value = if entry.value.is_empty() {
                    serde_json::Value::Null
                } else {
                    STANDARD.encode(&entry.value).into()
                };
                let body = serde_json::json!([{
                    "Key": key,
                    "Value": value,
                    "CreateIndex": entry.create_index,
                    "ModifyIndex": entry.modify_index,
                    "LockIndex": 0,
                    "Flags": 0,
                }]);
                axum::Json(body).into_response()
            }
            None => StatusCode::NOT_FOUND.into_response(),
        };

        if !state.omit_index {
            let name = HeaderName::from_bytes(INDEX_HEADER.as_bytes()).unwrap();
            response.headers_mut().insert(name, HeaderValue::from(index));
        }
        response
    }
}

fn parse_wait(wait: &str) -> Option<Duration> {
    if let Some(ms) = wait.strip_suffix("ms") {
        return ms.parse().ok().map(Duration::from_millis);
    }
    wait.strip_suffix('s')?.parse().ok().map(Duration::from_secs)
}

async fn kv(
    State(fake): State<FakeConsul>,
    Path(key): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let cursor = params.get("index").and_then(|index| index.parse::<u64>().ok());
    let wait = params
        .get("wait")
        .and_then(|wait| parse_wait(wait))
        .unwrap_or(Duration::from_secs(300));

    {
        let mut state = fake.state.lock().unwrap();
        state.last_request = SeenRequest {
            token: headers
                .get(TOKEN_HEADER)
                .and_then(|token| token.to_str().ok())
                .map(str::to_owned),
            datacenter: params.get("dc").cloned(),
            index: cursor,
            wait: params.get("wait").cloned(),
        };
        if let Some(body) = state.denied.get(&key) {
            return (StatusCode::FORBIDDEN, body.clone()).into_response();
        }
    }

    let Some(cursor) = cursor.filter(|cursor| *cursor > 0) else {
        return fake.respond(&key);
    };

    let mut changes = fake.changes.subscribe();
    let deadline = Instant::now() + wait;
    loop {
        let current = fake.state.lock().unwrap().key_index(&key);
        if current != cursor {
            break;
        }
        match tokio::time::timeout_at(deadline, changes.changed()).await {
            Ok(Ok(())) => continue,
            Ok(Err(_)) | Err(_) => break,
        }
    }
    fake.respond(&key)
}
