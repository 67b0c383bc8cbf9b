//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{routing::get, Json, Router};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const KID: &str = "test-key";
pub const SECRET: &[u8] = b"sidecar-test-secret-0123456789abc";
/// URL-safe base64 of [`SECRET`].
const SECRET_B64: &str = "c2lkZWNhci10ZXN0LXNlY3JldC0wMTIzNDU2Nzg5YWJj";

/// A mock JWKS endpoint counting how often keys are fetched.
pub struct MockJwks {
    pub url: String,
    pub fetches: Arc<AtomicU32>,
}

impl MockJwks {
    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

/// Start a JWKS endpoint serving a single HS256 key.
pub async fn start_mock_jwks() -> MockJwks {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let fetches = Arc::new(AtomicU32::new(0));

    let counter = fetches.clone();
    let app = Router::new().route(
        "/jwks",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "keys": [{ "kty": "oct", "kid": KID, "alg": "HS256", "k": SECRET_B64 }]
                }))
            }
        }),
    );

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockJwks {
        url: format!("http://{addr}/jwks"),
        fetches,
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// Sign `claims` with the mock key.
pub fn mint(claims: Value) -> String {
    mint_with(claims, SECRET)
}

/// Sign `claims` with an arbitrary HMAC secret under the mock key ID.
pub fn mint_with(claims: Value, secret: &[u8]) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(KID.to_string());
    encode(&header, &claims, &EncodingKey::from_secret(secret)).unwrap()
}
