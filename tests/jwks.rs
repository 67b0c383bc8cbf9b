//! Key set fetching against a live JWKS endpoint.

use std::sync::Arc;

use serde_json::json;

use token_decode_sidecar::config::ClaimMapping;
use token_decode_sidecar::decoder::{DecodeError, JwsDecoder, TokenDecoder};

mod common;

fn decoder(url: &str) -> JwsDecoder {
    let mapping = ClaimMapping::from([("sub".to_string(), "X-User".to_string())]);
    JwsDecoder::new(url.parse().unwrap(), mapping, "preferred_username", reqwest::Client::new())
}

#[tokio::test]
async fn test_recovers_lazily_without_boot_fetch() {
    let jwks = common::start_mock_jwks().await;
    let decoder = decoder(&jwks.url);
    assert_eq!(jwks.fetch_count(), 0);

    let token = common::mint(json!({"sub": "alice", "exp": common::unix_now() + 600}));
    let decoded = decoder.decode(&token).await.expect("decode after lazy fetch");

    assert_eq!(decoded.headers.get("X-User").map(String::as_str), Some("alice"));
    assert_eq!(jwks.fetch_count(), 1);

    decoder.decode(&token).await.unwrap();
    assert_eq!(jwks.fetch_count(), 1);
}

#[tokio::test]
async fn test_forged_kids_do_not_drive_fetches() {
    let jwks = common::start_mock_jwks().await;
    let decoder = decoder(&jwks.url);
    decoder.refresh_keys().await.unwrap();
    assert_eq!(jwks.fetch_count(), 1);

    for i in 0..50 {
        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
        header.kid = Some(format!("forged-{i}"));
        let token = jsonwebtoken::encode(
            &header,
            &json!({"sub": "eve", "exp": common::unix_now() + 600}),
            &jsonwebtoken::EncodingKey::from_secret(common::SECRET),
        )
        .unwrap();

        assert!(matches!(
            decoder.decode(&token).await,
            Err(DecodeError::UnknownKey { .. })
        ));
    }

    // One refetch for the first unknown kid, then throttled.
    assert_eq!(jwks.fetch_count(), 2);
}

#[tokio::test]
async fn test_concurrent_decodes_share_one_fetch() {
    let jwks = common::start_mock_jwks().await;
    let decoder = Arc::new(decoder(&jwks.url));
    let token = common::mint(json!({"sub": "alice", "exp": common::unix_now() + 600}));

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let decoder = Arc::clone(&decoder);
            let token = token.clone();
            tokio::spawn(async move { decoder.decode(&token).await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
    assert_eq!(jwks.fetch_count(), 1);
}
