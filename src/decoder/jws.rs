//! JWKS-backed token decoder.
//!
//! # Responsibilities
//! - Fetch and hold the JSON Web Key Set
//! - Verify token signature and expiry
//! - Project mapped claims onto header names
//!
//! # Design Decisions
//! - Construction never fails; keys are fetched by [`JwsDecoder::refresh_keys`]
//! - A missing key set or unknown `kid` triggers a refetch on the next decode
//! - Decode-triggered refetches are single-flight and at most one per
//!   [`MIN_REFRESH_INTERVAL`]
//! - The key set is swapped atomically, readers never block

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{DecodingKey, Header, Validation};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use url::Url;

use crate::config::ClaimMapping;
use crate::decoder::{DecodeError, DecodedToken, TokenDecoder};

type Claims = Map<String, Value>;

/// Minimum time between refetches triggered by decodes.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Decoder verifying tokens against a remote JWKS endpoint.
pub struct JwsDecoder {
    jwks_url: Url,
    client: reqwest::Client,
    mapping: ClaimMapping,
    username_claim: String,
    keys: ArcSwapOption<JwkSet>,
    /// Time of the last decode-triggered refetch; held across the fetch.
    last_refresh: Mutex<Option<Instant>>,
    min_refresh_interval: Duration,
}

impl JwsDecoder {
    pub fn new(
        jwks_url: Url,
        mapping: ClaimMapping,
        username_claim: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            jwks_url,
            client,
            mapping,
            username_claim: username_claim.into(),
            keys: ArcSwapOption::empty(),
            last_refresh: Mutex::new(None),
            min_refresh_interval: MIN_REFRESH_INTERVAL,
        }
    }

    /// Override the minimum time between decode-triggered refetches.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Fetch the key set and make it current.
    pub async fn refresh_keys(&self) -> Result<Arc<JwkSet>, DecodeError> {
        let key_set = self.fetch_keys().await.map_err(|source| DecodeError::KeySetUnavailable {
            url: self.jwks_url.to_string(),
            source,
        })?;

        tracing::info!(url = %self.jwks_url, keys = key_set.keys.len(), "key set refreshed");
        let key_set = Arc::new(key_set);
        self.keys.store(Some(Arc::clone(&key_set)));
        Ok(key_set)
    }

    async fn fetch_keys(&self) -> Result<JwkSet, reqwest::Error> {
        self.client
            .get(self.jwks_url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    fn current_keys(&self, kid: Option<&str>) -> Option<Arc<JwkSet>> {
        self.keys
            .load_full()
            .filter(|keys| kid.map_or(true, |kid| keys.find(kid).is_some()))
    }

    async fn keys_for(&self, kid: Option<&str>) -> Result<Arc<JwkSet>, DecodeError> {
        if let Some(keys) = self.current_keys(kid) {
            return Ok(keys);
        }

        let mut last_refresh = self.last_refresh.lock().await;
        // Another decode may have refreshed while this one waited.
        if let Some(keys) = self.current_keys(kid) {
            return Ok(keys);
        }

        if let Some(at) = *last_refresh {
            let elapsed = at.elapsed();
            if elapsed < self.min_refresh_interval {
                tracing::debug!(kid = ?kid, "key set refresh throttled");
                return self.keys.load_full().ok_or(DecodeError::RefreshThrottled {
                    retry_in: self.min_refresh_interval - elapsed,
                });
            }
        }

        *last_refresh = Some(Instant::now());
        self.refresh_keys().await
    }

    fn project(&self, claims: &Claims) -> DecodedToken {
        let headers = self
            .mapping
            .iter()
            .filter_map(|(claim, header)| {
                claims.get(claim).map(|value| (header.clone(), claim_value(value)))
            })
            .collect::<BTreeMap<_, _>>();

        let expires_at = claims
            .get("exp")
            .and_then(|exp| exp.as_u64().or_else(|| exp.as_f64().map(|secs| secs as u64)))
            .unwrap_or_default();

        DecodedToken {
            headers,
            expires_at,
            username: claims.get(&self.username_claim).map(claim_value),
        }
    }

    #[cfg(test)]
    fn install_keys(&self, keys: JwkSet) {
        self.keys.store(Some(Arc::new(keys)));
    }
}

#[async_trait]
impl TokenDecoder for JwsDecoder {
    async fn decode(&self, token: &str) -> Result<Arc<DecodedToken>, DecodeError> {
        let header = jsonwebtoken::decode_header(token)?;
        let keys = self.keys_for(header.kid.as_deref()).await?;
        let claims = verify(token, &header, &keys)?;
        Ok(Arc::new(self.project(&claims)))
    }
}

/// Verify against the key named by `kid`, or every key when the token has none.
fn verify(token: &str, header: &Header, keys: &JwkSet) -> Result<Claims, DecodeError> {
    let candidates: Vec<&Jwk> = match header.kid.as_deref() {
        Some(kid) => keys.find(kid).into_iter().collect(),
        None => keys.keys.iter().collect(),
    };

    let mut validation = Validation::new(header.alg);
    validation.validate_aud = false;

    let mut last_error = None;
    for jwk in candidates {
        let key = DecodingKey::from_jwk(jwk)?;
        match jsonwebtoken::decode::<Claims>(token, &key, &validation) {
            Ok(data) => return Ok(data.claims),
            Err(e) => last_error = Some(e),
        }
    }

    Err(match last_error {
        Some(e) => DecodeError::InvalidToken(e),
        None => DecodeError::UnknownKey { kid: header.kid.clone() },
    })
}

/// Header value for a claim; strings are used verbatim, anything else as JSON.
fn claim_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
