//! Configuration loading from the environment.

use crate::config::env::Environment;
use crate::config::schema::*;
use crate::config::ConfigError;

/// Resolve every variable eagerly into an immutable [`SidecarConfig`].
///
/// The first failing variable aborts loading.
pub fn load_config(env: &Environment) -> Result<SidecarConfig, ConfigError> {
    let jwks_url = JWKS_URL.resolve_parsed(env)?;
    let force_jwks_on_start = FORCE_JWKS_ON_START.resolve_bool(env)?;

    let claims = ClaimSourcesConfig {
        file_path: CLAIM_MAPPING_FILE_PATH.resolve(env)?.into(),
        inline: CLAIM_MAPPINGS.resolve(env)?,
    };

    let decode = DecodeConfig {
        auth_header: AUTH_HEADER_KEY.resolve(env)?,
        token_validated_header: TOKEN_VALIDATED_HEADER_KEY.resolve(env)?,
        username_claim: OIDC_USERNAME_CLAIM.resolve(env)?,
        validate_api_paths: split_list(&VALIDATE_API_PATHS.resolve(env)?),
    };

    let cluster = ClusterConfig {
        multi_cluster_prefix: MULTI_CLUSTER_PREFIX.resolve(env)?,
        secret_cache_ttl: SECRET_CACHE_TTL.resolve(env)?,
    };

    let port = PORT.resolve_parsed(env)?;

    let level_name = LOG_LEVEL.resolve(env)?;
    let logging = LogSettings {
        format: LOG_TYPE.resolve_parsed(env)?,
        level: parse_level(&level_name).map_err(|reason| ConfigError::InvalidValue {
            name: LOG_LEVEL.name,
            value: level_name.clone(),
            reason,
        })?,
    };

    let cache = CacheConfig {
        enabled: CACHE_ENABLED.resolve_bool(env)?,
        max_keys: MAX_CACHE_KEYS.resolve_i64(env)?,
    };

    Ok(SidecarConfig {
        jwks_url,
        force_jwks_on_start,
        claims,
        decode,
        cluster,
        port,
        logging,
        cache,
        key_cost: KEY_COST,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_defaults() {
        let config = load_config(&env(&[("JWKS_URL", "https://idp.example/jwks")])).unwrap();

        assert_eq!(config.jwks_url.as_str(), "https://idp.example/jwks");
        assert!(config.force_jwks_on_start);
        assert_eq!(config.claims.file_path.to_str(), Some("config.json"));
        assert_eq!(config.claims.inline, "");
        assert_eq!(config.decode.auth_header, "Authorization");
        assert_eq!(config.decode.token_validated_header, "jwt-token-validated");
        assert_eq!(config.decode.username_claim, "preferred_username");
        assert_eq!(config.decode.validate_api_paths.len(), 5);
        assert_eq!(config.cluster.multi_cluster_prefix, "multicluster");
        assert_eq!(config.cluster.secret_cache_ttl_secs().unwrap(), 300);
        assert_eq!(config.port, 8080);
        assert_eq!(config.logging.format, LogType::Json);
        assert_eq!(config.logging.level, LevelFilter::INFO);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_keys, 10_000);
        assert_eq!(config.key_cost, 100);
    }

    #[test]
    fn test_missing_jwks_url() {
        match load_config(&env(&[])) {
            Err(ConfigError::MissingRequired { name }) => assert_eq!(name, "JWKS_URL"),
            other => panic!("expected missing JWKS_URL, got {other:?}"),
        }
    }

    #[test]
    fn test_overrides() {
        let config = load_config(&env(&[
            ("JWKS_URL", "http://localhost:9000/keys"),
            ("FORCE_JWKS_ON_START", "false"),
            ("CLAIM_MAPPINGS", "sub:X-User"),
            ("PORT", "0"),
            ("LOG_TYPE", "pretty"),
            ("LOG_LEVEL", "debug"),
            ("CACHE_ENABLED", "false"),
            ("MAX_CACHE_KEYS", "-5"),
            ("VALIDATE_API_PATHS", "/api/a/"),
        ]))
        .unwrap();

        assert!(!config.force_jwks_on_start);
        assert_eq!(config.claims.inline, "sub:X-User");
        assert_eq!(config.port, 0);
        assert_eq!(config.logging.format, LogType::Pretty);
        assert_eq!(config.logging.level, LevelFilter::DEBUG);
        assert!(!config.cache.enabled);
        // Range is checked when the cache is built, not here.
        assert_eq!(config.cache.max_keys, -5);
        assert_eq!(config.decode.validate_api_paths, vec!["/api/a/".to_string()]);
    }

    #[test]
    fn test_invalid_typed_values() {
        let cases = [
            ("FORCE_JWKS_ON_START", "yes"),
            ("CACHE_ENABLED", "1"),
            ("MAX_CACHE_KEYS", "many"),
            ("PORT", "http"),
            ("LOG_TYPE", "xml"),
            ("LOG_LEVEL", "loud"),
            ("JWKS_URL", "not a url"),
        ];
        for (name, value) in cases {
            let mut pairs = vec![("JWKS_URL", "https://idp.example/jwks")];
            pairs.push((name, value));
            match load_config(&env(&pairs)) {
                Err(ConfigError::InvalidValue { name: failed, .. }) => assert_eq!(failed, name),
                other => panic!("{name}={value} should be invalid, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_bad_secret_ttl_is_deferred() {
        let config = load_config(&env(&[
            ("JWKS_URL", "https://idp.example/jwks"),
            ("SECRET_CACHE_TTL", "soon"),
        ]))
        .unwrap();
        assert!(config.cluster.secret_cache_ttl_secs().is_err());
    }

    #[test]
    fn test_summary_serializes_resolved_settings() {
        let config = load_config(&env(&[
            ("JWKS_URL", "https://idp.example/jwks"),
            ("VALIDATE_API_PATHS", "/api/a/,/api/b/"),
            ("LOG_TYPE", "pretty"),
        ]))
        .unwrap();

        let summary = serde_json::to_value(config.summary()).unwrap();
        assert_eq!(summary["jwks_url"], "https://idp.example/jwks");
        assert_eq!(summary["port"], 8080);
        assert_eq!(summary["log_type"], "pretty");
        assert!(summary["log_level"].as_str().unwrap().eq_ignore_ascii_case("info"));
        assert_eq!(summary["decode"]["validate_api_paths"][1], "/api/b/");
        assert_eq!(summary["cluster"]["secret_cache_ttl"], "300");
        assert_eq!(summary["cache"]["max_keys"], 10_000);
    }
}
