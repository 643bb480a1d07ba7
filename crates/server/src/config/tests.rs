use super::*;

#[test]
fn empty_document_uses_defaults() {
    let config = HololithConfig::from_toml("").unwrap();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.api_prefix, "/api/v1");
    assert_eq!(config.server.environment, "development");
    assert!(config.server.cors_origin.is_none());
    assert_eq!(config.store.backend, "memory");
    assert_eq!(config.store.pool_size, 5);
    assert_eq!(config.store.table_prefix, "hololith_");
    assert_eq!(config.auth.access_expiry_seconds, 900);
    assert_eq!(config.auth.refresh_expiry_seconds, 2_592_000);
    assert!(config.rate_limit.enabled);
    assert_eq!(config.rate_limit.default_per_minute, 200);
    assert_eq!(config.rate_limit.view_per_minute, 60);
    assert_eq!(config.rate_limit.register_per_minute, 5);
    assert_eq!(config.rate_limit.login_per_minute, 10);
    assert_eq!(config.rate_limit.refresh_per_minute, 30);
    assert!(config.seed.enabled);
}

#[test]
fn sections_override_defaults() {
    let toml = r#"
        [server]
        port = 8080
        environment = "production"
        cors_origin = "https://a.example, https://b.example,"

        [store]
        backend = "postgres"
        url = "postgres://localhost/hololith"
        schema = "shop"

        [rate_limit]
        enabled = false
        view_per_minute = 120

        [seed]
        enabled = false
    "#;

    let config = HololithConfig::from_toml(toml).unwrap();
    assert_eq!(config.server.port, 8080);
    assert!(config.server.is_production());
    assert_eq!(
        config.server.cors_origins(),
        ["https://a.example", "https://b.example"]
    );
    assert_eq!(config.store.schema, "shop");
    assert_eq!(config.store.url.as_deref(), Some("postgres://localhost/hololith"));
    assert!(!config.rate_limit.enabled);
    assert_eq!(config.rate_limit.view_per_minute, 120);
    assert_eq!(config.rate_limit.login_per_minute, 10);
    assert!(!config.seed.enabled);
}

#[test]
fn short_secrets_are_rejected() {
    let err = HololithConfig::from_toml(
        r#"
        [auth]
        access_secret = "too-short"
    "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("auth.access_secret"));

    let err = HololithConfig::from_toml(
        r#"
        [auth]
        refresh_secret = "0123456789abcde"
    "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("at least 16"));
}

#[test]
fn backend_settings_are_checked() {
    let err = HololithConfig::from_toml("[store]\nbackend = \"postgres\"").unwrap_err();
    assert!(err.to_string().contains("store.url"));

    let err = HololithConfig::from_toml("[store]\nbackend = \"redis\"").unwrap_err();
    assert!(err.to_string().contains("unknown store backend"));
}

#[test]
fn api_prefix_must_be_absolute() {
    assert!(HololithConfig::from_toml("[server]\napi_prefix = \"api\"").is_err());
    let config = HololithConfig::from_toml("[server]\napi_prefix = \"\"").unwrap();
    assert!(config.server.api_prefix.is_empty());
}
