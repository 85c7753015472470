//! Integration tests for gateway configuration loading
//!
//! Tests that manipulate EXTERNAL_API_URL or NEXT_PUBLIC_EXTERNAL_API_URL are
//! marked with #[serial] so they never race each other on the process
//! environment.

use serial_test::serial;
use std::env;
use std::io::Write;
use studyhub_common::config::{
    GatewayConfig, DEFAULT_UPSTREAM_BASE_URL, EXTERNAL_API_URL_ENV, PUBLIC_EXTERNAL_API_URL_ENV,
};
use studyhub_common::Error;

fn clear_upstream_env() {
    env::remove_var(EXTERNAL_API_URL_ENV);
    env::remove_var(PUBLIC_EXTERNAL_API_URL_ENV);
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_upstream_env();
    let file = write_config(
        r#"
        [upstream]
        external_api_url = "http://from-toml:5000"
        public_external_api_url = "http://public-from-toml"
        "#,
    );

    env::set_var(EXTERNAL_API_URL_ENV, "http://from-env:5000");
    let config = GatewayConfig::load(Some(file.path())).unwrap();
    clear_upstream_env();

    assert_eq!(
        config.upstream.resolved_base().as_deref(),
        Some("http://from-env:5000")
    );
    assert_eq!(
        config.upstream.public_external_api_url.as_deref(),
        Some("http://public-from-toml")
    );
}

#[test]
#[serial]
fn test_public_env_used_when_primary_absent() {
    clear_upstream_env();
    env::set_var(PUBLIC_EXTERNAL_API_URL_ENV, "http://public-env");

    let file = write_config("");
    let config = GatewayConfig::load(Some(file.path())).unwrap();
    clear_upstream_env();

    assert_eq!(config.upstream.strict_base(), None);
    assert_eq!(config.upstream.resolved_base().as_deref(), Some("http://public-env"));
}

#[test]
#[serial]
fn test_empty_file_and_env_fall_back_to_default() {
    clear_upstream_env();
    let file = write_config("");
    let config = GatewayConfig::load(Some(file.path())).unwrap();

    assert_eq!(
        config.upstream.resolved_base().as_deref(),
        Some(DEFAULT_UPSTREAM_BASE_URL)
    );
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = GatewayConfig::load(Some(&missing)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
