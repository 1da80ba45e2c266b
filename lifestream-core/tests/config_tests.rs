use chrono::Duration;
use lifestream_core::{AccountId, AppConfig, ConfigError, FetchConfig, ServiceKind};

const SAMPLE: &str = r#"{
  "fetch": { "request_timeout_seconds": 5 },
  "personas": [
    {
      "name": "Alice",
      "accounts": [
        { "service": "flickr", "username": "alice", "api_key": "k1", "batching": true },
        { "service": "Twitter", "username": "alice", "active": false },
        { "id": "links", "service": "delicious", "username": "alice", "batch_window_minutes": 30 }
      ]
    }
  ]
}"#;

#[test]
fn accounts_get_defaults_and_ids() {
    let config = AppConfig::from_json(SAMPLE).unwrap();
    let accounts = config.accounts().unwrap();
    assert_eq!(accounts.len(), 3);

    let flickr = &accounts[0];
    assert_eq!(flickr.id, AccountId::new("flickr:alice"));
    assert_eq!(flickr.persona, "Alice");
    assert_eq!(flickr.service, ServiceKind::Flickr);
    assert_eq!(flickr.credentials.api_key.as_deref(), Some("k1"));
    assert!(flickr.active);
    assert!(flickr.batching);
    assert_eq!(flickr.batch_window, Duration::minutes(15));
    assert_eq!(flickr.missing_credential(), None);

    assert_eq!(accounts[1].service, ServiceKind::Twitter);
    assert!(!accounts[1].active);
    assert!(!accounts[1].batching);

    assert_eq!(accounts[2].id, AccountId::new("links"));
    assert_eq!(accounts[2].batch_window, Duration::minutes(30));

    let fetch = FetchConfig::from(&config.fetch);
    assert_eq!(fetch.request_timeout, std::time::Duration::from_secs(5));
    assert_eq!(fetch.max_retries, 3);
    assert_eq!(config.endpoints.flickr.as_str(), "https://api.flickr.com/services/rest/");
}

#[test]
fn unknown_service_fails_fast() {
    let json = r#"{"personas": [{"name": "A", "accounts": [{"service": "myspace", "username": "a"}]}]}"#;
    match AppConfig::from_json(json) {
        Err(ConfigError::UnknownService(name)) => assert_eq!(name, "myspace"),
        other => panic!("expected an unknown service error, got {:?}", other),
    }
}

#[test]
fn duplicate_accounts_are_rejected() {
    let json = r#"{"personas": [
        {"name": "A", "accounts": [{"service": "twitter", "username": "a"}]},
        {"name": "B", "accounts": [{"service": "twitter", "username": "a"}]}
    ]}"#;
    assert!(matches!(
        AppConfig::from_json(json),
        Err(ConfigError::DuplicateAccount(id)) if id == "twitter:a"
    ));
}

#[test]
fn flickr_without_api_key_reports_missing_credential() {
    let json = r#"{"personas": [{"name": "A", "accounts": [{"service": "flickr", "username": "a"}]}]}"#;
    let accounts = AppConfig::from_json(json).unwrap().accounts().unwrap();
    assert_eq!(accounts[0].missing_credential(), Some("api_key"));
}

#[test]
fn config_saved_to_a_directory_loads_back() {
    let mut dir = std::env::temp_dir();
    dir.push(format!(
        "lifestream_config_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));

    let config = AppConfig::from_json(SAMPLE).unwrap();
    config.save(dir.join("config.json")).unwrap();

    let loaded = AppConfig::load_from_dir(&dir).unwrap();
    assert_eq!(loaded.accounts().unwrap(), config.accounts().unwrap());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn oversized_batch_window_is_rejected() {
    let json = r#"{"personas": [{"name": "A", "accounts": [
        {"service": "delicious", "username": "a", "batching": true, "batch_window_minutes": 9223372036854775807}
    ]}]}"#;
    assert!(matches!(
        AppConfig::from_json(json),
        Err(ConfigError::InvalidBatchWindow(minutes)) if minutes == i64::MAX
    ));
}
