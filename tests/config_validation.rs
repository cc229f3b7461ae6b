//! Integration tests for configuration loading and validation.

use randcaps::config::Config;
use randcaps::error::RandCapsError;
use randcaps::message_stream::Credential;
use std::sync::{Mutex, MutexGuard, OnceLock};

fn env_lock() -> MutexGuard<'static, ()> {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn test_yaml_parse_full() {
    let yaml = r#"
homeserver_url: "https://cclub.cs.wmich.edu/"
user_id: "@computer:cclub.cs.wmich.edu"
password: "pw"
mongodb_uri: "mongodb://localhost:27017"
mongodb_db: archive
events_collection: timeline
sample_size: 25
blocklist:
  - "@spammer:example.org"
allowed_room_ids:
  - "!general:cclub.cs.wmich.edu"
"#;
    let mut config = Config::from_yaml(yaml).unwrap();
    config.apply_env_overrides(no_env);
    config.post_deserialize().unwrap();

    assert_eq!(config.homeserver_url, "https://cclub.cs.wmich.edu");
    assert_eq!(config.mongodb_db, "archive");
    assert_eq!(config.events_collection, "timeline");
    assert_eq!(config.sample_size, 25);
    assert_eq!(config.sync_timeout_ms, 30_000);
    assert_eq!(
        config.blocklist_with_self(),
        vec![
            "@spammer:example.org".to_string(),
            "@computer:cclub.cs.wmich.edu".to_string()
        ]
    );
    assert_eq!(config.allowed_room_ids.len(), 1);
    assert_eq!(
        config.credential(),
        Some(Credential::Password {
            user_id: "@computer:cclub.cs.wmich.edu".into(),
            password: "pw".into()
        })
    );
}

#[test]
fn test_token_preferred_over_password() {
    let mut config = Config::from_yaml("user_id: \"@bot:x\"\npassword: pw\n").unwrap();
    config.apply_env_overrides(|key| (key == "MATRIX_ACCESS_TOKEN").then(|| "syt_abc".to_string()));
    config.post_deserialize().unwrap();
    assert_eq!(config.credential(), Some(Credential::AccessToken("syt_abc".into())));
}

#[test]
fn test_empty_collection_rejected() {
    let mut config =
        Config::from_yaml("user_id: \"@bot:x\"\npassword: pw\nevents_collection: \" \"\n").unwrap();
    let err = config.post_deserialize().unwrap_err();
    assert!(matches!(err, RandCapsError::Config(_)));
}

#[test]
fn test_invalid_yaml_is_error() {
    assert!(Config::from_yaml("sample_size: [not, a, number]").is_err());
}

#[test]
fn test_load_from_config_env_path() {
    let _guard = env_lock();
    let dir = std::env::temp_dir().join(format!("randcaps_config_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("randcaps.config.yaml");
    std::fs::write(
        &path,
        "user_id: \"@bot:example.org\"\naccess_token: tok\nmongodb_db: fromfile\n",
    )
    .unwrap();

    std::env::set_var("RANDCAPS_CONFIG", &path);
    std::env::remove_var("MONGODB_DB");
    std::env::remove_var("MATRIX_USER_ID");
    let loaded = Config::load();
    std::env::remove_var("RANDCAPS_CONFIG");
    let _ = std::fs::remove_dir_all(&dir);

    let config = loaded.unwrap();
    assert_eq!(config.user_id, "@bot:example.org");
    assert_eq!(config.mongodb_db, "fromfile");
}

#[test]
fn test_load_missing_config_path_is_error() {
    let _guard = env_lock();
    std::env::set_var("RANDCAPS_CONFIG", "/nonexistent/randcaps.config.yaml");
    let err = Config::load().unwrap_err();
    std::env::remove_var("RANDCAPS_CONFIG");
    assert!(err.is_fatal());
    assert!(err.to_string().contains("non-existent"));
}
