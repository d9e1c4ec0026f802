use clap::Parser;

use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn request_limit_defaults_to_a_full_post() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    assert_eq!(
        settings.storage.max_request_bytes.get(),
        DEFAULT_MAX_REQUEST_BYTES
    );
    assert!(settings.storage.max_request_bytes.get() > 10 * MAX_MEDIA_FILE_BYTES);
}

#[test]
fn public_base_url_defaults_to_the_listener() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(8080);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.storage.bucket, "memoria");
    assert_eq!(
        settings.storage.public_base_url,
        "http://127.0.0.1:8080/storage"
    );
}

#[test]
fn public_base_url_is_validated_and_trimmed() {
    let mut raw = RawSettings::default();
    raw.storage.public_base_url = Some("https://media.example.com/objects/".into());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.storage.public_base_url,
        "https://media.example.com/objects"
    );

    let mut raw = RawSettings::default();
    raw.storage.public_base_url = Some("ftp://media.example.com".into());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "storage.public_base_url",
            ..
        })
    ));
}

#[test]
fn bucket_names_are_restricted() {
    let mut raw = RawSettings::default();
    raw.storage.bucket = Some("../etc".into());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "storage.bucket",
            ..
        })
    ));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_pool_size_is_rejected() {
    let mut raw = RawSettings::default();
    raw.database.max_connections = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "database.max_connections",
            ..
        })
    ));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["memoria"]);
    assert!(args.command.is_none());
}

#[test]
fn keys_issue_parses_scopes() {
    let owner = uuid::Uuid::new_v4().to_string();
    let args = CliArgs::parse_from([
        "memoria",
        "keys",
        "issue",
        "--owner",
        owner.as_str(),
        "--name",
        "phone",
        "--scope",
        "post_read",
    ]);
    match args.command {
        Some(Command::Keys(KeysArgs {
            command: KeysCommand::Issue(issue),
            ..
        })) => {
            assert_eq!(issue.name, "phone");
            assert_eq!(issue.scopes, vec![crate::domain::api_keys::ApiScope::PostRead]);
        }
        other => panic!("unexpected command: {other:?}"),
    }

    assert!(
        CliArgs::try_parse_from([
            "memoria", "keys", "issue", "--owner", owner.as_str(), "--name", "x", "--scope",
            "admin"
        ])
        .is_err()
    );
}
