//! Config files, profiles and command-line precedence through a full refresh.

mod common;

use std::fs;

use procyon::config::{ConfigResolver, LogFormat};
use procyon::lifecycle::Phase;
use procyon::{ApplicationError, Context};
use tempfile::TempDir;

fn config_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("procyon.yml"),
        "server:\n  port: 8080\n  address: 127.0.0.1\nlogging:\n  format: json\nfeature:\n  name: base\n  flags:\n    - a\n    - b\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("procyon-staging.yml"),
        "server:\n  port: 8181\nfeature:\n  name: staging\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("procyon-canary.toml"),
        "[feature]\nname = \"canary\"\n",
    )
    .unwrap();
    dir
}

#[test]
fn default_file_is_bound_into_the_typed_config() {
    let dir = config_dir();
    let app = common::quiet_builder()
        .config_resolver(ConfigResolver::new().with_locations([dir.path()]))
        .build()
        .refresh(&Context::background())
        .unwrap();

    let config = app.config();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.address, "127.0.0.1");
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(app.environment().property("feature.flags.1").as_deref(), Some("b"));
    assert_eq!(app.phase(), Some(Phase::ContextLoaded));
    app.close();
}

#[test]
fn profile_files_override_in_activation_order() {
    let dir = config_dir();
    let app = common::quiet_builder()
        .config_resolver(ConfigResolver::new().with_locations([dir.path()]))
        .profiles(["staging", "canary"])
        .build()
        .refresh(&Context::background())
        .unwrap();

    let env = app.environment();
    assert_eq!(env.property("feature.name").as_deref(), Some("canary"));
    assert_eq!(app.config().server.port, 8181);
    assert_eq!(env.active_profiles(), ["staging", "canary"]);
    app.close();
}

#[test]
fn command_line_beats_every_file() {
    let dir = config_dir();
    let app = common::quiet_builder()
        .config_resolver(ConfigResolver::new().with_locations([dir.path()]))
        .args(["--server.port=9191", "--feature.name=cli"])
        .profiles(["staging"])
        .build()
        .refresh(&Context::background())
        .unwrap();

    assert_eq!(app.config().server.port, 9191);
    assert_eq!(app.environment().property("feature.name").as_deref(), Some("cli"));
    app.close();
}

#[test]
fn profiles_can_be_activated_by_property() {
    let dir = config_dir();
    let app = common::quiet_builder()
        .config_resolver(ConfigResolver::new().with_locations([dir.path()]))
        .args(["--procyon.profiles.active=staging"])
        .build()
        .refresh(&Context::background())
        .unwrap();

    assert_eq!(app.config().server.port, 8181);
    app.close();
}

#[test]
fn malformed_file_aborts_startup() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("procyon.yml"), "server: [unclosed\n").unwrap();

    let err = common::quiet_builder()
        .config_resolver(ConfigResolver::new().with_locations([dir.path()]))
        .build()
        .refresh(&Context::background())
        .unwrap_err();

    assert!(matches!(err, ApplicationError::Config(_)), "{err}");
}

#[test]
fn placeholders_resolve_across_sources() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("procyon.yml"),
        "app:\n  host: example.org\n  url: https://${app.host}:${app.port}/${app.missing}\n",
    )
    .unwrap();

    let app = common::quiet_builder()
        .config_resolver(ConfigResolver::new().with_locations([dir.path()]))
        .args(["--app.port=8443"])
        .build()
        .refresh(&Context::background())
        .unwrap();

    // Unknown keys stay as written.
    assert_eq!(
        app.environment().property("app.url").as_deref(),
        Some("https://example.org:8443/${app.missing}")
    );
    app.close();
}
