use cg_domain::config::{Config, PointerBackend, SelectionPolicy};

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn empty_file_parses_to_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.server.port, 4180);
    assert_eq!(config.upstream.model, "gemini-2.5-flash");
    assert_eq!(config.access.standard_ttl_hours, 24);
    assert_eq!(config.access.session_pointer, PointerBackend::File);
    assert_eq!(config.persona.assistant_name, "CentralGPT");
    assert_eq!(config.persona.developer_name, "XdpzQ");
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(config
        .server
        .cors
        .allowed_origins
        .contains(&"http://localhost:*".to_string()));
    assert!(config
        .server
        .cors
        .allowed_origins
        .contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn full_file_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 9000

[upstream]
model = "gemini-2.5-pro"
attempt_timeout_ms = 15000
selection = "round_robin"
credential_envs = ["KEY_A", "KEY_B"]

[access]
standard_ttl_hours = 12
session_pointer = "keychain"

[storage]
state_path = "/var/lib/centralgate"

[persona]
assistant_name = "Nova"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.upstream.selection, SelectionPolicy::RoundRobin);
    assert_eq!(config.upstream.credential_envs, vec!["KEY_A", "KEY_B"]);
    assert_eq!(config.access.standard_ttl_hours, 12);
    assert_eq!(
        config.storage.identities_file(),
        std::path::PathBuf::from("/var/lib/centralgate/identities.json")
    );
    assert_eq!(config.persona.assistant_name, "Nova");
    assert_eq!(config.persona.developer_name, "XdpzQ");
}

#[test]
fn seeded_settings_carry_persona_and_pool() {
    let config = Config::default();
    let settings = config.persona.seed_settings(vec!["k1".into()]);
    assert_eq!(settings.assistant_name, "CentralGPT");
    assert_eq!(settings.credentials, vec!["k1"]);
}
