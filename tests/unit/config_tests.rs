// Configuration module unit tests

use siteedge::config::*;
use siteedge::hostid::HostIdScheme;

const ADHOC: &str = r#"
hosts:
  pattern: "http://*.localhost:8080"
resolver:
  kind: adhoc
  root: /srv/sites
"#;

#[test]
fn test_can_deserialize_minimal_valid_yaml_config() {
    let config: Config = serde_yaml::from_str(ADHOC).expect("Failed to deserialize YAML");
    assert!(config.validate().is_ok());
}

#[test]
fn test_server_defaults() {
    let config: Config = serde_yaml::from_str(ADHOC).unwrap();
    assert_eq!(config.server.address, "0.0.0.0");
    assert_eq!(config.server.threads, 4);
    assert!(config.server.admin_host.is_none());
}

#[test]
fn test_resolver_defaults() {
    let config: Config = serde_yaml::from_str(ADHOC).unwrap();
    assert_eq!(config.resolver.kind, ResolverKind::Adhoc);
    assert_eq!(config.resolver.default_site, "main");
    assert!(config.resolver.resolve_default_site);
    assert_eq!(config.hosts.scheme, HostIdScheme::Subdomain);
}

#[test]
fn test_logging_defaults_to_json_info() {
    let config: Config = serde_yaml::from_str(ADHOC).unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_cache_defaults() {
    let config: Config = serde_yaml::from_str(ADHOC).unwrap();
    assert_eq!(config.cache.site_ttl_seconds, 60);
    assert_eq!(config.cache.error_ttl(), config.cache.site_ttl());
    assert!(config.cache.content.enabled);
}

#[test]
fn test_missing_hosts_section_fails() {
    let yaml = "resolver:\n  kind: adhoc\n  root: /srv\n";
    assert!(serde_yaml::from_str::<Config>(yaml).is_err());
}

#[test]
fn test_unknown_resolver_kind_fails() {
    let yaml = "hosts:\n  pattern: \"*.x\"\nresolver:\n  kind: ldap\n";
    assert!(serde_yaml::from_str::<Config>(yaml).is_err());
}

#[test]
fn test_host_pattern_from_config() {
    let config: Config = serde_yaml::from_str(ADHOC).unwrap();
    let pattern = config.hosts.host_pattern();
    assert_eq!(pattern.match_host("acme.localhost"), Some("acme".to_string()));
}

#[test]
fn test_zero_threads_is_invalid() {
    let mut config: Config = serde_yaml::from_str(ADHOC).unwrap();
    config.server.threads = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_from_file_missing() {
    let err = Config::from_file("/nonexistent/siteedge.yaml").unwrap_err();
    assert!(err.contains("Failed to read config file"));
}
