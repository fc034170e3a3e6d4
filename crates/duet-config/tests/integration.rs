use duet_config::{AuthConfig, AuthFlow, ConfigError, DEFAULT_GUEST_ROLE};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn load_reads_document_and_applies_env() -> anyhow::Result<()> {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"{{
            "auth_url": "https://id.example.com/auth",
            "realm": "main",
            "app_client_id": "app1",
            "api_client_id": "api1",
            "guest_client_id": "kiosk",
            "provider": {{ "flow": "standard", "enable_logging": false }}
        }}"#
    )?;

    let config = AuthConfig::load(file.path())?.with_env_overrides(|name| {
        (name == "DUET_APP_CLIENT_ID").then(|| "app2".to_string())
    })?;

    let delegated = config.delegated().expect("delegated mode configured");
    assert_eq!(delegated.app_client_id, "app2");
    assert_eq!(delegated.role_resource(None), "api1");
    assert_eq!(config.provider.flow, Some(AuthFlow::Standard));
    assert_eq!(config.guest_client_id(), Some("kiosk"));
    assert_eq!(config.guest_roles(), vec![DEFAULT_GUEST_ROLE.to_string()]);
    Ok(())
}

#[test]
fn load_reports_missing_file() {
    let err = AuthConfig::load(std::path::Path::new("/definitely/missing/duet.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn guest_only_document_is_valid() -> anyhow::Result<()> {
    let config = AuthConfig::from_json_str(
        r#"{ "guest_client_id": "kiosk", "guest_roles": ["editor"] }"#,
    )?;
    assert!(config.delegated().is_none());
    assert_eq!(config.guest_roles(), vec!["editor".to_string()]);
    Ok(())
}
