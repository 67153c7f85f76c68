use crate::infrastructure::error::CoreError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const DEFAULT_ADVISOR_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_LOG_TABLE: &str = "productivity_logs";

/// Connection settings for the remote daily-log store, resolved from
/// `config/app.json` plus the environment for the secret parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStoreSettings {
    pub base_url: String,
    pub table: String,
    pub api_key: String,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([(
        APP_JSON,
        serde_json::json!({
            "schema": 1,
            "appName": "Nova",
            "logStoreUrl": null,
            "logStoreTable": DEFAULT_LOG_TABLE,
            "advisorModel": DEFAULT_ADVISOR_MODEL
        }),
    )])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), CoreError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, CoreError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| CoreError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(CoreError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn read_advisor_model(config_dir: &Path) -> Result<String, CoreError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let model = app
        .get("advisorModel")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_ADVISOR_MODEL);
    Ok(model.to_string())
}

/// Secrets come from the environment, not the config files; the lookup
/// parameter keeps the resolution testable.
pub fn load_log_store_settings_from_lookup(
    config_dir: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<LogStoreSettings, CoreError> {
    let app = read_config(&config_dir.join(APP_JSON))?;

    let base_url = app
        .get("logStoreUrl")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .or_else(|| lookup("NOVA_LOG_STORE_URL").filter(|value| !value.trim().is_empty()))
        .ok_or_else(|| {
            CoreError::InvalidConfig(
                "log store url missing: set logStoreUrl in app.json or NOVA_LOG_STORE_URL"
                    .to_string(),
            )
        })?;
    let table = app
        .get("logStoreTable")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_LOG_TABLE)
        .to_string();
    let api_key = lookup("NOVA_LOG_STORE_API_KEY")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            CoreError::InvalidConfig("log store api key missing: set NOVA_LOG_STORE_API_KEY".to_string())
        })?;

    Ok(LogStoreSettings {
        base_url,
        table,
        api_key,
    })
}

pub fn load_log_store_settings(config_dir: &Path) -> Result<LogStoreSettings, CoreError> {
    load_log_store_settings_from_lookup(config_dir, |key| std::env::var(key).ok())
}

pub fn load_advisor_api_key_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, CoreError> {
    lookup("NOVA_ADVISOR_API_KEY")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            CoreError::InvalidConfig("advisor api key missing: set NOVA_ADVISOR_API_KEY".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_CONFIG: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: std::path::PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_CONFIG.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "nova-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            ensure_default_configs(&path).expect("write default configs");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn defaults_are_written_once() {
        let config_dir = TempConfigDir::new();
        let app_path = config_dir.path.join(APP_JSON);
        fs::write(&app_path, "{\"schema\": 1, \"advisorModel\": \"custom\"}\n")
            .expect("overwrite app.json");
        ensure_default_configs(&config_dir.path).expect("second run");
        assert_eq!(
            read_advisor_model(&config_dir.path).expect("advisor model"),
            "custom"
        );
    }

    #[test]
    fn advisor_model_falls_back_to_default() {
        let config_dir = TempConfigDir::new();
        assert_eq!(
            read_advisor_model(&config_dir.path).expect("advisor model"),
            DEFAULT_ADVISOR_MODEL
        );
    }

    #[test]
    fn log_store_settings_require_url_and_key() {
        let config_dir = TempConfigDir::new();
        let missing_url = load_log_store_settings_from_lookup(&config_dir.path, |key| match key {
            "NOVA_LOG_STORE_API_KEY" => Some("key".to_string()),
            _ => None,
        });
        match missing_url {
            Err(CoreError::InvalidConfig(message)) => assert!(message.contains("log store url")),
            _ => panic!("expected invalid config error"),
        }

        let settings = load_log_store_settings_from_lookup(&config_dir.path, |key| match key {
            "NOVA_LOG_STORE_URL" => Some("https://store.example.com".to_string()),
            "NOVA_LOG_STORE_API_KEY" => Some("key".to_string()),
            _ => None,
        })
        .expect("settings");
        assert_eq!(settings.base_url, "https://store.example.com");
        assert_eq!(settings.table, DEFAULT_LOG_TABLE);
    }

    #[test]
    fn advisor_api_key_comes_from_lookup() {
        assert!(load_advisor_api_key_from_lookup(|_| None).is_err());
        let key = load_advisor_api_key_from_lookup(|name| match name {
            "NOVA_ADVISOR_API_KEY" => Some(" secret ".to_string()),
            _ => None,
        })
        .expect("api key");
        assert_eq!(key, "secret");
    }

    #[test]
    fn rejects_unsupported_schema() {
        let config_dir = TempConfigDir::new();
        fs::write(config_dir.path.join(APP_JSON), "{\"schema\": 2}\n").expect("write app.json");
        assert!(read_advisor_model(&config_dir.path).is_err());
    }
}
