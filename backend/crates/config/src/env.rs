use mca_common::error::{McaError, McaResult};
use serde::Deserialize;
use std::env;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> McaResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            host: get_var_or("HOST", "0.0.0.0"),
            port: get_var_or("PORT", "8080")
                .parse()
                .map_err(|e| McaError::Config(format!("invalid PORT: {e}")))?,
            log_level: get_var_or("LOG_LEVEL", "info"),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings for one run of the OrgMeter sync runner.
///
/// Entity names and policy overrides stay as raw strings here; the runner
/// parses them against its own entity vocabulary.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub database_url: String,
    pub funder_id: Uuid,
    pub actor: String,
    pub entities: Vec<String>,
    pub update_existing: bool,
    pub only_selected: bool,
    pub dry_run: bool,
    pub resume_from_index: usize,
    pub policy_overrides: Vec<(String, String)>,
}

impl SyncConfig {
    pub fn from_env() -> McaResult<Self> {
        let _ = dotenvy::dotenv();

        let funder_raw = get_var("FUNDER_ID")?;
        let funder_id = Uuid::parse_str(funder_raw.trim())
            .map_err(|e| McaError::Config(format!("invalid FUNDER_ID: {e}")))?;

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            funder_id,
            actor: get_var_or("SYNC_ACTOR", "system"),
            entities: split_list(&get_var_or("SYNC_ENTITIES", "")),
            update_existing: get_bool("SYNC_UPDATE_EXISTING", true)?,
            only_selected: get_bool("SYNC_ONLY_SELECTED", true)?,
            dry_run: get_bool("SYNC_DRY_RUN", false)?,
            resume_from_index: get_var_or("SYNC_RESUME_FROM_INDEX", "0")
                .parse()
                .map_err(|e| McaError::Config(format!("invalid SYNC_RESUME_FROM_INDEX: {e}")))?,
            policy_overrides: parse_pairs(&get_var_or("SYNC_POLICY_OVERRIDES", ""))?,
        })
    }
}

fn get_var(key: &str) -> McaResult<String> {
    env::var(key).map_err(|_| McaError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn get_bool(key: &str, default: bool) -> McaResult<bool> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(McaError::Config(format!("invalid {key}: {other}"))),
        },
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses `key=value,key=value`.
fn parse_pairs(raw: &str) -> McaResult<Vec<(String, String)>> {
    split_list(raw)
        .into_iter()
        .map(|item| {
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| McaError::Config(format!("expected key=value, got {item:?}")))?;
            Ok((key.trim().to_owned(), value.trim().to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const SYNC_VARS: [&str; 8] = [
        "FUNDER_ID",
        "SYNC_ACTOR",
        "SYNC_ENTITIES",
        "SYNC_UPDATE_EXISTING",
        "SYNC_ONLY_SELECTED",
        "SYNC_DRY_RUN",
        "SYNC_RESUME_FROM_INDEX",
        "SYNC_POLICY_OVERRIDES",
    ];

    fn clear_sync_vars() {
        for key in SYNC_VARS {
            env::remove_var(key);
        }
    }

    #[test]
    fn config_from_env_succeeds_with_required_vars() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::set_var("DATABASE_URL", "postgres://localhost/mca_test");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(cfg.database_url, "postgres://localhost/mca_test");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.log_level, "info");

        env::remove_var("DATABASE_URL");
    }

    #[test]
    fn config_from_env_fails_without_database_url() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::remove_var("DATABASE_URL");
        let result = AppConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn bind_addr_formats_correctly() {
        let cfg = AppConfig {
            database_url: String::new(),
            host: "127.0.0.1".to_owned(),
            port: 3000,
            log_level: "debug".to_owned(),
        };
        assert_eq!(cfg.bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn sync_config_defaults() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_sync_vars();

        let funder = Uuid::new_v4();
        env::set_var("DATABASE_URL", "postgres://localhost/mca_test");
        env::set_var("FUNDER_ID", funder.to_string());

        let cfg = SyncConfig::from_env().expect("should parse sync config");
        assert_eq!(cfg.funder_id, funder);
        assert_eq!(cfg.actor, "system");
        assert!(cfg.entities.is_empty());
        assert!(cfg.update_existing);
        assert!(cfg.only_selected);
        assert!(!cfg.dry_run);
        assert_eq!(cfg.resume_from_index, 0);
        assert!(cfg.policy_overrides.is_empty());

        env::remove_var("DATABASE_URL");
        clear_sync_vars();
    }

    #[test]
    fn sync_config_parses_lists_and_flags() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_sync_vars();

        env::set_var("DATABASE_URL", "postgres://localhost/mca_test");
        env::set_var("FUNDER_ID", Uuid::new_v4().to_string());
        env::set_var("SYNC_ENTITIES", "iso, merchant ,,advance");
        env::set_var("SYNC_DRY_RUN", "yes");
        env::set_var("SYNC_RESUME_FROM_INDEX", "5");
        env::set_var("SYNC_POLICY_OVERRIDES", "iso=replace, advance=merge");

        let cfg = SyncConfig::from_env().expect("should parse sync config");
        assert_eq!(cfg.entities, vec!["iso", "merchant", "advance"]);
        assert!(cfg.dry_run);
        assert_eq!(cfg.resume_from_index, 5);
        assert_eq!(
            cfg.policy_overrides,
            vec![
                ("iso".to_owned(), "replace".to_owned()),
                ("advance".to_owned(), "merge".to_owned())
            ]
        );

        env::remove_var("DATABASE_URL");
        clear_sync_vars();
    }

    #[test]
    fn sync_config_rejects_bad_funder_id() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_sync_vars();

        env::set_var("DATABASE_URL", "postgres://localhost/mca_test");
        env::set_var("FUNDER_ID", "not-a-uuid");
        assert!(matches!(SyncConfig::from_env(), Err(McaError::Config(_))));

        env::remove_var("DATABASE_URL");
        clear_sync_vars();
    }

    #[test]
    fn parse_pairs_rejects_missing_separator() {
        assert!(parse_pairs("iso").is_err());
    }
}
