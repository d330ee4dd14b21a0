use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use skill_db::DEFAULT_POOL_SIZE;

/// Server settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub db_pool_size: usize,
    /// Create the schema before serving. Only valid on a fresh database.
    pub bootstrap: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = var("SKILL_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("SKILL_PORT")
            .map(|v| v.parse().with_context(|| format!("SKILL_PORT: invalid port {:?}", v)))
            .transpose()?
            .unwrap_or(8080);
        let db_path = var("SKILL_DB_PATH").unwrap_or_else(|| "skill.db".into()).into();
        let db_pool_size = var("SKILL_DB_POOL_SIZE")
            .map(|v| v.parse().with_context(|| format!("SKILL_DB_POOL_SIZE: invalid size {:?}", v)))
            .transpose()?
            .unwrap_or(DEFAULT_POOL_SIZE);
        if db_pool_size == 0 {
            bail!("SKILL_DB_POOL_SIZE must be at least 1");
        }
        let bootstrap = var("SKILL_BOOTSTRAP")
            .map(|v| parse_flag(&v).with_context(|| format!("SKILL_BOOTSTRAP: invalid flag {:?}", v)))
            .transpose()?
            .unwrap_or(false);

        Ok(Self {
            host,
            port,
            db_path,
            db_pool_size,
            bootstrap,
        })
    }

    pub fn in_memory(&self) -> bool {
        self.db_path.as_os_str() == ":memory:"
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.db_path, PathBuf::from("skill.db"));
        assert_eq!(cfg.db_pool_size, DEFAULT_POOL_SIZE);
        assert!(!cfg.bootstrap);
        assert!(!cfg.in_memory());
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("SKILL_HOST", "127.0.0.1"),
            ("SKILL_PORT", "9000"),
            ("SKILL_DB_PATH", ":memory:"),
            ("SKILL_DB_POOL_SIZE", "2"),
            ("SKILL_BOOTSTRAP", "yes"),
        ])
        .unwrap();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.db_pool_size, 2);
        assert!(cfg.bootstrap);
        assert!(cfg.in_memory());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("SKILL_PORT", "eighty")]).is_err());
        assert!(config(&[("SKILL_PORT", "70000")]).is_err());
        assert!(config(&[("SKILL_DB_POOL_SIZE", "0")]).is_err());
        assert!(config(&[("SKILL_BOOTSTRAP", "maybe")]).is_err());
    }
}
