//! Process configuration, resolved once from the environment at startup.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_PG_HOST: &str = "localhost";
pub const DEFAULT_PG_PORT: u16 = 5432;
pub const DEFAULT_PG_DATABASE: &str = "criminalidad_espana";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid port: {value:?}")]
    InvalidPort { var: &'static str, value: String },

    #[error("{var} is not a valid socket address: {value:?}")]
    InvalidAddr { var: &'static str, value: String },
}

/// Connection parameters for the crime-statistics database.
#[derive(Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for PgConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl fmt::Display for PgConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "postgres://{}@{}:{}/{}",
            self.user.as_deref().unwrap_or("<unset>"),
            self.host,
            self.port,
            self.database
        )
    }
}

/// Everything the binary needs, built once in `main` and passed down.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub pg: PgConfig,
    /// Holds `index.html` and the `static/` bundle.
    pub frontend_dir: PathBuf,
    /// Raw-data files mounted at `/data`.
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key-value lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let port = match get("PG_PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidPort { var: "PG_PORT", value })?,
            None => DEFAULT_PG_PORT,
        };

        let bind = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned());
        let bind_addr = bind
            .parse()
            .map_err(|_| ConfigError::InvalidAddr { var: "BIND_ADDR", value: bind })?;

        Ok(Self {
            bind_addr,
            pg: PgConfig {
                host: get("PG_HOST").unwrap_or_else(|| DEFAULT_PG_HOST.to_owned()),
                port,
                database: get("PG_DATABASE").unwrap_or_else(|| DEFAULT_PG_DATABASE.to_owned()),
                user: get("PG_USER"),
                password: get("PG_PASSWORD"),
            },
            frontend_dir: get("FRONTEND_DIR").unwrap_or_else(|| "frontend".to_owned()).into(),
            data_dir: get("DATA_DIR").unwrap_or_else(|| "data".to_owned()).into(),
        })
    }

    /// Names of required variables that were not provided.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.pg.user.is_none() {
            missing.push("PG_USER");
        }
        if self.pg.password.is_none() {
            missing.push("PG_PASSWORD");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs.iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Config::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = from(&[]).unwrap();
        assert_eq!(cfg.pg.host, "localhost");
        assert_eq!(cfg.pg.port, 5432);
        assert_eq!(cfg.pg.database, "criminalidad_espana");
        assert_eq!(cfg.bind_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(cfg.missing_credentials(), vec!["PG_USER", "PG_PASSWORD"]);
    }

    #[test]
    fn overrides_apply() {
        let cfg = from(&[
            ("PG_HOST", "db"),
            ("PG_PORT", "6543"),
            ("PG_USER", "sergio"),
            ("PG_PASSWORD", "secret"),
            ("PG_DATABASE", ""),
        ])
        .unwrap();
        assert_eq!(cfg.pg.host, "db");
        assert_eq!(cfg.pg.port, 6543);
        assert_eq!(cfg.pg.database, "criminalidad_espana");
        assert!(cfg.missing_credentials().is_empty());
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(matches!(
            from(&[("PG_PORT", "abc")]),
            Err(ConfigError::InvalidPort { var: "PG_PORT", .. })
        ));
        assert!(matches!(
            from(&[("BIND_ADDR", "nowhere")]),
            Err(ConfigError::InvalidAddr { .. })
        ));
    }

    #[test]
    fn password_never_printed() {
        let cfg = from(&[("PG_USER", "u"), ("PG_PASSWORD", "hunter2")]).unwrap();
        assert!(!format!("{:?}", cfg).contains("hunter2"));
        assert!(!cfg.pg.to_string().contains("hunter2"));
    }
}
