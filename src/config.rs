use anyhow::{Context, Result};
use clap::Parser;
use std::env;

const DEFAULT_PORT: u16 = 8000;
const DEV_HOST: &str = "127.0.0.1";
const PROD_HOST: &str = "0.0.0.0";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub model_dir: String,
    pub cors_origins: Vec<String>,
    pub production: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Karoseri damage classification API")]
pub struct Args {
    /// Host to bind to (overrides KAROSERI_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides KAROSERI_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides KAROSERI_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory holding the trained model (overrides KAROSERI_MODEL_DIR)
    #[arg(long)]
    pub model_dir: Option<String>,

    /// Comma separated allowed CORS origins (overrides KAROSERI_CORS_ORIGINS)
    #[arg(long)]
    pub cors_origins: Option<String>,

    /// Production mode: bind all interfaces by default
    #[arg(long)]
    pub production: bool,

    /// Apply the database schema and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge `args` over values looked up with `env`, then defaults.
    pub fn resolve(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let production = args.production
            || env("KAROSERI_ENV")
                .map(|v| v.trim().eq_ignore_ascii_case("production"))
                .unwrap_or(false);

        let default_host = if production { PROD_HOST } else { DEV_HOST };
        let env_port = match env("KAROSERI_PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .with_context(|| format!("parsing KAROSERI_PORT value `{}`", value))?,
            None => DEFAULT_PORT,
        };
        let cors = args
            .cors_origins
            .or_else(|| env("KAROSERI_CORS_ORIGINS"))
            .unwrap_or_else(|| "http://localhost:5173".into());

        Ok(Self {
            host: args
                .host
                .or_else(|| env("KAROSERI_HOST"))
                .unwrap_or_else(|| default_host.into()),
            port: args.port.unwrap_or(env_port),
            database_url: args
                .database_url
                .or_else(|| env("KAROSERI_DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/karoseri.db".into()),
            model_dir: args
                .model_dir
                .or_else(|| env("KAROSERI_MODEL_DIR"))
                .unwrap_or_else(|| "./trained_models".into()),
            cors_origins: split_origins(&cors),
            production,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn split_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn development_defaults() {
        let cfg = AppConfig::resolve(Args::default(), lookup(&[])).unwrap();
        assert_eq!(cfg.addr(), "127.0.0.1:8000");
        assert_eq!(cfg.database_url, "sqlite://./data/karoseri.db");
        assert_eq!(cfg.model_dir, "./trained_models");
        assert_eq!(cfg.cors_origins, vec!["http://localhost:5173"]);
        assert!(!cfg.production);
    }

    #[test]
    fn production_binds_all_interfaces() {
        let args = Args {
            production: true,
            ..Default::default()
        };
        let cfg = AppConfig::resolve(args, lookup(&[])).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:8000");

        let cfg = AppConfig::resolve(Args::default(), lookup(&[("KAROSERI_ENV", "Production")]))
            .unwrap();
        assert!(cfg.production);
        assert_eq!(cfg.host, "0.0.0.0");
    }

    #[test]
    fn cli_overrides_env() {
        let env = lookup(&[
            ("KAROSERI_HOST", "10.0.0.1"),
            ("KAROSERI_PORT", "9000"),
            ("KAROSERI_CORS_ORIGINS", "http://a.test, http://b.test,"),
        ]);
        let args = Args {
            port: Some(8081),
            ..Default::default()
        };
        let cfg = AppConfig::resolve(args, env).unwrap();
        assert_eq!(cfg.addr(), "10.0.0.1:8081");
        assert_eq!(cfg.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn invalid_port_is_an_error() {
        let err = AppConfig::resolve(Args::default(), lookup(&[("KAROSERI_PORT", "eighty")]))
            .unwrap_err();
        assert!(err.to_string().contains("KAROSERI_PORT"));
    }
}
