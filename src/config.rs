use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_DB_PATH: &str = "seek_jobs.db";

/// Runtime configuration, loaded once at startup and passed into constructors.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chrome binary path; chromedriver's default discovery is used when unset.
    pub chrome_binary: Option<String>,
    /// Path to the chromedriver executable.
    pub chromedriver_path: String,
    /// Chrome user-data directory carrying the already-authenticated session.
    pub user_data_dir: String,
    /// Profile name inside the user-data directory.
    pub profile_dir: String,
    pub db_path: PathBuf,
    /// Port the spawned chromedriver listens on.
    pub driver_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let user_data_dir = env::var("CHROME_USER_DATA_DIR").context(
            "CHROME_USER_DATA_DIR must point at a Chrome profile that is already logged in to Seek",
        )?;

        Ok(Self {
            chrome_binary: env::var("CHROME_BINARY").ok().filter(|s| !s.is_empty()),
            chromedriver_path: env::var("CHROMEDRIVER").unwrap_or_else(|_| "chromedriver".into()),
            user_data_dir,
            profile_dir: env::var("CHROME_PROFILE_DIR").unwrap_or_else(|_| "Default".into()),
            db_path: env::var("DB_PATH")
                .unwrap_or_else(|_| DEFAULT_DB_PATH.into())
                .into(),
            driver_port: env::var("CHROMEDRIVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(9515),
        })
    }

    /// DB location alone, for modes that never touch the browser.
    pub fn db_path_from_env() -> PathBuf {
        dotenvy::dotenv().ok();
        env::var("DB_PATH")
            .unwrap_or_else(|_| DEFAULT_DB_PATH.into())
            .into()
    }
}
