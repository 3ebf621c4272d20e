//! Configuration read from the environment.

use std::{fmt, net::SocketAddr, str::FromStr};

use chrono_tz::Tz;

use crate::{
    error::{FeedError, FeedResult},
    names::TeacherDirectory,
};

pub static DEFAULT_USER_AGENT: &str = "UntisICSBridge/1.0";
pub static DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Access to one WebUntis school.
#[derive(Clone)]
pub struct UntisConfig {
    /// Host name of the WebUntis server, optionally with scheme.
    pub server: String,
    pub school: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

impl fmt::Debug for UntisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UntisConfig")
            .field("server", &self.server)
            .field("school", &self.school)
            .field("username", &self.username)
            .field("password", &"***")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Everything the server and the CLI need to know.
#[derive(Debug, Clone)]
pub struct Config {
    pub untis: UntisConfig,
    /// Time zone of the school; lesson times are local to it.
    pub timezone: Tz,
    /// Shared secret required in the `token` query parameter, if set.
    pub access_token: Option<String>,
    pub bind_address: SocketAddr,
    /// Take missing teachers of personal lessons from the class timetable.
    pub teachers_from_class: bool,
    pub fallback_teachers: TeacherDirectory,
}

impl Config {
    /// Read the configuration from the process environment, honouring a `.env` file.
    pub fn from_env() -> FeedResult<Self> {
        // a missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`. Empty values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> FeedResult<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let required = [
            "WEBUNTIS_SERVER",
            "WEBUNTIS_SCHOOL",
            "WEBUNTIS_USERNAME",
            "WEBUNTIS_PASSWORD",
        ];
        let missing: Vec<&str> = required
            .into_iter()
            .filter(|&key| get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(FeedError::Configuration(format!(
                "missing environment variables: {}",
                missing.join(", ")
            )));
        }
        let untis = UntisConfig {
            server: get("WEBUNTIS_SERVER").unwrap_or_default(),
            school: get("WEBUNTIS_SCHOOL").unwrap_or_default(),
            username: get("WEBUNTIS_USERNAME").unwrap_or_default(),
            password: get("WEBUNTIS_PASSWORD").unwrap_or_default(),
            user_agent: get("WEBUNTIS_USERAGENT")
                .unwrap_or_else(|| String::from(DEFAULT_USER_AGENT)),
        };

        let timezone_name = get("TIMEZONE").unwrap_or_else(|| String::from("UTC"));
        let timezone = Tz::from_str(timezone_name.trim()).map_err(|err| {
            FeedError::Configuration(format!("invalid TIMEZONE '{timezone_name}': {err}"))
        })?;

        let bind_address = get("BIND_ADDRESS")
            .unwrap_or_else(|| String::from(DEFAULT_BIND_ADDRESS));
        let bind_address = SocketAddr::from_str(bind_address.trim()).map_err(|err| {
            FeedError::Configuration(format!("invalid BIND_ADDRESS '{bind_address}': {err}"))
        })?;

        let teachers_from_class = match get("TEACHERS_FROM_CLASS") {
            Some(value) => parse_bool("TEACHERS_FROM_CLASS", &value)?,
            None => false,
        };

        let fallback_teachers = match get("FALLBACK_TEACHERS") {
            Some(value) => TeacherDirectory::from_str(&value)?,
            None => TeacherDirectory::default_fallback(),
        };

        Ok(Self {
            untis,
            timezone,
            access_token: get("ACCESS_TOKEN"),
            bind_address,
            teachers_from_class,
            fallback_teachers,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> FeedResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(FeedError::Configuration(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}
