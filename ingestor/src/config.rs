use crate::errors::{Error, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_INFLUX_HOST: &str = "localhost";
const DEFAULT_INFLUX_PORT: u16 = 8086;
const DEFAULT_DATABASE: &str = "beehive_data";
const DEFAULT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_HTTP_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct Config {
    pub influx_host: String,
    pub influx_port: u16,
    pub database: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub create_database: bool,
    pub http_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let influx_host = lookup("INFLUXDB_HOST").unwrap_or_else(|| DEFAULT_INFLUX_HOST.to_string());
        let influx_port = parse_or(&lookup, "INFLUXDB_PORT", DEFAULT_INFLUX_PORT)?;
        let database = lookup("INFLUXDB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let token = lookup("INFLUXDB_TOKEN").filter(|t| !t.is_empty());
        let timeout_ms = parse_or(&lookup, "INFLUXDB_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        let create_database = parse_or(&lookup, "INFLUXDB_CREATE_DATABASE", false)?;

        let http_addr = match lookup("HTTP_ADDR") {
            Some(addr) => addr,
            None => {
                let port = parse_or(&lookup, "PORT", DEFAULT_HTTP_PORT)?;
                format!("0.0.0.0:{}", port)
            }
        };

        if database.is_empty() {
            return Err(Error::Config("INFLUXDB_DATABASE must not be empty".to_string()));
        }
        if timeout_ms == 0 {
            return Err(Error::Config("INFLUXDB_TIMEOUT_MS must be positive".to_string()));
        }

        Ok(Self {
            influx_host,
            influx_port,
            database,
            token,
            timeout: Duration::from_millis(timeout_ms),
            create_database,
            http_addr,
        })
    }

    pub fn influx_url(&self) -> String {
        format!("http://{}:{}", self.influx_host, self.influx_port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has invalid value {:?}", key, raw))),
        None => Ok(default),
    }
}
