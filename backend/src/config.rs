use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use thiserror::Error;

use crate::detour::SynthesisOptions;
use crate::geocode::DEFAULT_NOMINATIM_URL;
use crate::provider::ors::{DEFAULT_BASE_URL, DEFAULT_PROFILE, OrsSettings};
use crate::session::DEFAULT_SESSION_CAPACITY;

const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080);
const DEFAULT_CACHE_SIZE: usize = 256;
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 40;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Runtime settings, read from the process environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ors: OrsSettings,
    pub synthesis: SynthesisOptions,
    /// `None` disables the segment cache.
    pub segment_cache_size: Option<NonZeroUsize>,
    pub session_capacity: NonZeroUsize,
    pub anchors_path: Option<PathBuf>,
    pub nominatim_base_url: String,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let requests_per_minute: u32 =
            parse_var(&lookup, "ORS_REQUESTS_PER_MINUTE", DEFAULT_REQUESTS_PER_MINUTE)?;
        let timeout_secs: u64 = parse_var(&lookup, "MESSY_FETCH_TIMEOUT_SECS", 15)?;
        let concurrency: usize = parse_var(&lookup, "MESSY_FETCH_CONCURRENCY", 4)?;
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                var: "MESSY_FETCH_CONCURRENCY",
                value: "0".into(),
            });
        }
        let cache_size: usize = parse_var(&lookup, "MESSY_SEGMENT_CACHE_SIZE", DEFAULT_CACHE_SIZE)?;
        let session_capacity: NonZeroUsize =
            parse_var(&lookup, "MESSY_SESSION_CAPACITY", DEFAULT_SESSION_CAPACITY)?;
        let bind_addr: SocketAddr = parse_var(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR)?;

        let timeout = Duration::from_secs(timeout_secs);

        Ok(Self {
            ors: OrsSettings {
                api_key: non_blank(&lookup, "ORS_API_KEY"),
                base_url: non_blank(&lookup, "ORS_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                profile: non_blank(&lookup, "ORS_PROFILE")
                    .unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
                timeout,
                // 0 turns the limiter off
                requests_per_minute: NonZeroU32::new(requests_per_minute),
            },
            synthesis: SynthesisOptions {
                concurrency,
                fetch_timeout: timeout,
            },
            segment_cache_size: NonZeroUsize::new(cache_size),
            session_capacity,
            anchors_path: non_blank(&lookup, "ANCHORS_PATH").map(PathBuf::from),
            nominatim_base_url: non_blank(&lookup, "NOMINATIM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string()),
            bind_addr,
        })
    }
}

fn non_blank(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Option<String> {
    lookup(var)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match non_blank(lookup, var) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
