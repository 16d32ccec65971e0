pub mod cache;
pub mod ors;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::models::{Coordinate, RouteSegment};

pub use cache::CachedFetcher;
pub use ors::OrsClient;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("routing provider API key is not configured (set ORS_API_KEY)")]
    MissingApiKey,
    #[error("request to routing provider failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("routing provider error (HTTP {status}, code {code}): {message}")]
    Api {
        status: u16,
        code: u32,
        message: String,
    },
    #[error("routing provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse provider response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("provider returned no routes")]
    NoRoute,
    #[error("invalid route geometry: {0}")]
    Geometry(String),
    #[error("segment fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Errors that will repeat identically for every pair: a missing or
    /// rejected API key.
    pub fn is_configuration(&self) -> bool {
        match self {
            ProviderError::MissingApiKey => true,
            ProviderError::Api { status, .. } | ProviderError::Status { status, .. } => {
                matches!(status, 401 | 403)
            }
            _ => false,
        }
    }
}

/// Source of real-road segments between two points.
///
/// Abstracts the routing provider so the detour synthesizer can be driven by
/// stubs in tests and wrapped by decorators such as [`CachedFetcher`].
///
/// # Contract
/// - `from`/`to` are latitude-first; any axis swap the provider needs happens
///   inside the implementation.
/// - `Ok` segments hold at least two points.
/// - Failures mean "no segment for this pair", never a partial result.
#[async_trait]
pub trait SegmentFetcher: Send + Sync {
    async fn fetch_segment(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<RouteSegment, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_are_configuration_errors() {
        assert!(ProviderError::MissingApiKey.is_configuration());
        assert!(ProviderError::Api {
            status: 403,
            code: 403,
            message: "Access to this API has been disallowed".into(),
        }
        .is_configuration());
        assert!(ProviderError::Status {
            status: 401,
            body: String::new(),
        }
        .is_configuration());
    }

    #[test]
    fn pair_failures_are_not_configuration_errors() {
        assert!(!ProviderError::NoRoute.is_configuration());
        assert!(!ProviderError::Api {
            status: 404,
            code: 2010,
            message: "Could not find routable point".into(),
        }
        .is_configuration());
        assert!(!ProviderError::Timeout(Duration::from_secs(1)).is_configuration());
    }
}
