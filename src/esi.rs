//! # ESI Route Client
//!
//! Thin wrapper around `GET /route/{origin}/{destination}/`. The endpoint returns
//! the full system path including the origin, so the jump count is `len - 1`.

use crate::connection::SystemId;
use crate::http::ClientError;
use crate::settings::RoutePreference;
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Outcome of a successful routing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteLookup {
    Jumps(u32),
    /// The service knows both systems but there is no gate path (e.g. wormhole space).
    NoRoute,
}

/// Routing collaborator used by the distance cache.
#[async_trait]
pub trait RouteService: Send + Sync {
    async fn route(
        &self,
        from: SystemId,
        to: SystemId,
        preference: RoutePreference,
    ) -> Result<RouteLookup, ClientError>;
}

pub struct EsiRouteClient {
    client: reqwest::Client,
    base_url: url::Url,
    limiter: Arc<DirectRateLimiter>,
}

impl EsiRouteClient {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        max_requests_per_second: u32,
    ) -> Result<Self, ClientError> {
        // Url::join drops the last segment unless the base ends with '/'.
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        let quota = Quota::per_second(NonZeroU32::new(max_requests_per_second).unwrap_or(NonZeroU32::MIN));
        Ok(Self {
            client,
            base_url: url::Url::parse(&base)?,
            limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    fn route_url(&self, from: SystemId, to: SystemId) -> Result<url::Url, ClientError> {
        Ok(self.base_url.join(&format!("route/{}/{}/", from, to))?)
    }
}

#[async_trait]
impl RouteService for EsiRouteClient {
    async fn route(
        &self,
        from: SystemId,
        to: SystemId,
        preference: RoutePreference,
    ) -> Result<RouteLookup, ClientError> {
        let url = self.route_url(from, to)?;
        self.limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .query(&[("flag", preference.as_flag())])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(RouteLookup::NoRoute),
            status if !status.is_success() => Err(ClientError::Status(status)),
            _ => {
                let path: Vec<SystemId> = response.json().await?;
                Ok(match path.len() {
                    0 => RouteLookup::NoRoute,
                    n => RouteLookup::Jumps((n - 1) as u32),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> EsiRouteClient {
        EsiRouteClient::new(reqwest::Client::new(), &format!("{}/latest", server.uri()), 100).unwrap()
    }

    #[tokio::test]
    async fn test_jumps_is_path_length_minus_one() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest/route/30000142/30002187/"))
            .and(query_param("flag", "secure"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![30000142u64, 30000144, 30002187]))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let lookup = client
            .route(30000142, 30002187, RoutePreference::Secure)
            .await
            .unwrap();
        assert_eq!(lookup, RouteLookup::Jumps(2));
    }

    #[tokio::test]
    async fn test_not_found_is_no_route() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let lookup = client
            .route(30000142, 31000123, RoutePreference::Shortest)
            .await
            .unwrap();
        assert_eq!(lookup, RouteLookup::NoRoute);
    }

    #[tokio::test]
    async fn test_server_error_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .route(1, 2, RoutePreference::Shortest)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Status(s) if s == StatusCode::BAD_GATEWAY));
    }
}
