//! # Eve-Scout Signature Feed
//!
//! Fetches the public signature list and keeps the records that touch the anchor
//! system. A failing feed never fails a cycle: callers get an empty list and the
//! error is logged.

use crate::connection::{RawConnection, SystemId};
use crate::http::ClientError;
use crate::metrics;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};

/// Source of raw wormhole records.
#[async_trait]
pub trait SignatureFeed: Send + Sync {
    /// Current records touching `anchor`. Empty on any upstream failure.
    async fn anchor_connections(&self, anchor: SystemId) -> Vec<RawConnection>;
}

pub struct EveScoutClient {
    client: reqwest::Client,
    signatures_url: String,
}

impl EveScoutClient {
    pub fn new(client: reqwest::Client, signatures_url: impl Into<String>) -> Self {
        Self {
            client,
            signatures_url: signatures_url.into(),
        }
    }

    async fn fetch_signatures(&self) -> Result<Vec<Value>, ClientError> {
        let response = self.client.get(&self.signatures_url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(response.json::<Vec<Value>>().await?)
    }
}

#[async_trait]
impl SignatureFeed for EveScoutClient {
    async fn anchor_connections(&self, anchor: SystemId) -> Vec<RawConnection> {
        let signatures = match self.fetch_signatures().await {
            Ok(s) => s,
            Err(e) => {
                error!("Error fetching Eve-Scout signatures: {}", e);
                metrics::increment_feed_error();
                return Vec::new();
            }
        };

        let total = signatures.len();
        // Decode record by record so one odd entry does not drop the whole snapshot.
        let connections: Vec<RawConnection> = signatures
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<RawConnection>(value) {
                Ok(raw) => Some(raw),
                Err(e) => {
                    warn!("Skipping undecodable Eve-Scout record: {}", e);
                    None
                }
            })
            .filter(|raw| raw.touches(anchor))
            .collect();

        debug!(
            "Eve-Scout returned {} signatures, {} touch system {}",
            total,
            connections.len(),
            anchor
        );
        connections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const THERA: SystemId = 31000005;

    #[tokio::test]
    async fn test_filters_to_anchor_connections() {
        let server = MockServer::start().await;
        let body = serde_json::json!([
            {"id": 1, "out_system_id": THERA, "in_system_id": 30000144, "in_system_name": "Perimeter"},
            {"id": 2, "out_system_id": 30045328, "in_system_id": 30000142, "in_system_name": "Jita"},
            {"id": 3, "out_system_id": 30002187, "in_system_id": THERA},
        ]);
        Mock::given(method("GET"))
            .and(path("/v2/public/signatures"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = EveScoutClient::new(
            reqwest::Client::new(),
            format!("{}/v2/public/signatures", server.uri()),
        );
        let conns = client.anchor_connections(THERA).await;
        let ids: Vec<_> = conns.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![Some(1), Some(3)]);
    }

    #[tokio::test]
    async fn test_non_success_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = EveScoutClient::new(reqwest::Client::new(), server.uri());
        assert!(client.anchor_connections(THERA).await.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_record_is_skipped() {
        let server = MockServer::start().await;
        let body = serde_json::json!([
            "not a record",
            {"id": 2, "out_system_id": THERA, "in_system_id": 30000145},
        ]);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = EveScoutClient::new(reqwest::Client::new(), server.uri());
        let conns = client.anchor_connections(THERA).await;
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].id, Some(2));
    }

    #[tokio::test]
    async fn test_odd_optional_field_keeps_record() {
        let server = MockServer::start().await;
        let body = serde_json::json!([
            {
                "id": 1,
                "out_system_id": THERA,
                "in_system_id": 30000144,
                "in_system_name": "Perimeter",
                "wh_type": 42,
                "max_ship_size": {"size": "large"},
                "in_signature": false,
                "wh_exits_outward": "yes"
            },
        ]);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = EveScoutClient::new(reqwest::Client::new(), server.uri());
        let conns = client.anchor_connections(THERA).await;
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].wh_type, None);
        assert_eq!(conns[0].wh_exits_outward, None);

        let conn = crate::connection::normalize(&conns[0], THERA, "Thera").unwrap();
        assert_eq!(conn.exit_system_name, "Perimeter");
        assert_eq!(conn.wh_type, "?");
        assert_eq!(conn.exit_signature, "?");
        assert_eq!(conn.max_ship_size, crate::connection::ShipSize::Unknown);
    }

    #[tokio::test]
    async fn test_transport_failure_yields_empty() {
        let client = EveScoutClient::new(reqwest::Client::new(), "http://127.0.0.1:1/signatures");
        assert!(client.anchor_connections(THERA).await.is_empty());
    }
}
