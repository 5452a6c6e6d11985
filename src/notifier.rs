//! # Route Alerts
//!
//! [`RouteAlert`] is everything a notification needs to describe one accepted route.
//! Sinks decide how to render and deliver it: [`DiscordSink`] posts an embed to a
//! channel through the Discord REST API, [`LogSink`] writes it to the log.

use crate::connection::DirectedConnection;
use crate::http::ClientError;
use crate::route_matcher::RouteCandidate;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

const EMBED_COLOR_GOLD: u32 = 0xF1C40F;
const FOOTER_TEXT: &str = "Data from Eve-Scout • eve-scout.com";
const FOOTER_ICON: &str = "https://www.eve-scout.com/favicon.ico";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("Discord rejected the message ({status}): {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Presentation details of one wormhole in an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WormholeDetails {
    pub security_class: String,
    pub security_marker: &'static str,
    pub system_name: String,
    pub region: String,
    /// Signature to scan down first on this leg
    pub first_signature: String,
    /// Signature on the far side of the hole
    pub second_signature: String,
    pub size: String,
    pub size_marker: &'static str,
    pub wh_type: String,
    pub lifetime: String,
}

impl WormholeDetails {
    /// Entry leg: scanned from known space, so the k-space signature comes first.
    fn entry(conn: &DirectedConnection) -> Self {
        Self::build(conn, conn.exit_signature.clone(), conn.anchor_signature.clone())
    }

    /// Exit leg: scanned from the anchor, so the anchor signature comes first.
    fn exit(conn: &DirectedConnection) -> Self {
        Self::build(conn, conn.anchor_signature.clone(), conn.exit_signature.clone())
    }

    fn build(conn: &DirectedConnection, first_signature: String, second_signature: String) -> Self {
        Self {
            security_class: conn.security_class.to_string(),
            security_marker: conn.security_class.marker(),
            system_name: conn.exit_system_name.clone(),
            region: conn.exit_region.clone(),
            first_signature,
            second_signature,
            size: conn.max_ship_size.to_string(),
            size_marker: conn.max_ship_size.marker(),
            wh_type: conn.wh_type.clone(),
            lifetime: conn.lifetime_status(),
        }
    }

    fn render(&self) -> String {
        format!(
            "{} **{}**\nRegion: {}\nSig: `{}` → `{}`\nSize: {} **{}**\nType: {} | {}",
            self.security_marker,
            self.system_name,
            self.region,
            self.first_signature,
            self.second_signature,
            self.size_marker,
            self.size,
            self.wh_type,
            self.lifetime
        )
    }
}

/// An accepted route ready to be announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAlert {
    pub origin_name: String,
    pub destination_name: String,
    pub jumps_origin_to_entry: u32,
    pub jumps_exit_to_destination: u32,
    pub total_jumps: u32,
    pub entry: WormholeDetails,
    /// `None` when entry and exit are the same wormhole
    pub exit: Option<WormholeDetails>,
    pub mention: Option<String>,
}

impl RouteAlert {
    pub fn from_candidate(candidate: &RouteCandidate, mention: Option<String>) -> Self {
        Self {
            origin_name: candidate.origin.name.clone(),
            destination_name: candidate.destination.name.clone(),
            jumps_origin_to_entry: candidate.jumps_origin_to_entry,
            jumps_exit_to_destination: candidate.jumps_exit_to_destination,
            total_jumps: candidate.total_jumps(),
            entry: WormholeDetails::entry(&candidate.entry),
            exit: (!candidate.is_same_wormhole()).then(|| WormholeDetails::exit(&candidate.exit)),
            mention,
        }
    }

    pub fn is_same_wormhole(&self) -> bool {
        self.exit.is_none()
    }

    pub fn title(&self) -> String {
        format!("🌀 Thera Route: {} → {}", self.origin_name, self.destination_name)
    }

    pub fn summary(&self) -> String {
        format!(
            "A route from **{o}** to **{d}** is available via Thera!\n\n\
             **{a}j** from {o} to Thera entry\n\
             **{b}j** from Thera exit to {d}\n\
             **Total: {t} jumps** (+ Thera transit)",
            o = self.origin_name,
            d = self.destination_name,
            a = self.jumps_origin_to_entry,
            b = self.jumps_exit_to_destination,
            t = self.total_jumps
        )
    }

    /// Discord message payload with a single embed.
    pub fn to_discord_message(&self) -> Value {
        let mut fields = vec![json!({
            "name": format!("🚪 Entry WH ({} side)", self.origin_name),
            "value": self.entry.render(),
            "inline": false,
        })];
        match &self.exit {
            Some(exit) => fields.push(json!({
                "name": format!("🚪 Exit WH ({} side)", self.destination_name),
                "value": exit.render(),
                "inline": false,
            })),
            None => fields.push(json!({
                "name": "ℹ️ Same Wormhole",
                "value": "Entry and exit use the same wormhole connection",
                "inline": false,
            })),
        }

        let description = match &self.mention {
            Some(mention) => format!("{}\n\n{}", mention, self.summary()),
            None => self.summary(),
        };

        // Embed descriptions do not ping; the mention has to be in `content` as well.
        json!({
            "content": self.mention.clone().unwrap_or_default(),
            "embeds": [{
                "title": self.title(),
                "description": description,
                "color": EMBED_COLOR_GOLD,
                "timestamp": Utc::now().to_rfc3339(),
                "fields": fields,
                "footer": { "text": FOOTER_TEXT, "icon_url": FOOTER_ICON },
            }],
        })
    }
}

/// Delivery target for route alerts.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, alert: &RouteAlert) -> Result<(), NotifyError>;
}

/// Posts alerts to one Discord channel as the bot user.
pub struct DiscordSink {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
    channel_id: u64,
}

impl DiscordSink {
    pub fn new(client: reqwest::Client, api_url: &str, bot_token: impl Into<String>, channel_id: u64) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            channel_id,
        }
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    async fn deliver(&self, alert: &RouteAlert) -> Result<(), NotifyError> {
        let url = format!("{}/channels/{}/messages", self.api_url, self.channel_id);
        let response = self
            .client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.bot_token))
            .json(&alert.to_discord_message())
            .send()
            .await
            .map_err(ClientError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }
        Ok(())
    }
}

/// Writes alerts to the log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, alert: &RouteAlert) -> Result<(), NotifyError> {
        info!(
            "[dry-run] {} | {}j + {}j = {}j | entry {} ({}) {}",
            alert.title(),
            alert.jumps_origin_to_entry,
            alert.jumps_exit_to_destination,
            alert.total_jumps,
            alert.entry.system_name,
            alert.entry.region,
            alert
                .exit
                .as_ref()
                .map(|e| format!("exit {} ({})", e.system_name, e.region))
                .unwrap_or_else(|| "same wormhole".to_string())
        );
        Ok(())
    }
}
