//! # Wormhole Connections
//!
//! Eve-Scout reports each wormhole as an undirected pair of systems (`out_*` and `in_*`
//! sides). Routing only cares about one shape: the anchor hub on one side and a
//! known-space system on the other. [`normalize`] turns a [`RawConnection`] into that
//! directed view, or drops it when the far side is not routable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Solar system identifier as used by ESI and Eve-Scout.
pub type SystemId = u64;

/// Unique id Eve-Scout assigns to a signature pair.
pub type ConnectionId = u64;

/// One record of the Eve-Scout public signatures feed.
///
/// Every field is optional on the wire; the normalizer decides what is usable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConnection {
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub id: Option<ConnectionId>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub out_system_id: Option<SystemId>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub out_system_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub out_region_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub out_system_class: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub out_signature: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub in_system_id: Option<SystemId>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub in_system_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub in_region_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub in_system_class: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub in_signature: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub wh_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub max_ship_size: Option<String>,
    #[serde(default, deserialize_with = "de_opt_hours")]
    pub remaining_hours: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_opt_bool")]
    pub wh_exits_outward: Option<bool>,
}

impl RawConnection {
    /// True when either side of the pair is `anchor`.
    pub fn touches(&self, anchor: SystemId) -> bool {
        self.out_system_id == Some(anchor) || self.in_system_id == Some(anchor)
    }
}

// Eve-Scout has served ids both as numbers and as numeric strings.
fn de_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// Presentation fields: a value of the wrong type is treated as missing.
fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn de_opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn de_opt_hours<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|h| h.min(u32::MAX as u64) as u32)
            .or_else(|| n.as_f64().map(|h| h.max(0.0).floor() as u32)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|h| h.max(0.0).floor() as u32),
        _ => None,
    })
}

fn de_opt_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    })
}

/// Security band of the known-space side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityClass {
    High,
    Low,
    Null,
    Unknown,
}

impl SecurityClass {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hs" | "high" | "highsec" => SecurityClass::High,
            "ls" | "low" | "lowsec" => SecurityClass::Low,
            "ns" | "null" | "nullsec" => SecurityClass::Null,
            _ => SecurityClass::Unknown,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            SecurityClass::High => "🔵",
            SecurityClass::Low => "🟡",
            SecurityClass::Null => "🔴",
            SecurityClass::Unknown => "⚪",
        }
    }
}

impl std::fmt::Display for SecurityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityClass::High => write!(f, "High-sec"),
            SecurityClass::Low => write!(f, "Low-sec"),
            SecurityClass::Null => write!(f, "Null-sec"),
            SecurityClass::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Largest hull class a wormhole lets through. `Unknown` orders below `Small`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipSize {
    Unknown,
    Small,
    Medium,
    Large,
    Xlarge,
    Capital,
}

impl ShipSize {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "small" => ShipSize::Small,
            "medium" => ShipSize::Medium,
            "large" => ShipSize::Large,
            "xlarge" | "x-large" => ShipSize::Xlarge,
            "capital" => ShipSize::Capital,
            _ => ShipSize::Unknown,
        }
    }

    pub fn at_least(&self, min: ShipSize) -> bool {
        *self >= min
    }

    pub fn marker(&self) -> &'static str {
        match self {
            ShipSize::Small => "🔹",
            ShipSize::Medium => "🔷",
            ShipSize::Large => "🟦",
            ShipSize::Xlarge => "🟪",
            ShipSize::Capital => "🟥",
            ShipSize::Unknown => "❓",
        }
    }
}

impl std::fmt::Display for ShipSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShipSize::Unknown => write!(f, "Unknown"),
            ShipSize::Small => write!(f, "Small"),
            ShipSize::Medium => write!(f, "Medium"),
            ShipSize::Large => write!(f, "Large"),
            ShipSize::Xlarge => write!(f, "Xlarge"),
            ShipSize::Capital => write!(f, "Capital"),
        }
    }
}

const UNKNOWN_LABEL: &str = "?";

/// A Thera-side view of one wormhole: where it lands in known space and how to find it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectedConnection {
    pub id: ConnectionId,
    pub anchor_signature: String,
    pub exit_system_id: SystemId,
    pub exit_system_name: String,
    pub exit_region: String,
    pub exit_signature: String,
    pub security_class: SecurityClass,
    pub wh_type: String,
    pub max_ship_size: ShipSize,
    pub remaining_hours: u32,
    pub expires_at: Option<DateTime<Utc>>,
    /// Both sides are the anchor. Such records are rejected by [`normalize`], so this
    /// is always `false` on a connection it returns.
    pub is_same_exit_as_anchor_side: bool,
}

impl DirectedConnection {
    pub fn lifetime_status(&self) -> String {
        let h = self.remaining_hours;
        if h <= 4 {
            format!("⚠️ EOL (~{}h remaining)", h)
        } else if h <= 8 {
            format!("🕐 ~{}h remaining", h)
        } else {
            format!("✅ ~{}h remaining", h)
        }
    }
}

/// Wormhole-space systems are named `J` followed by six digits (e.g. `J123456`).
///
/// Known-space names that merely start with `J` (Jita) are not matched.
pub fn is_wormhole_space_name(name: &str) -> bool {
    let mut chars = name.chars();
    if chars.next() != Some('J') {
        return false;
    }
    let digits: Vec<char> = chars.collect();
    digits.len() == 6 && digits.iter().all(|c| c.is_ascii_digit())
}

/// Builds the directed view of `raw` relative to the anchor system.
///
/// Returns `None` for records that cannot be routed: neither side is the anchor, no id,
/// no exit system, or an exit side in wormhole space (including the anchor itself).
pub fn normalize(raw: &RawConnection, anchor_id: SystemId, anchor_name: &str) -> Option<DirectedConnection> {
    if !raw.touches(anchor_id) {
        return None;
    }
    let id = raw.id?;
    let anchor_is_out = raw.out_system_id == Some(anchor_id);
    let loops_on_anchor = anchor_is_out && raw.in_system_id == Some(anchor_id);

    let (anchor_signature, exit_id, exit_name, exit_signature, exit_region, exit_class) = if anchor_is_out {
        (
            raw.out_signature.clone(),
            raw.in_system_id,
            raw.in_system_name.clone(),
            raw.in_signature.clone(),
            raw.in_region_name.clone(),
            raw.in_system_class.clone(),
        )
    } else {
        (
            raw.in_signature.clone(),
            raw.out_system_id,
            raw.out_system_name.clone(),
            raw.out_signature.clone(),
            raw.out_region_name.clone().or_else(|| raw.in_region_name.clone()),
            raw.out_system_class.clone().or_else(|| raw.in_system_class.clone()),
        )
    };

    let exit_system_id = exit_id?;
    let exit_system_name = exit_name.unwrap_or_else(|| UNKNOWN_LABEL.to_string());
    if loops_on_anchor
        || exit_system_id == anchor_id
        || exit_system_name.eq_ignore_ascii_case(anchor_name)
        || is_wormhole_space_name(&exit_system_name)
    {
        return None;
    }

    Some(DirectedConnection {
        id,
        anchor_signature: anchor_signature.unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        exit_system_id,
        exit_system_name,
        exit_region: exit_region.unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        exit_signature: exit_signature.unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        security_class: exit_class
            .as_deref()
            .map(SecurityClass::parse)
            .unwrap_or(SecurityClass::Unknown),
        wh_type: raw.wh_type.clone().unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        max_ship_size: raw
            .max_ship_size
            .as_deref()
            .map(ShipSize::parse)
            .unwrap_or(ShipSize::Unknown),
        remaining_hours: raw.remaining_hours.unwrap_or(0),
        expires_at: raw.expires_at,
        is_same_exit_as_anchor_side: loops_on_anchor,
    })
}

/// Normalizes a whole feed snapshot, keeping only records that touch the anchor.
pub fn normalize_all(raw: &[RawConnection], anchor_id: SystemId, anchor_name: &str) -> Vec<DirectedConnection> {
    raw.iter()
        .filter(|r| r.touches(anchor_id))
        .filter_map(|r| normalize(r, anchor_id, anchor_name))
        .collect()
}
