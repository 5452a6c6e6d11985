//! # Thera Route Watch
//!
//! Watches the wormhole connections of a hub system (Thera by default) and announces
//! shortcuts between configured known-space systems.
//!
//! ## Overview
//!
//! Every poll cycle the watcher:
//!
//! - **Fetches** the anchor's current wormholes from the Eve-Scout public feed
//! - **Normalizes** them into anchor-relative connections, dropping wormhole space
//! - **Measures** gate distances through ESI, memoized in a TTL cache
//! - **Matches** each origin/destination pair against the closest entry and exit holes
//! - **Announces** routes within budget, at most once per cooldown per route
//!
//! ## Architecture
//!
//! ### Data Sources
//! [`eve_scout`] and [`esi`] wrap the two public HTTP APIs behind traits so the engine
//! can be driven by fakes in tests.
//!
//! ### Route Engine
//! [`connection`], [`distance_cache`] and [`route_matcher`] are pure or cache-backed
//! transformations from feed records to route candidates.
//!
//! ### Delivery
//! [`notification_tracker`] suppresses repeats and [`notifier`] renders and delivers alerts.
//!
//! ### Orchestration
//! [`orchestrator`] runs the cycle on a timer or on demand.

// Configuration
/// Layered configuration (TOML file + `THERA_*` environment)
pub mod settings;

// Data Sources
/// Shared HTTP client and transport errors
pub mod http;
/// Eve-Scout signature feed client
pub mod eve_scout;
/// ESI route client
pub mod esi;

// Route Engine
/// Wormhole connection records and normalization
pub mod connection;
/// Memoized jump distances
pub mod distance_cache;
/// Origin/destination route matching
pub mod route_matcher;

// Delivery
/// Per-route notification cooldowns
pub mod notification_tracker;
/// Route alerts and delivery sinks
pub mod notifier;

// Orchestration
/// Poll cycle and run loop
pub mod orchestrator;

// Observability
/// Metric names and helpers (no-ops without the `observability` feature)
pub mod metrics;

pub use connection::{DirectedConnection, RawConnection, SecurityClass, ShipSize, SystemId};
pub use distance_cache::DistanceCache;
pub use notification_tracker::{NotificationTracker, RouteFingerprint};
pub use notifier::{NotificationSink, RouteAlert};
pub use orchestrator::{CycleOutcome, CycleReport, Orchestrator, TriggerHandle};
pub use route_matcher::RouteCandidate;
pub use settings::Settings;
