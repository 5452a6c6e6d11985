//! # Poll Orchestrator
//!
//! The `Orchestrator` runs the poll cycle: fetch the anchor's wormholes, normalize
//! them, resolve jump distances, match routes, and announce the ones that are not on
//! cooldown.
//!
//! ## Cycle order
//!
//! 1. Sweep expired notification records
//! 2. Fetch raw connections from the signature feed
//! 3. Normalize and drop unroutable connections
//! 4. Resolve entry-leg and exit-leg distances (concurrently, cached)
//! 5. Match every origin against every destination
//! 6. Check and record each candidate's fingerprint
//! 7. Deliver accepted alerts to the sink
//!
//! Only one cycle runs at a time. A cycle requested while another is in progress is
//! skipped, whether it came from the timer or a manual trigger.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use thera_route_watch::orchestrator::{trigger_channel, Orchestrator};
//! use thera_route_watch::settings::Settings;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let settings = Settings::new()?;
//! let orchestrator = Arc::new(Orchestrator::from_settings(&settings)?);
//! let (trigger, triggers) = trigger_channel();
//! trigger.trigger();
//! orchestrator.run(triggers, tokio::signal::ctrl_c()).await;
//! # Ok(())
//! # }
//! ```

use crate::connection::{normalize_all, DirectedConnection, SystemId};
use crate::distance_cache::{DistanceCache, DistanceCacheStats};
use crate::esi::{EsiRouteClient, RouteService};
use crate::eve_scout::{EveScoutClient, SignatureFeed};
use crate::http::{self, ClientError};
use crate::metrics;
use crate::notification_tracker::NotificationTracker;
use crate::notifier::{DiscordSink, LogSink, NotificationSink, RouteAlert};
use crate::route_matcher::{distance_pairs, match_routes, RouteCandidate};
use crate::settings::{DestinationSystem, OriginSystem, Settings};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// What the orchestrator watches for, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct WatchPlan {
    pub origins: Vec<OriginSystem>,
    pub destinations: Vec<DestinationSystem>,
    pub anchor_id: SystemId,
    pub anchor_name: String,
    pub mention: Option<String>,
    pub poll_interval: Duration,
}

impl WatchPlan {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            origins: settings.departure_systems.clone(),
            destinations: settings.destinations.clone(),
            anchor_id: settings.anchor.system_id,
            anchor_name: settings.anchor.system_name.clone(),
            mention: settings.discord.mention(),
            poll_interval: Duration::from_secs(settings.polling.interval_seconds),
        }
    }
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub swept: usize,
    pub raw_connections: usize,
    pub routable_connections: usize,
    pub candidates: usize,
    pub notified: usize,
    pub suppressed: usize,
    pub delivery_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle was already running
    Skipped,
}

/// Snapshot for the `status` command.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub origins: Vec<OriginSystem>,
    pub destinations: Vec<DestinationSystem>,
    pub poll_interval: Duration,
    pub cooldown: Duration,
    pub tracked_routes: usize,
    pub cycles_completed: u64,
    pub distance_cache: DistanceCacheStats,
}

/// Sends manual "check now" requests to a running [`Orchestrator::run`] loop.
#[derive(Debug, Clone)]
pub struct TriggerHandle(mpsc::Sender<()>);

impl TriggerHandle {
    /// Queues a manual cycle. Returns `false` when one is already queued or the loop is gone.
    pub fn trigger(&self) -> bool {
        self.0.try_send(()).is_ok()
    }
}

/// Capacity 1: repeated triggers while one is pending collapse into a single cycle.
pub fn trigger_channel() -> (TriggerHandle, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(1);
    (TriggerHandle(tx), rx)
}

pub struct Orchestrator {
    plan: WatchPlan,
    feed: Arc<dyn SignatureFeed>,
    distances: Arc<DistanceCache>,
    tracker: Arc<NotificationTracker>,
    sink: Arc<dyn NotificationSink>,
    cycle_guard: Mutex<()>,
    cycles_completed: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        plan: WatchPlan,
        feed: Arc<dyn SignatureFeed>,
        distances: Arc<DistanceCache>,
        tracker: Arc<NotificationTracker>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            plan,
            feed,
            distances,
            tracker,
            sink,
            cycle_guard: Mutex::new(()),
            cycles_completed: AtomicU64::new(0),
        }
    }

    /// Wires the Eve-Scout, ESI and Discord clients from configuration.
    ///
    /// With `discord.dry_run` set, alerts go to the log instead of Discord.
    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        let client = http::build_client(&settings.api)?;

        let feed: Arc<dyn SignatureFeed> = Arc::new(EveScoutClient::new(
            client.clone(),
            settings.api.signatures_url.clone(),
        ));
        let routes: Arc<dyn RouteService> = Arc::new(EsiRouteClient::new(
            client.clone(),
            &settings.api.esi_base_url,
            settings.route.max_requests_per_second,
        )?);
        let distances = Arc::new(DistanceCache::new(
            routes,
            settings.route.preference,
            Duration::from_secs(settings.route.cache_ttl_seconds),
            settings.route.max_concurrent_lookups,
        ));
        let tracker = Arc::new(NotificationTracker::new(Duration::from_secs(
            settings.polling.cooldown_seconds,
        )));
        let sink: Arc<dyn NotificationSink> = if settings.discord.dry_run {
            Arc::new(LogSink)
        } else {
            Arc::new(DiscordSink::new(
                client,
                &settings.api.discord_api_url,
                settings.discord.bot_token.clone(),
                settings.discord.channel_id,
            ))
        };

        Ok(Self::new(
            WatchPlan::from_settings(settings),
            feed,
            distances,
            tracker,
            sink,
        ))
    }

    pub fn plan(&self) -> &WatchPlan {
        &self.plan
    }

    /// Runs one full cycle unless another one is in progress.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let _guard = match self.cycle_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Poll cycle already in progress, skipping");
                metrics::increment_cycle("skipped");
                return CycleOutcome::Skipped;
            }
        };

        let cycle = self.cycles_completed.load(Ordering::Relaxed) + 1;
        let start = Instant::now();
        let report = self
            .execute_cycle()
            .instrument(info_span!("poll_cycle", cycle))
            .await;

        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        metrics::increment_cycle("completed");
        metrics::record_cycle_duration(start.elapsed());
        metrics::set_tracked_fingerprints(self.tracker.len());
        metrics::set_distance_cache_size(self.distances.len());

        CycleOutcome::Completed(report)
    }

    async fn execute_cycle(&self) -> CycleReport {
        info!("Checking for {} connections...", self.plan.anchor_name);
        let mut report = CycleReport {
            swept: self.tracker.sweep(),
            ..Default::default()
        };

        let raw = self.feed.anchor_connections(self.plan.anchor_id).await;
        report.raw_connections = raw.len();
        if raw.is_empty() {
            info!("No {} connections found", self.plan.anchor_name);
            return report;
        }

        let connections = normalize_all(&raw, self.plan.anchor_id, &self.plan.anchor_name);
        report.routable_connections = connections.len();
        if connections.is_empty() {
            info!("No k-space {} connections found", self.plan.anchor_name);
            return report;
        }

        let candidates = self.find_routes(&connections).await;
        report.candidates = candidates.len();

        let mut accepted = Vec::new();
        for candidate in candidates {
            if self.tracker.check_and_record(candidate.fingerprint()) {
                accepted.push(candidate);
            } else {
                debug!("Route {} on cooldown", candidate.fingerprint());
                report.suppressed += 1;
                metrics::increment_notification("suppressed");
            }
        }

        if accepted.is_empty() {
            info!("No routes meeting criteria found");
            return report;
        }

        for candidate in &accepted {
            let alert = RouteAlert::from_candidate(candidate, self.plan.mention.clone());
            match self.sink.deliver(&alert).await {
                Ok(()) => {
                    report.notified += 1;
                    metrics::increment_notification("sent");
                    info!(
                        "Sent notification for route {} -> {} via {} -> {} ({} jumps)",
                        candidate.origin.name,
                        candidate.destination.name,
                        candidate.entry.exit_system_name,
                        candidate.exit.exit_system_name,
                        candidate.total_jumps()
                    );
                }
                Err(e) => {
                    // The fingerprint stays recorded: retrying every cycle would hammer a
                    // sink that is likely rate limiting us.
                    report.delivery_failures += 1;
                    metrics::increment_notification("failed");
                    error!("Failed to send notification: {}", e);
                }
            }
        }

        report
    }

    async fn find_routes(&self, connections: &[DirectedConnection]) -> Vec<RouteCandidate> {
        let pairs = distance_pairs(&self.plan.origins, &self.plan.destinations, connections);
        let lookups = pairs.len();
        let distances = self.distances.jumps_many(pairs).await;
        debug!(
            "Resolved {} of {} distance lookups for {} connections",
            distances.len(),
            lookups,
            connections.len()
        );
        match_routes(
            &self.plan.origins,
            &self.plan.destinations,
            connections,
            &distances,
        )
    }

    /// Current routable connections, without touching notification state.
    pub async fn list_connections(&self) -> Vec<DirectedConnection> {
        let raw = self.feed.anchor_connections(self.plan.anchor_id).await;
        normalize_all(&raw, self.plan.anchor_id, &self.plan.anchor_name)
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            origins: self.plan.origins.clone(),
            destinations: self.plan.destinations.clone(),
            poll_interval: self.plan.poll_interval,
            cooldown: self.tracker.cooldown(),
            tracked_routes: self.tracker.len(),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            distance_cache: self.distances.stats(),
        }
    }

    /// Runs cycles on the poll interval and on manual triggers until `shutdown` resolves.
    ///
    /// The first cycle starts immediately. Timer ticks missed while a cycle was running
    /// are dropped rather than replayed.
    pub async fn run<S>(&self, mut triggers: mpsc::Receiver<()>, shutdown: S)
    where
        S: Future,
    {
        info!(
            "Watching {} origin(s) and {} destination(s) every {:?}",
            self.plan.origins.len(),
            self.plan.destinations.len(),
            self.plan.poll_interval
        );

        let mut ticker = interval(self.plan.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        let mut triggers_open = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping poll loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.log_outcome(self.run_cycle().await);
                }
                received = triggers.recv(), if triggers_open => {
                    match received {
                        Some(()) => {
                            info!("Manual check requested");
                            self.log_outcome(self.run_cycle().await);
                        }
                        None => triggers_open = false,
                    }
                }
            }
        }
    }

    fn log_outcome(&self, outcome: CycleOutcome) {
        if let CycleOutcome::Completed(report) = outcome {
            info!(
                "Cycle done: {} raw, {} routable, {} candidates, {} notified, {} suppressed, {} failed",
                report.raw_connections,
                report.routable_connections,
                report.candidates,
                report.notified,
                report.suppressed,
                report.delivery_failures
            );
        }
    }
}
