//! # Route Matcher
//!
//! For every origin/destination pair, picks the wormhole closest to the origin (entry)
//! and, independently, the wormhole closest to the destination (exit). A route is a
//! candidate when the two legs together fit the destination's jump budget.
//!
//! ## Selection rules
//!
//! - Connections without a known distance for a leg are ignored for that leg.
//! - Equal distances are broken by the lowest connection id, so the result does not
//!   depend on feed order.
//! - Entry and exit may be the same wormhole; the candidate is flagged, not rejected.
//! - Destinations are matched independently, so one wormhole can serve several of them
//!   in the same cycle.

use crate::connection::DirectedConnection;
use crate::distance_cache::DistanceKey;
use crate::notification_tracker::RouteFingerprint;
use crate::settings::{DestinationSystem, OriginSystem};
use std::collections::HashMap;

/// A route worth announcing: origin → entry wormhole → anchor → exit wormhole → destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteCandidate {
    pub origin: OriginSystem,
    pub entry: DirectedConnection,
    pub exit: DirectedConnection,
    pub destination: DestinationSystem,
    pub jumps_origin_to_entry: u32,
    pub jumps_exit_to_destination: u32,
}

impl RouteCandidate {
    /// Gate jumps on both legs; the anchor transit itself is not counted.
    pub fn total_jumps(&self) -> u32 {
        self.jumps_origin_to_entry + self.jumps_exit_to_destination
    }

    pub fn is_same_wormhole(&self) -> bool {
        self.entry.id == self.exit.id
    }

    pub fn fingerprint(&self) -> RouteFingerprint {
        RouteFingerprint {
            origin_id: self.origin.system_id,
            entry_connection_id: self.entry.id,
            exit_connection_id: self.exit.id,
            destination_id: self.destination.system_id,
        }
    }
}

/// Every `(from, to)` pair [`match_routes`] will look up.
pub fn distance_pairs(
    origins: &[OriginSystem],
    destinations: &[DestinationSystem],
    connections: &[DirectedConnection],
) -> Vec<DistanceKey> {
    // Entry legs are only useful when there is somewhere to go.
    if destinations.is_empty() {
        return Vec::new();
    }
    let mut pairs = Vec::with_capacity((origins.len() + destinations.len()) * connections.len());
    for origin in origins {
        for conn in connections {
            pairs.push((origin.system_id, conn.exit_system_id));
        }
    }
    for destination in destinations {
        for conn in connections {
            pairs.push((conn.exit_system_id, destination.system_id));
        }
    }
    pairs
}

fn closest<'a, I, F>(connections: I, distance: F) -> Option<(&'a DirectedConnection, u32)>
where
    I: Iterator<Item = &'a DirectedConnection>,
    F: Fn(&DirectedConnection) -> Option<u32>,
{
    connections
        .filter_map(|c| distance(c).map(|jumps| (c, jumps)))
        .min_by_key(|(c, jumps)| (*jumps, c.id))
}

/// Matches every origin against every destination using precomputed distances.
///
/// `distances` maps `(origin, exit_system)` for entry legs and `(exit_system,
/// destination)` for exit legs; missing keys mean the leg is unknown.
pub fn match_routes(
    origins: &[OriginSystem],
    destinations: &[DestinationSystem],
    connections: &[DirectedConnection],
    distances: &HashMap<DistanceKey, u32>,
) -> Vec<RouteCandidate> {
    let mut candidates = Vec::new();

    for origin in origins {
        for destination in destinations {
            let usable = |c: &&DirectedConnection| {
                destination
                    .min_ship_size
                    .map_or(true, |min| c.max_ship_size.at_least(min))
            };

            let best_entry = closest(connections.iter().filter(usable), |c| {
                distances.get(&(origin.system_id, c.exit_system_id)).copied()
            });
            let best_exit = closest(connections.iter().filter(usable), |c| {
                distances.get(&(c.exit_system_id, destination.system_id)).copied()
            });

            let (Some((entry, to_entry)), Some((exit, from_exit))) = (best_entry, best_exit) else {
                continue;
            };

            if to_entry + from_exit <= destination.max_jumps {
                candidates.push(RouteCandidate {
                    origin: origin.clone(),
                    entry: entry.clone(),
                    exit: exit.clone(),
                    destination: destination.clone(),
                    jumps_origin_to_entry: to_entry,
                    jumps_exit_to_destination: from_exit,
                });
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{SecurityClass, ShipSize, SystemId};

    fn conn(id: u64, exit_system_id: SystemId) -> DirectedConnection {
        DirectedConnection {
            id,
            anchor_signature: format!("THR-{}", id),
            exit_system_id,
            exit_system_name: format!("Sys{}", exit_system_id),
            exit_region: "Region".into(),
            exit_signature: format!("KSP-{}", id),
            security_class: SecurityClass::High,
            wh_type: "Q063".into(),
            max_ship_size: ShipSize::Large,
            remaining_hours: 12,
            expires_at: None,
            is_same_exit_as_anchor_side: false,
        }
    }

    fn origin(id: SystemId) -> OriginSystem {
        OriginSystem {
            name: format!("Origin{}", id),
            system_id: id,
        }
    }

    fn dest(id: SystemId, max_jumps: u32) -> DestinationSystem {
        DestinationSystem {
            name: format!("Dest{}", id),
            system_id: id,
            max_jumps,
            min_ship_size: None,
        }
    }

    /// Connections 1..=3 land in systems 101..=103 with (entry, exit) distances
    /// (2,1), (4,3), (1,5) from origin 1 / to destinations 900 and 901.
    fn scenario() -> (Vec<DirectedConnection>, HashMap<DistanceKey, u32>) {
        let conns = vec![conn(1, 101), conn(2, 102), conn(3, 103)];
        let mut d = HashMap::new();
        for (exit, entry_jumps, exit_jumps) in [(101, 2, 1), (102, 4, 3), (103, 1, 5)] {
            d.insert((1, exit), entry_jumps);
            d.insert((exit, 900), exit_jumps);
            d.insert((exit, 901), exit_jumps);
        }
        (conns, d)
    }

    #[test]
    fn test_independent_entry_and_exit_selection() {
        let (conns, d) = scenario();
        let routes = match_routes(&[origin(1)], &[dest(900, 5), dest(901, 2)], &conns, &d);

        // best entry = conn 3 (1 jump), best exit = conn 1 (1 jump): total 2
        assert_eq!(routes.len(), 2);
        let d1 = &routes[0];
        assert_eq!(d1.destination.system_id, 900);
        assert_eq!(d1.entry.id, 3);
        assert_eq!(d1.exit.id, 1);
        assert_eq!(d1.total_jumps(), 2);
        assert!(!d1.is_same_wormhole());
        assert_eq!(routes[1].destination.system_id, 901);
    }

    #[test]
    fn test_destination_over_budget_rejected() {
        let (conns, mut d) = scenario();
        // Best exit toward 901 is now 3 jumps: 1 + 3 > 2
        d.insert((101, 901), 6);
        d.insert((103, 901), 3);
        let routes = match_routes(&[origin(1)], &[dest(900, 5), dest(901, 2)], &conns, &d);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].destination.system_id, 900);
    }

    #[test]
    fn test_tie_break_prefers_lowest_connection_id() {
        let conns = vec![conn(7, 107), conn(4, 104), conn(9, 109)];
        let mut d = HashMap::new();
        for exit in [107, 104, 109] {
            d.insert((1, exit), 2);
            d.insert((exit, 900), 3);
        }
        let routes = match_routes(&[origin(1)], &[dest(900, 10)], &conns, &d);
        assert_eq!(routes[0].entry.id, 4);
        assert_eq!(routes[0].exit.id, 4);

        let reversed: Vec<_> = conns.into_iter().rev().collect();
        let again = match_routes(&[origin(1)], &[dest(900, 10)], &reversed, &d);
        assert_eq!(again, routes);
    }

    #[test]
    fn test_unknown_distance_excluded_not_zero() {
        let conns = vec![conn(1, 101), conn(2, 102)];
        let mut d = HashMap::new();
        // conn 1 has no entry distance at all; conn 2 is far but known
        d.insert((1, 102), 8);
        d.insert((101, 900), 1);
        d.insert((102, 900), 1);
        let routes = match_routes(&[origin(1)], &[dest(900, 20)], &conns, &d);
        assert_eq!(routes[0].entry.id, 2);
        assert_eq!(routes[0].jumps_origin_to_entry, 8);
        assert_eq!(routes[0].exit.id, 1);
    }

    #[test]
    fn test_missing_leg_yields_no_candidate() {
        let conns = vec![conn(1, 101)];
        let mut d = HashMap::new();
        d.insert((1, 101), 1);
        assert!(match_routes(&[origin(1)], &[dest(900, 50)], &conns, &d).is_empty());
    }

    #[test]
    fn test_same_wormhole_flagged() {
        let conns = vec![conn(5, 105)];
        let mut d = HashMap::new();
        d.insert((1, 105), 3);
        d.insert((105, 900), 4);
        let routes = match_routes(&[origin(1)], &[dest(900, 10)], &conns, &d);
        assert_eq!(routes.len(), 1);
        assert!(routes[0].is_same_wormhole());
        assert_eq!(routes[0].total_jumps(), 7);
    }

    #[test]
    fn test_min_ship_size_filters_both_legs() {
        let mut small = conn(1, 101);
        small.max_ship_size = ShipSize::Medium;
        let big = conn(2, 102);
        let mut d = HashMap::new();
        d.insert((1, 101), 1);
        d.insert((101, 900), 1);
        d.insert((1, 102), 4);
        d.insert((102, 900), 4);

        let mut capital_dest = dest(900, 10);
        capital_dest.min_ship_size = Some(ShipSize::Large);
        let routes = match_routes(&[origin(1)], &[capital_dest], &[small, big], &d);
        assert_eq!(routes[0].entry.id, 2);
        assert_eq!(routes[0].exit.id, 2);
    }

    #[test]
    fn test_distance_pairs_cover_both_legs() {
        let conns = vec![conn(1, 101), conn(2, 102)];
        let pairs = distance_pairs(&[origin(1)], &[dest(900, 5)], &conns);
        assert_eq!(pairs, vec![(1, 101), (1, 102), (101, 900), (102, 900)]);
        assert!(distance_pairs(&[origin(1)], &[], &conns).is_empty());
    }

    #[test]
    fn test_fingerprint_identifies_route() {
        let conns = vec![conn(5, 105)];
        let mut d = HashMap::new();
        d.insert((1, 105), 3);
        d.insert((105, 900), 4);
        let route = &match_routes(&[origin(1)], &[dest(900, 10)], &conns, &d)[0];
        let fp = route.fingerprint();
        assert_eq!(
            (fp.origin_id, fp.entry_connection_id, fp.exit_connection_id, fp.destination_id),
            (1, 5, 5, 900)
        );
    }
}
