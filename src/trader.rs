//! The trading ship: missions, ledger and the set of locations worth visiting.
//!
//! Building a [`Trader`] runs these steps in order:
//!
//! 1. collect the missions into the ledger and the mandatory locations
//! 2. register every reachable station that sells a needed commodity
//! 3. classify commodities that no mission location sells ("detour" commodities)
//! 4. group the remaining sources of detour commodities per station
//! 5. of stations offering the same commodities keep only the best one
//! 6. greedily keep the stations offering the most still-missing commodities
//!
//! Mandatory locations and the stations kept in step 6 form the route.

use crate::commodity::{is_delivery, LedgerAction, Ledger, StationKind};
use crate::lookup::StationLookup;
use crate::mission::{MissionSet, Site};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A stop on the route together with the needed commodities it sells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub site: Site,
    pub commodities: BTreeSet<String>,
}

impl Location {
    pub fn new(site: Site, commodities: BTreeSet<String>) -> Self {
        Location { site, commodities }
    }
}

/// A station that could source detour commodities
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub commodities: BTreeSet<String>,
    pub distance: f64,
    pub kind: StationKind,
}

impl Candidate {
    /// Ordering key: anything off-planet beats any planetary base, then the
    /// shorter distance wins.
    fn preference(&self) -> (bool, OrderedFloat<f64>) {
        (self.kind.is_planetary(), OrderedFloat(self.distance))
    }
}

/// Auxiliary stations under consideration, iterated in site order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateMap {
    candidates: BTreeMap<Site, Candidate>,
}

impl CandidateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register that `site` offers `commodity`.
    pub fn offer(&mut self, site: Site, commodity: &str, distance: f64, kind: StationKind) {
        self.candidates
            .entry(site)
            .or_insert_with(|| Candidate {
                commodities: BTreeSet::new(),
                distance,
                kind,
            })
            .commodities
            .insert(commodity.to_string());
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.candidates.keys()
    }

    /// Among stations offering an identical commodity set keep exactly one:
    /// non-planetary first, then closest, then the first one seen.
    ///
    /// Returns the number of stations dropped.
    pub fn keep_closest(&mut self) -> usize {
        let to_be_deleted: Vec<Site> = {
            let mut groups: BTreeMap<&BTreeSet<String>, Vec<(&Site, &Candidate)>> = BTreeMap::new();
            for (site, candidate) in &self.candidates {
                groups.entry(&candidate.commodities).or_default().push((site, candidate));
            }

            let mut doomed = Vec::new();
            for members in groups.values() {
                let Some((best, _)) = members.iter().min_by_key(|(_, candidate)| candidate.preference()) else {
                    continue;
                };
                doomed.extend(
                    members
                        .iter()
                        .filter(|(site, _)| site != best)
                        .map(|(site, _)| (*site).clone()),
                );
            }
            doomed
        };

        for site in &to_be_deleted {
            self.candidates.remove(site);
        }
        to_be_deleted.len()
    }

    /// Repeatedly commit the station offering the most uncovered commodities,
    /// strip its commodities from the others and re-run [`Self::keep_closest`].
    ///
    /// Ties on the count go to the first station in iteration order. This is
    /// a greedy cover, not a minimum one.
    pub fn keep_unique(&mut self) -> Vec<Location> {
        let mut keep_these = Vec::new();

        loop {
            let mut best: Option<&Site> = None;
            let mut max_warez_at_location = 0;
            for (site, candidate) in &self.candidates {
                if candidate.commodities.len() > max_warez_at_location {
                    max_warez_at_location = candidate.commodities.len();
                    best = Some(site);
                }
            }

            let Some(best_site) = best.cloned() else {
                break;
            };
            let Some(chosen) = self.candidates.remove(&best_site) else {
                break;
            };

            for candidate in self.candidates.values_mut() {
                candidate.commodities.retain(|c| !chosen.commodities.contains(c));
            }
            self.candidates.retain(|_, candidate| !candidate.commodities.is_empty());
            self.keep_closest();

            log::debug!("keeping {} for {:?}", best_site, chosen.commodities);
            keep_these.push(Location::new(best_site, chosen.commodities));
        }

        keep_these
    }
}

/// Everything known about the missions and where to fulfil them.
#[derive(Debug, Clone)]
pub struct Trader {
    ledger: Ledger,
    origin: Option<Site>,
    origin_commodities: BTreeSet<String>,
    /// Mission locations and the needed commodities sold there
    locations: BTreeMap<Site, BTreeSet<String>>,
    detour_commodities: BTreeSet<String>,
    auxiliary: Vec<Location>,
}

impl Trader {
    /// Run all planning steps for a set of missions.
    pub fn new(missions: &MissionSet, lookup: &StationLookup, cargo: u32) -> Self {
        let mut trader = Trader {
            ledger: Ledger::new(cargo),
            origin: missions.origin.clone(),
            origin_commodities: BTreeSet::new(),
            locations: BTreeMap::new(),
            detour_commodities: BTreeSet::new(),
            auxiliary: Vec::new(),
        };

        trader.collect_mission_data(missions);
        trader.find_stations_to_buy_from(lookup);
        trader.find_detour_warez();

        let mut candidates = trader.warez_per_location();
        let dropped = candidates.keep_closest();
        log::debug!("{} duplicate detour stations dropped", dropped);
        trader.auxiliary = candidates.keep_unique();

        log::info!(
            "{} mission locations, {} detour commodities, {} detour stations",
            trader.locations.len(),
            trader.detour_commodities.len(),
            trader.auxiliary.len()
        );
        trader
    }

    fn collect_mission_data(&mut self, missions: &MissionSet) {
        for mission in &missions.missions {
            if mission.quantity == 0 {
                log::debug!("ignoring empty mission to {} in {}", mission.station, mission.system);
                continue;
            }

            self.locations
                .entry(Site::new(&mission.system, &mission.station))
                .or_default();

            if !is_delivery(&mission.commodity) {
                self.ledger.require(&mission.commodity, mission.quantity);
            }

            let action = LedgerAction::RegisterObligation {
                commodity: &mission.commodity,
                system: &mission.system,
                station: &mission.station,
                quantity: mission.quantity,
            };
            if let Err(e) = self.ledger.apply(action) {
                log::warn!("could not register mission: {}", e);
                continue;
            }

            // Deliveries are already aboard.
            if is_delivery(&mission.commodity) {
                self.ledger.stow(&mission.commodity, mission.quantity);
            }
        }

        log::info!(
            "{} missions, {} commodities to buy",
            missions.missions.len(),
            self.ledger.residual_needed()
        );
    }

    fn find_stations_to_buy_from(&mut self, lookup: &StationLookup) {
        let needed: BTreeSet<String> = self.ledger.needed_commodities().keys().cloned().collect();

        for (_, record) in lookup.iter() {
            let site = Site::new(&record.system, &record.name);
            let buy_here = record.commodities.iter().filter(|c| needed.contains(*c));

            for commodity in buy_here {
                self.ledger
                    .record_source(commodity, &record.system, &record.name, record.distance, record.kind);

                if let Some(sold_here) = self.locations.get_mut(&site) {
                    sold_here.insert(commodity.clone());
                }
                if self.origin.as_ref() == Some(&site) {
                    self.origin_commodities.insert(commodity.clone());
                }
            }
        }
    }

    fn find_detour_warez(&mut self) {
        for commodity in self.ledger.needed_commodities().keys() {
            let at_mission = self.locations.values().any(|sold| sold.contains(commodity));
            if !at_mission {
                self.detour_commodities.insert(commodity.clone());
            }
        }
    }

    /// Group the non-mission sources of detour commodities by station.
    fn warez_per_location(&self) -> CandidateMap {
        let mut candidates = CandidateMap::new();

        for commodity in &self.detour_commodities {
            let Some(ware) = self.ledger.commodity(commodity) else {
                continue;
            };
            for (system, stations) in &ware.buy_at {
                for (station, point) in stations {
                    let site = Site::new(system, station);
                    if self.locations.contains_key(&site) {
                        continue;
                    }
                    candidates.offer(site, commodity, point.distance, point.kind);
                }
            }
        }

        candidates
    }

    /// The baseline ledger every route simulation starts from
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn detour_commodities(&self) -> &BTreeSet<String> {
        &self.detour_commodities
    }

    /// Where the ship starts, with the needed commodities sold there
    pub fn origin(&self) -> Option<Location> {
        self.origin
            .clone()
            .map(|site| Location::new(site, self.origin_commodities.clone()))
    }

    pub fn mission_locations(&self) -> Vec<Location> {
        self.locations
            .iter()
            .map(|(site, sold)| Location::new(site.clone(), sold.clone()))
            .collect()
    }

    pub fn auxiliary_locations(&self) -> &[Location] {
        &self.auxiliary
    }

    /// All stations the route has to visit: mission locations first, then
    /// the detour stations in the order they were chosen.
    pub fn locations(&self) -> Vec<Location> {
        let mut all = self.mission_locations();
        all.extend(self.auxiliary.iter().cloned());
        all
    }

    /// Destinations of plain deliveries (cargo already aboard)
    pub fn deliveries(&self) -> Vec<(Site, u32)> {
        self.ledger
            .commodities()
            .filter(|ware| ware.is_delivery())
            .flat_map(|ware| {
                ware.sell_at.iter().flat_map(|(system, stations)| {
                    stations
                        .iter()
                        .map(move |(station, quantity)| (Site::new(system, station), *quantity))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::StationRecord;
    use crate::mission::Mission;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn create_gold_scenario() -> (MissionSet, StationLookup) {
        let mut missions = MissionSet::new().with_origin("Sol", "Beta");
        missions.push(Mission::new("Alpha", "Sol", "Gold", 10));

        let mut lookup = StationLookup::new();
        lookup.insert(1, StationRecord::new("Alpha", "Sol", 10.0, StationKind::Orbital, &[]));
        lookup.insert(2, StationRecord::new("Beta", "Sol", 20.0, StationKind::Orbital, &[]));
        lookup.insert(3, StationRecord::new("Gamma", "Sol", 200.0, StationKind::Orbital, &["Gold"]));
        (missions, lookup)
    }

    #[test]
    fn test_huge_mission_quantities_saturate() {
        let missions = MissionSet::parse("Alpha\tSol\tGold\t3000000000\nBeta\tSol\tGold\t3000000000\n");
        let (_, lookup) = create_gold_scenario();
        let trader = Trader::new(&missions, &lookup, 100);

        assert_eq!(trader.ledger().needed_commodities()["Gold"], u32::MAX);
        assert_eq!(trader.ledger().residual_obligations(), 2);
    }

    #[test]
    fn test_gold_scenario_graph() {
        let (missions, lookup) = create_gold_scenario();
        let trader = Trader::new(&missions, &lookup, 100);

        assert_eq!(trader.detour_commodities(), &set(&["Gold"]));
        let sites: Vec<Site> = trader.locations().into_iter().map(|l| l.site).collect();
        assert_eq!(sites, vec![Site::new("Sol", "Alpha"), Site::new("Sol", "Gamma")]);
        assert_eq!(trader.auxiliary_locations()[0].commodities, set(&["Gold"]));
        assert!(trader.origin().unwrap().commodities.is_empty());
    }

    #[test]
    fn test_commodity_at_mission_location_is_not_detour() {
        let mut missions = MissionSet::new();
        missions.push(Mission::new("Alpha", "Sol", "Gold", 10));
        missions.push(Mission::new("Delta", "Lave", "Tea", 3));

        let mut lookup = StationLookup::new();
        lookup.insert(1, StationRecord::new("Delta", "Lave", 10.0, StationKind::Orbital, &["Gold"]));
        lookup.insert(2, StationRecord::new("Gamma", "Sol", 5.0, StationKind::Orbital, &["Gold", "Tea"]));

        let trader = Trader::new(&missions, &lookup, 100);

        assert_eq!(trader.detour_commodities(), &set(&["Tea"]));
        let delta = trader
            .mission_locations()
            .into_iter()
            .find(|l| l.site == Site::new("Lave", "Delta"))
            .unwrap();
        assert_eq!(delta.commodities, set(&["Gold"]));
        assert_eq!(trader.auxiliary_locations().len(), 1);
        assert_eq!(trader.auxiliary_locations()[0].commodities, set(&["Tea"]));
    }

    #[test]
    fn test_deliveries_are_stowed_not_bought() {
        let mut missions = MissionSet::new();
        missions.push(Mission::new("Hub", "Lave", "Delivery", 4));
        missions.push(Mission::new("Alpha", "Sol", "Gold", 10));

        let trader = Trader::new(&missions, &StationLookup::new(), 50);
        let ledger = trader.ledger();

        assert!(!ledger.needed_commodities().contains_key("Delivery"));
        assert_eq!(ledger.commodity("Delivery").unwrap().quantity, 4);
        assert_eq!(ledger.free_cargo, 46);
        assert_eq!(trader.deliveries(), vec![(Site::new("Lave", "Hub"), 4)]);
        assert!(!trader.detour_commodities().contains("Delivery"));
    }

    #[test]
    fn test_empty_lookup_yields_no_detour_stations() {
        let mut missions = MissionSet::new().with_origin("Sol", "Beta");
        missions.push(Mission::new("Alpha", "Sol", "Gold", 10));

        let trader = Trader::new(&missions, &StationLookup::new(), 100);

        assert_eq!(trader.detour_commodities(), &set(&["Gold"]));
        assert!(trader.auxiliary_locations().is_empty());
        assert_eq!(trader.locations().len(), 1);
    }

    #[test]
    fn test_origin_commodities_are_recorded() {
        let mut missions = MissionSet::new().with_origin("Sol", "Beta");
        missions.push(Mission::new("Alpha", "Sol", "Gold", 10));

        let mut lookup = StationLookup::new();
        lookup.insert(2, StationRecord::new("Beta", "Sol", 20.0, StationKind::Orbital, &["Gold", "Fish"]));

        let trader = Trader::new(&missions, &lookup, 100);
        assert_eq!(trader.origin().unwrap().commodities, set(&["Gold"]));
    }

    #[test]
    fn test_keep_closest_prefers_orbital_then_distance() {
        let mut candidates = CandidateMap::new();
        candidates.offer(Site::new("A", "Surface"), "Gold", 10.0, StationKind::Planetary);
        candidates.offer(Site::new("B", "Far"), "Gold", 900.0, StationKind::Orbital);
        candidates.offer(Site::new("C", "Near"), "Gold", 100.0, StationKind::Other);
        candidates.offer(Site::new("D", "Tea"), "Tea", 1.0, StationKind::Planetary);

        assert_eq!(candidates.keep_closest(), 2);
        let sites: Vec<&Site> = candidates.sites().collect();
        assert_eq!(sites, vec![&Site::new("C", "Near"), &Site::new("D", "Tea")]);
    }

    #[test]
    fn test_keep_closest_ties_go_to_first_seen() {
        let mut candidates = CandidateMap::new();
        candidates.offer(Site::new("B", "Second"), "Gold", 50.0, StationKind::Orbital);
        candidates.offer(Site::new("A", "First"), "Gold", 50.0, StationKind::Orbital);

        candidates.keep_closest();
        let sites: Vec<&Site> = candidates.sites().collect();
        assert_eq!(sites, vec![&Site::new("A", "First")]);
    }

    #[test]
    fn test_keep_closest_is_a_fixed_point() {
        let mut candidates = CandidateMap::new();
        for (i, kind) in [StationKind::Planetary, StationKind::Orbital, StationKind::Other].iter().enumerate() {
            let system = format!("S{}", i);
            candidates.offer(Site::new(&system, "X"), "Gold", 10.0 * i as f64, *kind);
            candidates.offer(Site::new(&system, "Y"), "Gold", 1.0, *kind);
            candidates.offer(Site::new(&system, "Y"), "Tea", 1.0, *kind);
        }

        candidates.keep_closest();
        let once = candidates.clone();
        assert_eq!(candidates.keep_closest(), 0);
        assert_eq!(candidates, once);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_duplicate_groups_collapse_to_one_survivor() {
        let mut candidates = CandidateMap::new();
        for i in 0..6 {
            let site = Site::new(&format!("S{}", i), "Station");
            for commodity in ["Fish", "Gold", "Tea"] {
                candidates.offer(site.clone(), commodity, 100.0 - i as f64, StationKind::Orbital);
            }
        }

        candidates.keep_closest();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates.sites().next().unwrap(), &Site::new("S5", "Station"));
    }

    #[test]
    fn test_keep_unique_prefers_multi_commodity_station() {
        let mut candidates = CandidateMap::new();
        candidates.offer(Site::new("A", "One"), "Fish", 10.0, StationKind::Orbital);
        candidates.offer(Site::new("B", "Two"), "Fish", 500.0, StationKind::Orbital);
        candidates.offer(Site::new("B", "Two"), "Germanium", 500.0, StationKind::Orbital);

        let kept = candidates.keep_unique();

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].site, Site::new("B", "Two"));
        assert_eq!(kept[0].commodities, set(&["Fish", "Germanium"]));
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_keep_unique_recollapses_after_stripping() {
        let mut candidates = CandidateMap::new();
        // After "Big" is kept, both others only offer Tea and collide.
        for c in ["Fish", "Gold", "Salt"] {
            candidates.offer(Site::new("A", "Big"), c, 10.0, StationKind::Orbital);
        }
        candidates.offer(Site::new("B", "Near"), "Fish", 5.0, StationKind::Orbital);
        candidates.offer(Site::new("B", "Near"), "Tea", 5.0, StationKind::Orbital);
        candidates.offer(Site::new("C", "Far"), "Gold", 50.0, StationKind::Orbital);
        candidates.offer(Site::new("C", "Far"), "Tea", 50.0, StationKind::Orbital);

        let kept = candidates.keep_unique();
        let sites: Vec<&Site> = kept.iter().map(|l| &l.site).collect();

        assert_eq!(sites, vec![&Site::new("A", "Big"), &Site::new("B", "Near")]);
        assert_eq!(kept[1].commodities, set(&["Tea"]));
    }

    #[test]
    fn test_keep_unique_on_empty_map() {
        let mut candidates = CandidateMap::new();
        assert!(candidates.keep_unique().is_empty());
    }
}
