//! Commodity ledger: what is carried, what is owed where, and where it can be bought.
//!
//! The ledger is built once from the mission data and then cloned for every
//! simulated route, so a trial can mutate its own copy freely.

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name used in mission data for cargo that is already in the hold and only
/// needs to be dropped off.
pub const DELIVERY: &str = "delivery";

/// Check whether a commodity name is the delivery sentinel (case-insensitive)
pub fn is_delivery(name: &str) -> bool {
    name.eq_ignore_ascii_case(DELIVERY)
}

/// Broad class of a station, as far as route planning cares.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationKind {
    /// Starports and outposts in space
    Orbital,
    /// Anything on a planet surface; slow to reach
    Planetary,
    Other,
}

impl StationKind {
    /// Classify a free-form station type such as "Coriolis Starport" or
    /// "Planetary Outpost".
    pub fn from_type_name(type_name: &str) -> Self {
        let lower = type_name.to_lowercase();
        if lower.contains("planetary") {
            StationKind::Planetary
        } else if lower.contains("starport") || lower.contains("outpost") {
            StationKind::Orbital
        } else {
            StationKind::Other
        }
    }

    pub fn is_planetary(&self) -> bool {
        matches!(self, StationKind::Planetary)
    }
}

/// Where a commodity can be bought
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct BuyPoint {
    /// Distance from the system arrival point
    pub distance: f64,
    pub kind: StationKind,
}

/// Nested system -> station -> value map used for both sell and buy points.
pub type SiteMap<T> = BTreeMap<String, BTreeMap<String, T>>;

/// One commodity tracked by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commodity {
    pub name: String,
    /// Amount currently in the hold
    pub quantity: u32,
    /// Outstanding amount owed per station; entries vanish when settled
    pub sell_at: SiteMap<u32>,
    /// Known sources of this commodity
    pub buy_at: SiteMap<BuyPoint>,
}

impl Commodity {
    pub fn new(name: &str) -> Self {
        Commodity {
            name: name.to_string(),
            quantity: 0,
            sell_at: BTreeMap::new(),
            buy_at: BTreeMap::new(),
        }
    }

    pub fn is_delivery(&self) -> bool {
        is_delivery(&self.name)
    }

    /// Amount still owed at a station, if any
    pub fn owed_at(&self, system: &str, station: &str) -> Option<u32> {
        self.sell_at.get(system).and_then(|stations| stations.get(station)).copied()
    }

    /// Add to the amount owed at a station, creating the entry if needed.
    pub fn update_sellpoint(&mut self, system: &str, station: &str, quantity: u32) {
        let owed = self
            .sell_at
            .entry(system.to_string())
            .or_default()
            .entry(station.to_string())
            .or_insert(0);
        *owed = saturating_total(&self.name, *owed, quantity);
    }

    /// Record a source once; later calls for the same station are ignored.
    pub fn update_buypoint(&mut self, system: &str, station: &str, distance: f64, kind: StationKind) {
        self.buy_at
            .entry(system.to_string())
            .or_default()
            .entry(station.to_string())
            .or_insert(BuyPoint { distance, kind });
    }

    /// Number of stations this commodity still has to be delivered to
    pub fn open_sellpoints(&self) -> usize {
        self.sell_at.values().map(BTreeMap::len).sum()
    }

    fn settle_sellpoint(&mut self, system: &str, station: &str, quantity: u32) {
        let Some(stations) = self.sell_at.get_mut(system) else {
            return;
        };
        if let Some(owed) = stations.get_mut(station) {
            *owed = owed.saturating_sub(quantity);
            if *owed == 0 {
                stations.remove(station);
            }
        }
        if stations.is_empty() {
            self.sell_at.remove(system);
        }
    }
}

/// Add two quantities of `name`, capping at `u32::MAX` with a warning.
fn saturating_total(name: &str, current: u32, quantity: u32) -> u32 {
    current.checked_add(quantity).unwrap_or_else(|| {
        log::warn!("total quantity of {} exceeds {}; capping", name, u32::MAX);
        u32::MAX
    })
}

/// A single mutation of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction<'a> {
    /// Owe `quantity` more of a commodity at a station
    RegisterObligation {
        commodity: &'a str,
        system: &'a str,
        station: &'a str,
        quantity: u32,
    },
    /// Hand over `quantity` at a station where it is owed
    Sell {
        commodity: &'a str,
        system: &'a str,
        station: &'a str,
        quantity: u32,
    },
    /// Load `quantity` into the hold
    Buy {
        commodity: &'a str,
        system: &'a str,
        station: &'a str,
        quantity: u32,
    },
}

/// Complete trading state of the ship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    warez: BTreeMap<String, Commodity>,
    /// Cargo space currently unused
    pub free_cargo: u32,
    /// Total cargo space of the ship
    pub capacity: u32,
    /// Commodities that still have to be bought and the full amount needed.
    /// An entry disappears on its first purchase; it is never topped up.
    needed: BTreeMap<String, u32>,
    /// Commodity names in the order they were first seen
    order: Vec<String>,
}

impl Ledger {
    pub fn new(capacity: u32) -> Self {
        Ledger {
            warez: BTreeMap::new(),
            free_cargo: capacity,
            capacity,
            needed: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    pub fn commodity(&self, name: &str) -> Option<&Commodity> {
        self.warez.get(name)
    }

    /// Iterate over commodities in the order they were first seen
    pub fn commodities(&self) -> impl Iterator<Item = &Commodity> {
        self.order.iter().filter_map(|name| self.warez.get(name))
    }

    fn track(&mut self, name: &str) {
        if !self.order.iter().any(|known| known == name) {
            self.order.push(name.to_string());
        }
    }

    fn entry(&mut self, name: &str) -> &mut Commodity {
        self.track(name);
        self.warez
            .entry(name.to_string())
            .or_insert_with(|| Commodity::new(name))
    }

    pub fn needed_commodities(&self) -> &BTreeMap<String, u32> {
        &self.needed
    }

    /// Outstanding needs in the order the commodities were first seen
    pub fn needed_in_order(&self) -> impl Iterator<Item = (&str, u32)> {
        self.order
            .iter()
            .filter_map(|name| self.needed.get(name).map(|quantity| (name.as_str(), *quantity)))
    }

    /// Add to the total amount of a commodity that has to be acquired.
    pub fn require(&mut self, name: &str, quantity: u32) {
        self.track(name);
        let needed = self.needed.entry(name.to_string()).or_insert(0);
        *needed = saturating_total(name, *needed, quantity);
    }

    /// Drop a commodity from the shopping list after it was bought.
    pub fn fulfil_need(&mut self, name: &str) {
        self.needed.remove(name);
    }

    pub fn record_obligation(&mut self, commodity: &str, system: &str, station: &str, quantity: u32) {
        self.entry(commodity).update_sellpoint(system, station, quantity);
    }

    pub fn record_source(&mut self, commodity: &str, system: &str, station: &str, distance: f64, kind: StationKind) {
        self.entry(commodity).update_buypoint(system, station, distance, kind);
    }

    /// Put cargo that is already aboard into the hold. Free cargo is clamped
    /// at zero if the missions carry more than the ship can hold.
    pub fn stow(&mut self, commodity: &str, quantity: u32) {
        if quantity > self.free_cargo {
            log::warn!(
                "stowing {} of {} exceeds the {} free cargo; clamping to zero",
                quantity,
                commodity,
                self.free_cargo
            );
        }
        let ware = self.entry(commodity);
        ware.quantity = saturating_total(commodity, ware.quantity, quantity);
        self.free_cargo = self.free_cargo.saturating_sub(quantity);
    }

    /// The amount that can be sold right now at a station: everything owed
    /// there, but only if all of it is in the hold.
    pub fn can_sell(&self, commodity: &str, system: &str, station: &str) -> Option<u32> {
        let ware = self.warez.get(commodity)?;
        let owed = ware.owed_at(system, station)?;
        (ware.quantity >= owed).then_some(owed)
    }

    /// The amount that would be bought now: the whole outstanding need, but
    /// only if it fits in the hold.
    pub fn can_buy(&self, commodity: &str) -> Option<u32> {
        let needed = *self.needed.get(commodity)?;
        (self.free_cargo >= needed).then_some(needed)
    }

    /// Apply a mutation. Rejected actions leave the ledger untouched.
    pub fn apply(&mut self, action: LedgerAction<'_>) -> Result<(), LedgerError> {
        match action {
            LedgerAction::RegisterObligation { commodity, system, station, quantity } => {
                self.record_obligation(commodity, system, station, quantity);
                Ok(())
            }
            LedgerAction::Sell { commodity, system, station, quantity } => {
                let ware = self
                    .warez
                    .get_mut(commodity)
                    .ok_or_else(|| LedgerError::UnknownCommodity(commodity.to_string()))?;
                let owed = ware.owed_at(system, station).ok_or_else(|| LedgerError::NoObligation {
                    commodity: commodity.to_string(),
                    system: system.to_string(),
                    station: station.to_string(),
                })?;
                if owed < quantity || ware.quantity < quantity {
                    return Err(LedgerError::InsufficientStock {
                        commodity: commodity.to_string(),
                        requested: quantity,
                        owed,
                        held: ware.quantity,
                    });
                }
                ware.settle_sellpoint(system, station, quantity);
                ware.quantity -= quantity;
                self.free_cargo = self.free_cargo.saturating_add(quantity).min(self.capacity);
                Ok(())
            }
            LedgerAction::Buy { commodity, quantity, .. } => {
                if self.free_cargo < quantity {
                    return Err(LedgerError::InsufficientCargo {
                        commodity: commodity.to_string(),
                        requested: quantity,
                        free: self.free_cargo,
                    });
                }
                let ware = self
                    .warez
                    .get_mut(commodity)
                    .ok_or_else(|| LedgerError::UnknownCommodity(commodity.to_string()))?;
                ware.quantity = saturating_total(commodity, ware.quantity, quantity);
                self.free_cargo -= quantity;
                Ok(())
            }
        }
    }

    /// Number of (commodity, system, station) deliveries still open
    pub fn residual_obligations(&self) -> usize {
        self.warez.values().map(Commodity::open_sellpoints).sum()
    }

    /// Number of commodities that still have to be bought
    pub fn residual_needed(&self) -> usize {
        self.needed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_ledger() -> Ledger {
        let mut ledger = Ledger::new(100);
        ledger.record_obligation("Gold", "Sol", "Alpha", 10);
        ledger.require("Gold", 10);
        ledger
    }

    #[test]
    fn test_station_kind_classification() {
        assert_eq!(StationKind::from_type_name("Planetary Outpost"), StationKind::Planetary);
        assert_eq!(StationKind::from_type_name("Coriolis Starport"), StationKind::Orbital);
        assert_eq!(StationKind::from_type_name("Outpost"), StationKind::Orbital);
        assert_eq!(StationKind::from_type_name("Mega ship"), StationKind::Other);
    }

    #[test]
    fn test_obligations_accumulate() {
        let mut ledger = create_test_ledger();
        ledger.record_obligation("Gold", "Sol", "Alpha", 5);

        assert_eq!(ledger.commodity("Gold").unwrap().owed_at("Sol", "Alpha"), Some(15));
        assert_eq!(ledger.residual_obligations(), 1);
    }

    #[test]
    fn test_record_source_is_idempotent() {
        let mut ledger = create_test_ledger();
        ledger.record_source("Gold", "Sol", "Gamma", 200.0, StationKind::Orbital);
        ledger.record_source("Gold", "Sol", "Gamma", 999.0, StationKind::Planetary);

        let point = ledger.commodity("Gold").unwrap().buy_at["Sol"]["Gamma"];
        assert_eq!(point.distance, 200.0);
        assert_eq!(point.kind, StationKind::Orbital);
    }

    #[test]
    fn test_sell_requires_full_stock() {
        let mut ledger = create_test_ledger();
        ledger.apply(LedgerAction::Buy { commodity: "Gold", system: "Sol", station: "Gamma", quantity: 6 }).unwrap();

        assert_eq!(ledger.can_sell("Gold", "Sol", "Alpha"), None);
        let before = ledger.clone();
        let err = ledger
            .apply(LedgerAction::Sell { commodity: "Gold", system: "Sol", station: "Alpha", quantity: 10 })
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { held: 6, .. }));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_sale_settles_obligation() {
        let mut ledger = create_test_ledger();
        ledger.apply(LedgerAction::Buy { commodity: "Gold", system: "Sol", station: "Gamma", quantity: 10 }).unwrap();
        assert_eq!(ledger.free_cargo, 90);

        let owed = ledger.can_sell("Gold", "Sol", "Alpha").unwrap();
        ledger.apply(LedgerAction::Sell { commodity: "Gold", system: "Sol", station: "Alpha", quantity: owed }).unwrap();

        let gold = ledger.commodity("Gold").unwrap();
        assert!(gold.sell_at.is_empty());
        assert_eq!(gold.quantity, 0);
        assert_eq!(ledger.free_cargo, 100);
        assert_eq!(ledger.residual_obligations(), 0);
    }

    #[test]
    fn test_partial_sale_keeps_entry() {
        let mut ledger = create_test_ledger();
        ledger.stow("Gold", 10);
        ledger.apply(LedgerAction::Sell { commodity: "Gold", system: "Sol", station: "Alpha", quantity: 4 }).unwrap();

        assert_eq!(ledger.commodity("Gold").unwrap().owed_at("Sol", "Alpha"), Some(6));
    }

    #[test]
    fn test_buy_requires_free_cargo() {
        let mut ledger = Ledger::new(5);
        ledger.require("Gold", 10);
        ledger.record_obligation("Gold", "Sol", "Alpha", 10);

        assert_eq!(ledger.can_buy("Gold"), None);
        let err = ledger
            .apply(LedgerAction::Buy { commodity: "Gold", system: "Sol", station: "Gamma", quantity: 10 })
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientCargo { commodity: "Gold".to_string(), requested: 10, free: 5 }
        );
        assert_eq!(ledger.free_cargo, 5);
    }

    #[test]
    fn test_sale_without_obligation_is_rejected() {
        let mut ledger = create_test_ledger();
        let err = ledger
            .apply(LedgerAction::Sell { commodity: "Gold", system: "Sol", station: "Nowhere", quantity: 1 })
            .unwrap_err();
        assert!(matches!(err, LedgerError::NoObligation { .. }));

        let err = ledger
            .apply(LedgerAction::Sell { commodity: "Tea", system: "Sol", station: "Alpha", quantity: 1 })
            .unwrap_err();
        assert_eq!(err, LedgerError::UnknownCommodity("Tea".to_string()));
    }

    #[test]
    fn test_two_destinations_count_as_two_obligations() {
        let mut ledger = Ledger::new(100);
        ledger.apply(LedgerAction::RegisterObligation { commodity: "Germanium", system: "Sol", station: "Alpha", quantity: 5 }).unwrap();
        ledger.apply(LedgerAction::RegisterObligation { commodity: "Germanium", system: "Lave", station: "Station", quantity: 5 }).unwrap();
        ledger.require("Germanium", 10);

        assert_eq!(ledger.residual_obligations(), 2);
        assert_eq!(ledger.residual_needed(), 1);
    }

    #[test]
    fn test_commodities_keep_first_seen_order() {
        let mut ledger = Ledger::new(100);
        ledger.require("Zinc", 10);
        ledger.record_obligation("Zinc", "Sol", "Alpha", 10);
        ledger.record_obligation(DELIVERY, "Sol", "Alpha", 2);
        ledger.require("Apples", 5);
        ledger.record_obligation("Apples", "Sol", "Alpha", 5);

        let names: Vec<&str> = ledger.commodities().map(|ware| ware.name.as_str()).collect();
        assert_eq!(names, vec!["Zinc", DELIVERY, "Apples"]);
        let needed: Vec<(&str, u32)> = ledger.needed_in_order().collect();
        assert_eq!(needed, vec![("Zinc", 10), ("Apples", 5)]);
    }

    #[test]
    fn test_large_totals_saturate() {
        let mut ledger = Ledger::new(100);
        ledger.require("Gold", 3_000_000_000);
        ledger.require("Gold", 3_000_000_000);
        ledger.record_obligation("Gold", "Sol", "Alpha", 3_000_000_000);
        ledger.record_obligation("Gold", "Sol", "Alpha", 3_000_000_000);
        ledger.stow(DELIVERY, u32::MAX);
        ledger.stow(DELIVERY, 1);

        assert_eq!(ledger.needed_commodities()["Gold"], u32::MAX);
        assert_eq!(ledger.commodity("Gold").unwrap().owed_at("Sol", "Alpha"), Some(u32::MAX));
        assert_eq!(ledger.commodity(DELIVERY).unwrap().quantity, u32::MAX);
        assert_eq!(ledger.free_cargo, 0);
    }

    #[test]
    fn test_stow_clamps_free_cargo() {
        let mut ledger = Ledger::new(8);
        ledger.record_obligation(DELIVERY, "Sol", "Alpha", 10);
        ledger.stow(DELIVERY, 10);

        assert_eq!(ledger.free_cargo, 0);
        assert_eq!(ledger.commodity(DELIVERY).unwrap().quantity, 10);
        assert!(is_delivery("Delivery"));
    }
}
