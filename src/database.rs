//! Building the station lookup from raw reference data.
//!
//! The reference data consists of four local files: populated systems with
//! coordinates (JSON), stations (JSON), commodity names (JSON) and market
//! listings (CSV). Only stations the ship can actually use are kept:
//! reachable within the jump budget from the origin system, close enough to
//! the arrival point, with a market and a pad the ship fits on. Listings below
//! the minimum supply are dropped.

use crate::commodity::StationKind;
use crate::error::{Error, Result};
use crate::lookup::{StationLookup, StationRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Landing pad size the ship requires
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PadSize {
    Medium,
    Large,
}

/// Ship and pilot parameters that decide which stations are relevant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipParameters {
    /// Cargo capacity in tons
    pub cargo: u32,
    /// Laden jump range in light years
    pub jump_range: f64,
    /// Maximum number of jumps (one way) to fetch a commodity
    pub max_jumps: u32,
    pub pad_size: PadSize,
    /// Maximum distance of a station from the arrival point, in light seconds
    pub max_distance: f64,
    /// Minimum supply for a listing to count
    pub minimum_supply: u32,
}

impl Default for ShipParameters {
    fn default() -> Self {
        ShipParameters {
            cargo: 512,
            jump_range: 20.0,
            max_jumps: 8,
            pad_size: PadSize::Large,
            max_distance: 2500.0,
            minimum_supply: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSystem {
    pub id: u64,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawStation {
    pub id: u64,
    pub name: String,
    pub system_id: u64,
    #[serde(rename = "type", default)]
    pub station_type: Option<String>,
    #[serde(default)]
    pub distance_to_star: Option<f64>,
    #[serde(default)]
    pub max_landing_pad_size: Option<String>,
    #[serde(default)]
    pub has_market: Option<bool>,
    #[serde(default)]
    pub has_commodities: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawCommodity {
    pub id: u64,
    pub name: String,
}

/// One row of the listings table. Other columns are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawListing {
    pub station_id: u64,
    pub commodity_id: u64,
    pub supply: u64,
}

/// Locations of the raw reference files
#[derive(Debug, Clone)]
pub struct ReferencePaths {
    pub systems: PathBuf,
    pub stations: PathBuf,
    pub commodities: PathBuf,
    pub listings: PathBuf,
}

impl ReferencePaths {
    /// The usual file names inside one directory
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        ReferencePaths {
            systems: dir.join("systems_populated.json"),
            stations: dir.join("stations.json"),
            commodities: dir.join("commodities.json"),
            listings: dir.join("listings.csv"),
        }
    }
}

/// Raw reference data held in memory
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub systems: Vec<RawSystem>,
    pub stations: Vec<RawStation>,
    pub commodities: Vec<RawCommodity>,
    pub listings: Vec<RawListing>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn read_listings(path: &Path) -> Result<Vec<RawListing>> {
    let csv_error = |source| Error::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<RawListing>, _>>()
        .map_err(csv_error)
}

impl ReferenceData {
    pub fn load(paths: &ReferencePaths) -> Result<Self> {
        log::info!("Loading reference data ...");
        Ok(ReferenceData {
            systems: read_json(&paths.systems)?,
            stations: read_json(&paths.stations)?,
            commodities: read_json(&paths.commodities)?,
            listings: read_listings(&paths.listings)?,
        })
    }

    fn home_system(&self, origin_system: &str) -> Result<&RawSystem> {
        self.systems
            .iter()
            .find(|system| system.name == origin_system)
            .ok_or_else(|| Error::UnknownSystem(origin_system.to_string()))
    }

    /// Systems within `max_jumps` jumps of the origin, as id -> name.
    pub fn relevant_systems(&self, origin_system: &str, params: &ShipParameters) -> Result<HashMap<u64, String>> {
        let home = self.home_system(origin_system)?;
        let reach = params.jump_range * f64::from(params.max_jumps);

        let relevant: HashMap<u64, String> = self
            .systems
            .iter()
            .filter(|system| {
                let dx = home.x - system.x;
                let dy = home.y - system.y;
                let dz = home.z - system.z;
                (dx * dx + dy * dy + dz * dz).sqrt() <= reach
            })
            .map(|system| (system.id, system.name.clone()))
            .collect();

        log::info!("{} systems within {} jumps of {}", relevant.len(), params.max_jumps, origin_system);
        Ok(relevant)
    }

    /// Build the lookup of usable stations and their well-supplied commodities.
    pub fn build_lookup(&self, origin_system: &str, params: &ShipParameters) -> Result<StationLookup> {
        let systems = self.relevant_systems(origin_system, params)?;
        let mut lookup = StationLookup::new();

        for station in &self.stations {
            let Some(system) = systems.get(&station.system_id) else {
                continue;
            };
            if !station_fits(station, params) {
                continue;
            }
            let kind = StationKind::from_type_name(station.station_type.as_deref().unwrap_or(""));
            let distance = station.distance_to_star.unwrap_or_default();
            lookup.insert(station.id, StationRecord::new(&station.name, system, distance, kind, &[]));
        }

        let names: HashMap<u64, &str> = self
            .commodities
            .iter()
            .map(|commodity| (commodity.id, commodity.name.as_str()))
            .collect();

        for listing in &self.listings {
            if listing.supply < u64::from(params.minimum_supply) {
                continue;
            }
            let Some(record) = lookup.get_mut(listing.station_id) else {
                continue;
            };
            match names.get(&listing.commodity_id) {
                Some(name) => record.commodities.push(name.to_string()),
                None => log::debug!("listing for unknown commodity id {}", listing.commodity_id),
            }
        }

        log::info!("{} relevant stations", lookup.len());
        Ok(lookup)
    }
}

/// Distance, pad and market requirements for a single station
fn station_fits(station: &RawStation, params: &ShipParameters) -> bool {
    match station.distance_to_star {
        Some(distance) if distance > 0.0 && distance <= params.max_distance => {}
        _ => return false,
    }

    // Small and medium pads are always present; only large ships are picky.
    match station.max_landing_pad_size.as_deref() {
        None | Some("") => return false,
        Some(pad) if params.pad_size == PadSize::Large && !pad.eq_ignore_ascii_case("l") => return false,
        _ => {}
    }

    station.has_market.unwrap_or(false) && station.has_commodities.unwrap_or(false)
}
