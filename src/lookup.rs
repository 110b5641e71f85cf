//! Location/commodity lookup.
//!
//! Maps a station identifier to the station's name, system, distance from the
//! arrival point, kind and the commodities it offers. The lookup is already
//! filtered for the ship (see [`crate::database`]); the planner only reads it.

use crate::commodity::StationKind;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// One reachable station with a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    pub name: String,
    pub system: String,
    /// Distance from the arrival point in the system
    pub distance: f64,
    pub kind: StationKind,
    /// Commodities on sale in sufficient supply
    pub commodities: Vec<String>,
}

impl StationRecord {
    pub fn new(name: &str, system: &str, distance: f64, kind: StationKind, commodities: &[&str]) -> Self {
        StationRecord {
            name: name.to_string(),
            system: system.to_string(),
            distance,
            kind,
            commodities: commodities.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn offers(&self, commodity: &str) -> bool {
        self.commodities.iter().any(|c| c == commodity)
    }
}

/// Station id -> station record. Station names are not unique, ids are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationLookup {
    stations: BTreeMap<u64, StationRecord>,
}

impl StationLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u64, record: StationRecord) {
        self.stations.insert(id, record);
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&StationRecord> {
        self.stations.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut StationRecord> {
        self.stations.get_mut(&id)
    }

    /// Iterate over stations in id order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &StationRecord)> {
        self.stations.iter().map(|(id, record)| (*id, record))
    }

    /// Find a station by system and station name
    pub fn find(&self, system: &str, station: &str) -> Option<&StationRecord> {
        self.stations
            .values()
            .find(|record| record.system == system && record.name == station)
    }

    /// Check whether any station offers a commodity (case-insensitive).
    pub fn find_commodity(&self, commodity: &str) -> bool {
        self.stations.values().any(|record| {
            record
                .commodities
                .iter()
                .any(|c| c.eq_ignore_ascii_case(commodity))
        })
    }

    /// Load a lookup previously written with [`StationLookup::save`]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
