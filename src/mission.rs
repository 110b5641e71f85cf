//! Module for parsing mission data.
//!
//! Missions are kept in a tab-separated text file, one obligation per line:
//!
//! ```text
//! I'm at	Beta	Sol
//! Alpha	Sol	Gold	10
//! Hub	Lave	Delivery	4
//! ```
//!
//! The `I'm at` line declares where the ship currently is. Any other line
//! must carry exactly four fields; everything else is skipped.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const ORIGIN_MARKER: &str = "I'm at";

/// A single delivery obligation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub station: String,
    pub system: String,
    /// Commodity to bring, or the delivery sentinel for cargo already aboard
    pub commodity: String,
    pub quantity: u32,
}

impl Mission {
    pub fn new(station: &str, system: &str, commodity: &str, quantity: u32) -> Self {
        Mission {
            station: station.to_string(),
            system: system.to_string(),
            commodity: commodity.to_string(),
            quantity,
        }
    }

    /// Parse one `station<TAB>system<TAB>commodity<TAB>quantity` line.
    pub fn from_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
        if parts.len() != 4 {
            return None;
        }
        let quantity = parts[3].trim().parse().ok()?;
        Some(Mission::new(parts[0], parts[1], parts[2], quantity))
    }
}

/// A (system, station) pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Site {
    pub system: String,
    pub station: String,
}

impl Site {
    pub fn new(system: &str, station: &str) -> Self {
        Site {
            system: system.to_string(),
            station: station.to_string(),
        }
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in {}", self.station, self.system)
    }
}

/// All missions plus the optional starting point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionSet {
    pub origin: Option<Site>,
    pub missions: Vec<Mission>,
}

impl MissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_origin(mut self, system: &str, station: &str) -> Self {
        self.origin = Some(Site::new(system, station));
        self
    }

    pub fn push(&mut self, mission: Mission) {
        self.missions.push(mission);
    }

    /// Parse mission text. Malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut set = MissionSet::new();

        for (number, line) in text.lines().enumerate() {
            if line.contains(ORIGIN_MARKER) {
                let parts: Vec<&str> = line.split('\t').collect();
                if parts.len() >= 3 {
                    set.origin = Some(Site::new(parts[2].trim(), parts[1].trim()));
                } else {
                    log::debug!("line {}: origin line without station and system", number + 1);
                }
                continue;
            }

            match Mission::from_line(line) {
                Some(mission) => set.missions.push(mission),
                None => {
                    if !line.trim().is_empty() {
                        log::debug!("line {}: skipping malformed mission {:?}", number + 1, line);
                    }
                }
            }
        }

        set
    }

    /// Load and parse a mission file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(&path).map_err(|source| Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }
}
