//! Printable and serializable summary of a search outcome.

use crate::error::{Error, Result};
use crate::route::{SearchMode, SearchOutcome};
use crate::trader::Location;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A delivery that is still open at the end of the route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenDelivery {
    pub system: String,
    pub station: String,
    pub quantity: u32,
}

/// Remaining state of one commodity that still has open deliveries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualCommodity {
    pub commodity: String,
    /// Amount in the hold after the last stop
    pub in_cargo: u32,
    pub open: Vec<OpenDelivery>,
}

/// Summary of the best route found
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteReport {
    pub mode: SearchMode,
    pub trials: usize,
    pub origin: Option<Location>,
    /// Stations in visiting order, origin excluded
    pub route: Vec<Location>,
    /// Human-readable itinerary
    pub instructions: Vec<String>,
    pub residual_obligations: usize,
    pub residual_needed: usize,
    pub residual: Vec<ResidualCommodity>,
    pub free_cargo: u32,
}

impl RouteReport {
    pub fn from_outcome(outcome: &SearchOutcome) -> Self {
        let best = &outcome.best;
        let residual = best
            .ledger
            .commodities()
            .filter(|ware| !ware.sell_at.is_empty())
            .map(|ware| ResidualCommodity {
                commodity: ware.name.clone(),
                in_cargo: ware.quantity,
                open: ware
                    .sell_at
                    .iter()
                    .flat_map(|(system, stations)| {
                        stations.iter().map(move |(station, quantity)| OpenDelivery {
                            system: system.clone(),
                            station: station.clone(),
                            quantity: *quantity,
                        })
                    })
                    .collect(),
            })
            .collect();

        RouteReport {
            mode: outcome.mode,
            trials: outcome.trials,
            origin: outcome.origin.clone(),
            route: best.route.clone(),
            instructions: best.instructions.iter().map(ToString::to_string).collect(),
            residual_obligations: best.residual_obligations,
            residual_needed: best.residual_needed,
            residual,
            free_cargo: best.ledger.free_cargo,
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl std::fmt::Display for RouteReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(origin) = &self.origin {
            writeln!(f, "Starting at {}", origin.site)?;
            if !origin.commodities.is_empty() {
                let sold: Vec<&str> = origin.commodities.iter().map(String::as_str).collect();
                writeln!(f, "  Available here: {}", sold.join(", "))?;
            }
        }

        writeln!(f, "Route ({:?} search, {} routes tried):", self.mode, self.trials)?;
        for instruction in &self.instructions {
            writeln!(f, "  {}", instruction)?;
        }

        if self.residual_obligations == 0 {
            return writeln!(f, "All missions can be finished in one visit per station.");
        }

        writeln!(
            f,
            "{} delivery(ies) left open, {} commodity(ies) still to buy:",
            self.residual_obligations, self.residual_needed
        )?;
        for ware in &self.residual {
            writeln!(f, "  {} ({} in cargo)", ware.commodity, ware.in_cargo)?;
            for open in &ware.open {
                writeln!(f, "    {} to {} in {}", open.quantity, open.station, open.system)?;
            }
        }
        Ok(())
    }
}
