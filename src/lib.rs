//! Trade Mission Solver Library
//!
//! Plans a trading route for a set of pickup/delivery missions so that as
//! many missions as possible are finished while visiting every station once.
//!
//! # Features
//!
//! - Mission file parsing with an optional starting point
//! - Commodity ledger with wholesale-only buying and selling
//! - Selection of a minimal set of extra stations to buy from
//! - Exhaustive or seeded random search over station orderings
//! - Station lookup built from local reference data
//!
//! # Example
//!
//! ```no_run
//! use trade_mission_solver::lookup::StationLookup;
//! use trade_mission_solver::mission::MissionSet;
//! use trade_mission_solver::route::{LogObserver, RouteFinder, SearchConfig};
//! use trade_mission_solver::trader::Trader;
//!
//! let missions = MissionSet::from_file("missions.txt").unwrap();
//! let lookup = StationLookup::from_file("lookup.json").unwrap();
//!
//! let trader = Trader::new(&missions, &lookup, 512);
//! let mut finder = RouteFinder::new(&trader, SearchConfig::default());
//! let outcome = finder.find_route(&mut LogObserver);
//!
//! for instruction in &outcome.best.instructions {
//!     println!("{}", instruction);
//! }
//! ```

pub mod commodity;
pub mod database;
pub mod error;
pub mod lookup;
pub mod mission;
pub mod report;
pub mod route;
pub mod trader;

pub use error::{Error, Result};
pub use mission::MissionSet;
pub use report::RouteReport;
pub use route::{RouteFinder, SearchConfig};
pub use trader::Trader;
