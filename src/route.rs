//! Route search: find an ordering of stations that settles as many missions
//! as possible with a single visit per station.
//!
//! Every candidate ordering is simulated on a fresh copy of the baseline
//! ledger: sell whatever is owed and fully in the hold, then buy every needed
//! commodity that fits in one go. The best ordering is the one leaving the
//! fewest open deliveries, then the fewest commodities still to buy.
//!
//! Up to [`SearchConfig::exhaustive_limit`] stations every permutation is
//! tried. Beyond that the stations are shuffled randomly for a fixed number of
//! trials. Both stop as soon as a route settles every mission.

use crate::commodity::{Ledger, LedgerAction};
use crate::mission::Site;
use crate::trader::{Location, Trader};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Route search configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Largest number of stations searched exhaustively
    pub exhaustive_limit: usize,
    /// Number of random shuffles tried above the exhaustive limit
    pub random_trials: usize,
    /// Report progress every this many trials
    pub progress_interval: usize,
    /// Random seed
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            exhaustive_limit: 9,
            random_trials: 400_023,
            progress_interval: 1000,
            seed: 42,
        }
    }
}

/// One step of the itinerary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Buy { quantity: u32, commodity: String, site: Site },
    Sell { quantity: u32, commodity: String, site: Site },
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Buy { quantity, commodity, site } => {
                write!(f, "BUY {} of {} at {}", quantity, commodity, site)
            }
            Instruction::Sell { quantity, commodity, site } => {
                write!(f, "SELL {} of {} at {}", quantity, commodity, site)
            }
        }
    }
}

/// How the orderings were generated
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SearchMode {
    Exhaustive,
    Random,
}

/// Result of simulating one ordering
#[derive(Debug, Clone)]
pub struct Trial {
    pub ledger: Ledger,
    pub instructions: Vec<Instruction>,
    pub residual_obligations: usize,
    pub residual_needed: usize,
}

/// Best route seen so far
#[derive(Debug, Clone)]
pub struct BestRoute {
    /// Ledger state at the end of the route
    pub ledger: Ledger,
    /// Stations in visiting order, origin excluded
    pub route: Vec<Location>,
    pub instructions: Vec<Instruction>,
    pub residual_obligations: usize,
    pub residual_needed: usize,
}

impl BestRoute {
    fn untouched(ledger: &Ledger) -> Self {
        BestRoute {
            ledger: ledger.clone(),
            route: Vec::new(),
            instructions: Vec::new(),
            residual_obligations: ledger.residual_obligations(),
            residual_needed: ledger.residual_needed(),
        }
    }

    /// Whether a trial beats this route: fewer open deliveries without more
    /// to buy, or as many open deliveries with less to buy.
    pub fn is_beaten_by(&self, residual_obligations: usize, residual_needed: usize) -> bool {
        let fewer_missions = residual_obligations < self.residual_obligations
            && residual_needed <= self.residual_needed;
        let fewer_purchases = residual_obligations == self.residual_obligations
            && residual_needed < self.residual_needed;
        fewer_missions || fewer_purchases
    }
}

/// Snapshot passed to observers while searching
#[derive(Debug, Clone, Copy)]
pub struct SearchProgress {
    pub mode: SearchMode,
    pub trials: usize,
    /// Total number of trials planned, if it fits in a `usize`
    pub total: Option<usize>,
    pub best_residual_obligations: usize,
}

/// Hooks for following a search. All methods default to doing nothing.
pub trait SearchObserver {
    fn on_start(&mut self, _progress: &SearchProgress) {}
    fn on_progress(&mut self, _progress: &SearchProgress) {}
    fn on_improvement(&mut self, _best: &BestRoute, _trials: usize) {}
    fn on_finish(&mut self, _outcome: &SearchOutcome) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl SearchObserver for NoopObserver {}

/// Observer that reports through the `log` facade
pub struct LogObserver;

impl SearchObserver for LogObserver {
    fn on_start(&mut self, progress: &SearchProgress) {
        log::info!(
            "{:?} search, {} routes planned",
            progress.mode,
            progress.total.map_or_else(|| "too many".to_string(), |t| t.to_string())
        );
    }

    fn on_progress(&mut self, progress: &SearchProgress) {
        log::info!(
            "Went through {} routes. Best run so far left {} mission(s) open",
            progress.trials,
            progress.best_residual_obligations
        );
    }

    fn on_improvement(&mut self, best: &BestRoute, trials: usize) {
        log::debug!(
            "trial {}: {} mission(s) open, {} commodities to buy",
            trials,
            best.residual_obligations,
            best.residual_needed
        );
    }
}

/// Final result of a search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub mode: SearchMode,
    pub trials: usize,
    pub origin: Option<Location>,
    pub best: BestRoute,
}

impl SearchOutcome {
    /// Every mission can be finished without revisiting a station
    pub fn is_perfect(&self) -> bool {
        self.best.residual_obligations == 0
    }
}

/// Searches station orderings for the route with the fewest revisits.
pub struct RouteFinder {
    baseline: Ledger,
    origin: Option<Location>,
    locations: Vec<Location>,
    config: SearchConfig,
    best: Option<BestRoute>,
    trials: usize,
}

impl RouteFinder {
    pub fn new(trader: &Trader, config: SearchConfig) -> Self {
        Self::from_parts(trader.ledger().clone(), trader.origin(), trader.locations(), config)
    }

    pub fn from_parts(baseline: Ledger, origin: Option<Location>, locations: Vec<Location>, config: SearchConfig) -> Self {
        RouteFinder {
            baseline,
            origin,
            locations,
            config,
            best: None,
            trials: 0,
        }
    }

    fn best_residual_obligations(&self) -> usize {
        self.best
            .as_ref()
            .map_or_else(|| self.baseline.residual_obligations(), |b| b.residual_obligations)
    }

    fn sell_at_location(ledger: &mut Ledger, location: &Location, instructions: &mut Vec<Instruction>) {
        let Site { system, station } = &location.site;
        let sales: Vec<(String, u32)> = ledger
            .commodities()
            .filter_map(|ware| {
                ledger
                    .can_sell(&ware.name, system, station)
                    .map(|quantity| (ware.name.clone(), quantity))
            })
            .collect();

        for (commodity, quantity) in sales {
            let action = LedgerAction::Sell { commodity: &commodity, system, station, quantity };
            if ledger.apply(action).is_ok() {
                instructions.push(Instruction::Sell { quantity, commodity, site: location.site.clone() });
            }
        }
    }

    fn buy_at_location(ledger: &mut Ledger, location: &Location, instructions: &mut Vec<Instruction>) {
        let Site { system, station } = &location.site;
        let wanted: Vec<String> = ledger
            .needed_in_order()
            .filter(|(commodity, _)| location.commodities.contains(*commodity))
            .map(|(commodity, _)| commodity.to_string())
            .collect();

        // Wholesale only: the full amount or nothing.
        for commodity in wanted {
            let Some(quantity) = ledger.can_buy(&commodity) else {
                continue;
            };
            let action = LedgerAction::Buy { commodity: &commodity, system, station, quantity };
            if ledger.apply(action).is_ok() {
                ledger.fulfil_need(&commodity);
                instructions.push(Instruction::Buy { quantity, commodity, site: location.site.clone() });
            }
        }
    }

    /// Simulate visiting the origin and then `order` (indices into the
    /// station list) on a fresh copy of the baseline ledger.
    pub fn fly_route(&self, order: &[usize]) -> Trial {
        let mut ledger = self.baseline.clone();
        let mut instructions = Vec::new();

        let stops = self.origin.iter().chain(order.iter().filter_map(|&i| self.locations.get(i)));
        for location in stops {
            Self::sell_at_location(&mut ledger, location, &mut instructions);
            Self::buy_at_location(&mut ledger, location, &mut instructions);
        }

        Trial {
            residual_obligations: ledger.residual_obligations(),
            residual_needed: ledger.residual_needed(),
            ledger,
            instructions,
        }
    }

    fn progress(&self, mode: SearchMode, total: Option<usize>) -> SearchProgress {
        SearchProgress {
            mode,
            trials: self.trials,
            total,
            best_residual_obligations: self.best_residual_obligations(),
        }
    }

    /// Run one trial and keep it if it beats the best so far. Returns true
    /// once a perfect route is known.
    fn try_route(&mut self, order: &[usize], mode: SearchMode, total: Option<usize>, observer: &mut dyn SearchObserver) -> bool {
        let trial = self.fly_route(order);
        self.trials += 1;

        let improves = self
            .best
            .as_ref()
            .map_or(true, |best| best.is_beaten_by(trial.residual_obligations, trial.residual_needed));
        if improves {
            let best = BestRoute {
                route: order.iter().filter_map(|&i| self.locations.get(i).cloned()).collect(),
                ledger: trial.ledger,
                instructions: trial.instructions,
                residual_obligations: trial.residual_obligations,
                residual_needed: trial.residual_needed,
            };
            observer.on_improvement(&best, self.trials);
            self.best = Some(best);
        }

        if self.config.progress_interval > 0 && self.trials % self.config.progress_interval == 0 {
            observer.on_progress(&self.progress(mode, total));
        }

        self.best_residual_obligations() == 0
    }

    fn compute_all_permutations(&mut self, observer: &mut dyn SearchObserver) {
        let total = factorial(self.locations.len());
        observer.on_start(&self.progress(SearchMode::Exhaustive, total));

        let mut order: Vec<usize> = (0..self.locations.len()).collect();
        loop {
            if self.try_route(&order, SearchMode::Exhaustive, total, observer) {
                break;
            }
            if !next_permutation(&mut order) {
                break;
            }
        }
    }

    fn compute_random_routes(&mut self, observer: &mut dyn SearchObserver) {
        let total = Some(self.config.random_trials);
        observer.on_start(&self.progress(SearchMode::Random, total));

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..self.locations.len()).collect();
        for _ in 0..self.config.random_trials {
            order.shuffle(&mut rng);
            if self.try_route(&order, SearchMode::Random, total, observer) {
                break;
            }
        }
    }

    /// Search for the best route and report progress to `observer`.
    pub fn find_route(&mut self, observer: &mut dyn SearchObserver) -> SearchOutcome {
        log::info!("{} stations need to be visited", self.locations.len());

        let mode = if self.locations.len() <= self.config.exhaustive_limit {
            self.compute_all_permutations(observer);
            SearchMode::Exhaustive
        } else {
            self.compute_random_routes(observer);
            SearchMode::Random
        };

        let outcome = SearchOutcome {
            mode,
            trials: self.trials,
            origin: self.origin.clone(),
            best: self
                .best
                .clone()
                .unwrap_or_else(|| BestRoute::untouched(&self.baseline)),
        };
        observer.on_finish(&outcome);
        outcome
    }
}

/// n!, or `None` on overflow
fn factorial(n: usize) -> Option<usize> {
    (1..=n).try_fold(1usize, |acc, k| acc.checked_mul(k))
}

/// Advance to the next lexicographic permutation. Returns false after the last one.
fn next_permutation(order: &mut [usize]) -> bool {
    if order.len() < 2 {
        return false;
    }

    let mut i = order.len() - 1;
    while i > 0 && order[i - 1] >= order[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }

    let mut j = order.len() - 1;
    while order[j] <= order[i - 1] {
        j -= 1;
    }
    order.swap(i - 1, j);
    order[i..].reverse();
    true
}
