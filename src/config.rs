use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::PlanError;
use crate::types::Origin;

/// Pounds per ton: prices are quoted per pound, orders are placed in tons.
pub const LB_PER_TON: f64 = 2000.0;

/// Immutable run configuration, built once at startup.
///
/// Every field has a default matching the reference planning workbook, so a
/// TOML file only needs to name what differs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Mass-unit conversion between price basis and order basis.
    pub unit_factor: f64,
    /// Shipping cost per ton-mile from an origin to a plant or storage.
    pub grove_rate: f64,
    /// Shipping cost per ton-mile from a storage to a market.
    pub market_rate: f64,
    /// The single origin where futures contracts mature.
    pub futures_origin: Origin,
    pub layout: TableLayout,
    pub flow: Option<FlowConfig>,
    pub solver: SolverConfig,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            unit_factor: LB_PER_TON,
            grove_rate: 0.22,
            market_rate: 1.2,
            futures_origin: Origin::Florida,
            layout: TableLayout::default(),
            flow: None,
            solver: SolverConfig::default(),
        }
    }
}

impl PlanConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, PlanError> {
        let config: PlanConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, PlanError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if !(self.unit_factor.is_finite() && self.unit_factor > 0.0) {
            return Err(PlanError::malformed("unit_factor must be a positive number"));
        }
        for (name, rate) in [("grove_rate", self.grove_rate), ("market_rate", self.market_rate)] {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(PlanError::malformed(format!(
                    "{name} must be a non-negative number, got {rate}"
                )));
            }
        }
        if let Some(flow) = &self.flow {
            if flow.supply.is_empty() || flow.sinks.is_empty() {
                return Err(PlanError::malformed(
                    "flow section needs at least one supply origin and one sink",
                ));
            }
        }
        Ok(())
    }
}

// ── Sheet layout ────────────────────────────────────────────────────────────

/// Origin-indexed grid: one row per origin (or per contract), values start at `col`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GridBlock {
    pub sheet: String,
    pub row: usize,
    pub col: usize,
}

impl GridBlock {
    fn new(sheet: &str, row: usize, col: usize) -> Self {
        Self {
            sheet: sheet.to_string(),
            row,
            col,
        }
    }
}

/// Fixed-size table of named rows: the label sits in `name_col`, values start at `value_col`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NamedTable {
    pub sheet: String,
    pub row: usize,
    pub rows: usize,
    pub name_col: usize,
    pub value_col: usize,
}

impl NamedTable {
    fn new(sheet: &str, row: usize, rows: usize) -> Self {
        Self {
            sheet: sheet.to_string(),
            row,
            rows,
            name_col: 0,
            value_col: 1,
        }
    }

    pub fn row_range(&self) -> std::ops::Range<usize> {
        self.row..self.row + self.rows
    }
}

/// Where each input table lives. Row and column indices are zero-based.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TableLayout {
    /// Raw monthly prices, one row per origin.
    pub prices: GridBlock,
    /// Monthly exchange rates, one row per foreign origin.
    pub exchange_rates: GridBlock,
    /// Weekly harvest ceilings, one row per origin, four columns per month.
    pub capacities: GridBlock,
    /// Requested monthly order volumes, one row per origin.
    pub requests: GridBlock,
    /// Three (multiplier, threshold) column pairs per origin row.
    pub multipliers: GridBlock,
    /// Futures contracts, one row per kind: weekly volume then 12 percentages.
    pub futures: GridBlock,
    /// Candidate plants: name and capacity.
    pub plants: NamedTable,
    /// Candidate storages: name and capacity.
    pub storages: NamedTable,
    /// Origin → facility distances: facility name, then one column per origin.
    pub distances: NamedTable,
    /// Shipment split fractions: facility name, then one column per origin.
    pub splits: NamedTable,
    /// Market → storage distances: market name, then one column per storage row.
    pub markets: NamedTable,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            prices: GridBlock::new("grove", 4, 2),
            exchange_rates: GridBlock::new("grove", 13, 2),
            capacities: GridBlock::new("grove", 37, 2),
            requests: GridBlock::new("raw_materials", 5, 2),
            multipliers: GridBlock::new("raw_materials", 16, 2),
            futures: GridBlock::new("futures", 1, 1),
            plants: NamedTable::new("plants", 1, 10),
            storages: NamedTable::new("storages", 1, 71),
            distances: NamedTable::new("grove_distances", 1, 81),
            splits: NamedTable::new("shipment_split", 1, 81),
            markets: NamedTable::new("market_distances", 1, 100),
        }
    }
}

impl TableLayout {
    /// Distinct sheets referenced by the layout, sorted.
    pub fn sheet_names(&self) -> Vec<&str> {
        let mut names = vec![
            self.prices.sheet.as_str(),
            self.exchange_rates.sheet.as_str(),
            self.capacities.sheet.as_str(),
            self.requests.sheet.as_str(),
            self.multipliers.sheet.as_str(),
            self.futures.sheet.as_str(),
            self.plants.sheet.as_str(),
            self.storages.sheet.as_str(),
            self.distances.sheet.as_str(),
            self.splits.sheet.as_str(),
            self.markets.sheet.as_str(),
        ];
        names.sort_unstable();
        names.dedup();
        names
    }
}

// ── Flow optimisation ───────────────────────────────────────────────────────

/// Reduced origin/destination set handed to the transportation solver.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlowConfig {
    /// Supply ceiling per participating origin.
    pub supply: BTreeMap<Origin, u64>,
    /// Destination facilities in solve order.
    pub sinks: Vec<SinkDemand>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SinkDemand {
    pub facility: String,
    pub demand: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub timeout_ms: Option<u64>,
}

impl SolverConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
