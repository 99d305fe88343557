//! Origin → facility shipment allocation.

use tracing::{debug, info};

use crate::config::NamedTable;
use crate::error::PlanError;
use crate::network::Network;
use crate::source::TableSource;
use crate::types::{Monthly, Origin, OriginTable, Weekly, MONTHS, WEEKS};

const SPLIT_TOLERANCE: f64 = 1e-6;

/// Fraction of an origin's volume routed to each facility, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentSplit {
    pub fractions: OriginTable<Vec<(String, f64)>>,
}

impl ShipmentSplit {
    pub fn read(source: &dyn TableSource, table: &NamedTable) -> Result<Self, PlanError> {
        let mut fractions = OriginTable::from_fn(|_| Vec::new());
        for row in table.row_range() {
            let name = source.label(&table.sheet, row, table.name_col)?;
            if name.is_empty() {
                continue;
            }
            for origin in Origin::ALL {
                let fraction = source.cell(&table.sheet, row, table.value_col + origin.index())?;
                if fraction != 0.0 {
                    fractions[origin].push((name.clone(), fraction));
                }
            }
        }
        Ok(Self { fractions })
    }

    pub fn total(&self, origin: Origin) -> f64 {
        self.fractions[origin].iter().map(|(_, f)| f).sum()
    }

    /// Every origin that ships anything must route exactly all of it.
    pub fn validate(&self, volumes: &OriginTable<Weekly>) -> Result<(), PlanError> {
        for (origin, legs) in self.fractions.iter() {
            if let Some((name, f)) = legs.iter().find(|(_, f)| *f < 0.0 || !f.is_finite()) {
                return Err(PlanError::malformed(format!(
                    "{origin} → {name}: invalid split fraction {f}"
                )));
            }
            let ships = volumes[origin].iter().flatten().any(|v| *v > 0.0);
            let total = self.total(origin);
            if ships && (total - 1.0).abs() > SPLIT_TOLERANCE {
                return Err(PlanError::malformed(format!(
                    "{origin}: split fractions sum to {total}, expected 1.0"
                )));
            }
        }
        Ok(())
    }
}

/// One origin → facility shipment for one month.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentLeg {
    pub origin: Origin,
    pub facility: String,
    pub month: usize,
    pub quantity: [f64; WEEKS],
    pub cost: [f64; WEEKS],
}

impl ShipmentLeg {
    pub fn total_quantity(&self) -> f64 {
        self.quantity.iter().sum()
    }

    pub fn total_cost(&self) -> f64 {
        self.cost.iter().sum()
    }
}

/// Add the monthly futures arrival to every weekly order of `futures_origin`.
///
/// The monthly figure lands undivided on each of the four weeks.
pub fn merge_futures(
    orders: &OriginTable<Weekly>,
    futures: &Monthly,
    futures_origin: Origin,
) -> OriginTable<Weekly> {
    orders.map(|origin, weekly| {
        if origin != futures_origin {
            return *weekly;
        }
        let mut merged = *weekly;
        for (month, weeks) in merged.iter_mut().enumerate() {
            for qty in weeks.iter_mut() {
                *qty += futures[month];
            }
        }
        merged
    })
}

/// Split every origin's volume over its facilities and price each leg by
/// `rate × distance × fraction × volume`.
pub fn allocate_shipments(
    volumes: &OriginTable<Weekly>,
    split: &ShipmentSplit,
    network: &Network,
    rate: f64,
) -> Result<Vec<ShipmentLeg>, PlanError> {
    split.validate(volumes)?;

    let mut legs = Vec::new();
    for (origin, targets) in split.fractions.iter() {
        for (facility, fraction) in targets {
            let distance = network.distance(origin, facility)?;
            for month in 0..MONTHS {
                let volume = &volumes[origin][month];
                legs.push(ShipmentLeg {
                    origin,
                    facility: facility.clone(),
                    month,
                    quantity: volume.map(|v| v * fraction),
                    cost: volume.map(|v| rate * distance * fraction * v),
                });
            }
            debug!(%origin, %facility, distance, fraction, "allocated shipment legs");
        }
    }

    info!(
        legs = legs.len(),
        quantity = legs.iter().map(ShipmentLeg::total_quantity).sum::<f64>(),
        cost = legs.iter().map(ShipmentLeg::total_cost).sum::<f64>(),
        "allocated shipments"
    );
    Ok(legs)
}
