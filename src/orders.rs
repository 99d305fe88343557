//! Order planning: tiered scaling of requested volumes, weekly capacity
//! capping, and order costing.

use tracing::debug;

use crate::config::GridBlock;
use crate::error::PlanError;
use crate::source::TableSource;
use crate::types::{monthly_from_slice, Monthly, OriginTable, Weekly, MONTHS, WEEKS};

pub const TIER_COUNT: usize = 3;

/// A price bracket: orders are scaled by `multiplier` while the price is
/// strictly below `threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiplierTier {
    pub multiplier: f64,
    pub threshold: f64,
}

/// The three brackets of one origin, in evaluation order.
pub type Tiers = [MultiplierTier; TIER_COUNT];

/// Inputs that are read, not derived.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderInputs {
    pub requests: OriginTable<Monthly>,
    pub tiers: OriginTable<Tiers>,
    pub capacities: OriginTable<Weekly>,
}

impl OrderInputs {
    pub fn read(
        source: &dyn TableSource,
        requests: &GridBlock,
        multipliers: &GridBlock,
        capacities: &GridBlock,
    ) -> Result<Self, PlanError> {
        let requests = OriginTable::try_from_fn(|origin| {
            let row = source.row(
                &requests.sheet,
                requests.row + origin.index(),
                requests.col..requests.col + MONTHS,
            )?;
            monthly_from_slice(&row, &format!("{origin} requested orders"))
        })?;

        let tiers = OriginTable::try_from_fn(|origin| {
            let row = multipliers.row + origin.index();
            let mut tiers = [MultiplierTier {
                multiplier: 0.0,
                threshold: 0.0,
            }; TIER_COUNT];
            for (i, tier) in tiers.iter_mut().enumerate() {
                let col = multipliers.col + 2 * i;
                tier.multiplier = source.cell(&multipliers.sheet, row, col)?;
                tier.threshold = source.cell(&multipliers.sheet, row, col + 1)?;
            }
            check_tiers(&tiers).map_err(|msg| PlanError::malformed(format!("{origin} {msg}")))?;
            Ok::<_, PlanError>(tiers)
        })?;

        let capacities = OriginTable::try_from_fn(|origin| {
            let row = source.row(
                &capacities.sheet,
                capacities.row + origin.index(),
                capacities.col..capacities.col + MONTHS * WEEKS,
            )?;
            weekly_from_slice(&row, &format!("{origin} harvest capacity"))
        })?;

        Ok(Self {
            requests,
            tiers,
            capacities,
        })
    }
}

/// Thresholds must partition the price axis: strictly increasing.
fn check_tiers(tiers: &Tiers) -> Result<(), String> {
    for (i, pair) in tiers.windows(2).enumerate() {
        if pair[0].threshold >= pair[1].threshold {
            return Err(format!(
                "multiplier tiers: threshold {} ({}) is not below threshold {} ({})",
                i + 1,
                pair[0].threshold,
                i + 2,
                pair[1].threshold
            ));
        }
    }
    Ok(())
}

fn weekly_from_slice(values: &[f64], what: &str) -> Result<Weekly, PlanError> {
    if values.len() != MONTHS * WEEKS {
        return Err(PlanError::malformed(format!(
            "{what}: expected {} weekly values, got {}",
            MONTHS * WEEKS,
            values.len()
        )));
    }
    let mut weekly = [[0.0; WEEKS]; MONTHS];
    for (month, chunk) in values.chunks_exact(WEEKS).enumerate() {
        weekly[month].copy_from_slice(chunk);
    }
    Ok(weekly)
}

/// Scale a requested volume by the first tier whose threshold lies strictly
/// above `price`. A price at or above every threshold stops ordering.
pub fn tiered_scale(requested: f64, price: f64, tiers: &Tiers) -> f64 {
    tiers
        .iter()
        .find(|tier| price < tier.threshold)
        .map_or(0.0, |tier| requested * tier.multiplier)
}

/// Give every week the same uncapped monthly figure, capped by that week's harvest.
pub fn cap_by_week(monthly_order: f64, capacity: &[f64; WEEKS]) -> [f64; WEEKS] {
    capacity.map(|cap| if monthly_order > cap { cap } else { monthly_order })
}

/// Tiered, capacity-capped weekly orders for every origin.
pub fn plan_orders(
    inputs: &OrderInputs,
    prices: &OriginTable<Monthly>,
) -> OriginTable<Weekly> {
    OriginTable::from_fn(|origin| {
        let mut weekly = [[0.0; WEEKS]; MONTHS];
        for (month, week_orders) in weekly.iter_mut().enumerate() {
            let scaled = tiered_scale(
                inputs.requests[origin][month],
                prices[origin][month],
                &inputs.tiers[origin],
            );
            *week_orders = cap_by_week(scaled, &inputs.capacities[origin][month]);
        }
        debug!(%origin, total = weekly.iter().flatten().sum::<f64>(), "planned orders");
        weekly
    })
}

/// `unit_factor × price × order` for every origin, month and week.
pub fn order_costs(
    prices: &OriginTable<Monthly>,
    orders: &OriginTable<Weekly>,
    unit_factor: f64,
) -> OriginTable<Weekly> {
    OriginTable::from_fn(|origin| {
        let mut cost = [[0.0; WEEKS]; MONTHS];
        for month in 0..MONTHS {
            let price = prices[origin][month];
            cost[month] = orders[origin][month].map(|qty| unit_factor * price * qty);
        }
        cost
    })
}
