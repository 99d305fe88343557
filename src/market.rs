use tracing::info;

use crate::error::PlanError;
use crate::network::Network;

/// Nearest open storage serving a market.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketAssignment {
    pub market: String,
    pub storage: String,
    pub distance: f64,
    pub cost: f64,
}

/// Nearest open storage for one market; ties keep the storage listed first.
pub fn match_market(network: &Network, market: &str, rate: f64) -> Result<MarketAssignment, PlanError> {
    let mut best: Option<(&str, f64)> = None;
    for storage in network.open_storages() {
        let Some(distance) = network.market_distance(&storage.name, market) else {
            continue;
        };
        if best.map_or(true, |(_, min)| distance < min) {
            best = Some((&storage.name, distance));
        }
    }

    let (storage, distance) =
        best.ok_or_else(|| PlanError::NoFacilityAvailable(market.to_string()))?;
    Ok(MarketAssignment {
        market: market.to_string(),
        storage: storage.to_string(),
        distance,
        cost: distance * rate,
    })
}

pub fn match_markets(network: &Network, rate: f64) -> Result<Vec<MarketAssignment>, PlanError> {
    let assignments = network
        .markets()
        .iter()
        .map(|market| match_market(network, market, rate))
        .collect::<Result<Vec<_>, _>>()?;
    info!(markets = assignments.len(), "matched markets to storages");
    Ok(assignments)
}
