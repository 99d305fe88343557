//! End-to-end planning run over one set of input tables.

use tracing::{info, info_span};

use crate::config::PlanConfig;
use crate::error::PlanError;
use crate::futures::{read_contracts, schedule_futures, FuturesSchedule};
use crate::market::{match_markets, MarketAssignment};
use crate::network::{read_network, RouteDistance};
use crate::orders::{order_costs, plan_orders, OrderInputs};
use crate::pricing::{derive_prices, RawPrices};
use crate::shipment::{allocate_shipments, merge_futures, ShipmentLeg, ShipmentSplit};
use crate::source::TableSource;
use crate::transport::{CancelToken, FlowProblem, FlowSolution, SolveOptions};
use crate::types::{Monthly, OriginTable, Weekly};

/// Optimal reduced flow together with the problem it solves.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowPlan {
    pub problem: FlowProblem,
    pub solution: FlowSolution,
    pub pivots: usize,
}

/// Every table derived by one planning run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanReport {
    pub prices: OriginTable<Monthly>,
    pub orders: OriginTable<Weekly>,
    pub order_costs: OriginTable<Weekly>,
    pub futures: FuturesSchedule,
    /// Orders after the futures merge; the volumes actually shipped.
    pub shipped_volumes: OriginTable<Weekly>,
    pub distances: Vec<RouteDistance>,
    pub shipments: Vec<ShipmentLeg>,
    pub markets: Vec<MarketAssignment>,
    pub flow: Option<FlowPlan>,
}

impl PlanReport {
    pub fn total_order_cost(&self) -> f64 {
        self.order_costs
            .iter()
            .flat_map(|(_, weekly)| weekly.iter().flatten())
            .sum()
    }

    pub fn total_shipment_cost(&self) -> f64 {
        self.shipments.iter().map(ShipmentLeg::total_cost).sum()
    }

    pub fn total_market_cost(&self) -> f64 {
        self.markets.iter().map(|m| m.cost).sum()
    }
}

pub fn run_plan(source: &dyn TableSource, config: &PlanConfig) -> Result<PlanReport, PlanError> {
    run_plan_cancellable(source, config, None)
}

/// Like [`run_plan`], with a token that can abort the flow solve.
pub fn run_plan_cancellable(
    source: &dyn TableSource,
    config: &PlanConfig,
    cancel: Option<CancelToken>,
) -> Result<PlanReport, PlanError> {
    let _span = info_span!("plan").entered();
    config.validate()?;
    let layout = &config.layout;

    let raw = RawPrices::read(source, &layout.prices, &layout.exchange_rates)?;
    let prices = derive_prices(&raw)?;

    let inputs = OrderInputs::read(source, &layout.requests, &layout.multipliers, &layout.capacities)?;
    let orders = plan_orders(&inputs, &prices);
    let costs = order_costs(&prices, &orders, config.unit_factor);

    let contracts = read_contracts(source, &layout.futures)?;
    let futures = schedule_futures(&contracts);
    let shipped_volumes = merge_futures(&orders, &futures.total(), config.futures_origin);

    let network = read_network(source, layout)?;
    let split = ShipmentSplit::read(source, &layout.splits)?;
    let shipments = allocate_shipments(&shipped_volumes, &split, &network, config.grove_rate)?;
    let markets = match_markets(&network, config.market_rate)?;

    let flow = match &config.flow {
        Some(flow) => {
            let problem = FlowProblem::from_network(flow, &network, config.grove_rate)?;
            let outcome = problem.solve(&SolveOptions {
                timeout: config.solver.timeout(),
                cancel,
            });
            let pivots = outcome.pivots;
            info!(status = outcome.status.as_str(), pivots, "flow solve finished");
            let solution = outcome.into_result()?;
            Some(FlowPlan {
                problem,
                solution,
                pivots,
            })
        }
        None => None,
    };

    let report = PlanReport {
        prices,
        orders,
        order_costs: costs,
        futures,
        shipped_volumes,
        distances: network.distance_matrix(),
        shipments,
        markets,
        flow,
    };
    info!(
        order_cost = report.total_order_cost(),
        shipment_cost = report.total_shipment_cost(),
        market_cost = report.total_market_cost(),
        flow_cost = report.flow.as_ref().map(|f| f.solution.total_cost),
        "plan complete"
    );
    Ok(report)
}
