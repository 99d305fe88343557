//! Long-format polars frames built from a [`PlanReport`].
//!
//! Every frame uses the column names in [`crate::schema`]. Months and weeks
//! are printed one-based.

use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::error::PlanError;
use crate::pipeline::PlanReport;
use crate::schema::{flow, futures, keys, market, orders, routes, shipment, summary};
use crate::types::{Origin, MONTHS, WEEKS};

#[derive(Debug, Clone)]
pub struct ReportFrames {
    pub orders: DataFrame,
    pub futures: DataFrame,
    pub distances: DataFrame,
    pub shipments: DataFrame,
    pub markets: DataFrame,
    pub flows: Option<DataFrame>,
    pub summary: DataFrame,
}

impl ReportFrames {
    pub fn build(report: &PlanReport) -> Result<Self, PlanError> {
        let orders = orders_frame(report)?;
        let shipments = shipments_frame(report)?;
        let summary = origin_summary(&orders, &shipments)?;
        Ok(Self {
            orders,
            futures: futures_frame(report)?,
            distances: distances_frame(report)?,
            shipments,
            markets: markets_frame(report)?,
            flows: flows_frame(report)?,
            summary,
        })
    }

    /// Frames keyed by the file stem they are written under.
    pub fn named(&self) -> Vec<(&'static str, &DataFrame)> {
        let mut frames = vec![
            ("orders", &self.orders),
            ("futures", &self.futures),
            ("distances", &self.distances),
            ("shipments", &self.shipments),
            ("markets", &self.markets),
            ("summary", &self.summary),
        ];
        if let Some(flows) = &self.flows {
            frames.push(("flows", flows));
        }
        frames
    }

    /// Write every frame as `<dir>/<name>.csv` with a header row.
    pub fn write_csv<P: AsRef<Path>>(&self, dir: P) -> Result<(), PlanError> {
        std::fs::create_dir_all(dir.as_ref())?;
        for (name, frame) in self.named() {
            let path = dir.as_ref().join(format!("{name}.csv"));
            let mut file = File::create(&path)?;
            let mut frame = frame.clone();
            CsvWriter::new(&mut file).include_header(true).finish(&mut frame)?;
        }
        info!(dir = %dir.as_ref().display(), "wrote report frames");
        Ok(())
    }
}

fn origin_codes(n: usize, origin: Origin, into: &mut Vec<String>) {
    into.extend(std::iter::repeat(origin.code().to_string()).take(n));
}

/// One row per origin, month and week.
fn orders_frame(report: &PlanReport) -> Result<DataFrame, PlanError> {
    let rows = Origin::ALL.len() * MONTHS * WEEKS;
    let mut origin_col = Vec::with_capacity(rows);
    let mut month_col = Vec::with_capacity(rows);
    let mut week_col = Vec::with_capacity(rows);
    let mut price_col = Vec::with_capacity(rows);
    let mut qty_col = Vec::with_capacity(rows);
    let mut cost_col = Vec::with_capacity(rows);
    let mut shipped_col = Vec::with_capacity(rows);

    for origin in Origin::ALL {
        origin_codes(MONTHS * WEEKS, origin, &mut origin_col);
        for month in 0..MONTHS {
            for week in 0..WEEKS {
                month_col.push(month as u32 + 1);
                week_col.push(week as u32 + 1);
                price_col.push(report.prices[origin][month]);
                qty_col.push(report.orders[origin][month][week]);
                cost_col.push(report.order_costs[origin][month][week]);
                shipped_col.push(report.shipped_volumes[origin][month][week]);
            }
        }
    }

    let df = DataFrame::new(vec![
        Column::new(keys::ORIGIN.into(), &origin_col),
        Column::new(keys::MONTH.into(), &month_col),
        Column::new(keys::WEEK.into(), &week_col),
        Column::new(orders::PRICE.into(), &price_col),
        Column::new(orders::ORDER_QTY.into(), &qty_col),
        Column::new(orders::ORDER_COST.into(), &cost_col),
        Column::new(orders::SHIPPED_QTY.into(), &shipped_col),
    ])?;
    Ok(df)
}

fn futures_frame(report: &PlanReport) -> Result<DataFrame, PlanError> {
    let mut contract_col = Vec::new();
    let mut month_col = Vec::new();
    let mut qty_col = Vec::new();
    for (kind, monthly) in &report.futures.arrivals {
        for (month, qty) in monthly.iter().enumerate() {
            contract_col.push(kind.as_str().to_string());
            month_col.push(month as u32 + 1);
            qty_col.push(*qty);
        }
    }
    let df = DataFrame::new(vec![
        Column::new(futures::CONTRACT.into(), &contract_col),
        Column::new(keys::MONTH.into(), &month_col),
        Column::new(futures::ARRIVAL_QTY.into(), &qty_col),
    ])?;
    Ok(df)
}

fn distances_frame(report: &PlanReport) -> Result<DataFrame, PlanError> {
    let routes_iter = || report.distances.iter();
    let origins: Vec<String> = routes_iter().map(|r| r.origin.code().to_string()).collect();
    let facilities: Vec<String> = routes_iter().map(|r| r.facility.clone()).collect();
    let kinds: Vec<String> = routes_iter().map(|r| r.kind.as_str().to_string()).collect();
    let distances: Vec<f64> = routes_iter().map(|r| r.distance).collect();
    let df = DataFrame::new(vec![
        Column::new(keys::ORIGIN.into(), &origins),
        Column::new(keys::FACILITY.into(), &facilities),
        Column::new(keys::FACILITY_KIND.into(), &kinds),
        Column::new(routes::DISTANCE.into(), &distances),
    ])?;
    Ok(df)
}

/// One row per leg and week.
fn shipments_frame(report: &PlanReport) -> Result<DataFrame, PlanError> {
    let rows = report.shipments.len() * WEEKS;
    let mut origin_col = Vec::with_capacity(rows);
    let mut facility_col = Vec::with_capacity(rows);
    let mut month_col = Vec::with_capacity(rows);
    let mut week_col = Vec::with_capacity(rows);
    let mut qty_col = Vec::with_capacity(rows);
    let mut cost_col = Vec::with_capacity(rows);

    for leg in &report.shipments {
        origin_codes(WEEKS, leg.origin, &mut origin_col);
        for week in 0..WEEKS {
            facility_col.push(leg.facility.clone());
            month_col.push(leg.month as u32 + 1);
            week_col.push(week as u32 + 1);
            qty_col.push(leg.quantity[week]);
            cost_col.push(leg.cost[week]);
        }
    }

    let df = DataFrame::new(vec![
        Column::new(keys::ORIGIN.into(), &origin_col),
        Column::new(keys::FACILITY.into(), &facility_col),
        Column::new(keys::MONTH.into(), &month_col),
        Column::new(keys::WEEK.into(), &week_col),
        Column::new(shipment::QUANTITY.into(), &qty_col),
        Column::new(shipment::SHIPPING_COST.into(), &cost_col),
    ])?;
    Ok(df)
}

fn markets_frame(report: &PlanReport) -> Result<DataFrame, PlanError> {
    let names: Vec<String> = report.markets.iter().map(|m| m.market.clone()).collect();
    let storages: Vec<String> = report.markets.iter().map(|m| m.storage.clone()).collect();
    let distances: Vec<f64> = report.markets.iter().map(|m| m.distance).collect();
    let costs: Vec<f64> = report.markets.iter().map(|m| m.cost).collect();
    let df = DataFrame::new(vec![
        Column::new(market::MARKET.into(), &names),
        Column::new(market::STORAGE.into(), &storages),
        Column::new(market::DISTANCE.into(), &distances),
        Column::new(market::SHIPPING_COST.into(), &costs),
    ])?;
    Ok(df)
}

/// Non-zero flows of the optimal solution, dummy sink included.
fn flows_frame(report: &PlanReport) -> Result<Option<DataFrame>, PlanError> {
    let Some(plan) = &report.flow else {
        return Ok(None);
    };
    let mut source_col = Vec::new();
    let mut sink_col = Vec::new();
    let mut unit_col = Vec::new();
    let mut flow_col = Vec::new();
    let mut cost_col = Vec::new();
    for (i, source) in plan.problem.sources().iter().enumerate() {
        for (j, sink) in plan.problem.sinks().iter().enumerate() {
            let qty = plan.solution.flows[i][j];
            if qty == 0 {
                continue;
            }
            let unit = plan.problem.cost(i, j);
            source_col.push(source.name.clone());
            sink_col.push(sink.name.clone());
            unit_col.push(unit);
            flow_col.push(qty);
            cost_col.push(unit * qty as f64);
        }
    }
    let df = DataFrame::new(vec![
        Column::new(flow::SOURCE.into(), &source_col),
        Column::new(flow::SINK.into(), &sink_col),
        Column::new(flow::UNIT_COST.into(), &unit_col),
        Column::new(flow::FLOW.into(), &flow_col),
        Column::new(flow::FLOW_COST.into(), &cost_col),
    ])?;
    Ok(Some(df))
}

/// Per-origin totals of ordered volume, order cost and shipping cost.
fn origin_summary(orders_df: &DataFrame, shipments_df: &DataFrame) -> Result<DataFrame, PlanError> {
    let order_totals = orders_df.clone().lazy().group_by_stable([col(keys::ORIGIN)]).agg([
        col(orders::ORDER_QTY).sum().alias(summary::TOTAL_ORDER_QTY),
        col(orders::ORDER_COST).sum().alias(summary::TOTAL_ORDER_COST),
    ]);
    let shipping_totals = shipments_df
        .clone()
        .lazy()
        .group_by_stable([col(keys::ORIGIN)])
        .agg([col(shipment::SHIPPING_COST).sum().alias(summary::TOTAL_SHIPPING_COST)]);

    let df = order_totals
        .left_join(shipping_totals, col(keys::ORIGIN), col(keys::ORIGIN))
        .with_column(col(summary::TOTAL_SHIPPING_COST).fill_null(lit(0.0)))
        .collect()?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::futures::{ContractKind, FuturesSchedule};
    use crate::market::MarketAssignment;
    use crate::network::RouteDistance;
    use crate::shipment::ShipmentLeg;
    use crate::types::{FacilityKind, OriginTable, ZERO_MONTHLY, ZERO_WEEKLY};

    fn report() -> PlanReport {
        let orders = OriginTable::from_fn(|origin| {
            if origin == Origin::Texas {
                [[2.0; WEEKS]; MONTHS]
            } else {
                ZERO_WEEKLY
            }
        });
        PlanReport {
            prices: OriginTable::from_fn(|_| [1.5; MONTHS]),
            order_costs: orders.map(|_, w| w.map(|week| week.map(|q| q * 3000.0))),
            shipped_volumes: orders.clone(),
            orders,
            futures: FuturesSchedule {
                arrivals: vec![(ContractKind::Fruit, ZERO_MONTHLY)],
            },
            distances: vec![RouteDistance {
                origin: Origin::Texas,
                facility: "P01".to_string(),
                kind: FacilityKind::Plant,
                distance: 100.0,
            }],
            shipments: vec![ShipmentLeg {
                origin: Origin::Texas,
                facility: "P01".to_string(),
                month: 0,
                quantity: [2.0; WEEKS],
                cost: [44.0; WEEKS],
            }],
            markets: vec![MarketAssignment {
                market: "M1".to_string(),
                storage: "S01".to_string(),
                distance: 10.0,
                cost: 12.0,
            }],
            flow: None,
        }
    }

    #[test]
    fn orders_frame_is_long_format() {
        let frames = ReportFrames::build(&report()).unwrap();
        assert_eq!(frames.orders.height(), Origin::ALL.len() * MONTHS * WEEKS);
        assert_eq!(frames.futures.height(), MONTHS);
        assert_eq!(frames.shipments.height(), WEEKS);
        assert!(frames.flows.is_none());
        assert_eq!(frames.named().len(), 6);
    }

    #[test]
    fn summary_totals_by_origin() {
        let frames = ReportFrames::build(&report()).unwrap();
        let totals = &frames.summary;
        assert_eq!(totals.height(), Origin::ALL.len());

        let origins = totals.column(keys::ORIGIN).unwrap().str().unwrap();
        let qty = totals.column(summary::TOTAL_ORDER_QTY).unwrap().f64().unwrap();
        let shipping = totals.column(summary::TOTAL_SHIPPING_COST).unwrap().f64().unwrap();
        let texas = (0..totals.height())
            .find(|&i| origins.get(i) == Some("TEX"))
            .unwrap();
        assert_eq!(qty.get(texas), Some(2.0 * (MONTHS * WEEKS) as f64));
        assert_eq!(shipping.get(texas), Some(176.0));
        assert_eq!(shipping.get((texas + 1) % totals.height()), Some(0.0));
    }

    #[test]
    fn writes_one_csv_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        ReportFrames::build(&report()).unwrap().write_csv(dir.path()).unwrap();
        for name in ["orders", "futures", "distances", "shipments", "markets", "summary"] {
            assert!(dir.path().join(format!("{name}.csv")).exists(), "{name}.csv missing");
        }
        let text = std::fs::read_to_string(dir.path().join("markets.csv")).unwrap();
        assert!(text.starts_with("market,storage,distance,shipping_cost"));
    }
}
