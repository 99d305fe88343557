use std::io::Write;

use grove_flowkit::config::PlanConfig;
use grove_flowkit::error::PlanError;
use grove_flowkit::futures::read_contracts;
use grove_flowkit::pipeline::{run_plan, run_plan_cancellable};
use grove_flowkit::shipment::ShipmentSplit;
use grove_flowkit::source::FrameSource;
use grove_flowkit::transport::{CancelToken, DUMMY_SINK};
use grove_flowkit::types::{Origin, MONTHS, WEEKS};
use grove_flowkit::ReportFrames;

/// Sparse sheet that grows to fit whatever cells are set.
struct Sheet {
    cells: Vec<Vec<String>>,
}

impl Sheet {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            cells: vec![vec![String::new(); cols]; rows],
        }
    }

    fn set(&mut self, row: usize, col: usize, value: impl ToString) -> &mut Self {
        self.cells[row][col] = value.to_string();
        self
    }

    fn set_row(&mut self, row: usize, col: usize, values: &[f64]) -> &mut Self {
        for (i, v) in values.iter().enumerate() {
            self.set(row, col + i, v);
        }
        self
    }
}

const DOMESTIC_PRICES: [f64; 4] = [1.0, 1.2, 0.9, 1.1];

struct Workbook {
    sheets: Vec<(&'static str, Sheet)>,
}

impl Workbook {
    fn fixture() -> Self {
        let mut grove = Sheet::new(44, 50);
        for (i, price) in DOMESTIC_PRICES.iter().enumerate() {
            grove.set_row(4 + i, 2, &[*price; MONTHS]);
        }
        grove.set_row(8, 2, &[0.5; MONTHS]).set_row(9, 2, &[0.6; MONTHS]);
        grove.set_row(13, 2, &[2.0; MONTHS]).set_row(14, 2, &[1.5; MONTHS]);
        for i in 0..Origin::ALL.len() {
            grove.set_row(37 + i, 2, &[120.0; MONTHS * WEEKS]);
        }

        let mut raw = Sheet::new(23, 14);
        for i in 0..Origin::ALL.len() {
            raw.set_row(5 + i, 2, &[100.0; MONTHS]);
            raw.set_row(16 + i, 2, &[1.5, 1.0, 1.0, 1.2, 0.5, 2.0]);
        }

        let mut futures = Sheet::new(3, 14);
        futures.set(1, 1, 100.0).set_row(1, 2, &[10.0; 10]);
        futures.set(2, 1, 50.0).set_row(2, 2, &[20.0; 5]);

        let mut plants = Sheet::new(11, 2);
        plants.set(0, 0, "plant").set(0, 1, "capacity");
        plants.set(1, 0, "P01").set(1, 1, 500);
        plants.set(2, 0, "P02").set(2, 1, 0);
        plants.set(3, 0, "P03").set(3, 1, 300);

        let mut storages = Sheet::new(72, 2);
        storages.set(1, 0, "S01").set(1, 1, 100);
        storages.set(2, 0, "S02").set(2, 1, 0);
        storages.set(3, 0, "S03").set(3, 1, 200);

        let mut distances = Sheet::new(82, 7);
        let routes: [(&str, [f64; 6]); 6] = [
            ("P01", [100.0, 200.0, 300.0, 400.0, 500.0, 600.0]),
            ("P02", [10.0, 10.0, 10.0, 10.0, 10.0, 10.0]),
            ("P03", [150.0, 120.0, 250.0, 350.0, 450.0, 550.0]),
            ("S01", [60.0, 70.0, 80.0, 90.0, 1000.0, 1100.0]),
            ("S02", [5.0, 5.0, 5.0, 5.0, 5.0, 5.0]),
            ("S03", [65.0, 75.0, 85.0, 95.0, 1050.0, 1150.0]),
        ];
        for (i, (name, row)) in routes.iter().enumerate() {
            distances.set(1 + i, 0, name).set_row(1 + i, 1, row);
        }

        let mut splits = Sheet::new(82, 7);
        for (i, (name, fraction)) in [("P01", 0.5), ("P03", 0.3), ("S01", 0.2)].iter().enumerate() {
            splits.set(1 + i, 0, name).set_row(1 + i, 1, &[*fraction; 6]);
        }

        let mut markets = Sheet::new(101, 73);
        markets.set(1, 0, "M1").set(1, 1, 50.0).set(1, 3, 30.0);
        markets.set(2, 0, "M2").set(2, 1, 40.0).set(2, 3, 40.0);
        markets.set(3, 0, "M3").set(3, 2, 10.0).set(3, 3, 70.0);

        Self {
            sheets: vec![
                ("grove", grove),
                ("raw_materials", raw),
                ("futures", futures),
                ("plants", plants),
                ("storages", storages),
                ("grove_distances", distances),
                ("shipment_split", splits),
                ("market_distances", markets),
            ],
        }
    }

    fn sheet(&mut self, name: &str) -> &mut Sheet {
        &mut self
            .sheets
            .iter_mut()
            .find(|(n, _)| *n == name)
            .unwrap()
            .1
    }

    fn source(&self) -> FrameSource {
        let mut source = FrameSource::new();
        for (name, sheet) in &self.sheets {
            source.insert_rows(name, &sheet.cells).unwrap();
        }
        source
    }

    fn write_csv(&self, dir: &std::path::Path) {
        for (name, sheet) in &self.sheets {
            let mut file = std::fs::File::create(dir.join(format!("{name}.csv"))).unwrap();
            for row in &sheet.cells {
                writeln!(file, "{}", row.join(",")).unwrap();
            }
        }
    }
}

fn flow_config() -> PlanConfig {
    PlanConfig::from_toml_str(
        r#"
        [flow]
        supply = { FLA = 1500, CAL = 1500 }

        [[flow.sinks]]
        facility = "P01"
        demand = 1000

        [[flow.sinks]]
        facility = "P03"
        demand = 1500
        "#,
    )
    .unwrap()
}

#[test]
fn full_run_derives_every_table() {
    let source = Workbook::fixture().source();
    let config = PlanConfig::default();
    let report = run_plan(&source, &config).unwrap();

    // Foreign prices are converted, domestic prices pass through.
    assert_eq!(report.prices[Origin::Florida][0], 1.0);
    assert_eq!(report.prices[Origin::Brazil][0], 1.0);
    assert_eq!(report.prices[Origin::Spain][0], 0.6 * 1.5);

    // FLA: price 1.0 equals the first threshold, falls to tier two (x1.0).
    // CAL: price 1.2 equals the second threshold, falls to tier three (x0.5).
    // TEX: price 0.9 takes tier one (x1.5) and is capped at 120 per week.
    assert_eq!(report.orders[Origin::Florida][0], [100.0; WEEKS]);
    assert_eq!(report.orders[Origin::California][0], [50.0; WEEKS]);
    assert_eq!(report.orders[Origin::Texas][0], [120.0; WEEKS]);

    for origin in Origin::ALL {
        for month in 0..MONTHS {
            for week in 0..WEEKS {
                let qty = report.orders[origin][month][week];
                assert!(qty <= 120.0);
                assert_eq!(
                    report.order_costs[origin][month][week],
                    config.unit_factor * report.prices[origin][month] * qty
                );
            }
        }
    }

    // Futures: 10% of 100 plus 20% of 50 in January, only at the futures origin.
    assert_eq!(report.futures.total()[0], 20.0);
    assert_eq!(report.shipped_volumes[Origin::Florida][0], [120.0; WEEKS]);
    assert_eq!(report.shipped_volumes[Origin::Florida][11], [100.0; WEEKS]);
    assert_eq!(report.shipped_volumes[Origin::Texas][0], [120.0; WEEKS]);

    // P02 and S02 are closed: four open facilities per origin.
    assert_eq!(report.distances.len(), Origin::ALL.len() * 4);
    assert!(report.distances.iter().all(|r| r.facility != "P02" && r.facility != "S02"));
    let kinds: Vec<&str> = report.distances[..4].iter().map(|r| r.kind.as_str()).collect();
    assert_eq!(kinds, vec!["plant", "plant", "storage", "storage"]);

    assert_eq!(report.shipments.len(), Origin::ALL.len() * 3 * MONTHS);
    let leg = report
        .shipments
        .iter()
        .find(|l| l.origin == Origin::Florida && l.facility == "P01" && l.month == 0)
        .unwrap();
    assert_eq!(leg.quantity, [60.0; WEEKS]);
    assert_eq!(leg.cost, [config.grove_rate * 100.0 * 0.5 * 120.0; WEEKS]);

    let matched: Vec<(&str, &str)> = report
        .markets
        .iter()
        .map(|m| (m.market.as_str(), m.storage.as_str()))
        .collect();
    assert_eq!(matched, vec![("M1", "S03"), ("M2", "S01"), ("M3", "S03")]);
    assert_eq!(report.markets[0].cost, 30.0 * config.market_rate);

    assert!(report.flow.is_none());
}

#[test]
fn rerun_on_identical_tables_is_identical() {
    let source = Workbook::fixture().source();
    let config = flow_config();
    let first = run_plan(&source, &config).unwrap();
    let second = run_plan(&source, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn fixture_futures_curves_sum_to_one_hundred() {
    let source = Workbook::fixture().source();
    let contracts = read_contracts(&source, &PlanConfig::default().layout.futures).unwrap();
    assert_eq!(contracts.len(), 2);
    assert!(contracts.iter().all(|c| c.curve_is_complete()));
}

#[test]
fn incomplete_futures_curve_still_plans() {
    let mut workbook = Workbook::fixture();
    workbook.sheet("futures").set(2, 2, 5.0);
    let source = workbook.source();
    let report = run_plan(&source, &PlanConfig::default()).unwrap();
    assert_eq!(report.futures.total()[0], 10.0 + 2.5);
}

#[test]
fn fixture_split_fractions_sum_to_one() {
    let source = Workbook::fixture().source();
    let split = ShipmentSplit::read(&source, &PlanConfig::default().layout.splits).unwrap();
    for origin in Origin::ALL {
        assert!((split.total(origin) - 1.0).abs() < 1e-9, "{origin}");
    }
}

#[test]
fn split_naming_closed_facility_is_missing_distance() {
    let mut workbook = Workbook::fixture();
    workbook.sheet("shipment_split").set(3, 0, "S02");
    let err = run_plan(&workbook.source(), &PlanConfig::default()).unwrap_err();
    assert!(matches!(err, PlanError::MissingDistance { ref facility, .. } if facility == "S02"));
}

#[test]
fn market_without_open_storage_fails() {
    let mut workbook = Workbook::fixture();
    workbook.sheet("market_distances").set(4, 0, "M4").set(4, 2, 15.0);
    let err = run_plan(&workbook.source(), &PlanConfig::default()).unwrap_err();
    assert!(matches!(err, PlanError::NoFacilityAvailable(ref m) if m == "M4"));
}

#[test]
fn non_numeric_price_is_malformed() {
    let mut workbook = Workbook::fixture();
    workbook.sheet("grove").set(4, 3, "n/a");
    let err = run_plan(&workbook.source(), &PlanConfig::default()).unwrap_err();
    assert!(matches!(err, PlanError::MalformedInput(_)));
}

#[test]
fn negative_price_is_malformed() {
    let mut workbook = Workbook::fixture();
    workbook.sheet("grove").set(6, 5, -0.9);
    let err = run_plan(&workbook.source(), &PlanConfig::default()).unwrap_err();
    assert!(matches!(err, PlanError::MalformedInput(ref msg) if msg.starts_with("TEX month 4")));
}

#[test]
fn flow_section_is_solved_to_optimality() {
    let source = Workbook::fixture().source();
    let config = flow_config();
    let report = run_plan(&source, &config).unwrap();
    let flow = report.flow.unwrap();

    let sinks: Vec<&str> = flow.problem.sinks().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(sinks, vec!["P01", "P03", DUMMY_SINK]);
    assert_eq!(flow.solution.flows, vec![vec![1000, 0, 500], vec![0, 1500, 0]]);
    let expected = config.grove_rate * (100.0 * 1000.0 + 120.0 * 1500.0);
    assert!((flow.solution.total_cost - expected).abs() < 1e-6);
}

#[test]
fn flow_short_of_demand_is_infeasible() {
    let source = Workbook::fixture().source();
    let mut config = flow_config();
    if let Some(flow) = config.flow.as_mut() {
        flow.supply.insert(Origin::Florida, 400);
        flow.supply.insert(Origin::California, 400);
    }
    assert!(matches!(run_plan(&source, &config), Err(PlanError::Infeasible(_))));
}

#[test]
fn cancelled_flow_solve_surfaces_as_error() {
    let source = Workbook::fixture().source();
    let token = CancelToken::new();
    token.cancel();
    let err = run_plan_cancellable(&source, &flow_config(), Some(token)).unwrap_err();
    assert!(matches!(err, PlanError::Cancelled(_)));

    let mut config = flow_config();
    config.solver.timeout_ms = Some(0);
    assert!(matches!(run_plan(&source, &config), Err(PlanError::Timeout(_))));
}

#[test]
fn csv_workbook_matches_in_memory_workbook() {
    let workbook = Workbook::fixture();
    let dir = tempfile::tempdir().unwrap();
    workbook.write_csv(dir.path());

    let config = flow_config();
    let sheets = config.layout.sheet_names();
    let from_csv = FrameSource::from_csv_dir(dir.path(), &sheets).unwrap();
    let expected = run_plan(&workbook.source(), &config).unwrap();
    assert_eq!(run_plan(&from_csv, &config).unwrap(), expected);

    let out = dir.path().join("out");
    let frames = ReportFrames::build(&expected).unwrap();
    frames.write_csv(&out).unwrap();
    assert!(out.join("flows.csv").exists());
    assert_eq!(frames.summary.height(), Origin::ALL.len());
}
