use std::path::PathBuf;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;

use crate::config::PlanConfig;
use crate::pipeline::{run_plan, PlanReport};
use crate::report::ReportFrames;
use crate::schema;
use crate::source::{read_sheet_csv, FrameSource};

#[pyclass]
pub struct PlanModel {
    base_path: PathBuf,
    config: PlanConfig,
    report: Option<PlanReport>,
    frames: Option<ReportFrames>,
}

#[pymethods]
impl PlanModel {
    /// `base_path` holds one header-less `<sheet>.csv` per input sheet.
    /// `config_path` optionally points at a TOML file overriding the defaults.
    #[new]
    #[pyo3(signature = (base_path, config_path=None))]
    fn new(base_path: String, config_path: Option<String>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => PlanConfig::from_path(path)?,
            None => PlanConfig::default(),
        };
        Ok(Self {
            base_path: PathBuf::from(base_path),
            config,
            report: None,
            frames: None,
        })
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load one input sheet as an all-string DataFrame, exactly as the planner sees it.
    fn load_sheet(&self, sheet: &str) -> PyResult<PyDataFrame> {
        let df = read_sheet_csv(self.base_path.join(format!("{sheet}.csv")))?;
        Ok(PyDataFrame(df))
    }

    fn sheet_names(&self) -> Vec<String> {
        self.config
            .layout
            .sheet_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    // ── Planning ────────────────────────────────────────────────────────────

    /// Run every stage and return the per-origin summary.
    fn run(&mut self, py: Python<'_>) -> PyResult<PyDataFrame> {
        let sheets = self.config.layout.sheet_names();
        let source = FrameSource::from_csv_dir(&self.base_path, &sheets)?;
        let config = &self.config;
        let report = py.allow_threads(|| run_plan(&source, config))?;
        let frames = ReportFrames::build(&report)?;
        let summary = frames.summary.clone();
        self.report = Some(report);
        self.frames = Some(frames);
        Ok(PyDataFrame(summary))
    }

    fn orders(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.frames()?.orders.clone()))
    }

    fn futures(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.frames()?.futures.clone()))
    }

    fn distances(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.frames()?.distances.clone()))
    }

    fn shipments(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.frames()?.shipments.clone()))
    }

    fn markets(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.frames()?.markets.clone()))
    }

    /// `None` when the configuration has no flow section.
    fn flows(&self) -> PyResult<Option<PyDataFrame>> {
        Ok(self.frames()?.flows.clone().map(PyDataFrame))
    }

    fn total_costs(&self) -> PyResult<(f64, f64, f64)> {
        let report = self.report()?;
        Ok((
            report.total_order_cost(),
            report.total_shipment_cost(),
            report.total_market_cost(),
        ))
    }

    fn write_report(&self, dir: String) -> PyResult<()> {
        self.frames()?.write_csv(dir)?;
        Ok(())
    }
}

impl PlanModel {
    fn report(&self) -> PyResult<&PlanReport> {
        self.report
            .as_ref()
            .ok_or_else(|| PyValueError::new_err("No plan yet. Call run() first."))
    }

    fn frames(&self) -> PyResult<&ReportFrames> {
        self.frames
            .as_ref()
            .ok_or_else(|| PyValueError::new_err("No plan yet. Call run() first."))
    }
}

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let keys = PyModule::new(m.py(), "keys")?;
    keys.add("ORIGIN", schema::keys::ORIGIN)?;
    keys.add("MONTH", schema::keys::MONTH)?;
    keys.add("WEEK", schema::keys::WEEK)?;
    keys.add("FACILITY", schema::keys::FACILITY)?;
    keys.add("FACILITY_KIND", schema::keys::FACILITY_KIND)?;
    m.add_submodule(&keys)?;

    let orders = PyModule::new(m.py(), "orders")?;
    orders.add("PRICE", schema::orders::PRICE)?;
    orders.add("ORDER_QTY", schema::orders::ORDER_QTY)?;
    orders.add("ORDER_COST", schema::orders::ORDER_COST)?;
    orders.add("SHIPPED_QTY", schema::orders::SHIPPED_QTY)?;
    m.add_submodule(&orders)?;

    let futures = PyModule::new(m.py(), "futures")?;
    futures.add("CONTRACT", schema::futures::CONTRACT)?;
    futures.add("ARRIVAL_QTY", schema::futures::ARRIVAL_QTY)?;
    m.add_submodule(&futures)?;

    let shipment = PyModule::new(m.py(), "shipment")?;
    shipment.add("QUANTITY", schema::shipment::QUANTITY)?;
    shipment.add("SHIPPING_COST", schema::shipment::SHIPPING_COST)?;
    m.add_submodule(&shipment)?;

    let routes = PyModule::new(m.py(), "routes")?;
    routes.add("DISTANCE", schema::routes::DISTANCE)?;
    m.add_submodule(&routes)?;

    let market = PyModule::new(m.py(), "market")?;
    market.add("MARKET", schema::market::MARKET)?;
    market.add("STORAGE", schema::market::STORAGE)?;
    market.add("DISTANCE", schema::market::DISTANCE)?;
    market.add("SHIPPING_COST", schema::market::SHIPPING_COST)?;
    m.add_submodule(&market)?;

    let flow = PyModule::new(m.py(), "flow")?;
    flow.add("SOURCE", schema::flow::SOURCE)?;
    flow.add("SINK", schema::flow::SINK)?;
    flow.add("UNIT_COST", schema::flow::UNIT_COST)?;
    flow.add("FLOW", schema::flow::FLOW)?;
    flow.add("FLOW_COST", schema::flow::FLOW_COST)?;
    m.add_submodule(&flow)?;

    let summary = PyModule::new(m.py(), "summary")?;
    summary.add("TOTAL_ORDER_QTY", schema::summary::TOTAL_ORDER_QTY)?;
    summary.add("TOTAL_ORDER_COST", schema::summary::TOTAL_ORDER_COST)?;
    summary.add("TOTAL_SHIPPING_COST", schema::summary::TOTAL_SHIPPING_COST)?;
    m.add_submodule(&summary)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // A host application may already own the global subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    m.add_class::<PlanModel>()?;
    add_schema_exports(m)?;
    Ok(())
}
