//! Minimum-cost transportation solver.
//!
//! Minimizes Σ cost × flow subject to `Σ_sink flow ≤ supply` per source and
//! `Σ_source flow ≥ demand` per sink, with non-negative integer flows.
//!
//! The problem is balanced with an internal slack column, started from
//! Vogel's approximation and improved with MODI potentials and stepping-stone
//! pivots. Entering and leaving cells follow Bland's rule, so degenerate
//! bases cannot cycle. Integer supplies and demands give integer vertices.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::FlowConfig;
use crate::error::PlanError;
use crate::network::Network;

pub const DUMMY_SINK: &str = "Dummy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Supply {
    Limited(u64),
    /// No ceiling: the source may ship as much as the sinks take.
    Unlimited,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowSource {
    pub name: String,
    pub supply: Supply,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowSink {
    pub name: String,
    pub demand: u64,
}

/// Bipartite sources × sinks problem with a dense cost matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowProblem {
    sources: Vec<FlowSource>,
    sinks: Vec<FlowSink>,
    costs: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Timeout,
    Cancelled,
}

impl SolveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SolveStatus::Optimal => "Optimal",
            SolveStatus::Infeasible => "Infeasible",
            SolveStatus::Unbounded => "Unbounded",
            SolveStatus::Timeout => "Timeout",
            SolveStatus::Cancelled => "Cancelled",
        }
    }
}

/// Shared flag a caller can raise to stop a running solve.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SolveOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowSolution {
    /// `flows[source][sink]`.
    pub flows: Vec<Vec<u64>>,
    pub total_cost: f64,
}

impl FlowSolution {
    pub fn shipped_from(&self, source: usize) -> u64 {
        self.flows[source].iter().sum()
    }

    pub fn received_by(&self, sink: usize) -> u64 {
        self.flows.iter().map(|row| row[sink]).sum()
    }
}

/// Terminal state of a solve: a status, plus the solution when optimal.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowOutcome {
    pub status: SolveStatus,
    pub solution: Option<FlowSolution>,
    pub pivots: usize,
    pub detail: String,
}

impl FlowOutcome {
    fn failed(status: SolveStatus, pivots: usize, detail: String) -> Self {
        Self {
            status,
            solution: None,
            pivots,
            detail,
        }
    }

    pub fn into_result(self) -> Result<FlowSolution, PlanError> {
        match (self.status, self.solution) {
            (SolveStatus::Optimal, Some(solution)) => Ok(solution),
            (SolveStatus::Infeasible, _) => Err(PlanError::Infeasible(self.detail)),
            (SolveStatus::Unbounded, _) => Err(PlanError::Unbounded(self.detail)),
            (SolveStatus::Timeout, _) => Err(PlanError::Timeout(self.pivots)),
            (SolveStatus::Cancelled, _) => Err(PlanError::Cancelled(self.pivots)),
            (SolveStatus::Optimal, None) => Err(PlanError::Infeasible(
                "optimal status without a solution".to_string(),
            )),
        }
    }
}

impl FlowProblem {
    pub fn new(
        sources: Vec<FlowSource>,
        sinks: Vec<FlowSink>,
        costs: Vec<Vec<f64>>,
    ) -> Result<Self, PlanError> {
        if sources.is_empty() || sinks.is_empty() {
            return Err(PlanError::malformed(
                "flow problem needs at least one source and one sink",
            ));
        }
        if costs.len() != sources.len() || costs.iter().any(|row| row.len() != sinks.len()) {
            return Err(PlanError::malformed(format!(
                "cost matrix must be {} x {}",
                sources.len(),
                sinks.len()
            )));
        }
        if costs.iter().flatten().any(|c| !c.is_finite()) {
            return Err(PlanError::malformed("cost matrix contains a non-finite value"));
        }
        Ok(Self {
            sources,
            sinks,
            costs,
        })
    }

    /// Reduced problem over configured origins and facilities, costed by
    /// `distance × rate`, with a dummy sink absorbing surplus supply.
    pub fn from_network(flow: &FlowConfig, network: &Network, rate: f64) -> Result<Self, PlanError> {
        let mut sources = Vec::with_capacity(flow.supply.len());
        let mut costs = Vec::with_capacity(flow.supply.len());
        for (&origin, &supply) in &flow.supply {
            sources.push(FlowSource {
                name: origin.code().to_string(),
                supply: Supply::Limited(supply),
            });
            let row = flow
                .sinks
                .iter()
                .map(|sink| network.distance(origin, &sink.facility).map(|d| d * rate))
                .collect::<Result<Vec<_>, _>>()?;
            costs.push(row);
        }
        let sinks = flow
            .sinks
            .iter()
            .map(|s| FlowSink {
                name: s.facility.clone(),
                demand: s.demand,
            })
            .collect();
        Ok(Self::new(sources, sinks, costs)?.with_dummy_sink())
    }

    /// Append a zero-cost sink taking up the surplus of capped supply over demand.
    /// Problems with an uncapped source or no surplus are returned unchanged.
    pub fn with_dummy_sink(mut self) -> Self {
        let mut supply = 0u64;
        for source in &self.sources {
            match source.supply {
                Supply::Limited(s) => supply = supply.saturating_add(s),
                Supply::Unlimited => return self,
            }
        }
        let demand = self.total_demand();
        if supply > demand {
            self.sinks.push(FlowSink {
                name: DUMMY_SINK.to_string(),
                demand: supply - demand,
            });
            for row in &mut self.costs {
                row.push(0.0);
            }
        }
        self
    }

    pub fn sources(&self) -> &[FlowSource] {
        &self.sources
    }

    pub fn sinks(&self) -> &[FlowSink] {
        &self.sinks
    }

    pub fn cost(&self, source: usize, sink: usize) -> f64 {
        self.costs[source][sink]
    }

    pub fn total_demand(&self) -> u64 {
        self.sinks
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.demand))
    }

    pub fn solve(&self, options: &SolveOptions) -> FlowOutcome {
        let demand_total = self.total_demand();

        for (i, source) in self.sources.iter().enumerate() {
            if source.supply == Supply::Unlimited && self.costs[i].iter().any(|c| *c < 0.0) {
                return FlowOutcome::failed(
                    SolveStatus::Unbounded,
                    0,
                    format!("uncapped source {} has a negative-cost route", source.name),
                );
            }
        }

        let supply: Vec<u64> = self
            .sources
            .iter()
            .map(|s| match s.supply {
                Supply::Limited(cap) => cap,
                Supply::Unlimited => demand_total,
            })
            .collect();
        let supply_total = supply.iter().fold(0u64, |acc, s| acc.saturating_add(*s));
        if supply_total < demand_total {
            return FlowOutcome::failed(
                SolveStatus::Infeasible,
                0,
                format!("total supply {supply_total} is below total demand {demand_total}"),
            );
        }

        // Surplus goes either unused (cost 0) or, if cheaper, as extra flow
        // to the source's most negative sink.
        let surplus = supply_total - demand_total;
        let n = self.sinks.len();
        let excess_target: Vec<Option<usize>> = self
            .costs
            .iter()
            .map(|row| {
                let (j, c) = row
                    .iter()
                    .enumerate()
                    .fold((0, row[0]), |best, (j, &c)| if c < best.1 { (j, c) } else { best });
                (c < 0.0).then_some(j)
            })
            .collect();

        let mut demand: Vec<u64> = self.sinks.iter().map(|s| s.demand).collect();
        let mut costs = self.costs.clone();
        if surplus > 0 {
            demand.push(surplus);
            for (row, target) in costs.iter_mut().zip(&excess_target) {
                let slack_cost = target.map_or(0.0, |j| row[j]);
                row.push(slack_cost);
            }
        }

        let mut tableau = Tableau::vogel(&supply, &demand, costs);
        let deadline = options.timeout.map(|t| Instant::now() + t);
        let pivots = match tableau.optimize(deadline, options.cancel.as_ref()) {
            Ok(pivots) => pivots,
            Err(Interrupt::Timeout(p)) => {
                return FlowOutcome::failed(SolveStatus::Timeout, p, "deadline reached".into())
            }
            Err(Interrupt::Cancelled(p)) => {
                return FlowOutcome::failed(SolveStatus::Cancelled, p, "cancelled".into())
            }
        };

        let mut flows: Vec<Vec<u64>> = tableau.flow.iter().map(|row| row[..n].to_vec()).collect();
        if surplus > 0 {
            for (i, target) in excess_target.iter().enumerate() {
                if let Some(j) = target {
                    flows[i][*j] += tableau.flow[i][n];
                }
            }
        }
        let total_cost: f64 = flows
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().enumerate().map(move |(j, &x)| (i, j, x)))
            .map(|(i, j, x)| self.costs[i][j] * x as f64)
            .sum();

        info!(
            sources = self.sources.len(),
            sinks = n,
            pivots,
            total_cost,
            "solved transportation problem"
        );
        FlowOutcome {
            status: SolveStatus::Optimal,
            solution: Some(FlowSolution { flows, total_cost }),
            pivots,
            detail: String::new(),
        }
    }
}

enum Interrupt {
    Timeout(usize),
    Cancelled(usize),
}

/// Balanced transportation tableau with a spanning-tree basis of m + n − 1 cells.
struct Tableau {
    costs: Vec<Vec<f64>>,
    flow: Vec<Vec<u64>>,
    basic: Vec<Vec<bool>>,
    rows: usize,
    cols: usize,
}

/// Tree node: a source row or a sink column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    Row(usize),
    Col(usize),
}

impl Tableau {
    /// Vogel's approximation. Each allocation crosses out exactly one line,
    /// so the basis stays a spanning tree even when a supply and a demand are
    /// exhausted together.
    fn vogel(supply: &[u64], demand: &[u64], costs: Vec<Vec<f64>>) -> Self {
        let (rows, cols) = (supply.len(), demand.len());
        let mut flow = vec![vec![0u64; cols]; rows];
        let mut basic = vec![vec![false; cols]; rows];
        let mut s = supply.to_vec();
        let mut d = demand.to_vec();
        let mut row_open = vec![true; rows];
        let mut col_open = vec![true; cols];
        let (mut rows_left, mut cols_left) = (rows, cols);

        while rows_left > 0 && cols_left > 0 {
            let Some((i, j)) = Self::vogel_pick(&costs, &row_open, &col_open) else {
                break;
            };
            let q = s[i].min(d[j]);
            flow[i][j] = q;
            basic[i][j] = true;
            s[i] -= q;
            d[j] -= q;
            if s[i] == 0 && rows_left > 1 {
                row_open[i] = false;
                rows_left -= 1;
            } else {
                col_open[j] = false;
                cols_left -= 1;
            }
        }

        Self {
            costs,
            flow,
            basic,
            rows,
            cols,
        }
    }

    fn vogel_pick(
        costs: &[Vec<f64>],
        row_open: &[bool],
        col_open: &[bool],
    ) -> Option<(usize, usize)> {
        let penalty = |values: &mut dyn Iterator<Item = f64>| {
            let (mut lo, mut hi) = (f64::INFINITY, f64::INFINITY);
            for v in values {
                if v < lo {
                    hi = lo;
                    lo = v;
                } else if v < hi {
                    hi = v;
                }
            }
            if hi.is_finite() {
                hi - lo
            } else {
                0.0
            }
        };
        let open_rows = || (0..row_open.len()).filter(move |&i| row_open[i]);
        let open_cols = || (0..col_open.len()).filter(move |&j| col_open[j]);

        let mut best: Option<(f64, Line)> = None;
        for i in open_rows() {
            let p = penalty(&mut open_cols().map(|j| costs[i][j]));
            if best.map_or(true, |(b, _)| p > b) {
                best = Some((p, Line::Row(i)));
            }
        }
        for j in open_cols() {
            let p = penalty(&mut open_rows().map(|i| costs[i][j]));
            if best.map_or(true, |(b, _)| p > b) {
                best = Some((p, Line::Col(j)));
            }
        }

        let cheapest = |cells: &mut dyn Iterator<Item = (usize, usize)>| {
            cells.fold(None, |acc: Option<(usize, usize)>, (i, j)| match acc {
                Some((bi, bj)) if costs[bi][bj] <= costs[i][j] => acc,
                _ => Some((i, j)),
            })
        };
        match best?.1 {
            Line::Row(i) => cheapest(&mut open_cols().map(|j| (i, j))),
            Line::Col(j) => cheapest(&mut open_rows().map(|i| (i, j))),
        }
    }

    fn optimize(
        &mut self,
        deadline: Option<Instant>,
        cancel: Option<&CancelToken>,
    ) -> Result<usize, Interrupt> {
        let scale = self
            .costs
            .iter()
            .flatten()
            .fold(1.0f64, |acc, c| acc.max(c.abs()));
        let eps = 1e-9 * scale;
        let mut pivots = 0;

        loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(Interrupt::Cancelled(pivots));
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(Interrupt::Timeout(pivots));
            }

            let (u, v) = self.potentials();
            let entering = (0..self.rows)
                .flat_map(|i| (0..self.cols).map(move |j| (i, j)))
                .find(|&(i, j)| !self.basic[i][j] && self.costs[i][j] - u[i] - v[j] < -eps);
            let Some((ei, ej)) = entering else {
                return Ok(pivots);
            };

            self.pivot(ei, ej);
            pivots += 1;
            debug!(pivots, row = ei, col = ej, "transportation pivot");
        }
    }

    /// Dual potentials with `u[0] = 0` and `c = u + v` on every basic cell.
    fn potentials(&self) -> (Vec<f64>, Vec<f64>) {
        let mut u = vec![None; self.rows];
        let mut v = vec![None; self.cols];
        u[0] = Some(0.0);
        let mut queue = VecDeque::from([Line::Row(0)]);
        while let Some(line) = queue.pop_front() {
            match line {
                Line::Row(i) => {
                    let ui = u[i].unwrap_or(0.0);
                    for j in 0..self.cols {
                        if self.basic[i][j] && v[j].is_none() {
                            v[j] = Some(self.costs[i][j] - ui);
                            queue.push_back(Line::Col(j));
                        }
                    }
                }
                Line::Col(j) => {
                    let vj = v[j].unwrap_or(0.0);
                    for i in 0..self.rows {
                        if self.basic[i][j] && u[i].is_none() {
                            u[i] = Some(self.costs[i][j] - vj);
                            queue.push_back(Line::Row(i));
                        }
                    }
                }
            }
        }
        (
            u.into_iter().map(|x| x.unwrap_or(0.0)).collect(),
            v.into_iter().map(|x| x.unwrap_or(0.0)).collect(),
        )
    }

    /// Basis cells on the tree path from `Row(from)` to `Col(to)`, in path order.
    fn tree_path(&self, from: usize, to: usize) -> Vec<(usize, usize)> {
        let node = |line: Line| match line {
            Line::Row(i) => i,
            Line::Col(j) => self.rows + j,
        };
        let mut parent: Vec<Option<Line>> = vec![None; self.rows + self.cols];
        let mut seen = vec![false; self.rows + self.cols];
        let mut queue = VecDeque::from([Line::Row(from)]);
        seen[node(Line::Row(from))] = true;

        while let Some(line) = queue.pop_front() {
            if line == Line::Col(to) {
                break;
            }
            let neighbours: Vec<Line> = match line {
                Line::Row(i) => (0..self.cols)
                    .filter(|&j| self.basic[i][j])
                    .map(Line::Col)
                    .collect(),
                Line::Col(j) => (0..self.rows)
                    .filter(|&i| self.basic[i][j])
                    .map(Line::Row)
                    .collect(),
            };
            for next in neighbours {
                if !seen[node(next)] {
                    seen[node(next)] = true;
                    parent[node(next)] = Some(line);
                    queue.push_back(next);
                }
            }
        }

        let mut cells = Vec::new();
        let mut cur = Line::Col(to);
        while let Some(prev) = parent[node(cur)] {
            cells.push(match (prev, cur) {
                (Line::Row(i), Line::Col(j)) | (Line::Col(j), Line::Row(i)) => (i, j),
                _ => unreachable!("tree edges join a row to a column"),
            });
            cur = prev;
        }
        cells.reverse();
        cells
    }

    /// Stepping-stone pivot on entering cell `(ei, ej)`.
    fn pivot(&mut self, ei: usize, ej: usize) {
        // Path cells alternate −, +, −, ... starting from the entering row, so
        // the odd-length path closes a cycle with the entering cell as +.
        let path = self.tree_path(ei, ej);
        let minus: Vec<(usize, usize)> = path.iter().copied().step_by(2).collect();
        let plus: Vec<(usize, usize)> = path.iter().copied().skip(1).step_by(2).collect();

        let theta = minus
            .iter()
            .map(|&(i, j)| self.flow[i][j])
            .min()
            .unwrap_or(0);
        let Some(leaving) = minus
            .iter()
            .copied()
            .filter(|&(i, j)| self.flow[i][j] == theta)
            .min_by_key(|&(i, j)| i * self.cols + j)
        else {
            return;
        };

        self.flow[ei][ej] += theta;
        for &(i, j) in &plus {
            self.flow[i][j] += theta;
        }
        for &(i, j) in &minus {
            self.flow[i][j] -= theta;
        }
        self.basic[leaving.0][leaving.1] = false;
        self.basic[ei][ej] = true;
    }
}
