use tracing::warn;

use crate::config::GridBlock;
use crate::error::PlanError;
use crate::source::TableSource;
use crate::types::{monthly_from_slice, Monthly, MONTHS};

const CURVE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    /// Frozen concentrate futures.
    Concentrate,
    /// Fresh fruit futures.
    Fruit,
}

impl ContractKind {
    /// Row order of the futures sheet.
    pub const ALL: [ContractKind; 2] = [ContractKind::Concentrate, ContractKind::Fruit];

    pub fn as_str(self) -> &'static str {
        match self {
            ContractKind::Concentrate => "concentrate",
            ContractKind::Fruit => "fruit",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuturesContract {
    pub kind: ContractKind,
    pub weekly_volume: f64,
    /// Share of the volume arriving in each month, in percent.
    pub curve: Monthly,
}

impl FuturesContract {
    /// `curve[m] / 100 × weekly_volume`.
    ///
    /// The weekly base rate is deliberately consumed as a monthly figure.
    pub fn monthly_arrivals(&self) -> Monthly {
        self.curve.map(|pct| pct / 100.0 * self.weekly_volume)
    }

    pub fn curve_total(&self) -> f64 {
        self.curve.iter().sum()
    }

    /// True when the distribution curve covers the whole year exactly once.
    pub fn curve_is_complete(&self) -> bool {
        (self.curve_total() - 100.0).abs() <= CURVE_TOLERANCE
    }
}

/// Monthly futures arrivals, per contract and combined.
#[derive(Debug, Clone, PartialEq)]
pub struct FuturesSchedule {
    pub arrivals: Vec<(ContractKind, Monthly)>,
}

impl FuturesSchedule {
    pub fn total(&self) -> Monthly {
        let mut total = [0.0; MONTHS];
        for (_, monthly) in &self.arrivals {
            for (t, v) in total.iter_mut().zip(monthly) {
                *t += v;
            }
        }
        total
    }
}

/// One row per contract kind: weekly volume, then the 12 monthly percentages.
pub fn read_contracts(
    source: &dyn TableSource,
    block: &GridBlock,
) -> Result<Vec<FuturesContract>, PlanError> {
    ContractKind::ALL
        .into_iter()
        .enumerate()
        .map(|(i, kind)| {
            let row = block.row + i;
            let weekly_volume = source.cell(&block.sheet, row, block.col)?;
            let curve = source.row(&block.sheet, row, block.col + 1..block.col + 1 + MONTHS)?;
            Ok(FuturesContract {
                kind,
                weekly_volume,
                curve: monthly_from_slice(&curve, &format!("{} futures curve", kind.as_str()))?,
            })
        })
        .collect()
}

pub fn schedule_futures(contracts: &[FuturesContract]) -> FuturesSchedule {
    let arrivals = contracts
        .iter()
        .map(|contract| {
            if !contract.curve_is_complete() {
                warn!(
                    kind = contract.kind.as_str(),
                    total = contract.curve_total(),
                    "futures distribution curve does not sum to 100"
                );
            }
            (contract.kind, contract.monthly_arrivals())
        })
        .collect();
    FuturesSchedule { arrivals }
}
