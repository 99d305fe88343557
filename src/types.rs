//! Enumerated keys and fixed-shape tables shared by every planning stage.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::PlanError;

pub const MONTHS: usize = 12;
pub const WEEKS: usize = 4;

/// One value per month of the planning horizon.
pub type Monthly = [f64; MONTHS];

/// One value per week, four weeks per month.
pub type Weekly = [[f64; WEEKS]; MONTHS];

pub const ZERO_MONTHLY: Monthly = [0.0; MONTHS];
pub const ZERO_WEEKLY: Weekly = [[0.0; WEEKS]; MONTHS];

/// Growing region supplying raw fruit.
///
/// Declaration order is table order: every origin-indexed sheet lists the
/// regions in this sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum Origin {
    #[serde(rename = "FLA")]
    Florida,
    #[serde(rename = "CAL")]
    California,
    #[serde(rename = "TEX")]
    Texas,
    #[serde(rename = "ARZ")]
    Arizona,
    #[serde(rename = "BRA")]
    Brazil,
    #[serde(rename = "SPA")]
    Spain,
}

impl Origin {
    pub const ALL: [Origin; 6] = [
        Origin::Florida,
        Origin::California,
        Origin::Texas,
        Origin::Arizona,
        Origin::Brazil,
        Origin::Spain,
    ];

    /// Regions priced in a foreign currency.
    pub const FOREIGN: [Origin; 2] = [Origin::Brazil, Origin::Spain];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn code(self) -> &'static str {
        match self {
            Origin::Florida => "FLA",
            Origin::California => "CAL",
            Origin::Texas => "TEX",
            Origin::Arizona => "ARZ",
            Origin::Brazil => "BRA",
            Origin::Spain => "SPA",
        }
    }

    pub fn is_foreign(self) -> bool {
        Self::FOREIGN.contains(&self)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Origin {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Origin::ALL
            .into_iter()
            .find(|o| o.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PlanError::malformed(format!("unknown origin code '{s}'")))
    }
}

/// Dense table with exactly one entry per origin.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginTable<T>([T; 6]);

impl<T> OriginTable<T> {
    pub fn from_fn(mut f: impl FnMut(Origin) -> T) -> Self {
        Self(Origin::ALL.map(&mut f))
    }

    /// Build a table from a fallible per-origin producer, stopping at the first error.
    pub fn try_from_fn<E>(mut f: impl FnMut(Origin) -> Result<T, E>) -> Result<Self, E> {
        let mut values = Vec::with_capacity(Origin::ALL.len());
        for origin in Origin::ALL {
            values.push(f(origin)?);
        }
        match values.try_into() {
            Ok(array) => Ok(Self(array)),
            Err(_) => unreachable!("one value per origin"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Origin, &T)> {
        Origin::ALL.into_iter().zip(self.0.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(Origin, &T) -> U) -> OriginTable<U> {
        OriginTable::from_fn(|origin| f(origin, &self[origin]))
    }
}

impl<T> Index<Origin> for OriginTable<T> {
    type Output = T;

    fn index(&self, origin: Origin) -> &T {
        &self.0[origin.index()]
    }
}

impl<T> IndexMut<Origin> for OriginTable<T> {
    fn index_mut(&mut self, origin: Origin) -> &mut T {
        &mut self.0[origin.index()]
    }
}

/// Copy a slice into a fixed 12-month row, rejecting any other length.
pub fn monthly_from_slice(values: &[f64], what: &str) -> Result<Monthly, PlanError> {
    values.try_into().map_err(|_| {
        PlanError::malformed(format!(
            "{what}: expected {MONTHS} monthly values, got {}",
            values.len()
        ))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacilityKind {
    Plant,
    Storage,
}

impl FacilityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FacilityKind::Plant => "plant",
            FacilityKind::Storage => "storage",
        }
    }
}

/// Processing plant or storage node in the distribution network.
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    pub name: String,
    pub kind: FacilityKind,
    pub capacity: f64,
}

impl Facility {
    pub fn is_open(&self) -> bool {
        self.capacity != 0.0
    }
}
