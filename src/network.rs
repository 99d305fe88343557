use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{info, warn};

use crate::config::{NamedTable, TableLayout};
use crate::error::PlanError;
use crate::source::TableSource;
use crate::types::{Facility, FacilityKind, Origin, OriginTable};

/// Node payload of the route graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Site {
    Origin(Origin),
    Facility(FacilityKind),
    Market,
}

/// One populated origin → facility distance.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDistance {
    pub origin: Origin,
    pub facility: String,
    pub kind: FacilityKind,
    pub distance: f64,
}

/// Two-echelon route network restricted to open facilities.
///
/// Nodes are origins, open plants and storages, and markets. An edge carries
/// the distance of a route that exists; a missing edge means the route is not
/// available, never that it is free.
#[derive(Debug, Clone)]
pub struct Network {
    graph: DiGraph<Site, f64>,
    origin_nodes: OriginTable<NodeIndex>,
    /// Open facility name → node.
    facility_nodes: HashMap<String, NodeIndex>,
    market_nodes: HashMap<String, NodeIndex>,
    plants: Vec<Facility>,
    storages: Vec<Facility>,
    markets: Vec<String>,
}

impl Network {
    /// Keep only the open candidates, preserving table order within each kind.
    pub fn from_facilities(candidates: impl IntoIterator<Item = Facility>) -> Self {
        let mut graph = DiGraph::new();
        let origin_nodes = OriginTable::from_fn(|origin| graph.add_node(Site::Origin(origin)));
        let mut network = Self {
            graph,
            origin_nodes,
            facility_nodes: HashMap::new(),
            market_nodes: HashMap::new(),
            plants: Vec::new(),
            storages: Vec::new(),
            markets: Vec::new(),
        };

        for facility in candidates {
            if !facility.is_open() || facility.name.is_empty() {
                continue;
            }
            if network.facility_nodes.contains_key(&facility.name) {
                warn!(name = %facility.name, "duplicate facility name ignored");
                continue;
            }
            let node = network.graph.add_node(Site::Facility(facility.kind));
            network.facility_nodes.insert(facility.name.clone(), node);
            match facility.kind {
                FacilityKind::Plant => network.plants.push(facility),
                FacilityKind::Storage => network.storages.push(facility),
            }
        }
        network
    }

    /// Register an origin → facility distance. Routes to closed or unknown
    /// facilities are dropped; returns whether the route was kept.
    pub fn add_grove_route(&mut self, origin: Origin, facility: &str, distance: f64) -> bool {
        let Some(&target) = self.facility_nodes.get(facility) else {
            return false;
        };
        let source = self.origin_nodes[origin];
        if self.graph.find_edge(source, target).is_some() {
            return false;
        }
        self.graph.add_edge(source, target, distance);
        true
    }

    pub fn add_market(&mut self, name: &str) {
        if self.market_nodes.contains_key(name) {
            warn!(name, "duplicate market name ignored");
            return;
        }
        let node = self.graph.add_node(Site::Market);
        self.market_nodes.insert(name.to_string(), node);
        self.markets.push(name.to_string());
    }

    /// Register a storage → market distance; only open storages and known markets qualify.
    pub fn add_market_route(&mut self, storage: &str, market: &str, distance: f64) -> bool {
        let (Some(&source), Some(&target)) =
            (self.facility_nodes.get(storage), self.market_nodes.get(market))
        else {
            return false;
        };
        if self.graph[source] != Site::Facility(FacilityKind::Storage)
            || self.graph.find_edge(source, target).is_some()
        {
            return false;
        }
        self.graph.add_edge(source, target, distance);
        true
    }

    pub fn open_plants(&self) -> &[Facility] {
        &self.plants
    }

    pub fn open_storages(&self) -> &[Facility] {
        &self.storages
    }

    /// Plants first, then storages, each in table order.
    pub fn open_facilities(&self) -> impl Iterator<Item = &Facility> {
        self.plants.iter().chain(self.storages.iter())
    }

    pub fn markets(&self) -> &[String] {
        &self.markets
    }

    pub fn facility(&self, name: &str) -> Option<&Facility> {
        self.open_facilities().find(|f| f.name == name)
    }

    pub fn distance(&self, origin: Origin, facility: &str) -> Result<f64, PlanError> {
        let missing = || PlanError::MissingDistance {
            origin,
            facility: facility.to_string(),
        };
        let target = *self.facility_nodes.get(facility).ok_or_else(missing)?;
        let edge = self
            .graph
            .find_edge(self.origin_nodes[origin], target)
            .ok_or_else(missing)?;
        Ok(self.graph[edge])
    }

    pub fn market_distance(&self, storage: &str, market: &str) -> Option<f64> {
        let source = *self.facility_nodes.get(storage)?;
        let target = *self.market_nodes.get(market)?;
        self.graph
            .find_edge(source, target)
            .map(|edge| self.graph[edge])
    }

    /// Every populated origin → facility distance, origin-major in facility order.
    pub fn distance_matrix(&self) -> Vec<RouteDistance> {
        let mut rows = Vec::new();
        for origin in Origin::ALL {
            for facility in self.open_facilities() {
                if let Ok(distance) = self.distance(origin, &facility.name) {
                    rows.push(RouteDistance {
                        origin,
                        facility: facility.name.clone(),
                        kind: facility.kind,
                        distance,
                    });
                }
            }
        }
        rows
    }

    pub fn route_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Read a numeric cell, treating a blank cell as absent.
fn optional_cell(
    source: &dyn TableSource,
    sheet: &str,
    row: usize,
    col: usize,
) -> Result<Option<f64>, PlanError> {
    if source.label(sheet, row, col)?.is_empty() {
        return Ok(None);
    }
    source.cell(sheet, row, col).map(Some)
}

fn read_candidates(
    source: &dyn TableSource,
    table: &NamedTable,
    kind: FacilityKind,
) -> Result<Vec<Facility>, PlanError> {
    table
        .row_range()
        .map(|row| {
            Ok(Facility {
                name: source.label(&table.sheet, row, table.name_col)?,
                kind,
                capacity: source.cell(&table.sheet, row, table.value_col)?,
            })
        })
        .collect()
}

/// Resolve open facilities, grove distances and market distances from the input tables.
pub fn read_network(source: &dyn TableSource, layout: &TableLayout) -> Result<Network, PlanError> {
    let plants = read_candidates(source, &layout.plants, FacilityKind::Plant)?;
    let storages = read_candidates(source, &layout.storages, FacilityKind::Storage)?;
    let mut network = Network::from_facilities(plants.into_iter().chain(storages.iter().cloned()));

    let dist = &layout.distances;
    for row in dist.row_range() {
        let name = source.label(&dist.sheet, row, dist.name_col)?;
        if network.facility(&name).is_none() {
            continue;
        }
        for origin in Origin::ALL {
            if let Some(d) = optional_cell(source, &dist.sheet, row, dist.value_col + origin.index())? {
                network.add_grove_route(origin, &name, d);
            }
        }
    }

    let markets = &layout.markets;
    for row in markets.row_range() {
        let market = source.label(&markets.sheet, row, markets.name_col)?;
        if market.is_empty() {
            continue;
        }
        network.add_market(&market);
        for (slot, storage) in storages.iter().enumerate() {
            if !storage.is_open() {
                continue;
            }
            if let Some(d) = optional_cell(source, &markets.sheet, row, markets.value_col + slot)? {
                network.add_market_route(&storage.name, &market, d);
            }
        }
    }

    info!(
        plants = network.open_plants().len(),
        storages = network.open_storages().len(),
        markets = network.markets().len(),
        routes = network.route_count(),
        "resolved network topology"
    );
    Ok(network)
}
