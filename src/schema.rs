/// Column-name constants for grove-flowkit output frames.
/// Single source of truth - exported to Python via PyO3.

// ── Shared key columns ──────────────────────────────────────────────────────
pub mod keys {
    pub const ORIGIN: &str = "origin";
    pub const MONTH: &str = "month";
    pub const WEEK: &str = "week";
    pub const FACILITY: &str = "facility";
    pub const FACILITY_KIND: &str = "facility_kind";
}

// ── Order plan columns ──────────────────────────────────────────────────────
pub mod orders {
    pub const PRICE: &str = "price";
    pub const ORDER_QTY: &str = "order_qty";
    pub const ORDER_COST: &str = "order_cost";
    pub const SHIPPED_QTY: &str = "shipped_qty";
}

// ── Futures columns ─────────────────────────────────────────────────────────
pub mod futures {
    pub const CONTRACT: &str = "contract";
    pub const ARRIVAL_QTY: &str = "arrival_qty";
}

// ── Route columns ───────────────────────────────────────────────────────────
pub mod routes {
    pub const DISTANCE: &str = "distance";
}

// ── Shipment columns ────────────────────────────────────────────────────────
pub mod shipment {
    pub const QUANTITY: &str = "quantity";
    pub const SHIPPING_COST: &str = "shipping_cost";
}

// ── Market assignment columns ───────────────────────────────────────────────
pub mod market {
    pub const MARKET: &str = "market";
    pub const STORAGE: &str = "storage";
    pub const DISTANCE: &str = "distance";
    pub const SHIPPING_COST: &str = "shipping_cost";
}

// ── Flow solution columns ───────────────────────────────────────────────────
pub mod flow {
    pub const SOURCE: &str = "source";
    pub const SINK: &str = "sink";
    pub const UNIT_COST: &str = "unit_cost";
    pub const FLOW: &str = "flow";
    pub const FLOW_COST: &str = "flow_cost";
}

// ── Origin summary columns ──────────────────────────────────────────────────
pub mod summary {
    pub const TOTAL_ORDER_QTY: &str = "total_order_qty";
    pub const TOTAL_ORDER_COST: &str = "total_order_cost";
    pub const TOTAL_SHIPPING_COST: &str = "total_shipping_cost";
}
