//! Row types read back from the harvester database.

/// A combination table row as stored. Only read back by tests; consumers query the tables directly.
#[cfg(test)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FlowRow {
    pub id: i64,
    pub rank: i64,
    pub code: String,
    pub name: String,
    pub scope_kind: String,
    pub scope_selector: String,
    pub period: String,
    pub latest_price: Option<f64>,
    pub change_percentage: f64,
    pub main_flow_net_amount: f64,
    pub main_flow_net_percentage: f64,
    pub extra_large_order_flow_net_amount: f64,
    pub extra_large_order_flow_net_percentage: f64,
    pub large_order_flow_net_amount: f64,
    pub large_order_flow_net_percentage: f64,
    pub medium_order_flow_net_amount: f64,
    pub medium_order_flow_net_percentage: f64,
    pub small_order_flow_net_amount: f64,
    pub small_order_flow_net_percentage: f64,
    pub captured_at: String,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct SweepRunRow {
    pub id: i64,
    pub sweep_no: i64,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: i64,
    pub combinations: i64,
    pub stored: i64,
    pub empty: i64,
    pub failed: i64,
    pub records: i64,
}
