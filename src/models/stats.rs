use serde::{Deserialize, Serialize};

/// Сводка для админки: `/admin-state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminSummary {
    pub customers: u64,
    pub products: u64,
    pub orders: u64,
    pub revenue: f64,
}
