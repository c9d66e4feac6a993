//! Sale status.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a sale.
///
/// A sale is created `Pending` when inventory is committed at checkout and
/// moves to `Paid` or `Failed` once the payments API answers. `Failed`
/// sales have had their units returned to the buyer's cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sale_status", rename_all = "lowercase")
)]
pub enum SaleStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl SaleStatus {
    /// Whether the sale has reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Failed)
    }

    /// Database/wire spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(serde_json::to_string(&SaleStatus::Paid).unwrap(), "\"paid\"");
        let parsed: SaleStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, SaleStatus::Failed);
    }

    #[test]
    fn test_terminal() {
        assert!(!SaleStatus::Pending.is_terminal());
        assert!(SaleStatus::Paid.is_terminal());
        assert!(SaleStatus::Failed.is_terminal());
    }
}
