//! Inventory report.

use std::fmt::Write as _;

use serde::Serialize;
use sqlx::PgPool;

use larder_core::{CategoryName, ProductId};
use larder_db::ProductRepository;
use larder_db::models::ProductWithAvailability;

use super::CommandError;

/// One report row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub product_id: ProductId,
    pub name: String,
    pub category: Option<CategoryName>,
    pub on_hand: i64,
    pub reserved: i64,
    pub available: i64,
}

impl From<ProductWithAvailability> for ReportRow {
    fn from(item: ProductWithAvailability) -> Self {
        Self {
            product_id: item.product.id,
            name: item.product.name,
            category: item.product.category_name,
            on_hand: i64::from(item.product.inventory),
            reserved: item.reserved,
            available: item.available,
        }
    }
}

/// Keep rows at or below `low` available units, if a threshold is given.
fn filter_low(rows: Vec<ReportRow>, low: Option<i64>) -> Vec<ReportRow> {
    match low {
        Some(threshold) => rows
            .into_iter()
            .filter(|row| row.available <= threshold)
            .collect(),
        None => rows,
    }
}

/// Render rows as a fixed-width table.
fn render_table(rows: &[ReportRow]) -> String {
    let width = rows
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("PRODUCT".len());

    let mut out = format!(
        "{:>6}  {:<width$}  {:>8}  {:>8}  {:>9}\n",
        "ID", "PRODUCT", "ON HAND", "RESERVED", "AVAILABLE"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:>6}  {:<width$}  {:>8}  {:>8}  {:>9}",
            row.product_id.as_i32(),
            row.name,
            row.on_hand,
            row.reserved,
            row.available
        );
    }
    out
}

/// Print inventory levels for every product.
///
/// # Errors
///
/// Returns an error if the query or JSON encoding fails.
pub async fn report(pool: &PgPool, low: Option<i64>, json: bool) -> Result<(), CommandError> {
    let products = ProductRepository::new(pool).list(None).await?;
    let rows = filter_low(products.into_iter().map(ReportRow::from).collect(), low);

    let output = if json {
        serde_json::to_string_pretty(&rows)?
    } else {
        render_table(&rows)
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{}", output.trim_end());
    }

    tracing::info!(products = rows.len(), "Inventory report complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i32, name: &str, on_hand: i64, reserved: i64) -> ReportRow {
        ReportRow {
            product_id: ProductId::new(id),
            name: name.to_owned(),
            category: None,
            on_hand,
            reserved,
            available: (on_hand - reserved).max(0),
        }
    }

    #[test]
    fn test_filter_low() {
        let rows = vec![row(1, "Salt", 10, 2), row(2, "Saffron", 3, 1), row(3, "Sumac", 1, 4)];

        let low = filter_low(rows.clone(), Some(2));
        let ids: Vec<i32> = low.iter().map(|r| r.product_id.as_i32()).collect();
        assert_eq!(ids, vec![2, 3]);

        assert_eq!(filter_low(rows, None).len(), 3);
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let table = render_table(&[row(1, "Salt", 10, 2), row(12, "Smoked Paprika", 4, 0)]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("AVAILABLE"));
        assert!(lines[2].contains("Smoked Paprika"));
        assert_eq!(lines[1].len(), lines[2].len());
    }
}
