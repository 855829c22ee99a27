use anyhow::Result;
use rusqlite::{params, Row};

use super::{format_ts, now_ts, parse_ts, Database};
use crate::models::{CreateSaleInput, Sale};

fn sale_from_row(row: &Row) -> rusqlite::Result<Sale> {
    let created_at: String = row.get(5)?;
    Ok(Sale {
        id: row.get(0)?,
        project_id: row.get(1)?,
        amount_cents: row.get(2)?,
        currency: row.get(3)?,
        description: row.get(4)?,
        created_at: parse_ts(5, &created_at)?,
    })
}

impl Database {
    pub fn create_sale(&self, project_id: i64, input: CreateSaleInput) -> Result<Sale> {
        let created_at = now_ts();
        let currency = input.currency.to_uppercase();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO sales (project_id, amount_cents, currency, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    project_id,
                    input.amount_cents,
                    currency,
                    input.description,
                    format_ts(&created_at)
                ],
            )?;
            Ok(Sale {
                id: conn.last_insert_rowid(),
                project_id,
                amount_cents: input.amount_cents,
                currency,
                description: input.description,
                created_at,
            })
        })
    }

    pub fn get_sales(&self, project_id: i64) -> Result<Vec<Sale>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, project_id, amount_cents, currency, description, created_at
                 FROM sales WHERE project_id = ?1 ORDER BY created_at DESC, id DESC",
            )?;
            let sales = stmt
                .query_map(params![project_id], sale_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(sales)
        })
    }
}
