// Invoice reads: candidate lookup for the worker, search for manual matching

use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CandidateInvoiceRow, Invoice};
use crate::ReconStore;

/// Search parameters for the manual-match invoice lookup. The caller is
/// responsible for the paid-by-default policy: when `statuses` is None
/// and `exclude_paid` is set, paid invoices are filtered out.
#[derive(Debug, Clone, Default)]
pub struct InvoiceSearch {
    pub name_query: Option<String>,
    pub amount: Option<Decimal>,
    pub statuses: Option<Vec<String>>,
    pub exclude_paid: bool,
    pub limit: i64,
}

/// Escape ILIKE metacharacters in a user-supplied substring.
fn like_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

impl ReconStore {
    pub async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>> {
        Ok(
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn get_invoice_by_number(&self, invoice_number: &str) -> Result<Option<Invoice>> {
        Ok(
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE invoice_number = $1")
                .bind(invoice_number)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn invoice_exists(&self, id: Uuid) -> Result<bool> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// One query per worker chunk: every unpaid invoice whose amount is
    /// in the chunk's amount set, grouped by the 2-decimal amount string
    /// for O(1) lookup while matching.
    pub async fn find_candidate_invoices_by_amounts(
        &self,
        amounts: &[Decimal],
    ) -> Result<HashMap<String, Vec<CandidateInvoiceRow>>> {
        if amounts.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, CandidateInvoiceRow>(
            r#"
            SELECT id, invoice_number, customer_name, due_date, amount
            FROM invoices
            WHERE status <> 'paid' AND amount = ANY($1)
            "#,
        )
        .bind(amounts)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<String, Vec<CandidateInvoiceRow>> = HashMap::new();
        for row in rows {
            grouped
                .entry(format!("{:.2}", row.amount))
                .or_default()
                .push(row);
        }

        Ok(grouped)
    }

    /// Invoice search for the manual-match flow: amount within one cent,
    /// optional status set, case-insensitive substring on customer name.
    pub async fn search_invoices(&self, search: &InvoiceSearch) -> Result<Vec<Invoice>> {
        let pattern = search
            .name_query
            .as_deref()
            .map(|q| format!("%{}%", like_escape(q)));

        Ok(sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE ($1::numeric IS NULL OR (amount >= $1 - 0.01 AND amount <= $1 + 0.01))
              AND ($2::text[] IS NULL OR status = ANY($2))
              AND ($3::text IS NULL OR customer_name ILIKE $3)
              AND (NOT $4 OR status <> 'paid')
            ORDER BY due_date ASC, created_at DESC
            LIMIT $5
            "#,
        )
        .bind(search.amount)
        .bind(&search.statuses)
        .bind(pattern)
        .bind(search.exclude_paid)
        .bind(search.limit)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Unpaid invoices within one cent of the given amount, for the
    /// candidate picker.
    pub async fn find_candidates_for_amount(
        &self,
        amount: Decimal,
        limit: i64,
    ) -> Result<Vec<Invoice>> {
        Ok(sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE status <> 'paid'
              AND amount >= $1 - 0.01
              AND amount <= $1 + 0.01
            ORDER BY due_date ASC, created_at DESC
            LIMIT $2
            "#,
        )
        .bind(amount)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_escape() {
        assert_eq!(like_escape("acme"), "acme");
        assert_eq!(like_escape("100%"), "100\\%");
        assert_eq!(like_escape("a_b"), "a\\_b");
        assert_eq!(like_escape("back\\slash"), "back\\\\slash");
    }
}
