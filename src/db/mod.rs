use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use sqlx::QueryBuilder;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;
use crate::models::{
    Approver, Contractor, Invoice, InvoiceStatus, InvoiceSubmission, InvoiceWithContractor,
    NewContractor,
};
use crate::workflow::Transition;

pub async fn init(config: &Config) -> Result<Database> {
    let database = Database::new(config).await?;
    Ok(database)
}

/// Optional narrowing of the invoice listing.
#[derive(Debug, Default, Clone)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub period_start: Option<NaiveDate>,
    pub contractor_id: Option<i64>,
}

pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(config.database_url())
            .await
            .context("failed to connect to database")?;
        debug!("database pool ready");
        Ok(Self { pool })
    }

    pub async fn contractor_by_token(&self, token: &str) -> Result<Option<Contractor>> {
        let contractor = sqlx::query_as::<_, Contractor>(
            "SELECT * FROM contractors WHERE url_token = $1 AND is_active = TRUE",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(contractor)
    }

    pub async fn contractor_by_id(&self, id: i64) -> Result<Option<Contractor>> {
        let contractor = sqlx::query_as::<_, Contractor>("SELECT * FROM contractors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(contractor)
    }

    pub async fn active_contractors(&self) -> Result<Vec<Contractor>> {
        let contractors = sqlx::query_as::<_, Contractor>(
            "SELECT * FROM contractors WHERE is_active = TRUE ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(contractors)
    }

    pub async fn all_contractors(&self) -> Result<Vec<Contractor>> {
        let contractors =
            sqlx::query_as::<_, Contractor>("SELECT * FROM contractors ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(contractors)
    }

    pub async fn insert_contractor(&self, new: &NewContractor) -> Result<Contractor> {
        let contractor = sqlx::query_as::<_, Contractor>(
            r#"
            INSERT INTO contractors (name, email, company, default_hourly_rate, url_token)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.company)
        .bind(new.default_hourly_rate)
        .bind(&new.url_token)
        .fetch_one(&self.pool)
        .await?;
        Ok(contractor)
    }

    pub async fn set_contractor_active(&self, id: i64, active: bool) -> Result<Contractor> {
        let contractor = sqlx::query_as::<_, Contractor>(
            "UPDATE contractors SET is_active = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?
        .with_context(|| format!("contractor {id} not found"))?;
        Ok(contractor)
    }

    pub async fn approver_by_token(&self, token: &str) -> Result<Option<Approver>> {
        let approver = sqlx::query_as::<_, Approver>(
            "SELECT id, name, email, approval_level FROM approvers \
             WHERE url_token = $1 AND is_active = TRUE",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(approver)
    }

    pub async fn invoice_for_period(
        &self,
        contractor_id: i64,
        period_start: NaiveDate,
    ) -> Result<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE contractor_id = $1 AND pay_period_start = $2",
        )
        .bind(contractor_id)
        .bind(period_start)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invoice)
    }

    pub async fn contractor_invoices(&self, contractor_id: i64) -> Result<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE contractor_id = $1 ORDER BY pay_period_start DESC",
        )
        .bind(contractor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(invoices)
    }

    pub async fn invoice_with_contractor(&self, id: i64) -> Result<Option<InvoiceWithContractor>> {
        let record = sqlx::query_as::<_, InvoiceWithContractor>(
            r#"
            SELECT i.*, c.name AS contractor_name, c.email AS contractor_email,
                   c.company AS contractor_company
            FROM invoices i
            JOIN contractors c ON c.id = i.contractor_id
            WHERE i.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Insert or replace the timecard for one contractor and period in a
    /// single statement, so two racing submissions cannot both insert.
    /// Replacing always clears approval and rejection provenance; the
    /// resubmitted card starts its review from scratch.
    pub async fn submit_invoice(&self, submission: &InvoiceSubmission) -> Result<Invoice> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                contractor_id, pay_period_start, pay_period_end,
                week_1_start, week_1_end, week_1_hours, week_1_rate, week_1_notes,
                week_2_start, week_2_end, week_2_hours, week_2_rate, week_2_notes,
                subtotal, tax_rate, tax_amount, expenses, expenses_total, total_amount,
                status, submitted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            ON CONFLICT (contractor_id, pay_period_start) DO UPDATE SET
                pay_period_end = EXCLUDED.pay_period_end,
                week_1_start = EXCLUDED.week_1_start,
                week_1_end = EXCLUDED.week_1_end,
                week_1_hours = EXCLUDED.week_1_hours,
                week_1_rate = EXCLUDED.week_1_rate,
                week_1_notes = EXCLUDED.week_1_notes,
                week_2_start = EXCLUDED.week_2_start,
                week_2_end = EXCLUDED.week_2_end,
                week_2_hours = EXCLUDED.week_2_hours,
                week_2_rate = EXCLUDED.week_2_rate,
                week_2_notes = EXCLUDED.week_2_notes,
                subtotal = EXCLUDED.subtotal,
                tax_rate = EXCLUDED.tax_rate,
                tax_amount = EXCLUDED.tax_amount,
                expenses = EXCLUDED.expenses,
                expenses_total = EXCLUDED.expenses_total,
                total_amount = EXCLUDED.total_amount,
                status = EXCLUDED.status,
                submitted_at = EXCLUDED.submitted_at,
                approval_1_at = NULL,
                approval_1_by = NULL,
                approval_2_at = NULL,
                approval_2_by = NULL,
                rejected_at = NULL,
                rejected_by = NULL,
                rejection_reason = NULL,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(submission.contractor_id)
        .bind(submission.pay_period_start)
        .bind(submission.pay_period_end)
        .bind(submission.week_1_start)
        .bind(submission.week_1_end)
        .bind(submission.week_1_hours)
        .bind(submission.week_1_rate)
        .bind(&submission.week_1_notes)
        .bind(submission.week_2_start)
        .bind(submission.week_2_end)
        .bind(submission.week_2_hours)
        .bind(submission.week_2_rate)
        .bind(&submission.week_2_notes)
        .bind(submission.subtotal)
        .bind(submission.tax_rate)
        .bind(submission.tax_amount)
        .bind(&submission.expenses)
        .bind(submission.expenses_total)
        .bind(submission.total_amount)
        .bind(submission.status.as_str())
        .bind(submission.submitted_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(invoice)
    }

    /// Write a workflow transition back to the row. Stamps the transition
    /// did not earn stay at their stored values.
    pub async fn apply_transition(
        &self,
        invoice_id: i64,
        transition: &Transition,
    ) -> Result<Invoice> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET
                status = $2,
                approval_1_at = COALESCE($3, approval_1_at),
                approval_1_by = COALESCE($4, approval_1_by),
                approval_2_at = COALESCE($5, approval_2_at),
                approval_2_by = COALESCE($6, approval_2_by),
                paid_at = COALESCE($7, paid_at),
                rejected_at = COALESCE($8, rejected_at),
                rejected_by = COALESCE($9, rejected_by),
                rejection_reason = COALESCE($10, rejection_reason),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(invoice_id)
        .bind(transition.to.as_str())
        .bind(transition.approval_1.as_ref().map(|s| s.at))
        .bind(transition.approval_1.as_ref().map(|s| s.by.clone()))
        .bind(transition.approval_2.as_ref().map(|s| s.at))
        .bind(transition.approval_2.as_ref().map(|s| s.by.clone()))
        .bind(transition.paid_at)
        .bind(transition.rejection.as_ref().map(|r| r.at))
        .bind(transition.rejection.as_ref().map(|r| r.by.clone()))
        .bind(transition.rejection.as_ref().map(|r| r.reason.clone()))
        .fetch_optional(&self.pool)
        .await?
        .with_context(|| format!("invoice {invoice_id} not found"))?;
        Ok(invoice)
    }

    pub async fn invoices(&self, filter: &InvoiceFilter) -> Result<Vec<InvoiceWithContractor>> {
        let mut builder = QueryBuilder::new(
            "SELECT i.*, c.name AS contractor_name, c.email AS contractor_email, \
             c.company AS contractor_company \
             FROM invoices i JOIN contractors c ON c.id = i.contractor_id WHERE TRUE",
        );
        if let Some(status) = filter.status {
            builder.push(" AND i.status = ").push_bind(status.as_str());
        }
        if let Some(period_start) = filter.period_start {
            builder
                .push(" AND i.pay_period_start = ")
                .push_bind(period_start);
        }
        if let Some(contractor_id) = filter.contractor_id {
            builder
                .push(" AND i.contractor_id = ")
                .push_bind(contractor_id);
        }
        builder.push(" ORDER BY i.pay_period_start DESC");

        let invoices = builder
            .build_query_as::<InvoiceWithContractor>()
            .fetch_all(&self.pool)
            .await?;
        Ok(invoices)
    }

    /// Oldest submissions first, so approvers work the queue in order.
    pub async fn pending_approval(
        &self,
        status: InvoiceStatus,
    ) -> Result<Vec<InvoiceWithContractor>> {
        let invoices = sqlx::query_as::<_, InvoiceWithContractor>(
            r#"
            SELECT i.*, c.name AS contractor_name, c.email AS contractor_email,
                   c.company AS contractor_company
            FROM invoices i
            JOIN contractors c ON c.id = i.contractor_id
            WHERE i.status = $1
            ORDER BY i.submitted_at ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(invoices)
    }

    /// Invoices an approver has touched since `since`, newest first. An
    /// approver "touched" a row if their name is on any provenance column.
    pub async fn approver_activity(
        &self,
        approver_name: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<InvoiceWithContractor>> {
        let invoices = sqlx::query_as::<_, InvoiceWithContractor>(
            r#"
            SELECT i.*, c.name AS contractor_name, c.email AS contractor_email,
                   c.company AS contractor_company
            FROM invoices i
            JOIN contractors c ON c.id = i.contractor_id
            WHERE (i.approval_1_by = $1 OR i.approval_2_by = $1 OR i.rejected_by = $1)
              AND i.updated_at >= $2
            ORDER BY i.updated_at DESC
            LIMIT $3
            "#,
        )
        .bind(approver_name)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(invoices)
    }

    pub async fn delete_invoice(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            bail!("invoice {id} not found");
        }
        Ok(())
    }
}
