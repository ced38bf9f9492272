use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::pay_period::PayPeriod;

use super::{ExpenseItem, InvoiceStatus, TimecardEntry};

/// One invoice row: a contractor's timecard for one pay period, plus every
/// approval and rejection stamp it has collected. At most one row exists per
/// contractor and period.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Invoice {
    pub id: i64,
    pub contractor_id: i64,
    pub pay_period_start: NaiveDate,
    pub pay_period_end: NaiveDate,
    pub week_1_start: NaiveDate,
    pub week_1_end: NaiveDate,
    pub week_1_hours: f64,
    pub week_1_rate: f64,
    pub week_1_notes: Option<String>,
    pub week_2_start: NaiveDate,
    pub week_2_end: NaiveDate,
    pub week_2_hours: f64,
    pub week_2_rate: f64,
    pub week_2_notes: Option<String>,
    pub subtotal: f64,
    pub tax_rate: Option<f64>,
    pub tax_amount: Option<f64>,
    /// JSON list of [`ExpenseItem`]s. Null on rows from before expenses
    /// existed.
    pub expenses: Option<String>,
    pub expenses_total: f64,
    pub total_amount: f64,
    #[sqlx(try_from = "String")]
    pub status: InvoiceStatus,
    pub submitted_at: DateTime<Utc>,
    pub approval_1_at: Option<DateTime<Utc>>,
    pub approval_1_by: Option<String>,
    pub approval_2_at: Option<DateTime<Utc>>,
    pub approval_2_by: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn expense_items(&self) -> Vec<ExpenseItem> {
        self.expenses
            .as_deref()
            .map(ExpenseItem::parse_list)
            .unwrap_or_default()
    }

    pub fn total_hours(&self) -> f64 {
        self.week_1_hours + self.week_2_hours
    }

    /// Rebuild the invoice total from the stored hours, rates, tax rate and
    /// expense list. Matches `total_amount` on any row this program wrote.
    pub fn recomputed_total(&self) -> f64 {
        let subtotal = self.week_1_hours * self.week_1_rate + self.week_2_hours * self.week_2_rate;
        let tax = self
            .tax_rate
            .filter(|rate| *rate > 0.0)
            .map(|rate| subtotal * rate)
            .unwrap_or(0.0);
        subtotal + tax + ExpenseItem::total(&self.expense_items())
    }
}

/// An invoice joined with the contractor columns listings need.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct InvoiceWithContractor {
    #[sqlx(flatten)]
    pub invoice: Invoice,
    pub contractor_name: String,
    pub contractor_email: String,
    pub contractor_company: Option<String>,
}

/// The values written when a timecard is submitted. Resubmission overwrites
/// the same row, so this carries everything the upsert sets.
#[derive(Debug, Clone)]
pub struct InvoiceSubmission {
    pub contractor_id: i64,
    pub pay_period_start: NaiveDate,
    pub pay_period_end: NaiveDate,
    pub week_1_start: NaiveDate,
    pub week_1_end: NaiveDate,
    pub week_1_hours: f64,
    pub week_1_rate: f64,
    pub week_1_notes: Option<String>,
    pub week_2_start: NaiveDate,
    pub week_2_end: NaiveDate,
    pub week_2_hours: f64,
    pub week_2_rate: f64,
    pub week_2_notes: Option<String>,
    pub subtotal: f64,
    pub tax_rate: Option<f64>,
    pub tax_amount: Option<f64>,
    pub expenses: String,
    pub expenses_total: f64,
    pub total_amount: f64,
    pub status: InvoiceStatus,
    pub submitted_at: DateTime<Utc>,
}

impl InvoiceSubmission {
    pub fn build(
        contractor_id: i64,
        entry: &TimecardEntry,
        period: &PayPeriod,
        status: InvoiceStatus,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        let totals = entry.totals();
        let week_1 = period.week_1();
        let week_2 = period.week_2();
        Ok(Self {
            contractor_id,
            pay_period_start: period.start(),
            pay_period_end: period.end(),
            week_1_start: week_1.start,
            week_1_end: week_1.end,
            week_1_hours: entry.week_1.hours,
            week_1_rate: entry.week_1.rate,
            week_1_notes: entry.week_1.notes.clone(),
            week_2_start: week_2.start,
            week_2_end: week_2.end,
            week_2_hours: entry.week_2.hours,
            week_2_rate: entry.week_2.rate,
            week_2_notes: entry.week_2.notes.clone(),
            subtotal: totals.subtotal,
            tax_rate: totals.tax_rate,
            tax_amount: totals.tax_amount,
            expenses: serde_json::to_string(&entry.expenses)?,
            expenses_total: totals.expenses_total,
            total_amount: totals.total,
            status,
            submitted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeekEntry;
    use crate::pay_period::PayCalendar;

    fn sample_invoice() -> Invoice {
        let calendar = PayCalendar::default();
        let period = calendar.period_for(calendar.anchor());
        let entry = TimecardEntry {
            week_1: WeekEntry {
                hours: 40.0,
                rate: 85.0,
                notes: None,
            },
            week_2: WeekEntry {
                hours: 32.0,
                rate: 85.0,
                notes: None,
            },
            tax_rate: Some(0.04712),
            expenses: vec![ExpenseItem {
                merchant: "Home Depot".to_string(),
                description: "Lumber".to_string(),
                amount: 127.46,
            }],
        };
        let submission =
            InvoiceSubmission::build(7, &entry, &period, InvoiceStatus::Submitted, Utc::now())
                .unwrap();
        Invoice {
            id: 1,
            contractor_id: submission.contractor_id,
            pay_period_start: submission.pay_period_start,
            pay_period_end: submission.pay_period_end,
            week_1_start: submission.week_1_start,
            week_1_end: submission.week_1_end,
            week_1_hours: submission.week_1_hours,
            week_1_rate: submission.week_1_rate,
            week_1_notes: submission.week_1_notes,
            week_2_start: submission.week_2_start,
            week_2_end: submission.week_2_end,
            week_2_hours: submission.week_2_hours,
            week_2_rate: submission.week_2_rate,
            week_2_notes: submission.week_2_notes,
            subtotal: submission.subtotal,
            tax_rate: submission.tax_rate,
            tax_amount: submission.tax_amount,
            expenses: Some(submission.expenses),
            expenses_total: submission.expenses_total,
            total_amount: submission.total_amount,
            status: submission.status,
            submitted_at: submission.submitted_at,
            approval_1_at: None,
            approval_1_by: None,
            approval_2_at: None,
            approval_2_by: None,
            paid_at: None,
            rejected_at: None,
            rejected_by: None,
            rejection_reason: None,
            created_at: submission.submitted_at,
            updated_at: submission.submitted_at,
        }
    }

    #[test]
    fn submission_snaps_week_bounds_to_the_period() {
        let invoice = sample_invoice();
        assert_eq!(invoice.pay_period_start, invoice.week_1_start);
        assert_eq!(invoice.week_1_end + chrono::Duration::days(1), invoice.week_2_start);
        assert_eq!(invoice.week_2_end, invoice.pay_period_end);
    }

    #[test]
    fn recomputing_the_total_from_stored_fields_is_stable() {
        let invoice = sample_invoice();
        assert_eq!(invoice.recomputed_total(), invoice.total_amount);
    }

    #[test]
    fn expense_items_survive_the_json_round_trip() {
        let invoice = sample_invoice();
        let items = invoice.expense_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].merchant, "Home Depot");
        assert_eq!(items[0].amount, 127.46);
    }

    #[test]
    fn missing_expense_column_reads_as_no_expenses() {
        let mut invoice = sample_invoice();
        invoice.expenses = None;
        assert!(invoice.expense_items().is_empty());
    }
}
