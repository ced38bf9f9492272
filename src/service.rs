use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveTime, Utc};
use log::{debug, info};
use uuid::Uuid;

use crate::db::{Database, InvoiceFilter};
use crate::models::{
    Approver, Contractor, Invoice, InvoiceStatus, InvoiceSubmission, InvoiceWithContractor,
    NewContractor, TimecardEntry,
};
use crate::notify::{self, Event, Notifier, SummaryLine};
use crate::pay_period::{PayCalendar, PayPeriod};
use crate::workflow::{self, WorkflowEvent};

const ACTIVITY_LIMIT: i64 = 20;

/// Statuses that have cleared both approvals and belong on the summary sent
/// to the payment processor.
const SUMMARY_STATUSES: [InvoiceStatus; 3] = [
    InvoiceStatus::Approval2,
    InvoiceStatus::PendingPayment,
    InvoiceStatus::Paid,
];

/// Everything the application does, in one place: each operation loads state,
/// runs it through the workflow rules, writes the outcome, then notifies.
pub struct TimecardService<N: Notifier> {
    db: Database,
    notifier: N,
    calendar: PayCalendar,
}

/// How one pay period stands across all active contractors.
#[derive(Debug)]
pub struct PeriodSummary {
    pub period: PayPeriod,
    pub invoices: Vec<InvoiceWithContractor>,
    pub not_submitted: Vec<Contractor>,
    pub total_contractors: usize,
    pub labor_total: f64,
    pub expenses_total: f64,
    pub total_amount: f64,
    pub all_submitted: bool,
}

impl<N: Notifier> TimecardService<N> {
    pub fn new(db: Database, notifier: N, calendar: PayCalendar) -> Self {
        Self {
            db,
            notifier,
            calendar,
        }
    }

    pub fn calendar(&self) -> &PayCalendar {
        &self.calendar
    }

    pub async fn contractor_by_token(&self, token: &str) -> Result<Contractor> {
        let contractor = self
            .db
            .contractor_by_token(token)
            .await?
            .context("no active contractor matches this link token")?;
        debug!("token matched contractor #{} {}", contractor.id, contractor.name);
        Ok(contractor)
    }

    pub async fn approver_by_token(&self, token: &str) -> Result<Approver> {
        let approver = self
            .db
            .approver_by_token(token)
            .await?
            .context("no active approver matches this link token")?;
        debug!("token matched approver #{} {}", approver.id, approver.name);
        Ok(approver)
    }

    pub async fn invoice_for_period(
        &self,
        contractor: &Contractor,
        period: &PayPeriod,
    ) -> Result<Option<Invoice>> {
        self.db
            .invoice_for_period(contractor.id, period.start())
            .await
    }

    pub async fn invoice_history(&self, contractor: &Contractor) -> Result<Vec<Invoice>> {
        self.db.contractor_invoices(contractor.id).await
    }

    /// Submit the timecard for `period`, replacing any earlier submission
    /// that has not yet entered approval. Rejected cards may be fixed up and
    /// resubmitted the same way.
    pub async fn submit_timecard(
        &self,
        contractor: &Contractor,
        period: &PayPeriod,
        entry: &TimecardEntry,
    ) -> Result<Invoice> {
        if self.calendar.is_future(period) {
            bail!("Cannot submit a timecard for a future pay period");
        }
        if entry.is_empty() {
            bail!("Timecard has no hours or expenses to submit");
        }

        let existing = self
            .db
            .invoice_for_period(contractor.id, period.start())
            .await?;
        let now = Utc::now();
        let transition = workflow::apply(
            existing.as_ref().map(|i| i.status),
            &WorkflowEvent::Submit,
            now,
        )?;
        let submission =
            InvoiceSubmission::build(contractor.id, entry, period, transition.to, now)?;
        let invoice = self.db.submit_invoice(&submission).await?;
        info!(
            "{} submitted timecard for {} ({:.2} hours, ${:.2})",
            contractor.name,
            period.key(),
            invoice.total_hours(),
            invoice.total_amount
        );
        notify::dispatch(
            &self.notifier,
            Event::submitted(&invoice, contractor, existing.is_some()),
        )
        .await;
        Ok(invoice)
    }

    /// Sign off at the approver's own level. The workflow decides whether
    /// the invoice is actually at that gate.
    pub async fn approve(&self, approver: &Approver, invoice_id: i64) -> Result<Invoice> {
        let record = self.load_invoice(invoice_id).await?;
        let event = WorkflowEvent::Approve {
            level: approver.approval_level,
            approver: approver.name.clone(),
        };
        let transition = workflow::apply(Some(record.invoice.status), &event, Utc::now())?;
        let updated = self.db.apply_transition(invoice_id, &transition).await?;
        info!(
            "{} approved invoice {} ({} -> {})",
            approver.name, invoice_id, record.invoice.status, updated.status
        );
        notify::dispatch(&self.notifier, Event::approved(&updated, &record, approver)).await;
        Ok(updated)
    }

    pub async fn reject(
        &self,
        approver: &Approver,
        invoice_id: i64,
        reason: &str,
    ) -> Result<Invoice> {
        let record = self.load_invoice(invoice_id).await?;
        let event = WorkflowEvent::Reject {
            approver: approver.name.clone(),
            reason: reason.to_string(),
        };
        let transition = workflow::apply(Some(record.invoice.status), &event, Utc::now())?;
        let updated = self.db.apply_transition(invoice_id, &transition).await?;
        info!("{} rejected invoice {}", approver.name, invoice_id);
        notify::dispatch(&self.notifier, Event::rejected(&updated, &record, approver)).await;
        Ok(updated)
    }

    /// Push an invoice one step along the normal order, no approval gates.
    /// Steps that would have earned approval stamps earn them here too,
    /// attributed to `actor`.
    pub async fn advance(&self, invoice_id: i64, actor: &str) -> Result<Invoice> {
        let record = self.load_invoice(invoice_id).await?;
        let event = WorkflowEvent::Advance {
            actor: actor.to_string(),
        };
        let transition = workflow::apply(Some(record.invoice.status), &event, Utc::now())?;
        let updated = self.db.apply_transition(invoice_id, &transition).await?;
        info!(
            "{} advanced invoice {} ({} -> {})",
            actor, invoice_id, record.invoice.status, updated.status
        );
        notify::dispatch(
            &self.notifier,
            Event::status_changed(&updated, record.invoice.status),
        )
        .await;
        Ok(updated)
    }

    pub async fn delete_invoice(&self, invoice_id: i64) -> Result<()> {
        self.db.delete_invoice(invoice_id).await?;
        info!("deleted invoice {invoice_id}");
        Ok(())
    }

    pub async fn pending_for(&self, approver: &Approver) -> Result<Vec<InvoiceWithContractor>> {
        self.db
            .pending_approval(approver.approval_level.pending_status())
            .await
    }

    /// What this approver has acted on since local midnight, newest first.
    pub async fn activity_for(&self, approver: &Approver) -> Result<Vec<InvoiceWithContractor>> {
        let since = start_of_local_day(Local::now());
        self.db
            .approver_activity(&approver.name, since, ACTIVITY_LIMIT)
            .await
    }

    pub async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<InvoiceWithContractor>> {
        self.db.invoices(filter).await
    }

    pub async fn period_summary(&self, period: &PayPeriod) -> Result<PeriodSummary> {
        let invoices = self
            .db
            .invoices(&InvoiceFilter {
                period_start: Some(period.start()),
                ..InvoiceFilter::default()
            })
            .await?;
        let contractors = self.db.active_contractors().await?;

        let submitted: HashSet<i64> = invoices.iter().map(|r| r.invoice.contractor_id).collect();
        let not_submitted: Vec<Contractor> = contractors
            .iter()
            .filter(|c| !submitted.contains(&c.id))
            .cloned()
            .collect();
        let labor_total = invoices.iter().map(|r| r.invoice.subtotal).sum();
        let expenses_total = invoices.iter().map(|r| r.invoice.expenses_total).sum();
        let total_amount = invoices.iter().map(|r| r.invoice.total_amount).sum();
        let all_submitted = not_submitted.is_empty() && !contractors.is_empty();

        Ok(PeriodSummary {
            period: *period,
            total_contractors: contractors.len(),
            invoices,
            not_submitted,
            labor_total,
            expenses_total,
            total_amount,
            all_submitted,
        })
    }

    /// Nudge one contractor about a period. Unlike workflow notifications
    /// this send is the whole point of the operation, so failures surface.
    pub async fn send_reminder(
        &self,
        contractor_id: i64,
        period: &PayPeriod,
        notes: Option<&str>,
    ) -> Result<Contractor> {
        let contractor = self
            .db
            .contractor_by_id(contractor_id)
            .await?
            .with_context(|| format!("contractor {contractor_id} not found"))?;
        let invoice = self
            .db
            .invoice_for_period(contractor_id, period.start())
            .await?;
        self.notifier
            .notify(&Event::reminder(&contractor, period, invoice.as_ref(), notes))
            .await?;
        info!("sent timecard reminder to {}", contractor.name);
        Ok(contractor)
    }

    /// Send the payment processor a roll-up of every invoice in `period`
    /// that has cleared both approvals. Returns how many made the list.
    pub async fn send_period_summary(&self, period: &PayPeriod) -> Result<usize> {
        let invoices = self
            .db
            .invoices(&InvoiceFilter {
                period_start: Some(period.start()),
                ..InvoiceFilter::default()
            })
            .await?;
        let lines: Vec<SummaryLine> = invoices
            .iter()
            .filter(|r| SUMMARY_STATUSES.contains(&r.invoice.status))
            .map(|r| SummaryLine {
                contractor_name: r.contractor_name.clone(),
                status: r.invoice.status,
                total_amount: r.invoice.total_amount,
            })
            .collect();
        let count = lines.len();
        self.notifier
            .notify(&Event::period_summary(period, lines))
            .await?;
        info!("sent period summary for {} ({count} invoices)", period.key());
        Ok(count)
    }

    pub async fn list_contractors(&self) -> Result<Vec<Contractor>> {
        self.db.all_contractors().await
    }

    pub async fn add_contractor(
        &self,
        name: &str,
        email: &str,
        company: Option<String>,
        default_hourly_rate: f64,
    ) -> Result<Contractor> {
        let new = NewContractor {
            name: name.to_string(),
            email: email.to_string(),
            company,
            default_hourly_rate,
            url_token: Uuid::new_v4().simple().to_string(),
        };
        let contractor = self.db.insert_contractor(&new).await?;
        info!(
            "registered contractor {} with link token {}",
            contractor.name, contractor.url_token
        );
        Ok(contractor)
    }

    pub async fn set_contractor_active(&self, contractor_id: i64, active: bool) -> Result<Contractor> {
        let contractor = self.db.set_contractor_active(contractor_id, active).await?;
        info!(
            "contractor {} is now {}",
            contractor.name,
            if contractor.is_active { "active" } else { "inactive" }
        );
        Ok(contractor)
    }

    async fn load_invoice(&self, id: i64) -> Result<InvoiceWithContractor> {
        self.db
            .invoice_with_contractor(id)
            .await?
            .with_context(|| format!("invoice {id} not found"))
    }
}

/// Local midnight as a UTC instant. A DST jump can skip midnight itself; the
/// current instant stands in on such a day.
fn start_of_local_day(now: DateTime<Local>) -> DateTime<Utc> {
    now.date_naive()
        .and_time(NaiveTime::MIN)
        .and_local_timezone(Local)
        .earliest()
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc))
}
