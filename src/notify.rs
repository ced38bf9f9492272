use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

use crate::models::{Approver, Contractor, Invoice, InvoiceStatus, InvoiceWithContractor};
use crate::pay_period::PayPeriod;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook returned {0}")]
    Status(reqwest::StatusCode),
}

/// Outbound notification, serialized as a JSON envelope with an `event`
/// discriminator and camelCase payload fields. The embedded `invoice` and
/// `contractor` objects keep their column names.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Event {
    InvoiceSubmitted {
        invoice: Invoice,
        contractor: Contractor,
        contractor_name: String,
        contractor_email: String,
        contractor_company: Option<String>,
        is_resubmission: bool,
        pay_period_start: NaiveDate,
        pay_period_end: NaiveDate,
        week_1_hours: f64,
        week_1_rate: f64,
        week_1_notes: Option<String>,
        week_2_hours: f64,
        week_2_rate: f64,
        week_2_notes: Option<String>,
        total_amount: f64,
    },
    InvoiceApproved {
        invoice: Invoice,
        contractor_name: String,
        contractor_email: String,
        contractor_company: Option<String>,
        approver_name: String,
        approval_level: i16,
        approval_label: String,
        previous_status: InvoiceStatus,
        new_status: InvoiceStatus,
        total_amount: f64,
    },
    InvoiceRejected {
        invoice: Invoice,
        contractor_name: String,
        contractor_email: String,
        contractor_company: Option<String>,
        approver_name: String,
        rejection_reason: String,
        previous_status: InvoiceStatus,
        total_amount: f64,
    },
    StatusChanged {
        invoice: Invoice,
        previous_status: InvoiceStatus,
        new_status: InvoiceStatus,
    },
    TimecardReminder {
        contractor: Contractor,
        contractor_name: String,
        contractor_email: String,
        pay_period_start: NaiveDate,
        pay_period_end: NaiveDate,
        pay_period_label: String,
        invoice_status: Option<InvoiceStatus>,
        notes: Option<String>,
    },
    PeriodSummary {
        pay_period_start: NaiveDate,
        pay_period_end: NaiveDate,
        pay_period_label: String,
        invoice_count: usize,
        total_amount: f64,
        invoices: Vec<SummaryLine>,
    },
}

/// One row of a period summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryLine {
    pub contractor_name: String,
    pub status: InvoiceStatus,
    pub total_amount: f64,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::InvoiceSubmitted { .. } => "invoice_submitted",
            Event::InvoiceApproved { .. } => "invoice_approved",
            Event::InvoiceRejected { .. } => "invoice_rejected",
            Event::StatusChanged { .. } => "status_changed",
            Event::TimecardReminder { .. } => "timecard_reminder",
            Event::PeriodSummary { .. } => "period_summary",
        }
    }

    pub fn submitted(invoice: &Invoice, contractor: &Contractor, is_resubmission: bool) -> Event {
        Event::InvoiceSubmitted {
            invoice: invoice.clone(),
            contractor: contractor.clone(),
            contractor_name: contractor.name.clone(),
            contractor_email: contractor.email.clone(),
            contractor_company: contractor.company.clone(),
            is_resubmission,
            pay_period_start: invoice.pay_period_start,
            pay_period_end: invoice.pay_period_end,
            week_1_hours: invoice.week_1_hours,
            week_1_rate: invoice.week_1_rate,
            week_1_notes: invoice.week_1_notes.clone(),
            week_2_hours: invoice.week_2_hours,
            week_2_rate: invoice.week_2_rate,
            week_2_notes: invoice.week_2_notes.clone(),
            total_amount: invoice.total_amount,
        }
    }

    /// `updated` is the row after the transition; `record` is the pre-event
    /// row with contractor columns attached.
    pub fn approved(updated: &Invoice, record: &InvoiceWithContractor, approver: &Approver) -> Event {
        Event::InvoiceApproved {
            invoice: updated.clone(),
            contractor_name: record.contractor_name.clone(),
            contractor_email: record.contractor_email.clone(),
            contractor_company: record.contractor_company.clone(),
            approver_name: approver.name.clone(),
            approval_level: approver.approval_level.as_i16(),
            approval_label: approver.approval_level.label().to_string(),
            previous_status: record.invoice.status,
            new_status: updated.status,
            total_amount: updated.total_amount,
        }
    }

    pub fn rejected(updated: &Invoice, record: &InvoiceWithContractor, approver: &Approver) -> Event {
        Event::InvoiceRejected {
            invoice: updated.clone(),
            contractor_name: record.contractor_name.clone(),
            contractor_email: record.contractor_email.clone(),
            contractor_company: record.contractor_company.clone(),
            approver_name: approver.name.clone(),
            rejection_reason: updated.rejection_reason.clone().unwrap_or_default(),
            previous_status: record.invoice.status,
            total_amount: updated.total_amount,
        }
    }

    pub fn status_changed(updated: &Invoice, previous: InvoiceStatus) -> Event {
        Event::StatusChanged {
            invoice: updated.clone(),
            previous_status: previous,
            new_status: updated.status,
        }
    }

    pub fn reminder(
        contractor: &Contractor,
        period: &PayPeriod,
        invoice: Option<&Invoice>,
        notes: Option<&str>,
    ) -> Event {
        Event::TimecardReminder {
            contractor: contractor.clone(),
            contractor_name: contractor.name.clone(),
            contractor_email: contractor.email.clone(),
            pay_period_start: period.start(),
            pay_period_end: period.end(),
            pay_period_label: period.label(),
            invoice_status: invoice.map(|i| i.status),
            notes: notes.map(str::to_string),
        }
    }

    pub fn period_summary(period: &PayPeriod, lines: Vec<SummaryLine>) -> Event {
        Event::PeriodSummary {
            pay_period_start: period.start(),
            pay_period_end: period.end(),
            pay_period_label: period.label(),
            invoice_count: lines.len(),
            total_amount: lines.iter().map(|line| line.total_amount).sum(),
            invoices: lines,
        }
    }
}

/// Delivery seam. The service is generic over this so tests can watch what
/// would have been sent.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &Event) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Posts events to the configured webhook. With no URL configured every
/// send quietly succeeds, which keeps local setups working.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, url })
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        let Some(url) = &self.url else {
            debug!("no webhook configured, dropping {} event", event.name());
            return Ok(());
        };
        let response = self.client.post(url).json(event).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status()));
        }
        debug!("delivered {} event", event.name());
        Ok(())
    }
}

/// Best-effort delivery used after workflow transitions. A webhook outage
/// must never make a committed state change look failed, so errors are
/// logged and swallowed here.
pub async fn dispatch<N: Notifier>(notifier: &N, event: Event) {
    if let Err(err) = notifier.notify(&event).await {
        warn!("failed to deliver {} notification: {err}", event.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApprovalLevel;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn contractor() -> Contractor {
        Contractor {
            id: 7,
            name: "Kai Nakamura".to_string(),
            email: "kai@example.com".to_string(),
            company: Some("Nakamura Builders".to_string()),
            default_hourly_rate: 85.0,
            is_active: true,
            url_token: "f3a9c2".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
        }
    }

    fn approver(level: ApprovalLevel) -> Approver {
        Approver {
            id: 2,
            name: "Dana Reyes".to_string(),
            email: "dana@example.com".to_string(),
            approval_level: level,
        }
    }

    fn invoice(status: InvoiceStatus) -> Invoice {
        let submitted = Utc.with_ymd_and_hms(2025, 12, 10, 18, 30, 0).unwrap();
        let date = |m: u32, d: u32| chrono::NaiveDate::from_ymd_opt(2025, m, d).unwrap();
        Invoice {
            id: 41,
            contractor_id: 7,
            pay_period_start: date(12, 1),
            pay_period_end: date(12, 14),
            week_1_start: date(12, 1),
            week_1_end: date(12, 7),
            week_1_hours: 40.0,
            week_1_rate: 85.0,
            week_1_notes: Some("Framing".to_string()),
            week_2_start: date(12, 8),
            week_2_end: date(12, 14),
            week_2_hours: 32.0,
            week_2_rate: 85.0,
            week_2_notes: None,
            subtotal: 6120.0,
            tax_rate: None,
            tax_amount: None,
            expenses: Some("[]".to_string()),
            expenses_total: 0.0,
            total_amount: 6120.0,
            status,
            submitted_at: submitted,
            approval_1_at: None,
            approval_1_by: None,
            approval_2_at: None,
            approval_2_by: None,
            paid_at: None,
            rejected_at: None,
            rejected_by: None,
            rejection_reason: None,
            created_at: submitted,
            updated_at: submitted,
        }
    }

    fn record(status: InvoiceStatus) -> InvoiceWithContractor {
        InvoiceWithContractor {
            invoice: invoice(status),
            contractor_name: "Kai Nakamura".to_string(),
            contractor_email: "kai@example.com".to_string(),
            contractor_company: Some("Nakamura Builders".to_string()),
        }
    }

    #[test]
    fn submitted_event_flattens_contractor_and_week_fields() {
        let event = Event::submitted(&invoice(InvoiceStatus::Submitted), &contractor(), true);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "invoice_submitted");
        assert_eq!(json["contractorName"], "Kai Nakamura");
        assert_eq!(json["isResubmission"], true);
        assert_eq!(json["week1Hours"], 40.0);
        assert_eq!(json["week2Notes"], serde_json::Value::Null);
        assert_eq!(json["payPeriodStart"], "2025-12-01");
        assert_eq!(json["invoice"]["status"], "submitted");
        assert_eq!(json["invoice"]["pay_period_end"], "2025-12-14");
        assert_eq!(json["contractor"]["url_token"], "f3a9c2");
    }

    #[test]
    fn approved_event_reports_both_statuses_and_the_level() {
        let mut updated = invoice(InvoiceStatus::Approval2);
        updated.approval_2_by = Some("Dana Reyes".to_string());
        let event = Event::approved(
            &updated,
            &record(InvoiceStatus::Approval1),
            &approver(ApprovalLevel::Second),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "invoice_approved");
        assert_eq!(json["approverName"], "Dana Reyes");
        assert_eq!(json["approvalLevel"], 2);
        assert_eq!(json["approvalLabel"], "Final Approval (2/2)");
        assert_eq!(json["previousStatus"], "approval_1");
        assert_eq!(json["newStatus"], "approval_2");
    }

    #[test]
    fn rejected_event_carries_the_reason() {
        let mut updated = invoice(InvoiceStatus::Rejected);
        updated.rejection_reason = Some("Week 2 hours look doubled".to_string());
        let event = Event::rejected(
            &updated,
            &record(InvoiceStatus::Submitted),
            &approver(ApprovalLevel::First),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "invoice_rejected");
        assert_eq!(json["rejectionReason"], "Week 2 hours look doubled");
        assert_eq!(json["previousStatus"], "submitted");
    }

    #[test]
    fn reminder_event_reports_missing_invoices_as_null_status() {
        let calendar = crate::pay_period::PayCalendar::default();
        let period = calendar.period_for(calendar.anchor());
        let event = Event::reminder(&contractor(), &period, None, Some("second notice"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "timecard_reminder");
        assert_eq!(json["invoiceStatus"], serde_json::Value::Null);
        assert_eq!(json["payPeriodLabel"], "Dec 1 - Dec 14, 2025");
        assert_eq!(json["notes"], "second notice");
    }

    #[test]
    fn period_summary_totals_its_lines() {
        let calendar = crate::pay_period::PayCalendar::default();
        let period = calendar.period_for(calendar.anchor());
        let event = Event::period_summary(
            &period,
            vec![
                SummaryLine {
                    contractor_name: "Kai Nakamura".to_string(),
                    status: InvoiceStatus::Approval2,
                    total_amount: 6120.0,
                },
                SummaryLine {
                    contractor_name: "Rosa Ibarra".to_string(),
                    status: InvoiceStatus::PendingPayment,
                    total_amount: 2400.0,
                },
            ],
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "period_summary");
        assert_eq!(json["invoiceCount"], 2);
        assert_eq!(json["totalAmount"], 8520.0);
        assert_eq!(json["invoices"][1]["contractorName"], "Rosa Ibarra");
        assert_eq!(json["invoices"][1]["status"], "pending_payment");
    }

    struct Failing;

    impl Notifier for Failing {
        async fn notify(&self, _event: &Event) -> Result<(), NotifyError> {
            Err(NotifyError::Status(
                reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }

    struct Recording(Mutex<Vec<String>>);

    impl Notifier for Recording {
        async fn notify(&self, event: &Event) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(event.name().to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatch_swallows_delivery_failures() {
        let event = Event::submitted(&invoice(InvoiceStatus::Submitted), &contractor(), false);
        dispatch(&Failing, event).await;
    }

    #[tokio::test]
    async fn dispatch_hands_the_event_to_the_notifier() {
        let sink = Recording(Mutex::new(Vec::new()));
        let event = Event::status_changed(&invoice(InvoiceStatus::Paid), InvoiceStatus::PendingPayment);
        dispatch(&sink, event).await;
        assert_eq!(*sink.0.lock().unwrap(), vec!["status_changed".to_string()]);
    }

    #[tokio::test]
    async fn unconfigured_webhook_drops_events_without_error() {
        let notifier = WebhookNotifier::new(None).unwrap();
        let event = Event::submitted(&invoice(InvoiceStatus::Submitted), &contractor(), false);
        assert!(notifier.notify(&event).await.is_ok());
    }
}
