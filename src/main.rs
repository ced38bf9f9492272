mod config;
mod db;
mod models;
mod notify;
mod pay_period;
mod service;
mod workflow;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

use crate::db::InvoiceFilter;
use crate::models::{
    ExpenseItem, Invoice, InvoiceStatus, InvoiceWithContractor, TimecardEntry, WeekEntry,
};
use crate::notify::WebhookNotifier;
use crate::pay_period::{PayPeriod, range_label};
use crate::service::TimecardService;

type Service = TimecardService<WebhookNotifier>;

#[derive(Parser)]
#[command(
    name = "timecard-manager",
    version,
    about = "Contractor timecard submission and two stage approval tracking"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show a contractor's pay period and timecard
    Status(StatusArgs),
    /// Submit or resubmit a timecard for a pay period
    Submit(SubmitArgs),
    /// List invoices waiting at an approver's level
    Pending(TokenArgs),
    /// Approve an invoice at the approver's level
    Approve(ApproveArgs),
    /// Reject an invoice back to the contractor, with a reason
    Reject(RejectArgs),
    /// Show what an approver has acted on today
    Activity(TokenArgs),
    /// Administrative operations
    #[command(subcommand)]
    Admin(AdminCommand),
    /// Contractor roster management
    #[command(subcommand)]
    Contractors(ContractorCommand),
}

#[derive(Args)]
struct TokenArgs {
    /// Personal link token
    #[arg(long)]
    token: String,
}

#[derive(Args)]
struct PeriodArgs {
    /// Any date inside the target pay period, defaults to today
    #[arg(long)]
    period: Option<NaiveDate>,
    /// Target the previous pay period instead of the current one
    #[arg(long, conflicts_with = "period")]
    last: bool,
    /// Target the next pay period instead of the current one
    #[arg(long, conflicts_with_all = ["period", "last"])]
    next: bool,
}

#[derive(Args)]
struct StatusArgs {
    #[command(flatten)]
    auth: TokenArgs,
    #[command(flatten)]
    period: PeriodArgs,
    /// Also list earlier invoices
    #[arg(long)]
    history: bool,
}

#[derive(Args)]
struct SubmitArgs {
    #[command(flatten)]
    auth: TokenArgs,
    #[command(flatten)]
    period: PeriodArgs,
    /// Hours worked in the first week
    #[arg(long, default_value_t = 0.0)]
    week1_hours: f64,
    /// Hourly rate for the first week, defaults to the contractor's rate
    #[arg(long)]
    week1_rate: Option<f64>,
    #[arg(long)]
    week1_notes: Option<String>,
    /// Hours worked in the second week
    #[arg(long, default_value_t = 0.0)]
    week2_hours: f64,
    /// Hourly rate for the second week, defaults to the first week's rate
    #[arg(long)]
    week2_rate: Option<f64>,
    #[arg(long)]
    week2_notes: Option<String>,
    /// Tax rate applied to labor, e.g. 0.04712 for Hawaii GET
    #[arg(long)]
    tax_rate: Option<f64>,
    /// Reimbursable expense as MERCHANT:AMOUNT or MERCHANT:AMOUNT:DESCRIPTION, repeatable
    #[arg(long = "expense")]
    expenses: Vec<ExpenseItem>,
}

#[derive(Args)]
struct ApproveArgs {
    #[command(flatten)]
    auth: TokenArgs,
    /// Invoice to approve
    #[arg(long)]
    invoice: i64,
}

#[derive(Args)]
struct RejectArgs {
    #[command(flatten)]
    auth: TokenArgs,
    /// Invoice to reject
    #[arg(long)]
    invoice: i64,
    /// Why the timecard is being sent back
    #[arg(long)]
    reason: String,
}

#[derive(Subcommand)]
enum AdminCommand {
    /// List invoices, optionally filtered
    List(ListArgs),
    /// Roll up one pay period across all active contractors
    Summary(PeriodArgs),
    /// Force an invoice one step forward in the workflow
    Advance(AdvanceArgs),
    /// Remove an invoice outright
    Delete(InvoiceArg),
    /// Send a timecard reminder to one contractor
    Remind(RemindArgs),
    /// Send the payment processor a summary of fully approved invoices
    SendSummary(PeriodArgs),
}

#[derive(Args)]
struct ListArgs {
    /// Filter by status, e.g. submitted or pending_payment
    #[arg(long)]
    status: Option<InvoiceStatus>,
    /// Filter by pay period, any date inside it
    #[arg(long)]
    period: Option<NaiveDate>,
    /// Filter by contractor
    #[arg(long)]
    contractor_id: Option<i64>,
}

#[derive(Args)]
struct AdvanceArgs {
    /// Invoice to advance
    #[arg(long)]
    invoice: i64,
    /// Name recorded on any approval stamp this step earns
    #[arg(long, default_value = "Admin")]
    actor: String,
}

#[derive(Args)]
struct InvoiceArg {
    #[arg(long)]
    invoice: i64,
}

#[derive(Args)]
struct RemindArgs {
    #[arg(long)]
    contractor_id: i64,
    #[command(flatten)]
    period: PeriodArgs,
    /// Extra context passed through with the reminder
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Subcommand)]
enum ContractorCommand {
    /// Show the roster with link tokens
    List,
    /// Register a contractor and mint their link token
    Add(AddContractorArgs),
    /// Re-enable a contractor's link
    Activate(IdArg),
    /// Disable a contractor's link without touching their history
    Deactivate(IdArg),
}

#[derive(Args)]
struct AddContractorArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    company: Option<String>,
    /// Prefilled hourly rate for new timecards
    #[arg(long, default_value_t = 0.0)]
    rate: f64,
}

#[derive(Args)]
struct IdArg {
    #[arg(long)]
    id: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = config::init()?;
    let database = db::init(&config).await?;
    let notifier = WebhookNotifier::new(config.webhook_url().map(str::to_string))?;
    let service = TimecardService::new(database, notifier, config.pay_calendar());

    match cli.command {
        Command::Status(args) => status(&service, args).await,
        Command::Submit(args) => submit(&service, args).await,
        Command::Pending(args) => pending(&service, args).await,
        Command::Approve(args) => approve(&service, args).await,
        Command::Reject(args) => reject(&service, args).await,
        Command::Activity(args) => activity(&service, args).await,
        Command::Admin(command) => admin(&service, command).await,
        Command::Contractors(command) => contractors(&service, command).await,
    }
}

fn resolve_period(service: &Service, args: &PeriodArgs) -> PayPeriod {
    let calendar = service.calendar();
    match args.period {
        Some(date) => calendar.period_for(date),
        None if args.last => calendar.current_period().previous(),
        None if args.next => calendar.current_period().next(),
        None => calendar.current_period(),
    }
}

async fn status(service: &Service, args: StatusArgs) -> Result<()> {
    let contractor = service.contractor_by_token(&args.auth.token).await?;
    let period = resolve_period(service, &args.period);
    let invoice = service.invoice_for_period(&contractor, &period).await?;
    let calendar = service.calendar();

    println!("{} <{}>", contractor.name, contractor.email);
    let tag = if calendar.is_current(&period) {
        " (current)"
    } else {
        ""
    };
    println!("Pay period: {}{tag}", period.label());

    let today = Local::now().date_naive();
    let marker = |week: u8| {
        if period.contains(today) && period.week_of(today) == week {
            "   <- this week"
        } else {
            ""
        }
    };
    println!("  Week 1:   {}{}", period.week_1().label(), marker(1));
    println!("  Week 2:   {}{}", period.week_2().label(), marker(2));

    match &invoice {
        None => println!("Status:     Pending (no timecard submitted)"),
        Some(invoice) => print_invoice_detail(invoice),
    }

    if args.history {
        let history = service.invoice_history(&contractor).await?;
        if history.is_empty() {
            println!();
            println!("No invoices on file.");
        } else {
            println!();
            println!("History:");
            for invoice in &history {
                println!(
                    "  {:<22} {:<16} {:>7.1} h  {:>12}",
                    range_label(invoice.pay_period_start, invoice.pay_period_end),
                    invoice.status.display_name(),
                    invoice.total_hours(),
                    money(invoice.total_amount)
                );
            }
        }
    } else if args.period.period.is_none() && !args.period.last && !args.period.next {
        let starts: Vec<String> = calendar
            .past_periods(3)
            .iter()
            .map(|p| p.key())
            .collect();
        println!();
        println!("Earlier periods (use --period): {}", starts.join(", "));
    }
    Ok(())
}

async fn submit(service: &Service, args: SubmitArgs) -> Result<()> {
    let contractor = service.contractor_by_token(&args.auth.token).await?;
    let period = resolve_period(service, &args.period);

    let week_1_rate = args.week1_rate.unwrap_or(contractor.default_hourly_rate);
    let week_2_rate = args.week2_rate.unwrap_or(week_1_rate);
    let entry = TimecardEntry {
        week_1: WeekEntry {
            hours: args.week1_hours,
            rate: week_1_rate,
            notes: args.week1_notes,
        },
        week_2: WeekEntry {
            hours: args.week2_hours,
            rate: week_2_rate,
            notes: args.week2_notes,
        },
        tax_rate: args.tax_rate,
        expenses: args.expenses,
    };

    let invoice = service.submit_timecard(&contractor, &period, &entry).await?;
    println!("Submitted timecard for {}", period.label());
    print_invoice_detail(&invoice);
    Ok(())
}

async fn pending(service: &Service, args: TokenArgs) -> Result<()> {
    let approver = service.approver_by_token(&args.token).await?;
    println!(
        "{} <{}>  {}",
        approver.name,
        approver.email,
        approver.approval_level.label()
    );
    let rows = service.pending_for(&approver).await?;
    if rows.is_empty() {
        println!("Nothing is waiting for approval.");
    } else {
        println!("{} waiting:", count_noun(rows.len(), "invoice"));
        print_invoice_rows(&rows);
    }
    Ok(())
}

async fn approve(service: &Service, args: ApproveArgs) -> Result<()> {
    let approver = service.approver_by_token(&args.auth.token).await?;
    let invoice = service.approve(&approver, args.invoice).await?;
    println!(
        "Invoice #{} is now {}",
        invoice.id,
        invoice.status.display_name()
    );
    Ok(())
}

async fn reject(service: &Service, args: RejectArgs) -> Result<()> {
    let approver = service.approver_by_token(&args.auth.token).await?;
    let invoice = service.reject(&approver, args.invoice, &args.reason).await?;
    println!("Invoice #{} rejected and returned to the contractor", invoice.id);
    if let Some(reason) = &invoice.rejection_reason {
        println!("  Reason: {reason}");
    }
    Ok(())
}

async fn activity(service: &Service, args: TokenArgs) -> Result<()> {
    let approver = service.approver_by_token(&args.token).await?;
    let rows = service.activity_for(&approver).await?;
    if rows.is_empty() {
        println!("No activity today for {}", approver.name);
    } else {
        println!("Today's activity for {}:", approver.name);
        print_invoice_rows(&rows);
    }
    Ok(())
}

async fn admin(service: &Service, command: AdminCommand) -> Result<()> {
    match command {
        AdminCommand::List(args) => {
            let filter = InvoiceFilter {
                status: args.status,
                period_start: args
                    .period
                    .map(|date| service.calendar().period_for(date).start()),
                contractor_id: args.contractor_id,
            };
            let rows = service.list_invoices(&filter).await?;
            if rows.is_empty() {
                println!("No invoices match.");
            } else {
                println!("{}:", count_noun(rows.len(), "invoice"));
                print_invoice_rows(&rows);
            }
        }
        AdminCommand::Summary(args) => {
            let period = resolve_period(service, &args);
            let summary = service.period_summary(&period).await?;
            println!("Pay period {}", summary.period.label());
            println!(
                "  Submitted: {} of {} active contractors",
                summary.invoices.len(),
                summary.total_contractors
            );
            println!("  Labor:     {}", money(summary.labor_total));
            println!("  Expenses:  {}", money(summary.expenses_total));
            println!("  Total:     {}", money(summary.total_amount));
            if summary.all_submitted {
                println!("  Every active contractor has submitted.");
            }
            if !summary.invoices.is_empty() {
                println!();
                print_invoice_rows(&summary.invoices);
            }
            if !summary.not_submitted.is_empty() {
                println!();
                println!("  Waiting on:");
                for contractor in &summary.not_submitted {
                    println!("    {} <{}>", contractor.name, contractor.email);
                }
            }
        }
        AdminCommand::Advance(args) => {
            let invoice = service.advance(args.invoice, &args.actor).await?;
            println!(
                "Invoice #{} is now {}",
                invoice.id,
                invoice.status.display_name()
            );
        }
        AdminCommand::Delete(args) => {
            service.delete_invoice(args.invoice).await?;
            println!("Invoice #{} deleted", args.invoice);
        }
        AdminCommand::Remind(args) => {
            let period = resolve_period(service, &args.period);
            let contractor = service
                .send_reminder(args.contractor_id, &period, args.notes.as_deref())
                .await?;
            println!(
                "Reminder sent to {} for {}",
                contractor.name,
                period.label()
            );
        }
        AdminCommand::SendSummary(args) => {
            let period = resolve_period(service, &args);
            let count = service.send_period_summary(&period).await?;
            println!(
                "Summary for {} sent ({})",
                period.label(),
                count_noun(count, "fully approved invoice")
            );
        }
    }
    Ok(())
}

async fn contractors(service: &Service, command: ContractorCommand) -> Result<()> {
    match command {
        ContractorCommand::List => {
            let contractors = service.list_contractors().await?;
            if contractors.is_empty() {
                println!("No contractors registered.");
            }
            for c in &contractors {
                println!(
                    "  #{:<4} {:<24} {:<28} {:>9}/h  {:<8} token {}",
                    c.id,
                    c.name,
                    c.email,
                    money(c.default_hourly_rate),
                    if c.is_active { "active" } else { "inactive" },
                    c.url_token
                );
            }
        }
        ContractorCommand::Add(args) => {
            let contractor = service
                .add_contractor(&args.name, &args.email, args.company, args.rate)
                .await?;
            println!("Added {} (#{})", contractor.name, contractor.id);
            println!("Link token: {}", contractor.url_token);
        }
        ContractorCommand::Activate(args) => {
            let contractor = service.set_contractor_active(args.id, true).await?;
            println!("{} is active again", contractor.name);
        }
        ContractorCommand::Deactivate(args) => {
            let contractor = service.set_contractor_active(args.id, false).await?;
            println!("{} is deactivated", contractor.name);
        }
    }
    Ok(())
}

fn print_invoice_detail(invoice: &Invoice) {
    println!("Status:     {}", invoice.status.display_name());
    println!("  Submitted {}", local_stamp(invoice.submitted_at));
    if let (Some(at), Some(by)) = (invoice.approval_1_at, &invoice.approval_1_by) {
        println!("  First approval by {by} {}", local_stamp(at));
    }
    if let (Some(at), Some(by)) = (invoice.approval_2_at, &invoice.approval_2_by) {
        println!("  Second approval by {by} {}", local_stamp(at));
    }
    if let Some(at) = invoice.paid_at {
        println!("  Paid {}", local_stamp(at));
    }
    if let (Some(by), Some(reason)) = (&invoice.rejected_by, &invoice.rejection_reason) {
        println!("  Rejected by {by}: {reason}");
    }
    println!(
        "  Week 1:   {:>6.1} h @ {}{}",
        invoice.week_1_hours,
        money(invoice.week_1_rate),
        note_suffix(&invoice.week_1_notes)
    );
    println!(
        "  Week 2:   {:>6.1} h @ {}{}",
        invoice.week_2_hours,
        money(invoice.week_2_rate),
        note_suffix(&invoice.week_2_notes)
    );
    println!("  Labor:    {}", money(invoice.subtotal));
    if let (Some(rate), Some(amount)) = (invoice.tax_rate, invoice.tax_amount) {
        println!("  Tax:      {} at {:.3}%", money(amount), rate * 100.0);
    }
    let expenses = invoice.expense_items();
    if !expenses.is_empty() {
        println!("  Expenses: {} (untaxed)", money(invoice.expenses_total));
        for item in &expenses {
            let description = if item.description.is_empty() {
                String::new()
            } else {
                format!(" ({})", item.description)
            };
            println!("    {} {}{description}", money(item.amount), item.merchant);
        }
    }
    println!(
        "  Total:    {} ({:.1} hours)",
        money(invoice.total_amount),
        invoice.total_hours()
    );
    if (invoice.recomputed_total() - invoice.total_amount).abs() > 0.005 {
        println!("  Note: stored total does not match the recomputed total");
    }
}

fn print_invoice_rows(rows: &[InvoiceWithContractor]) {
    for row in rows {
        let invoice = &row.invoice;
        println!(
            "  #{:<4} {:<24} {:<22} {:>7.1} h  {:>12}  {}",
            invoice.id,
            row.contractor_name,
            range_label(invoice.pay_period_start, invoice.pay_period_end),
            invoice.total_hours(),
            money(invoice.total_amount),
            invoice.status.display_name()
        );
    }
}

fn note_suffix(notes: &Option<String>) -> String {
    match notes {
        Some(notes) if !notes.is_empty() => format!("  ({notes})"),
        _ => String::new(),
    }
}

fn count_noun(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn money(amount: f64) -> String {
    format!("${amount:.2}")
}

fn local_stamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%b %-d, %H:%M").to_string()
}
