mod approver;
mod contractor;
mod expense;
mod invoice;
mod status;
mod timecard;

pub use approver::{ApprovalLevel, Approver, InvalidApprovalLevel};
pub use contractor::{Contractor, NewContractor};
pub use expense::{ExpenseItem, ParseExpenseError};
pub use invoice::{Invoice, InvoiceSubmission, InvoiceWithContractor};
pub use status::{InvalidStatus, InvoiceStatus};
pub use timecard::{TimecardEntry, TimecardTotals, WeekEntry};
