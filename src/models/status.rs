use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Workflow position of a submitted invoice. A pay period with no invoice
/// row has no status at all; "pending" is the absence of a row, never a
/// stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceStatus {
    #[serde(rename = "submitted")]
    Submitted,
    #[serde(rename = "approval_1")]
    Approval1,
    #[serde(rename = "approval_2")]
    Approval2,
    #[serde(rename = "pending_payment")]
    PendingPayment,
    #[serde(rename = "paid")]
    Paid,
    #[serde(rename = "rejected")]
    Rejected,
}

impl InvoiceStatus {
    /// Wire and column representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Submitted => "submitted",
            InvoiceStatus::Approval1 => "approval_1",
            InvoiceStatus::Approval2 => "approval_2",
            InvoiceStatus::PendingPayment => "pending_payment",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Rejected => "rejected",
        }
    }

    /// Label shown to people, e.g. in listings.
    pub const fn display_name(&self) -> &'static str {
        match self {
            InvoiceStatus::Submitted => "Submitted",
            InvoiceStatus::Approval1 => "First Approved",
            InvoiceStatus::Approval2 => "Second Approved",
            InvoiceStatus::PendingPayment => "Pending Payment",
            InvoiceStatus::Paid => "Paid",
            InvoiceStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized invoice status `{0}`")]
pub struct InvalidStatus(pub String);

impl FromStr for InvoiceStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(InvoiceStatus::Submitted),
            "approval_1" => Ok(InvoiceStatus::Approval1),
            "approval_2" => Ok(InvoiceStatus::Approval2),
            "pending_payment" => Ok(InvoiceStatus::PendingPayment),
            "paid" => Ok(InvoiceStatus::Paid),
            "rejected" => Ok(InvoiceStatus::Rejected),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for InvoiceStatus {
    type Error = InvalidStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_column_representation() {
        let all = [
            InvoiceStatus::Submitted,
            InvoiceStatus::Approval1,
            InvoiceStatus::Approval2,
            InvoiceStatus::PendingPayment,
            InvoiceStatus::Paid,
            InvoiceStatus::Rejected,
        ];
        for status in all {
            assert_eq!(status.as_str().parse::<InvoiceStatus>(), Ok(status));
        }
    }

    #[test]
    fn rejects_unknown_and_differently_cased_values() {
        assert!("Pending".parse::<InvoiceStatus>().is_err());
        assert!("pending".parse::<InvoiceStatus>().is_err());
        assert!("APPROVAL_1".parse::<InvoiceStatus>().is_err());
        assert!("".parse::<InvoiceStatus>().is_err());
    }

    #[test]
    fn serializes_as_the_wire_string() {
        let json = serde_json::to_string(&InvoiceStatus::Approval1).unwrap();
        assert_eq!(json, "\"approval_1\"");
        let back: InvoiceStatus = serde_json::from_str("\"pending_payment\"").unwrap();
        assert_eq!(back, InvoiceStatus::PendingPayment);
    }
}
