use thiserror::Error;

use super::InvoiceStatus;

/// Which of the two approval stages an approver acts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalLevel {
    First,
    Second,
}

impl ApprovalLevel {
    pub const fn as_i16(&self) -> i16 {
        match self {
            ApprovalLevel::First => 1,
            ApprovalLevel::Second => 2,
        }
    }

    /// Status an invoice must hold to appear in this level's queue.
    pub const fn pending_status(&self) -> InvoiceStatus {
        match self {
            ApprovalLevel::First => InvoiceStatus::Submitted,
            ApprovalLevel::Second => InvoiceStatus::Approval1,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            ApprovalLevel::First => "First Approval (1/2)",
            ApprovalLevel::Second => "Final Approval (2/2)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("approval level must be 1 or 2, got {0}")]
pub struct InvalidApprovalLevel(pub i16);

impl TryFrom<i16> for ApprovalLevel {
    type Error = InvalidApprovalLevel;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ApprovalLevel::First),
            2 => Ok(ApprovalLevel::Second),
            other => Err(InvalidApprovalLevel(other)),
        }
    }
}

/// An approver, looked up by personal link token just like contractors.
/// Carries only the columns the application reads back.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Approver {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[sqlx(try_from = "i16")]
    pub approval_level: ApprovalLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_their_queue_status() {
        assert_eq!(ApprovalLevel::First.pending_status(), InvoiceStatus::Submitted);
        assert_eq!(ApprovalLevel::Second.pending_status(), InvoiceStatus::Approval1);
    }

    #[test]
    fn only_one_and_two_are_valid_levels() {
        assert_eq!(ApprovalLevel::try_from(1), Ok(ApprovalLevel::First));
        assert_eq!(ApprovalLevel::try_from(2), Ok(ApprovalLevel::Second));
        assert!(ApprovalLevel::try_from(0).is_err());
        assert!(ApprovalLevel::try_from(3).is_err());
    }
}
