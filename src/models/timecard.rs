use super::ExpenseItem;

/// Hours and rate for one week of a pay period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeekEntry {
    pub hours: f64,
    pub rate: f64,
    pub notes: Option<String>,
}

impl WeekEntry {
    pub fn amount(&self) -> f64 {
        self.hours * self.rate
    }
}

/// Everything a contractor fills in for one pay period, before it becomes
/// an invoice row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimecardEntry {
    pub week_1: WeekEntry,
    pub week_2: WeekEntry,
    pub tax_rate: Option<f64>,
    pub expenses: Vec<ExpenseItem>,
}

/// Derived invoice money. `tax_rate` is normalized here: a missing or
/// non-positive rate is carried as `None` and charges nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimecardTotals {
    pub subtotal: f64,
    pub tax_rate: Option<f64>,
    pub tax_amount: Option<f64>,
    pub expenses_total: f64,
    pub total: f64,
}

impl TimecardEntry {
    /// Invoice math. Tax applies to labor only; expenses are reimbursed
    /// untaxed on top.
    pub fn totals(&self) -> TimecardTotals {
        let subtotal = self.week_1.amount() + self.week_2.amount();
        let tax_rate = self.tax_rate.filter(|rate| *rate > 0.0);
        let tax_amount = tax_rate.map(|rate| subtotal * rate);
        let expenses_total = ExpenseItem::total(&self.expenses);
        let total = subtotal + tax_amount.unwrap_or(0.0) + expenses_total;
        TimecardTotals {
            subtotal,
            tax_rate,
            tax_amount,
            expenses_total,
            total,
        }
    }

    /// A timecard needs labor or expenses before it can be submitted.
    pub fn is_empty(&self) -> bool {
        let totals = self.totals();
        totals.subtotal <= 0.0 && totals.expenses_total <= 0.0
    }
}
