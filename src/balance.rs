//! The balance projector: turns one month's aggregated sums, the
//! household income, and the trailing variable-spend average into the
//! three balance figures shown on the overview.
//!
//! Everything here is a pure function of its inputs; the overview page
//! gathers the sums and hands them over.

use time::Date;

use crate::transaction::MonthlyTotals;

/// Where the viewed month sits relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthPosition {
    /// The viewed month ended before today's month.
    Past,
    /// Today falls inside the viewed month.
    Current,
    /// The viewed month starts after today's month.
    Future,
}

/// Classify `viewed`'s calendar month against `today`'s.
pub fn month_position(viewed: Date, today: Date) -> MonthPosition {
    let viewed = (viewed.year(), viewed.month() as u8);
    let today = (today.year(), today.month() as u8);

    match viewed.cmp(&today) {
        std::cmp::Ordering::Less => MonthPosition::Past,
        std::cmp::Ordering::Equal => MonthPosition::Current,
        std::cmp::Ordering::Greater => MonthPosition::Future,
    }
}

/// The mean of the current and previous calendar months' variable spend.
///
/// Each month is aggregated independently; this is the estimate used for
/// months whose variable spending is not yet known.
pub fn trailing_average(current_month_variable: f64, previous_month_variable: f64) -> f64 {
    (current_month_variable + previous_month_variable) / 2.0
}

/// Everything the projector needs for one viewed month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceInputs {
    /// The household's monthly income.
    pub income: f64,
    /// The viewed month's aggregated sums.
    pub totals: MonthlyTotals,
    /// The 2-month trailing average of variable spend (see [trailing_average]).
    pub trailing_average: f64,
    /// The sum of every budget ceiling, spent against or not.
    pub budget_ceiling: f64,
    /// Where the viewed month sits relative to today.
    pub position: MonthPosition,
}

/// The three balance figures for a viewed month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balances {
    /// Income minus everything recorded: the money literally left.
    pub actual: f64,
    /// Income minus committed spend and the variable-spend estimate.
    pub predicted: f64,
    /// Income minus committed spend and the total budget ceilings.
    pub planned: f64,
    /// The variable-spend estimate the prediction used.
    pub projected_variable: f64,
}

/// Produce the three balance figures for a viewed month.
///
/// The prediction's variable-spend estimate is the trailing average for
/// future months. For the current or a past month it is the greater of
/// the month's actual variable spend and the trailing average, so a month
/// that is already over the average is never under-predicted.
pub fn project(inputs: &BalanceInputs) -> Balances {
    let committed = inputs.totals.committed();

    let projected_variable = match inputs.position {
        MonthPosition::Future => inputs.trailing_average,
        MonthPosition::Current | MonthPosition::Past => {
            inputs.totals.variable.max(inputs.trailing_average)
        }
    };

    Balances {
        actual: inputs.income - (committed + inputs.totals.variable),
        predicted: inputs.income - (committed + projected_variable),
        planned: inputs.income - (committed + inputs.budget_ceiling),
        projected_variable,
    }
}

/// `part` as a percentage of `whole`, or 0 when `whole` is not positive.
///
/// Guards every percentage figure against a zero income or zero budget.
pub fn percent_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod month_position_tests {
    use time::macros::date;

    use super::{MonthPosition, month_position};

    #[test]
    fn same_month_is_current() {
        assert_eq!(
            month_position(date!(2026 - 08 - 01), date!(2026 - 08 - 31)),
            MonthPosition::Current
        );
    }

    #[test]
    fn earlier_month_is_past() {
        assert_eq!(
            month_position(date!(2026 - 07 - 31), date!(2026 - 08 - 01)),
            MonthPosition::Past
        );
    }

    #[test]
    fn later_month_is_future() {
        assert_eq!(
            month_position(date!(2026 - 09 - 01), date!(2026 - 08 - 31)),
            MonthPosition::Future
        );
    }

    #[test]
    fn year_dominates_month() {
        assert_eq!(
            month_position(date!(2027 - 01 - 01), date!(2026 - 12 - 31)),
            MonthPosition::Future
        );
        assert_eq!(
            month_position(date!(2025 - 12 - 01), date!(2026 - 01 - 15)),
            MonthPosition::Past
        );
    }
}
