//! Month arithmetic and the monthly aggregation queries.
//!
//! The aggregator is a pure function of the stored record set and the
//! reference month: fetch every record whose date falls inside the month,
//! then partition the sums by kind and by category.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use time::{Date, Month, OffsetDateTime};

use crate::{
    Error,
    database_id::HouseholdId,
    transaction::core::{
        KIND_VARIABLE, TRANSACTION_COLUMNS, Transaction, TransactionKind, map_transaction_row,
    },
};

/// The inclusive first-to-last-day range of `reference`'s calendar month.
pub fn month_bounds(reference: Date) -> RangeInclusive<Date> {
    let first = reference
        .replace_day(1)
        .expect("day 1 is valid in every month");
    let last = reference
        .replace_day(time::util::days_in_year_month(
            reference.year(),
            reference.month(),
        ))
        .expect("the length of a month is a valid day in it");

    first..=last
}

/// Shift `date` by `months` calendar months, preserving the day-of-month.
///
/// Days past the end of the target month are clamped to its last day,
/// e.g. January 31 plus one month is February 28 (or 29).
pub fn shift_months(date: Date, months: i32) -> Date {
    let mut year = date.year();
    let mut month = date.month();

    for _ in 0..months.abs() {
        if months > 0 {
            if month == Month::December {
                year += 1;
            }
            month = month.next();
        } else {
            if month == Month::January {
                year -= 1;
            }
            month = month.previous();
        }
    }

    let day = date.day().min(time::util::days_in_year_month(year, month));

    Date::from_calendar_date(year, month, day)
        .expect("a clamped day is always valid for the target month")
}

/// Parse a `YYYY-MM` month query parameter into the first day of that month.
pub fn parse_month_param(value: &str) -> Option<Date> {
    let (year, month) = value.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u8 = month.parse().ok()?;
    let month = Month::try_from(month).ok()?;

    Date::from_calendar_date(year, month, 1).ok()
}

/// Format a date's month as a `YYYY-MM` query parameter.
pub fn format_month_param(date: Date) -> String {
    format!("{:04}-{:02}", date.year(), date.month() as u8)
}

/// A human-readable month heading, e.g. "August 2026".
pub fn month_title(date: Date) -> String {
    format!("{} {}", date.month(), date.year())
}

/// The month being viewed, as a `YYYY-MM` query parameter.
#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    /// The viewed month; the current month when absent.
    pub month: Option<String>,
}

impl MonthQuery {
    /// The first day of the viewed month, defaulting to today's month.
    pub fn viewed_month(&self) -> Date {
        self.month
            .as_deref()
            .and_then(parse_month_param)
            .unwrap_or_else(|| OffsetDateTime::now_utc().date())
    }
}

/// The previous/next month navigation header shown on month-scoped pages.
///
/// `page` is the path of the page being navigated; the links keep the
/// viewer on the same page with the month query parameter shifted.
pub fn month_navigation(page: &str, viewed: Date) -> Markup {
    let previous_url = format!(
        "{page}?month={}",
        format_month_param(shift_months(viewed, -1))
    );
    let next_url = format!("{page}?month={}", format_month_param(shift_months(viewed, 1)));

    html!(
        div class="flex justify-between items-center p-4 rounded-xl bg-white dark:bg-gray-800 border border-gray-200 dark:border-gray-700"
        {
            a
                href=(previous_url)
                class="text-gray-500 hover:text-gray-900 dark:hover:text-white"
            {
                "< Previous"
            }

            h2 class="text-xl font-bold" { (month_title(viewed)) }

            a
                href=(next_url)
                class="text-gray-500 hover:text-gray-900 dark:hover:text-white"
            {
                "Next >"
            }
        }
    )
}

/// Retrieve every transaction of `household_id` dated within the calendar
/// month containing `reference`, regardless of which batch created it.
///
/// Records are ordered by date then ID so listings are stable.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_month_transactions(
    household_id: HouseholdId,
    reference: Date,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let bounds = month_bounds(reference);
    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
         WHERE household_id = ?1 AND date BETWEEN ?2 AND ?3
         ORDER BY date ASC, id ASC"
    );

    connection
        .prepare(&query)?
        .query_map(
            (household_id, bounds.start(), bounds.end()),
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// The per-kind expense sums for one month.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct MonthlyTotals {
    /// The sum of FIXED amounts.
    pub fixed: f64,
    /// The sum of INSTALLMENT amounts.
    pub installments: f64,
    /// The sum of VARIABLE amounts.
    pub variable: f64,
}

impl MonthlyTotals {
    /// Fixed costs plus installments: the month's committed spend.
    pub fn committed(&self) -> f64 {
        self.fixed + self.installments
    }

    /// Everything spent in the month across all three kinds.
    pub fn total(&self) -> f64 {
        self.fixed + self.installments + self.variable
    }
}

/// Partition `transactions` by kind and sum each partition.
pub fn totals_by_kind(transactions: &[Transaction]) -> MonthlyTotals {
    let mut totals = MonthlyTotals::default();

    for transaction in transactions {
        match transaction.kind {
            TransactionKind::Fixed { .. } => totals.fixed += transaction.amount,
            TransactionKind::Installment(_) => totals.installments += transaction.amount,
            TransactionKind::Variable => totals.variable += transaction.amount,
        }
    }

    totals
}

/// Sum the amounts of the already-paid transactions in `transactions`.
pub fn paid_total<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> f64 {
    transactions
        .into_iter()
        .filter(|transaction| transaction.is_paid)
        .map(|transaction| transaction.amount)
        .sum()
}

/// One variable-expense category's spend for the month.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySpend {
    /// The category label as recorded on the transactions.
    pub category: String,
    /// The sum of the category's VARIABLE amounts.
    pub total: f64,
}

/// Sum the VARIABLE transactions in `transactions` per category.
///
/// Categories are returned in alphabetical order.
pub fn variable_spend_by_category(transactions: &[Transaction]) -> Vec<CategorySpend> {
    let mut by_category: BTreeMap<&str, f64> = BTreeMap::new();

    for transaction in transactions {
        if transaction.kind == TransactionKind::Variable {
            *by_category.entry(&transaction.category).or_default() += transaction.amount;
        }
    }

    by_category
        .into_iter()
        .map(|(category, total)| CategorySpend {
            category: category.to_owned(),
            total,
        })
        .collect()
}

/// Sum the VARIABLE amounts of `household_id` for `reference`'s month
/// directly in SQL.
///
/// Used for the trailing-average months so the overview does not fetch
/// several full months of rows just to add them up.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn variable_total_for_month(
    household_id: HouseholdId,
    reference: Date,
    connection: &Connection,
) -> Result<f64, Error> {
    let bounds = month_bounds(reference);

    let total = connection
        .prepare(
            "SELECT COALESCE(SUM(amount), 0) FROM \"transaction\"
             WHERE household_id = ?1 AND kind = ?2 AND date BETWEEN ?3 AND ?4",
        )?
        .query_row(
            (household_id, KIND_VARIABLE, bounds.start(), bounds.end()),
            |row| row.get(0),
        )?;

    Ok(total)
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod aggregation_tests {
    use time::macros::date;

    use crate::transaction::{
        core::create_transaction,
        generate::{InstallmentPurchase, create_installment_purchase},
        test_utils::{new_fixed_transaction, new_variable_transaction, test_household},
    };

    use super::{
        get_month_transactions, paid_total, totals_by_kind, variable_spend_by_category,
        variable_total_for_month,
    };

    #[test]
    fn sums_partition_by_kind() {
        let (conn, household_id, user_id) = test_household();
        let in_month = date!(2026 - 08 - 10);

        create_transaction(
            new_fixed_transaction(household_id, user_id, 1200.0, in_month),
            &conn,
        )
        .unwrap();
        create_transaction(
            new_variable_transaction(household_id, user_id, 600.0, in_month),
            &conn,
        )
        .unwrap();
        create_installment_purchase(
            &InstallmentPurchase {
                description: "TV".to_owned(),
                total_amount: 800.0,
                count: 1,
                start_date: in_month,
                category: "Electronics".to_owned(),
            },
            household_id,
            user_id,
            &conn,
        )
        .unwrap();

        let transactions = get_month_transactions(household_id, in_month, &conn).unwrap();
        let totals = totals_by_kind(&transactions);

        assert_eq!(totals.fixed, 1200.0);
        assert_eq!(totals.installments, 800.0);
        assert_eq!(totals.variable, 600.0);
        assert_eq!(totals.committed(), 2000.0);
        assert_eq!(totals.total(), 2600.0);
    }

    #[test]
    fn excludes_records_outside_month_even_in_same_series() {
        let (conn, household_id, user_id) = test_household();
        let start = date!(2026 - 08 - 10);

        // Three installments: August, September, October.
        create_installment_purchase(
            &InstallmentPurchase {
                description: "Sofa".to_owned(),
                total_amount: 300.0,
                count: 3,
                start_date: start,
                category: "Home".to_owned(),
            },
            household_id,
            user_id,
            &conn,
        )
        .unwrap();

        let transactions = get_month_transactions(household_id, start, &conn).unwrap();

        assert_eq!(transactions.len(), 1, "got {transactions:#?}");
        assert_eq!(transactions[0].date, start);
    }

    #[test]
    fn only_fetches_own_household() {
        let (conn, household_id, user_id) = test_household();
        let in_month = date!(2026 - 08 - 10);

        create_transaction(
            new_variable_transaction(household_id, user_id, 50.0, in_month),
            &conn,
        )
        .unwrap();

        let other_household = household_id + 999;
        let transactions = get_month_transactions(other_household, in_month, &conn).unwrap();

        assert!(transactions.is_empty());
    }

    #[test]
    fn orders_by_date_then_id() {
        let (conn, household_id, user_id) = test_household();

        let later = create_transaction(
            new_variable_transaction(household_id, user_id, 1.0, date!(2026 - 08 - 20)),
            &conn,
        )
        .unwrap();
        let earlier = create_transaction(
            new_variable_transaction(household_id, user_id, 2.0, date!(2026 - 08 - 05)),
            &conn,
        )
        .unwrap();

        let transactions =
            get_month_transactions(household_id, date!(2026 - 08 - 01), &conn).unwrap();

        assert_eq!(
            transactions.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![earlier.id, later.id]
        );
    }

    #[test]
    fn paid_total_only_counts_paid() {
        let (conn, household_id, user_id) = test_household();
        let in_month = date!(2026 - 08 - 10);

        let paid = create_transaction(
            new_fixed_transaction(household_id, user_id, 100.0, in_month),
            &conn,
        )
        .unwrap();
        create_transaction(
            new_fixed_transaction(household_id, user_id, 40.0, in_month),
            &conn,
        )
        .unwrap();
        crate::transaction::core::set_transaction_paid(paid.id, true, &conn).unwrap();

        let transactions = get_month_transactions(household_id, in_month, &conn).unwrap();

        assert_eq!(paid_total(&transactions), 100.0);
    }

    #[test]
    fn variable_spend_groups_by_category() {
        let (conn, household_id, user_id) = test_household();
        let in_month = date!(2026 - 08 - 10);

        let mut groceries =
            new_variable_transaction(household_id, user_id, 80.0, in_month);
        groceries.category = "Groceries".to_owned();
        create_transaction(groceries.clone(), &conn).unwrap();
        groceries.amount = 20.0;
        create_transaction(groceries, &conn).unwrap();

        let mut transport = new_variable_transaction(household_id, user_id, 35.0, in_month);
        transport.category = "Transport".to_owned();
        create_transaction(transport, &conn).unwrap();

        // Fixed costs never show up in the per-category variable sums.
        create_transaction(
            new_fixed_transaction(household_id, user_id, 1000.0, in_month),
            &conn,
        )
        .unwrap();

        let transactions = get_month_transactions(household_id, in_month, &conn).unwrap();
        let by_category = variable_spend_by_category(&transactions);

        assert_eq!(by_category.len(), 2);
        assert_eq!(by_category[0].category, "Groceries");
        assert_eq!(by_category[0].total, 100.0);
        assert_eq!(by_category[1].category, "Transport");
        assert_eq!(by_category[1].total, 35.0);
    }

    #[test]
    fn sql_variable_total_matches_aggregation() {
        let (conn, household_id, user_id) = test_household();
        let in_month = date!(2026 - 07 - 15);

        create_transaction(
            new_variable_transaction(household_id, user_id, 500.0, in_month),
            &conn,
        )
        .unwrap();
        create_transaction(
            new_variable_transaction(household_id, user_id, 200.0, date!(2026 - 07 - 20)),
            &conn,
        )
        .unwrap();
        create_transaction(
            new_fixed_transaction(household_id, user_id, 999.0, in_month),
            &conn,
        )
        .unwrap();
        // Outside the month.
        create_transaction(
            new_variable_transaction(household_id, user_id, 123.0, date!(2026 - 08 - 01)),
            &conn,
        )
        .unwrap();

        let total = variable_total_for_month(household_id, in_month, &conn).unwrap();

        assert_eq!(total, 700.0);
    }

    #[test]
    fn sql_variable_total_is_zero_for_empty_month() {
        let (conn, household_id, _) = test_household();

        let total =
            variable_total_for_month(household_id, date!(2026 - 01 - 01), &conn).unwrap();

        assert_eq!(total, 0.0);
    }
}
