//! Materializes multi-record transaction series from a single user
//! intent: installment purchases and recurring fixed costs.
//!
//! A series row is created in the same SQL transaction as its member
//! records, so a half-written batch is never visible and a failure leaves
//! zero records behind.

use rusqlite::{Connection, Transaction as SqlTransaction, params_from_iter};
use time::{Date, Month, OffsetDateTime};

use crate::{
    Error,
    database_id::{HouseholdId, SeriesId, TransactionId, UserId},
    transaction::{
        core::{
            InstallmentDetail, KIND_FIXED, KIND_INSTALLMENT, NewTransaction, TransactionKind,
            insert_transaction_record, validate_new_record,
        },
        month::shift_months,
    },
};

/// Create the series table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_series_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS series (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                household_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(household_id) REFERENCES household(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// A purchase paid over several future months.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallmentPurchase {
    /// What was bought.
    pub description: String,
    /// The total purchase amount, split across the installments.
    pub total_amount: f64,
    /// How many monthly installments to split into. Must be at least 1.
    pub count: u32,
    /// When the first installment is due.
    pub start_date: Date,
    /// The category to record every installment against.
    pub category: String,
}

/// Split `total` into `count` per-installment amounts.
///
/// The split happens in integer cents: every installment gets the floor
/// share and the final installment absorbs the remainder, so the amounts
/// always sum to `total` exactly.
fn split_amount(total: f64, count: u32) -> Vec<f64> {
    let total_cents = (total * 100.0).round() as i64;
    let base_cents = total_cents / count as i64;
    let remainder_cents = total_cents - base_cents * count as i64;

    let mut amounts = vec![base_cents as f64 / 100.0; count as usize];

    if let Some(last) = amounts.last_mut() {
        *last = (base_cents + remainder_cents) as f64 / 100.0;
    }

    amounts
}

/// Materialize an installment purchase as `purchase.count` dated records,
/// one per month starting at `purchase.start_date`, all sharing a freshly
/// allocated series ID.
///
/// Record *i* (1-based) is dated `start_date + (i - 1)` months, with the
/// day-of-month preserved and clamped to shorter months. Each record
/// carries its position, the installment count, and the original total.
///
/// The series row and all records commit in one SQL transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidInstallmentCount] if `purchase.count` is zero,
/// - [Error::EmptyDescription], [Error::EmptyCategory], or
///   [Error::InvalidAmount] if validation fails,
/// - or [Error::SqlError] if there is some other SQL error.
///
/// Nothing is written when an error is returned.
pub fn create_installment_purchase(
    purchase: &InstallmentPurchase,
    household_id: HouseholdId,
    user_id: UserId,
    connection: &Connection,
) -> Result<SeriesId, Error> {
    if purchase.count == 0 {
        return Err(Error::InvalidInstallmentCount(purchase.count));
    }

    validate_new_record(
        &purchase.description,
        purchase.total_amount,
        &purchase.category,
    )?;

    let created_at = OffsetDateTime::now_utc();
    let amounts = split_amount(purchase.total_amount, purchase.count);

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Immediate)?;

    let series_id = insert_series(household_id, KIND_INSTALLMENT, created_at, &transaction)?;

    for (index, amount) in amounts.into_iter().enumerate() {
        let record = NewTransaction {
            household_id,
            user_id,
            description: purchase.description.clone(),
            amount,
            date: shift_months(purchase.start_date, index as i32),
            category: purchase.category.clone(),
            kind: TransactionKind::Installment(InstallmentDetail {
                series_id,
                number: index as u32 + 1,
                count: purchase.count,
                purchase_total: purchase.total_amount,
            }),
        };

        insert_transaction_record(&record, created_at, &transaction)?;
    }

    transaction.commit()?;

    Ok(series_id)
}

/// A bill expected every month for the rest of the calendar year.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringFixedCost {
    /// What the bill is for.
    pub description: String,
    /// The amount due each month.
    pub amount: f64,
    /// The day of the month the bill is due, 1-31.
    pub due_day: u8,
    /// Any date within the starting month; its year fixes the horizon.
    pub reference: Date,
    /// The category to record every occurrence against.
    pub category: String,
}

/// Materialize a recurring fixed cost as one record per month from the
/// reference month through December of the reference year, all sharing a
/// freshly allocated series ID.
///
/// The horizon is fixed, not rolling: starting in October yields three
/// records (October, November, December). Due days past the end of a
/// month are clamped to its last day. Every record carries the same
/// amount; later edits are per-record.
///
/// The series row and all records commit in one SQL transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidDayOfMonth] if `cost.due_day` is outside 1-31,
/// - [Error::EmptyDescription], [Error::EmptyCategory], or
///   [Error::InvalidAmount] if validation fails,
/// - or [Error::SqlError] if there is some other SQL error.
///
/// Nothing is written when an error is returned.
pub fn create_recurring_fixed_cost(
    cost: &RecurringFixedCost,
    household_id: HouseholdId,
    user_id: UserId,
    connection: &Connection,
) -> Result<SeriesId, Error> {
    if !(1..=31).contains(&cost.due_day) {
        return Err(Error::InvalidDayOfMonth(cost.due_day));
    }

    validate_new_record(&cost.description, cost.amount, &cost.category)?;

    let created_at = OffsetDateTime::now_utc();
    let year = cost.reference.year();

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Immediate)?;

    let series_id = insert_series(household_id, KIND_FIXED, created_at, &transaction)?;

    for month_number in cost.reference.month() as u8..=Month::December as u8 {
        let month = Month::try_from(month_number).expect("month numbers 1-12 are valid");
        let day = cost
            .due_day
            .min(time::util::days_in_year_month(year, month));
        let date = Date::from_calendar_date(year, month, day)
            .expect("a clamped day is always valid for the target month");

        let record = NewTransaction {
            household_id,
            user_id,
            description: cost.description.clone(),
            amount: cost.amount,
            date,
            category: cost.category.clone(),
            kind: TransactionKind::Fixed {
                series_id: Some(series_id),
            },
        };

        insert_transaction_record(&record, created_at, &transaction)?;
    }

    transaction.commit()?;

    Ok(series_id)
}

fn insert_series(
    household_id: HouseholdId,
    kind: &str,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<SeriesId, Error> {
    connection.execute(
        "INSERT INTO series (household_id, kind, created_at) VALUES (?1, ?2, ?3)",
        (household_id, kind, created_at),
    )?;

    Ok(connection.last_insert_rowid())
}

/// Delete every transaction sharing `series_id`, and the series row itself.
///
/// The cascade is the two-step protocol the store contract asks for:
/// enumerate the member IDs, then delete them in one batch. Both steps
/// and the series-row delete commit in one SQL transaction.
///
/// Returns how many transactions were removed.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingSeries] if `series_id` does not refer to a valid series,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_series(series_id: SeriesId, connection: &Connection) -> Result<usize, Error> {
    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Immediate)?;

    let member_ids: Vec<TransactionId> = {
        let mut statement =
            transaction.prepare("SELECT id FROM \"transaction\" WHERE series_id = :id")?;
        let ids = statement
            .query_map(&[(":id", &series_id)], |row| row.get(0))?
            .collect::<Result<Vec<TransactionId>, rusqlite::Error>>()?;
        ids
    };

    if !member_ids.is_empty() {
        let placeholders = member_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        transaction.execute(
            &format!("DELETE FROM \"transaction\" WHERE id IN ({placeholders})"),
            params_from_iter(member_ids.iter()),
        )?;
    }

    let series_rows = transaction.execute("DELETE FROM series WHERE id = ?1", [series_id])?;

    if series_rows == 0 {
        return Err(Error::DeleteMissingSeries);
    }

    transaction.commit()?;

    Ok(member_ids.len())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod split_amount_tests {
    use super::split_amount;

    #[test]
    fn splits_evenly_when_divisible() {
        assert_eq!(split_amount(100.0, 4), vec![25.0, 25.0, 25.0, 25.0]);
    }

    #[test]
    fn last_installment_absorbs_remainder() {
        assert_eq!(split_amount(1000.0, 3), vec![333.33, 333.33, 333.34]);
    }

    #[test]
    fn sum_is_exact_for_awkward_splits() {
        for (total, count) in [(999.99, 7), (0.05, 3), (5000.0, 48), (123.45, 12)] {
            let amounts = split_amount(total, count);

            assert_eq!(amounts.len(), count as usize);

            let sum_cents: i64 = amounts.iter().map(|a| (a * 100.0).round() as i64).sum();
            assert_eq!(
                sum_cents,
                (total * 100.0).round() as i64,
                "split of {total} into {count} drifted: {amounts:?}"
            );
        }
    }

    #[test]
    fn single_installment_keeps_total() {
        assert_eq!(split_amount(59.99, 1), vec![59.99]);
    }
}

#[cfg(test)]
mod installment_tests {
    use time::macros::date;

    use crate::{
        Error,
        transaction::{
            core::{TransactionKind, count_transactions},
            month::get_month_transactions,
            test_utils::{series_transactions, test_household},
        },
    };

    use super::{InstallmentPurchase, create_installment_purchase};

    fn tv_purchase() -> InstallmentPurchase {
        InstallmentPurchase {
            description: "TV".to_owned(),
            total_amount: 1000.0,
            count: 3,
            start_date: date!(2026 - 01 - 15),
            category: "Electronics".to_owned(),
        }
    }

    #[test]
    fn generates_one_record_per_installment() {
        let (conn, household_id, user_id) = test_household();

        let series_id =
            create_installment_purchase(&tv_purchase(), household_id, user_id, &conn).unwrap();

        let records = series_transactions(series_id, &conn);
        assert_eq!(records.len(), 3);

        let mut numbers: Vec<u32> = records
            .iter()
            .map(|record| match &record.kind {
                TransactionKind::Installment(detail) => {
                    assert_eq!(detail.series_id, series_id);
                    assert_eq!(detail.count, 3);
                    assert_eq!(detail.purchase_total, 1000.0);
                    detail.number
                }
                other => panic!("expected installment, got {other:?}"),
            })
            .collect();
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn amounts_sum_to_total_exactly() {
        let (conn, household_id, user_id) = test_household();

        let series_id =
            create_installment_purchase(&tv_purchase(), household_id, user_id, &conn).unwrap();

        let records = series_transactions(series_id, &conn);
        let sum_cents: i64 = records
            .iter()
            .map(|record| (record.amount * 100.0).round() as i64)
            .sum();

        assert_eq!(sum_cents, 100_000);
    }

    #[test]
    fn dates_advance_one_month_per_installment() {
        let (conn, household_id, user_id) = test_household();

        let series_id =
            create_installment_purchase(&tv_purchase(), household_id, user_id, &conn).unwrap();

        let mut dates: Vec<_> = series_transactions(series_id, &conn)
            .into_iter()
            .map(|record| record.date)
            .collect();
        dates.sort_unstable();

        assert_eq!(
            dates,
            vec![
                date!(2026 - 01 - 15),
                date!(2026 - 02 - 15),
                date!(2026 - 03 - 15)
            ]
        );
    }

    #[test]
    fn month_end_start_date_clamps_in_short_months() {
        let (conn, household_id, user_id) = test_household();
        let purchase = InstallmentPurchase {
            start_date: date!(2026 - 01 - 31),
            ..tv_purchase()
        };

        let series_id =
            create_installment_purchase(&purchase, household_id, user_id, &conn).unwrap();

        let mut dates: Vec<_> = series_transactions(series_id, &conn)
            .into_iter()
            .map(|record| record.date)
            .collect();
        dates.sort_unstable();

        assert_eq!(
            dates,
            vec![
                date!(2026 - 01 - 31),
                date!(2026 - 02 - 28),
                date!(2026 - 03 - 31)
            ]
        );
    }

    #[test]
    fn zero_installments_writes_nothing() {
        let (conn, household_id, user_id) = test_household();
        let purchase = InstallmentPurchase {
            count: 0,
            ..tv_purchase()
        };

        let result = create_installment_purchase(&purchase, household_id, user_id, &conn);

        assert_eq!(result, Err(Error::InvalidInstallmentCount(0)));
        assert_eq!(count_transactions(&conn), Ok(0));
    }

    #[test]
    fn invalid_amount_writes_nothing() {
        let (conn, household_id, user_id) = test_household();
        let purchase = InstallmentPurchase {
            total_amount: f64::NAN,
            ..tv_purchase()
        };

        let result = create_installment_purchase(&purchase, household_id, user_id, &conn);

        assert!(matches!(result, Err(Error::InvalidAmount(_))));
        assert_eq!(count_transactions(&conn), Ok(0));
    }

    #[test]
    fn concurrent_purchases_do_not_share_series() {
        let (conn, household_id, user_id) = test_household();

        let first =
            create_installment_purchase(&tv_purchase(), household_id, user_id, &conn).unwrap();
        let second =
            create_installment_purchase(&tv_purchase(), household_id, user_id, &conn).unwrap();

        assert_ne!(first, second);
        assert_eq!(series_len(first, &conn), 3);
        assert_eq!(series_len(second, &conn), 3);
    }

    fn series_len(series_id: i64, conn: &rusqlite::Connection) -> usize {
        series_transactions(series_id, conn).len()
    }

    #[test]
    fn installments_land_in_their_own_months() {
        let (conn, household_id, user_id) = test_household();

        create_installment_purchase(&tv_purchase(), household_id, user_id, &conn).unwrap();

        for (reference, expected) in [
            (date!(2026 - 01 - 01), 1),
            (date!(2026 - 02 - 01), 1),
            (date!(2026 - 03 - 01), 1),
            (date!(2026 - 04 - 01), 0),
        ] {
            let month = get_month_transactions(household_id, reference, &conn).unwrap();
            assert_eq!(month.len(), expected, "month {reference}");
        }
    }
}


#[cfg(test)]
mod delete_series_tests {
    use time::macros::date;

    use crate::{
        Error,
        transaction::{
            core::count_transactions,
            test_utils::{series_transactions, test_household},
        },
    };

    use super::{InstallmentPurchase, create_installment_purchase, delete_series};

    fn purchase(description: &str) -> InstallmentPurchase {
        InstallmentPurchase {
            description: description.to_owned(),
            total_amount: 600.0,
            count: 6,
            start_date: date!(2026 - 03 - 10),
            category: "Home".to_owned(),
        }
    }

    #[test]
    fn removes_all_records_in_group_and_no_others() {
        let (conn, household_id, user_id) = test_household();
        let doomed =
            create_installment_purchase(&purchase("Sofa"), household_id, user_id, &conn).unwrap();
        let survivor =
            create_installment_purchase(&purchase("Desk"), household_id, user_id, &conn).unwrap();

        let removed = delete_series(doomed, &conn).unwrap();

        assert_eq!(removed, 6);
        assert!(series_transactions(doomed, &conn).is_empty());
        assert_eq!(series_transactions(survivor, &conn).len(), 6);
        assert_eq!(count_transactions(&conn), Ok(6));
    }

    #[test]
    fn deleting_missing_series_fails() {
        let (conn, _, _) = test_household();

        assert_eq!(delete_series(999, &conn), Err(Error::DeleteMissingSeries));
    }

    #[test]
    fn series_id_is_freed_from_transactions_table() {
        let (conn, household_id, user_id) = test_household();
        let series_id =
            create_installment_purchase(&purchase("Sofa"), household_id, user_id, &conn).unwrap();

        delete_series(series_id, &conn).unwrap();

        let remaining: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM series WHERE id = ?1",
                [series_id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
