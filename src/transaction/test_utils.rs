//! Shared helpers for transaction tests.

use rusqlite::Connection;
use time::Date;

use crate::{
    database_id::{HouseholdId, SeriesId, UserId},
    db::initialize,
    household::create_household,
    transaction::core::{
        NewTransaction, TRANSACTION_COLUMNS, Transaction, TransactionKind, map_transaction_row,
    },
    user::get_or_create_user,
};

/// An in-memory database with one household and one member user.
pub fn test_household() -> (Connection, HouseholdId, UserId) {
    let conn = Connection::open_in_memory().unwrap();
    initialize(&conn).unwrap();

    let user = get_or_create_user("ana@example.com", "Ana", &conn).unwrap();
    let household = create_household(&user, 5000.0, &conn).unwrap();

    (conn, household.id, user.id)
}

/// A variable expense in the "Groceries" category.
pub fn new_variable_transaction(
    household_id: HouseholdId,
    user_id: UserId,
    amount: f64,
    date: Date,
) -> NewTransaction {
    NewTransaction {
        household_id,
        user_id,
        description: "Groceries run".to_owned(),
        amount,
        date,
        category: "Groceries".to_owned(),
        kind: TransactionKind::Variable,
    }
}

/// An ad hoc fixed cost (no series).
pub fn new_fixed_transaction(
    household_id: HouseholdId,
    user_id: UserId,
    amount: f64,
    date: Date,
) -> NewTransaction {
    NewTransaction {
        household_id,
        user_id,
        description: "Electricity".to_owned(),
        amount,
        date,
        category: "Utilities".to_owned(),
        kind: TransactionKind::Fixed { series_id: None },
    }
}

/// Every transaction sharing `series_id`.
pub fn series_transactions(series_id: SeriesId, connection: &Connection) -> Vec<Transaction> {
    let query =
        format!("SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE series_id = :id");

    connection
        .prepare(&query)
        .unwrap()
        .query_map(&[(":id", &series_id)], map_transaction_row)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}
