//! Database initialization for the application.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{
    Error, budget::create_budget_table, household::create_household_table,
    transaction::{create_series_table, create_transaction_table}, user::create_user_table,
};

/// Create the application's tables if they do not exist.
///
/// All tables are created within a single exclusive SQL transaction so a
/// partially initialized schema is never left behind.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is some
/// other SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_household_table(&transaction)?;
    create_user_table(&transaction)?;
    create_series_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_budget_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
