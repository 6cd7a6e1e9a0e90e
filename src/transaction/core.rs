//! Defines the core data models and database queries for transactions.

use rusqlite::{Connection, Row};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::{HouseholdId, SeriesId, TransactionId, UserId},
};

// ============================================================================
// MODELS
// ============================================================================

pub(super) const KIND_FIXED: &str = "FIXED";
pub(super) const KIND_INSTALLMENT: &str = "INSTALLMENT";
pub(super) const KIND_VARIABLE: &str = "VARIABLE";

/// The variant-specific data carried by a transaction.
///
/// All three kinds share one table; the kind tag and its payload columns
/// are mapped to and from this enum so that callers never branch on raw
/// strings.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionKind {
    /// A monthly bill (rent, utilities). Bills generated as a recurring
    /// series carry the series that created them; ad hoc bills carry none.
    Fixed {
        /// The recurring series this bill was generated from, if any.
        series_id: Option<SeriesId>,
    },
    /// One month's share of a purchase paid over several months.
    Installment(InstallmentDetail),
    /// An ad hoc expense recorded against a free-text category.
    Variable,
}

/// The fields tying an installment record to its purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallmentDetail {
    /// The purchase group shared by every installment of one purchase.
    pub series_id: SeriesId,
    /// This record's 1-based position within the purchase.
    pub number: u32,
    /// How many installments the purchase was split into.
    pub count: u32,
    /// The original total purchase amount.
    pub purchase_total: f64,
}

impl TransactionKind {
    /// The tag stored in the `kind` column.
    pub fn tag(&self) -> &'static str {
        match self {
            TransactionKind::Fixed { .. } => KIND_FIXED,
            TransactionKind::Installment(_) => KIND_INSTALLMENT,
            TransactionKind::Variable => KIND_VARIABLE,
        }
    }

    /// The series this record belongs to, if it was generated as part of one.
    pub fn series_id(&self) -> Option<SeriesId> {
        match self {
            TransactionKind::Fixed { series_id } => *series_id,
            TransactionKind::Installment(detail) => Some(detail.series_id),
            TransactionKind::Variable => None,
        }
    }
}

/// One dated financial movement belonging to a household.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The household the transaction belongs to.
    pub household_id: HouseholdId,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money spent in this transaction.
    pub amount: f64,
    /// When the money moves (a bill's due date, an installment's month).
    pub date: Date,
    /// The free-text category the transaction is recorded against.
    pub category: String,
    /// The user who recorded the transaction.
    pub user_id: UserId,
    /// When the record was created.
    pub created_at: OffsetDateTime,
    /// Whether the transaction has been paid.
    pub is_paid: bool,
    /// When the transaction was marked paid, if it has been.
    pub paid_at: Option<OffsetDateTime>,
    /// The kind tag and its variant-specific payload.
    pub kind: TransactionKind,
}

/// The data needed to create a single transaction record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The household the transaction belongs to.
    pub household_id: HouseholdId,
    /// The user recording the transaction.
    pub user_id: UserId,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money spent.
    pub amount: f64,
    /// When the money moves.
    pub date: Date,
    /// The free-text category to record against.
    pub category: String,
    /// The kind tag and its variant-specific payload.
    pub kind: TransactionKind,
}

/// Check the fields shared by every way of creating transactions.
///
/// Runs before any write so malformed input can never reach the store.
pub(super) fn validate_new_record(
    description: &str,
    amount: f64,
    category: &str,
) -> Result<(), Error> {
    if description.trim().is_empty() {
        return Err(Error::EmptyDescription);
    }

    if category.trim().is_empty() {
        return Err(Error::EmptyCategory);
    }

    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount(amount));
    }

    Ok(())
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

pub(super) const TRANSACTION_COLUMNS: &str = "id, household_id, description, amount, date, \
    category, kind, user_id, created_at, is_paid, paid_at, series_id, installment_current, \
    installment_total, total_purchase_amount";

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                household_id INTEGER NOT NULL,
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                date TEXT NOT NULL,
                category TEXT NOT NULL,
                kind TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                is_paid INTEGER NOT NULL DEFAULT 0,
                paid_at TEXT,
                series_id INTEGER,
                installment_current INTEGER,
                installment_total INTEGER,
                total_purchase_amount REAL,
                FOREIGN KEY(household_id) REFERENCES household(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE,
                FOREIGN KEY(series_id) REFERENCES series(id) ON UPDATE CASCADE
                )",
        (),
    )?;

    // Composite index used by the monthly aggregation queries.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_household_date
         ON \"transaction\"(household_id, date);",
        (),
    )?;

    Ok(())
}

/// Create a new transaction in the database.
///
/// This is the path for ad hoc single entries; installment purchases and
/// recurring fixed costs go through the generators in
/// [crate::transaction::generate].
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyDescription], [Error::EmptyCategory], or
///   [Error::InvalidAmount] if validation fails (nothing is written),
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    validate_new_record(
        &new_transaction.description,
        new_transaction.amount,
        &new_transaction.category,
    )?;

    let created_at = OffsetDateTime::now_utc();

    insert_transaction_record(&new_transaction, created_at, connection)?;

    Ok(Transaction {
        id: connection.last_insert_rowid(),
        household_id: new_transaction.household_id,
        description: new_transaction.description,
        amount: new_transaction.amount,
        date: new_transaction.date,
        category: new_transaction.category,
        user_id: new_transaction.user_id,
        created_at,
        is_paid: false,
        paid_at: None,
        kind: new_transaction.kind,
    })
}

/// Insert one record without validation; shared by [create_transaction]
/// and the batch generators, which validate the whole series up front.
pub(super) fn insert_transaction_record(
    new_transaction: &NewTransaction,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let (installment_current, installment_total, purchase_total) = match &new_transaction.kind {
        TransactionKind::Installment(detail) => (
            Some(detail.number),
            Some(detail.count),
            Some(detail.purchase_total),
        ),
        _ => (None, None, None),
    };

    connection.execute(
        "INSERT INTO \"transaction\" (household_id, description, amount, date, category, kind, \
         user_id, created_at, is_paid, paid_at, series_id, installment_current, \
         installment_total, total_purchase_amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, NULL, ?9, ?10, ?11, ?12)",
        (
            new_transaction.household_id,
            &new_transaction.description,
            new_transaction.amount,
            new_transaction.date,
            &new_transaction.category,
            new_transaction.kind.tag(),
            new_transaction.user_id,
            created_at,
            new_transaction.kind.series_id(),
            installment_current,
            installment_total,
            purchase_total,
        ),
    )?;

    Ok(())
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let query = format!("SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id");

    let transaction = connection
        .prepare(&query)?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// The fields of a transaction that can be edited after creation.
///
/// `None` fields are left unchanged.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransactionPatch {
    /// A replacement description.
    pub description: Option<String>,
    /// A replacement amount.
    pub amount: Option<f64>,
}

/// Apply a partial update to a transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyDescription] or [Error::InvalidAmount] if a provided
///   field fails validation (nothing is written),
/// - [Error::UpdateMissingTransaction] if `id` does not refer to a valid
///   transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    patch: TransactionPatch,
    connection: &Connection,
) -> Result<(), Error> {
    if let Some(description) = &patch.description
        && description.trim().is_empty()
    {
        return Err(Error::EmptyDescription);
    }

    if let Some(amount) = patch.amount
        && (!amount.is_finite() || amount <= 0.0)
    {
        return Err(Error::InvalidAmount(amount));
    }

    let rows_affected = connection.execute(
        "UPDATE \"transaction\"
         SET description = COALESCE(?1, description), amount = COALESCE(?2, amount)
         WHERE id = ?3",
        (patch.description, patch.amount, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    Ok(())
}

/// Set a transaction's paid flag and paid timestamp.
///
/// Marking paid stamps `paid_at`; marking unpaid clears it.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingTransaction] if `id` does not refer to a valid
///   transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn set_transaction_paid(
    id: TransactionId,
    is_paid: bool,
    connection: &Connection,
) -> Result<(), Error> {
    let paid_at = is_paid.then(OffsetDateTime::now_utc);

    let rows_affected = connection.execute(
        "UPDATE \"transaction\" SET is_paid = ?1, paid_at = ?2 WHERE id = ?3",
        (is_paid, paid_at, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    Ok(())
}

/// Delete a single transaction by ID.
///
/// Deleting one installment leaves the rest of its purchase untouched;
/// use [crate::transaction::generate::delete_series] to remove a whole
/// group.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingTransaction] if `id` does not refer to a valid
///   transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM \"transaction\" WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingTransaction);
    }

    Ok(())
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Map a database row to a Transaction.
///
/// **Note:** expects the columns in [TRANSACTION_COLUMNS] order.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let kind_tag: String = row.get(6)?;

    let kind = match kind_tag.as_str() {
        KIND_FIXED => TransactionKind::Fixed {
            series_id: row.get(11)?,
        },
        KIND_INSTALLMENT => TransactionKind::Installment(InstallmentDetail {
            series_id: row.get(11)?,
            number: row.get(12)?,
            count: row.get(13)?,
            purchase_total: row.get(14)?,
        }),
        KIND_VARIABLE => TransactionKind::Variable,
        _ => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                format!("unknown transaction kind \"{kind_tag}\"").into(),
            ));
        }
    };

    Ok(Transaction {
        id: row.get(0)?,
        household_id: row.get(1)?,
        description: row.get(2)?,
        amount: row.get(3)?,
        date: row.get(4)?,
        category: row.get(5)?,
        user_id: row.get(7)?,
        created_at: row.get(8)?,
        is_paid: row.get(9)?,
        paid_at: row.get(10)?,
        kind,
    })
}

// ============================================================================
// TESTS
// ============================================================================
