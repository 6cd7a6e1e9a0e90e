//! The user model and database functions.
//!
//! Users are a thin stand-in for the external identity provider: a row
//! records who is acting and which household they belong to. There are no
//! credentials; the session cookie set at sign-in is the only claim of
//! identity.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    database_id::{HouseholdId, UserId},
};

/// Someone who records transactions and belongs to at most one household.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The ID of the user.
    pub id: UserId,
    /// The name shown in greetings and listings.
    pub display_name: String,
    /// The address the user signs in with. Unique.
    pub email: String,
    /// The household the user belongs to, if any.
    pub household_id: Option<HouseholdId>,
}

/// Create the user table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                display_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                household_id INTEGER,
                FOREIGN KEY(household_id) REFERENCES household(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    Ok(())
}

/// Get the user with `email`, creating them on first sign-in.
///
/// An existing user keeps their stored display name; the submitted one is
/// only used when the row is first created.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_or_create_user(
    email: &str,
    display_name: &str,
    connection: &Connection,
) -> Result<User, Error> {
    let existing = connection
        .prepare("SELECT id, display_name, email, household_id FROM user WHERE email = :email")?
        .query_row(&[(":email", &email)], map_user_row);

    match existing {
        Ok(user) => Ok(user),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            connection.execute(
                "INSERT INTO user (display_name, email) VALUES (?1, ?2)",
                (display_name, email),
            )?;

            Ok(User {
                id: connection.last_insert_rowid(),
                display_name: display_name.to_owned(),
                email: email.to_owned(),
                household_id: None,
            })
        }
        Err(error) => Err(error.into()),
    }
}

/// Retrieve a user from the database by their `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_user(id: UserId, connection: &Connection) -> Result<User, Error> {
    let user = connection
        .prepare("SELECT id, display_name, email, household_id FROM user WHERE id = :id")?
        .query_row(&[(":id", &id)], map_user_row)?;

    Ok(user)
}

/// Point `user_id` at `household_id`.
///
/// Joining a new household discards access to the previous one: the
/// column is simply overwritten, there is no merge.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `user_id` does not refer to a valid user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn set_user_household(
    user_id: UserId,
    household_id: HouseholdId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET household_id = ?1 WHERE id = ?2",
        (household_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Resolve the acting user's household ID, failing when they have none.
///
/// Every transaction and budget operation requires a household; handlers
/// call this before touching the generators or aggregators.
///
/// # Errors
/// This function will return a:
/// - [Error::MissingHousehold] if the user does not belong to a household,
/// - [Error::NotFound] if `user_id` does not refer to a valid user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn require_household(
    user_id: UserId,
    connection: &Connection,
) -> Result<HouseholdId, Error> {
    get_user(user_id, connection)?
        .household_id
        .ok_or(Error::MissingHousehold)
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        household_id: row.get(3)?,
    })
}
