//! Vida Adulta is a web app for managing a household's budget: fixed
//! bills, installment purchases, variable spending, and the monthly
//! balance projections derived from them.
//!
//! This library provides a REST API that directly serves HTML pages.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_server::Handle;
use tokio::signal;

mod alert;
mod app_state;
mod balance;
mod budget;
mod dashboard;
mod database_id;
mod db;
mod endpoints;
mod household;
mod html;
mod internal_server_error;
mod logging;
mod navigation;
mod not_found;
mod routing;
mod session;
mod timezone;
mod transaction;
mod user;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::logging_middleware;
pub use routing::build_router;

use crate::{
    alert::Alert,
    html::{error_view, render},
    internal_server_error::render_internal_server_error,
    not_found::get_404_not_found_response,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request has no valid session cookie.
    ///
    /// The client should be redirected to the sign-in page.
    #[error("not signed in")]
    NotSignedIn,

    /// The acting user does not belong to a household yet.
    ///
    /// Every transaction and budget belongs to a household, so operations
    /// on them cannot proceed without one. The client should be sent to
    /// the settings page to create or join a household.
    #[error("the current user does not belong to a household")]
    MissingHousehold,

    /// The referenced household does not exist.
    ///
    /// Occurs when joining a household with an invalid invite code.
    #[error("no household with ID {0} exists")]
    HouseholdNotFound(i64),

    /// A non-positive or non-finite amount was submitted.
    ///
    /// Amounts are validated before any write so that malformed input can
    /// never produce NaN records in the store.
    #[error("{0} is not a valid amount, expected a positive number")]
    InvalidAmount(f64),

    /// An installment purchase was submitted with a count below one.
    #[error("{0} is not a valid number of installments, expected at least 1")]
    InvalidInstallmentCount(u32),

    /// A day-of-month outside 1-31 was submitted (a bill's due day or the
    /// household's card-closing day).
    #[error("{0} is not a valid day of the month, expected a day between 1 and 31")]
    InvalidDayOfMonth(u8),

    /// An empty string was used as a transaction description.
    #[error("the description cannot be empty")]
    EmptyDescription,

    /// An empty string was used as a category name.
    #[error("the category cannot be empty")]
    EmptyCategory,

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to update a transaction that does not exist
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,

    /// Tried to delete a transaction that does not exist
    #[error("tried to delete a transaction that is not in the database")]
    DeleteMissingTransaction,

    /// Tried to delete a purchase group that does not exist
    #[error("tried to delete a purchase group that is not in the database")]
    DeleteMissingSeries,

    /// Tried to delete a budget that does not exist
    #[error("tried to delete a budget that is not in the database")]
    DeleteMissingBudget,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotSignedIn => Redirect::to(endpoints::SIGN_IN_VIEW).into_response(),
            Error::MissingHousehold => Redirect::to(endpoints::SETTINGS_VIEW).into_response(),
            Error::NotFound => get_404_not_found_response(),
            error @ (Error::InvalidAmount(_)
            | Error::InvalidInstallmentCount(_)
            | Error::InvalidDayOfMonth(_)
            | Error::EmptyDescription
            | Error::EmptyCategory) => render(
                StatusCode::BAD_REQUEST,
                error_view(
                    "Invalid Input",
                    "400",
                    &error.to_string(),
                    "Go back and correct the form.",
                ),
            ),
            Error::InvalidTimezoneError(timezone) => render_internal_server_error(
                "Invalid Timezone Settings",
                &format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to a valid, canonical timezone string"
                ),
            ),
            Error::DatabaseLockError => render_internal_server_error(
                "Sorry, something went wrong.",
                "Try again later or check the server logs",
            ),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                render_internal_server_error(
                    "Sorry, something went wrong.",
                    "Try again later or check the server logs",
                )
            }
        }
    }
}

impl Error {
    fn into_alert_response(self) -> Response {
        match self {
            Error::MissingHousehold => render(
                StatusCode::BAD_REQUEST,
                Alert::error(
                    "No household",
                    "Create or join a household on the settings page before adding records.",
                )
                .into_html(),
            ),
            Error::HouseholdNotFound(id) => render(
                StatusCode::NOT_FOUND,
                Alert::error(
                    "Household not found",
                    &format!(
                        "No household with the invite code {id} exists. \
                        Check the code and try again."
                    ),
                )
                .into_html(),
            ),
            Error::InvalidAmount(amount) => render(
                StatusCode::BAD_REQUEST,
                Alert::error(
                    "Invalid amount",
                    &format!("{amount} is not a valid amount. Enter a positive number."),
                )
                .into_html(),
            ),
            Error::InvalidInstallmentCount(count) => render(
                StatusCode::BAD_REQUEST,
                Alert::error(
                    "Invalid number of installments",
                    &format!("{count} is not a valid number of installments. Enter at least 1."),
                )
                .into_html(),
            ),
            Error::InvalidDayOfMonth(day) => render(
                StatusCode::BAD_REQUEST,
                Alert::error(
                    "Invalid day of the month",
                    &format!("{day} is not a valid day. Enter a day between 1 and 31."),
                )
                .into_html(),
            ),
            Error::EmptyDescription => render(
                StatusCode::BAD_REQUEST,
                Alert::error_simple("The description cannot be empty.").into_html(),
            ),
            Error::EmptyCategory => render(
                StatusCode::BAD_REQUEST,
                Alert::error_simple("The category cannot be empty.").into_html(),
            ),
            Error::UpdateMissingTransaction => render(
                StatusCode::NOT_FOUND,
                Alert::error(
                    "Could not update transaction",
                    "The transaction could not be found.",
                )
                .into_html(),
            ),
            Error::DeleteMissingTransaction => render(
                StatusCode::NOT_FOUND,
                Alert::error(
                    "Could not delete transaction",
                    "The transaction could not be found. \
                    Try refreshing the page to see if the transaction has already been deleted.",
                )
                .into_html(),
            ),
            Error::DeleteMissingSeries => render(
                StatusCode::NOT_FOUND,
                Alert::error(
                    "Could not delete purchase",
                    "The purchase could not be found. \
                    Try refreshing the page to see if it has already been deleted.",
                )
                .into_html(),
            ),
            Error::DeleteMissingBudget => render(
                StatusCode::NOT_FOUND,
                Alert::error(
                    "Could not delete budget",
                    "The budget could not be found. \
                    Try refreshing the page to see if it has already been deleted.",
                )
                .into_html(),
            ),
            _ => render(
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::error(
                    "Something went wrong",
                    "An unexpected error occurred, check the server logs for more details.",
                )
                .into_html(),
            ),
        }
    }
}
