//! The page and endpoint for editing a transaction's description and
//! amount.
//!
//! Edits are per-record: changing one installment or one month of a
//! recurring bill never touches its siblings.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    database_id::TransactionId,
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, base,
    },
    navigation::NavBar,
    transaction::{
        core::{Transaction, TransactionPatch, get_transaction, update_transaction},
        modify_endpoints::page_for,
    },
};

/// The state needed for the edit transaction page.
#[derive(Debug, Clone)]
pub struct EditTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

fn edit_transaction_form_view(
    update_endpoint: &str,
    transaction: &Transaction,
    error_message: &str,
) -> Markup {
    html! {
        form
            hx-put=(update_endpoint)
            hx-target-error="#alert-container"
            class="w-full space-y-4 md:space-y-6"
        {
            div
            {
                label for="description" class=(FORM_LABEL_STYLE) { "Description" }

                input
                    id="description"
                    type="text"
                    name="description"
                    value=(transaction.description)
                    required
                    autofocus
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="amount" class=(FORM_LABEL_STYLE) { "Amount (R$)" }

                input
                    id="amount"
                    type="number"
                    name="amount"
                    step="0.01"
                    min="0.01"
                    value=(transaction.amount)
                    required
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            @if !error_message.is_empty() {
                p class="text-red-600 dark:text-red-400"
                {
                    (error_message)
                }
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Update" }
        }
    }
}

fn edit_transaction_view(transaction: &Transaction, error_message: &str) -> Markup {
    let nav_bar = NavBar::new("").into_html();
    let update_endpoint = endpoints::format_endpoint(endpoints::PUT_TRANSACTION, transaction.id);
    let form = edit_transaction_form_view(&update_endpoint, transaction, error_message);

    let content = html! {
        (nav_bar)
        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="text-xl font-bold py-4" { "Edit Entry" }
            (form)
        }
    };

    base("Edit Entry", &content)
}

/// Route handler for the edit transaction page.
pub async fn get_edit_transaction_page(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<EditTransactionState>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = get_transaction(transaction_id, &connection)?;

    Ok(edit_transaction_view(&transaction, "").into_response())
}

/// The form data for editing a transaction.
#[derive(Debug, Deserialize)]
pub struct EditTransactionForm {
    /// The replacement description.
    pub description: String,
    /// The replacement amount.
    pub amount: f64,
}

/// A route handler that applies a partial update to a transaction, then
/// redirects back to the page the record is listed on.
pub async fn edit_transaction_endpoint(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<EditTransactionState>,
    Form(form): Form<EditTransactionForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let patch = TransactionPatch {
        description: Some(form.description),
        amount: Some(form.amount),
    };

    match update_transaction(transaction_id, patch, &connection) {
        Ok(()) => match get_transaction(transaction_id, &connection) {
            Ok(transaction) => {
                (HxRedirect(page_for(&transaction)), StatusCode::SEE_OTHER).into_response()
            }
            Err(error) => error.into_alert_response(),
        },
        Err(Error::UpdateMissingTransaction) => {
            Error::UpdateMissingTransaction.into_alert_response()
        }
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while updating transaction {transaction_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
