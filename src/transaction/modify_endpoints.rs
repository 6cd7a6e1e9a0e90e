//! Endpoints for mutating existing transactions: toggling the paid flag,
//! deleting single records, and deleting whole series.
//!
//! Successful mutations redirect back to the page the record belongs to
//! (derived from its kind and month) so the view re-fetches committed
//! state instead of diverging locally; failures return an alert fragment
//! and leave the prior rendering untouched.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use rusqlite::Connection;

use crate::{
    AppState, Error,
    database_id::{SeriesId, TransactionId},
    endpoints,
    transaction::{
        core::{
            TRANSACTION_COLUMNS, Transaction, TransactionKind, delete_transaction,
            get_transaction, map_transaction_row, set_transaction_paid,
        },
        generate::delete_series,
        month::format_month_param,
    },
};

/// The state needed to modify transactions.
#[derive(Debug, Clone)]
pub struct ModifyTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ModifyTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The month-scoped page a transaction is listed on.
pub(super) fn page_for(transaction: &Transaction) -> String {
    let page = match transaction.kind {
        TransactionKind::Fixed { .. } => endpoints::FIXED_COSTS_VIEW,
        TransactionKind::Installment(_) => endpoints::PURCHASES_VIEW,
        TransactionKind::Variable => endpoints::EXPENSES_VIEW,
    };

    format!(
        "{page}?month={}",
        format_month_param(transaction.date)
    )
}

fn redirect_to(page: String) -> Response {
    (HxRedirect(page), StatusCode::SEE_OTHER).into_response()
}

/// A route handler that flips a transaction's paid flag.
///
/// Marking paid stamps the paid timestamp; marking unpaid clears it.
pub async fn toggle_paid_endpoint(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<ModifyTransactionState>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let transaction = match get_transaction(transaction_id, &connection) {
        Ok(transaction) => transaction,
        Err(Error::NotFound) => return Error::UpdateMissingTransaction.into_alert_response(),
        Err(error) => return error.into_alert_response(),
    };

    match set_transaction_paid(transaction.id, !transaction.is_paid, &connection) {
        Ok(()) => redirect_to(page_for(&transaction)),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while toggling transaction {transaction_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

/// A route handler for deleting a single transaction.
///
/// Deleting one installment leaves the rest of its purchase in place.
pub async fn delete_transaction_endpoint(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<ModifyTransactionState>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let transaction = match get_transaction(transaction_id, &connection) {
        Ok(transaction) => transaction,
        Err(Error::NotFound) => return Error::DeleteMissingTransaction.into_alert_response(),
        Err(error) => return error.into_alert_response(),
    };

    match delete_transaction(transaction.id, &connection) {
        Ok(()) => redirect_to(page_for(&transaction)),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while deleting transaction {transaction_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

/// A route handler for deleting every record in a series: all remaining
/// installments of one purchase, or all months of one recurring bill.
pub async fn delete_series_endpoint(
    Path(series_id): Path<SeriesId>,
    State(state): State<ModifyTransactionState>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    // Grab one member before the cascade so the redirect can land on the
    // page and month the series was viewed from.
    let sample = first_series_member(series_id, &connection);

    match delete_series(series_id, &connection) {
        Ok(removed) => {
            tracing::info!("Deleted series {series_id} ({removed} records)");

            match sample {
                Some(transaction) => redirect_to(page_for(&transaction)),
                None => redirect_to(endpoints::PURCHASES_VIEW.to_owned()),
            }
        }
        Err(Error::DeleteMissingSeries) => Error::DeleteMissingSeries.into_alert_response(),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while deleting series {series_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

fn first_series_member(series_id: SeriesId, connection: &Connection) -> Option<Transaction> {
    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
         WHERE series_id = :id ORDER BY date ASC LIMIT 1"
    );

    connection
        .prepare(&query)
        .ok()?
        .query_row(&[(":id", &series_id)], map_transaction_row)
        .ok()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod modify_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{extract::Path, extract::State, http::StatusCode, response::Response};
    use axum_htmx::HX_REDIRECT;
    use time::macros::date;

    use crate::transaction::{
        core::{count_transactions, create_transaction, get_transaction},
        generate::{InstallmentPurchase, create_installment_purchase},
        test_utils::{new_fixed_transaction, test_household},
    };

    use super::{
        ModifyTransactionState, delete_series_endpoint, delete_transaction_endpoint,
        toggle_paid_endpoint,
    };

    fn get_test_state() -> (ModifyTransactionState, i64, i64) {
        let (conn, household_id, user_id) = test_household();

        (
            ModifyTransactionState {
                db_connection: Arc::new(Mutex::new(conn)),
            },
            household_id,
            user_id,
        )
    }

    #[track_caller]
    fn assert_hx_redirect(response: &Response, expected: &str) {
        let location = response
            .headers()
            .get(HX_REDIRECT)
            .expect("expected response to have the header hx-redirect")
            .to_str()
            .unwrap();

        assert_eq!(location, expected);
    }

    #[tokio::test]
    async fn toggle_flips_paid_and_redirects_to_record_month() {
        let (state, household_id, user_id) = get_test_state();
        let transaction = create_transaction(
            new_fixed_transaction(household_id, user_id, 100.0, date!(2026 - 03 - 05)),
            &state.db_connection.lock().unwrap(),
        )
        .unwrap();

        let response = toggle_paid_endpoint(Path(transaction.id), State(state.clone())).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, "/fixed?month=2026-03");

        let toggled =
            get_transaction(transaction.id, &state.db_connection.lock().unwrap()).unwrap();
        assert!(toggled.is_paid);
    }

    #[tokio::test]
    async fn toggle_missing_transaction_returns_not_found_alert() {
        let (state, _, _) = get_test_state();

        let response = toggle_paid_endpoint(Path(999), State(state)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_single_installment_keeps_siblings() {
        let (state, household_id, user_id) = get_test_state();
        let series_id = {
            let connection = state.db_connection.lock().unwrap();
            create_installment_purchase(
                &InstallmentPurchase {
                    description: "TV".to_owned(),
                    total_amount: 900.0,
                    count: 3,
                    start_date: date!(2026 - 01 - 10),
                    category: "Electronics".to_owned(),
                },
                household_id,
                user_id,
                &connection,
            )
            .unwrap()
        };

        let first_id = {
            let connection = state.db_connection.lock().unwrap();
            crate::transaction::test_utils::series_transactions(series_id, &connection)[0].id
        };

        let response = delete_transaction_endpoint(Path(first_id), State(state.clone())).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, "/purchases?month=2026-01");
        assert_eq!(
            count_transactions(&state.db_connection.lock().unwrap()),
            Ok(2)
        );
    }

    #[tokio::test]
    async fn delete_series_removes_whole_purchase() {
        let (state, household_id, user_id) = get_test_state();
        let series_id = {
            let connection = state.db_connection.lock().unwrap();
            create_installment_purchase(
                &InstallmentPurchase {
                    description: "TV".to_owned(),
                    total_amount: 900.0,
                    count: 3,
                    start_date: date!(2026 - 01 - 10),
                    category: "Electronics".to_owned(),
                },
                household_id,
                user_id,
                &connection,
            )
            .unwrap()
        };

        let response = delete_series_endpoint(Path(series_id), State(state.clone())).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, "/purchases?month=2026-01");
        assert_eq!(
            count_transactions(&state.db_connection.lock().unwrap()),
            Ok(0)
        );
    }

    #[tokio::test]
    async fn delete_missing_series_returns_not_found_alert() {
        let (state, _, _) = get_test_state();

        let response = delete_series_endpoint(Path(999), State(state)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
