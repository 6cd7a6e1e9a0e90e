//! Endpoints for creating transactions: ad hoc single entries,
//! installment purchases, and recurring fixed-cost series.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
// Must use axum_extra's Form since that parses an empty string as None instead
// of crashing like axum::Form.
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;
use rusqlite::Connection;
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error,
    alert::Alert,
    endpoints,
    session::CurrentUser,
    transaction::{
        core::{NewTransaction, TransactionKind, create_transaction},
        generate::{
            InstallmentPurchase, RecurringFixedCost, create_installment_purchase,
            create_recurring_fixed_cost,
        },
        month::{format_month_param, parse_month_param},
    },
    user::require_household,
};

/// The state needed to create transactions.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The category fixed costs are recorded against.
pub(super) const FIXED_COST_CATEGORY: &str = "Fixed Cost";

fn lock_connection(
    state: &CreateTransactionState,
) -> Result<std::sync::MutexGuard<'_, Connection>, Response> {
    state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError.into_alert_response()
    })
}

/// The viewed month from a hidden form field, defaulting to today's month.
fn viewed_month(month: Option<&str>) -> Date {
    month
        .and_then(parse_month_param)
        .unwrap_or_else(|| OffsetDateTime::now_utc().date())
}

/// The date to stamp on an ad hoc entry for `viewed`'s month: today when
/// viewing the current month, otherwise the first of the viewed month.
fn entry_date(viewed: Date) -> Date {
    let today = OffsetDateTime::now_utc().date();

    if (viewed.year(), viewed.month()) == (today.year(), today.month()) {
        today
    } else {
        viewed
            .replace_day(1)
            .expect("day 1 is valid in every month")
    }
}

fn redirect_to_month(page: &str, month: Date) -> Response {
    (
        HxRedirect(format!("{page}?month={}", format_month_param(month))),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}

/// The form data for creating an ad hoc single entry.
#[derive(Debug, Deserialize)]
pub struct SingleEntryForm {
    /// Text detailing the entry; defaults to the category when blank.
    #[serde(default)]
    pub description: String,
    /// The amount spent.
    pub amount: f64,
    /// The category to record against.
    pub category: String,
    /// The kind tag, FIXED or VARIABLE.
    pub kind: String,
    /// The viewed month as `YYYY-MM`.
    pub month: Option<String>,
}

/// A route handler for creating one FIXED or VARIABLE record, redirecting
/// back to the originating page on success.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Form(form): Form<SingleEntryForm>,
) -> Response {
    let (kind, page) = match form.kind.as_str() {
        "FIXED" => (
            TransactionKind::Fixed { series_id: None },
            endpoints::FIXED_COSTS_VIEW,
        ),
        "VARIABLE" => (TransactionKind::Variable, endpoints::EXPENSES_VIEW),
        other => {
            return crate::html::render(
                StatusCode::BAD_REQUEST,
                Alert::error_simple(&format!("\"{other}\" is not a transaction kind."))
                    .into_html(),
            );
        }
    };

    let connection = match lock_connection(&state) {
        Ok(connection) => connection,
        Err(response) => return response,
    };

    let household_id = match require_household(user_id, &connection) {
        Ok(household_id) => household_id,
        Err(error) => return error.into_alert_response(),
    };

    let viewed = viewed_month(form.month.as_deref());
    let description = if form.description.trim().is_empty() {
        format!("Spent on {}", form.category)
    } else {
        form.description
    };

    let new_transaction = NewTransaction {
        household_id,
        user_id,
        description,
        amount: form.amount,
        date: entry_date(viewed),
        category: form.category,
        kind,
    };

    match create_transaction(new_transaction, &connection) {
        Ok(_) => redirect_to_month(page, viewed),
        Err(error) => {
            tracing::error!("An unexpected error occurred while creating a transaction: {error}");
            error.into_alert_response()
        }
    }
}

/// The form data for creating a fixed cost, one month or recurring.
#[derive(Debug, Deserialize)]
pub struct FixedCostForm {
    /// What the bill is for.
    pub description: String,
    /// The amount due.
    pub amount: f64,
    /// The day of the month the bill is due.
    pub due_day: u8,
    /// The viewed month as `YYYY-MM`; the bill lands in this month.
    pub month: Option<String>,
    /// Present when the bill should repeat monthly until December.
    #[serde(default)]
    pub recurring: Option<String>,
}

/// A route handler for creating a fixed cost in the viewed month, either
/// as a single record or as a recurring series through December.
pub async fn create_fixed_cost_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Form(form): Form<FixedCostForm>,
) -> Response {
    if !(1..=31).contains(&form.due_day) {
        return Error::InvalidDayOfMonth(form.due_day).into_alert_response();
    }

    let connection = match lock_connection(&state) {
        Ok(connection) => connection,
        Err(response) => return response,
    };

    let household_id = match require_household(user_id, &connection) {
        Ok(household_id) => household_id,
        Err(error) => return error.into_alert_response(),
    };

    let viewed = viewed_month(form.month.as_deref());
    let due_day = form
        .due_day
        .min(time::util::days_in_year_month(viewed.year(), viewed.month()));
    let due_date = viewed
        .replace_day(due_day)
        .expect("a clamped day is always valid for the month");

    let result = if form.recurring.is_some() {
        create_recurring_fixed_cost(
            &RecurringFixedCost {
                description: form.description,
                amount: form.amount,
                due_day: form.due_day,
                reference: due_date,
                category: FIXED_COST_CATEGORY.to_owned(),
            },
            household_id,
            user_id,
            &connection,
        )
        .map(|_| ())
    } else {
        create_transaction(
            NewTransaction {
                household_id,
                user_id,
                description: form.description,
                amount: form.amount,
                date: due_date,
                category: FIXED_COST_CATEGORY.to_owned(),
                kind: TransactionKind::Fixed { series_id: None },
            },
            &connection,
        )
        .map(|_| ())
    };

    match result {
        Ok(()) => redirect_to_month(endpoints::FIXED_COSTS_VIEW, viewed),
        Err(error) => {
            tracing::error!("An unexpected error occurred while creating a fixed cost: {error}");
            error.into_alert_response()
        }
    }
}

/// The form data for creating an installment purchase.
#[derive(Debug, Deserialize)]
pub struct PurchaseForm {
    /// What was bought.
    pub description: String,
    /// The total purchase amount.
    pub total_amount: f64,
    /// How many monthly installments to split into.
    pub installments: u32,
    /// When the first installment is due.
    pub start_date: Date,
    /// The category to record every installment against.
    pub category: String,
}

/// A route handler for creating an installment purchase, redirecting to
/// the first installment's month on success.
pub async fn create_purchase_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Form(form): Form<PurchaseForm>,
) -> Response {
    let connection = match lock_connection(&state) {
        Ok(connection) => connection,
        Err(response) => return response,
    };

    let household_id = match require_household(user_id, &connection) {
        Ok(household_id) => household_id,
        Err(error) => return error.into_alert_response(),
    };

    let purchase = InstallmentPurchase {
        description: form.description,
        total_amount: form.total_amount,
        count: form.installments,
        start_date: form.start_date,
        category: form.category,
    };

    match create_installment_purchase(&purchase, household_id, user_id, &connection) {
        Ok(_) => redirect_to_month(endpoints::PURCHASES_VIEW, form.start_date),
        Err(error) => {
            tracing::error!("An unexpected error occurred while creating a purchase: {error}");
            error.into_alert_response()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod create_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, extract::State, http::StatusCode, response::Response};
    use axum_extra::extract::Form;
    use axum_htmx::HX_REDIRECT;
    use time::macros::date;

    use crate::{
        session::CurrentUser,
        transaction::{
            core::{TransactionKind, count_transactions},
            month::get_month_transactions,
            test_utils::test_household,
        },
    };

    use super::{
        CreateTransactionState, FixedCostForm, PurchaseForm, SingleEntryForm,
        create_fixed_cost_endpoint, create_purchase_endpoint, create_transaction_endpoint,
    };

    fn get_test_state() -> (CreateTransactionState, i64, i64) {
        let (conn, household_id, user_id) = test_household();

        (
            CreateTransactionState {
                db_connection: Arc::new(Mutex::new(conn)),
            },
            household_id,
            user_id,
        )
    }

    #[track_caller]
    fn assert_hx_redirect_starts_with(response: &Response, prefix: &str) {
        let location = response
            .headers()
            .get(HX_REDIRECT)
            .expect("expected response to have the header hx-redirect")
            .to_str()
            .unwrap();

        assert!(
            location.starts_with(prefix),
            "got redirect to {location}, want prefix {prefix}"
        );
    }

    #[tokio::test]
    async fn creates_variable_entry_with_default_description() {
        let (state, household_id, user_id) = get_test_state();

        let form = SingleEntryForm {
            description: String::new(),
            amount: 42.0,
            category: "Groceries".to_owned(),
            kind: "VARIABLE".to_owned(),
            month: Some("2026-08".to_owned()),
        };

        let response =
            create_transaction_endpoint(State(state.clone()), Extension(CurrentUser(user_id)), Form(form))
                .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect_starts_with(&response, "/expenses?month=2026-08");

        let connection = state.db_connection.lock().unwrap();
        let transactions =
            get_month_transactions(household_id, date!(2026 - 08 - 01), &connection).unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].description, "Spent on Groceries");
        assert_eq!(transactions[0].kind, TransactionKind::Variable);
    }

    #[tokio::test]
    async fn rejects_unknown_kind() {
        let (state, _, user_id) = get_test_state();

        let form = SingleEntryForm {
            description: "Mystery".to_owned(),
            amount: 42.0,
            category: "Groceries".to_owned(),
            kind: "MYSTERY".to_owned(),
            month: None,
        };

        let response =
            create_transaction_endpoint(State(state.clone()), Extension(CurrentUser(user_id)), Form(form))
                .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            count_transactions(&state.db_connection.lock().unwrap()),
            Ok(0)
        );
    }

    #[test]
    fn fixed_cost_form_decodes_recurring_checkbox() {
        let form: FixedCostForm = serde_html_form::from_str(
            "description=Rent&amount=1500&due_day=5&month=2026-08&recurring=on",
        )
        .unwrap();
        assert_eq!(form.recurring.as_deref(), Some("on"));

        let form: FixedCostForm =
            serde_html_form::from_str("description=Rent&amount=1500&due_day=5").unwrap();
        assert!(form.recurring.is_none());
        assert!(form.month.is_none());
    }

    #[tokio::test]
    async fn single_fixed_cost_lands_on_due_day() {
        let (state, household_id, user_id) = get_test_state();

        let form = FixedCostForm {
            description: "Rent".to_owned(),
            amount: 1500.0,
            due_day: 5,
            month: Some("2026-08".to_owned()),
            recurring: None,
        };

        let response =
            create_fixed_cost_endpoint(State(state.clone()), Extension(CurrentUser(user_id)), Form(form))
                .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let connection = state.db_connection.lock().unwrap();
        let transactions =
            get_month_transactions(household_id, date!(2026 - 08 - 01), &connection).unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].date, date!(2026 - 08 - 05));
        assert_eq!(
            transactions[0].kind,
            TransactionKind::Fixed { series_id: None }
        );
    }

    #[tokio::test]
    async fn recurring_fixed_cost_fills_rest_of_year() {
        let (state, _, user_id) = get_test_state();

        let form = FixedCostForm {
            description: "Rent".to_owned(),
            amount: 1500.0,
            due_day: 5,
            month: Some("2026-10".to_owned()),
            recurring: Some("on".to_owned()),
        };

        let response =
            create_fixed_cost_endpoint(State(state.clone()), Extension(CurrentUser(user_id)), Form(form))
                .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            count_transactions(&state.db_connection.lock().unwrap()),
            Ok(3)
        );
    }

    #[tokio::test]
    async fn rejects_due_day_out_of_range() {
        let (state, _, user_id) = get_test_state();

        let form = FixedCostForm {
            description: "Rent".to_owned(),
            amount: 1500.0,
            due_day: 32,
            month: None,
            recurring: None,
        };

        let response =
            create_fixed_cost_endpoint(State(state.clone()), Extension(CurrentUser(user_id)), Form(form))
                .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            count_transactions(&state.db_connection.lock().unwrap()),
            Ok(0)
        );
    }

    #[tokio::test]
    async fn purchase_generates_installments_and_redirects() {
        let (state, _, user_id) = get_test_state();

        let form = PurchaseForm {
            description: "iPhone".to_owned(),
            total_amount: 5000.0,
            installments: 10,
            start_date: date!(2026 - 02 - 10),
            category: "Electronics".to_owned(),
        };

        let response =
            create_purchase_endpoint(State(state.clone()), Extension(CurrentUser(user_id)), Form(form))
                .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect_starts_with(&response, "/purchases?month=2026-02");
        assert_eq!(
            count_transactions(&state.db_connection.lock().unwrap()),
            Ok(10)
        );
    }

    #[tokio::test]
    async fn purchase_with_zero_installments_writes_nothing() {
        let (state, _, user_id) = get_test_state();

        let form = PurchaseForm {
            description: "iPhone".to_owned(),
            total_amount: 5000.0,
            installments: 0,
            start_date: date!(2026 - 02 - 10),
            category: "Electronics".to_owned(),
        };

        let response =
            create_purchase_endpoint(State(state.clone()), Extension(CurrentUser(user_id)), Form(form))
                .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            count_transactions(&state.db_connection.lock().unwrap()),
            Ok(0)
        );
    }
}
