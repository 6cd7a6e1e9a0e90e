//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    response::Redirect,
    routing::{delete, get, post, put},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    budget::{
        create_budget_endpoint, delete_budget_endpoint, get_budget_detail_page, get_expenses_page,
    },
    dashboard::get_overview_page,
    endpoints,
    household::{
        create_household_endpoint, get_settings_page, join_household_endpoint,
        update_settings_endpoint,
    },
    internal_server_error::get_internal_server_error_page,
    not_found::get_404_not_found,
    session::{get_sign_in_page, session_guard, session_guard_hx, sign_in, sign_out},
    transaction::{
        create_fixed_cost_endpoint, create_purchase_endpoint, create_transaction_endpoint,
        delete_series_endpoint, delete_transaction_endpoint, edit_transaction_endpoint,
        get_edit_transaction_page, get_fixed_costs_page, get_purchases_page,
        toggle_paid_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::SIGN_IN_VIEW, get(get_sign_in_page))
        .route(endpoints::SIGN_IN_API, post(sign_in))
        .route(endpoints::SIGN_OUT, get(sign_out))
        .route(
            endpoints::INTERNAL_ERROR_VIEW,
            get(get_internal_server_error_page),
        );

    // Pages and the plain-form household endpoints redirect to the
    // sign-in page when the session cookie is missing.
    let protected_routes = Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::OVERVIEW_VIEW, get(get_overview_page))
        .route(endpoints::FIXED_COSTS_VIEW, get(get_fixed_costs_page))
        .route(endpoints::PURCHASES_VIEW, get(get_purchases_page))
        .route(endpoints::EXPENSES_VIEW, get(get_expenses_page))
        .route(endpoints::BUDGET_DETAIL_VIEW, get(get_budget_detail_page))
        .route(
            endpoints::EDIT_TRANSACTION_VIEW,
            get(get_edit_transaction_page),
        )
        .route(endpoints::SETTINGS_VIEW, get(get_settings_page))
        .route(endpoints::POST_HOUSEHOLD, post(create_household_endpoint))
        .route(endpoints::JOIN_HOUSEHOLD, post(join_household_endpoint))
        .route(
            endpoints::PUT_HOUSEHOLD_SETTINGS,
            post(update_settings_endpoint),
        )
        .layer(middleware::from_fn_with_state(state.clone(), session_guard));

    // These routes are called by HTMX and need the HX-Redirect header for
    // auth redirects to work properly.
    let protected_routes = protected_routes.merge(
        Router::new()
            .route(
                endpoints::POST_TRANSACTION,
                post(create_transaction_endpoint),
            )
            .route(endpoints::POST_FIXED_SERIES, post(create_fixed_cost_endpoint))
            .route(endpoints::POST_PURCHASE, post(create_purchase_endpoint))
            .route(endpoints::PUT_TRANSACTION, put(edit_transaction_endpoint))
            .route(
                endpoints::DELETE_TRANSACTION,
                delete(delete_transaction_endpoint),
            )
            .route(endpoints::TOGGLE_PAID, post(toggle_paid_endpoint))
            .route(endpoints::DELETE_SERIES, delete(delete_series_endpoint))
            .route(endpoints::POST_BUDGET, post(create_budget_endpoint))
            .route(endpoints::DELETE_BUDGET, delete(delete_budget_endpoint))
            .layer(middleware::from_fn_with_state(state.clone(), session_guard_hx)),
    );

    protected_routes
        .merge(unprotected_routes)
        .nest_service(endpoints::STATIC, ServeDir::new("static/"))
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The root path '/' redirects to the overview page.
async fn get_index_page() -> Redirect {
    Redirect::to(endpoints::OVERVIEW_VIEW)
}
