//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/transactions/{transaction_id}', use [format_endpoint].

/// The root route which redirects to the overview or sign-in page.
pub const ROOT: &str = "/";
/// The landing page for signed in users: the monthly overview.
pub const OVERVIEW_VIEW: &str = "/overview";
/// The page listing the viewed month's fixed costs.
pub const FIXED_COSTS_VIEW: &str = "/fixed";
/// The page listing the viewed month's installments.
pub const PURCHASES_VIEW: &str = "/purchases";
/// The page with budgets and the viewed month's variable expenses.
pub const EXPENSES_VIEW: &str = "/expenses";
/// The page listing one budget's variable expenses for the viewed month.
pub const BUDGET_DETAIL_VIEW: &str = "/expenses/{budget_id}";
/// The page for editing a single transaction.
pub const EDIT_TRANSACTION_VIEW: &str = "/transactions/{transaction_id}/edit";
/// The page for household settings and the invite code.
pub const SETTINGS_VIEW: &str = "/settings";
/// The page for picking the acting user.
pub const SIGN_IN_VIEW: &str = "/sign_in";
/// The page to display when an internal server error occurs.
pub const INTERNAL_ERROR_VIEW: &str = "/error";
/// The route for static files.
pub const STATIC: &str = "/static";

/// The route for establishing a session.
pub const SIGN_IN_API: &str = "/api/sign_in";
/// The route for clearing the current session.
pub const SIGN_OUT: &str = "/api/sign_out";
/// The route to create a single transaction (ad hoc fixed or variable entry).
pub const POST_TRANSACTION: &str = "/api/transactions";
/// The route to create a recurring fixed cost series.
pub const POST_FIXED_SERIES: &str = "/api/fixed";
/// The route to create an installment purchase.
pub const POST_PURCHASE: &str = "/api/purchases";
/// The route to update a transaction's description and amount.
pub const PUT_TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to toggle a transaction's paid flag.
pub const TOGGLE_PAID: &str = "/api/transactions/{transaction_id}/toggle";
/// The route to delete a single transaction.
pub const DELETE_TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to delete every record in a series (all installments of one
/// purchase, or all months of one recurring bill).
pub const DELETE_SERIES: &str = "/api/series/{series_id}";
/// The route to create or overwrite a budget.
pub const POST_BUDGET: &str = "/api/budgets";
/// The route to delete a budget.
pub const DELETE_BUDGET: &str = "/api/budgets/{budget_id}";
/// The route to create a household for the acting user.
pub const POST_HOUSEHOLD: &str = "/api/household";
/// The route to join an existing household by invite code.
pub const JOIN_HOUSEHOLD: &str = "/api/household/join";
/// The route to update the household's income and closing day.
pub const PUT_HOUSEHOLD_SETTINGS: &str = "/api/household/settings";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::ROOT);
        assert_endpoint_is_valid_uri(endpoints::OVERVIEW_VIEW);
        assert_endpoint_is_valid_uri(endpoints::FIXED_COSTS_VIEW);
        assert_endpoint_is_valid_uri(endpoints::PURCHASES_VIEW);
        assert_endpoint_is_valid_uri(endpoints::EXPENSES_VIEW);
        assert_endpoint_is_valid_uri(endpoints::BUDGET_DETAIL_VIEW);
        assert_endpoint_is_valid_uri(endpoints::EDIT_TRANSACTION_VIEW);
        assert_endpoint_is_valid_uri(endpoints::SETTINGS_VIEW);
        assert_endpoint_is_valid_uri(endpoints::SIGN_IN_VIEW);
        assert_endpoint_is_valid_uri(endpoints::INTERNAL_ERROR_VIEW);
        assert_endpoint_is_valid_uri(endpoints::STATIC);

        assert_endpoint_is_valid_uri(endpoints::SIGN_IN_API);
        assert_endpoint_is_valid_uri(endpoints::SIGN_OUT);
        assert_endpoint_is_valid_uri(endpoints::POST_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::POST_FIXED_SERIES);
        assert_endpoint_is_valid_uri(endpoints::POST_PURCHASE);
        assert_endpoint_is_valid_uri(endpoints::PUT_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::TOGGLE_PAID);
        assert_endpoint_is_valid_uri(endpoints::DELETE_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::DELETE_SERIES);
        assert_endpoint_is_valid_uri(endpoints::POST_BUDGET);
        assert_endpoint_is_valid_uri(endpoints::DELETE_BUDGET);
        assert_endpoint_is_valid_uri(endpoints::POST_HOUSEHOLD);
        assert_endpoint_is_valid_uri(endpoints::JOIN_HOUSEHOLD);
        assert_endpoint_is_valid_uri(endpoints::PUT_HOUSEHOLD_SETTINGS);
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint("/hello/{world_id}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());

        // Parameter with single word should also work.
        let formatted_path = format_endpoint("/hello/{world}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint("/hello/world", 1);

        assert_eq!(formatted_path, "/hello/world");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint("/hello/{world}/bye", 1);

        assert_eq!(formatted_path, "/hello/1/bye");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }
}
