//! Budgets ("cotas"): per-household spending ceilings for variable-expense
//! categories, and the expenses pages that track spend against them.
//!
//! A budget is keyed by the household and a normalized category string, so
//! resubmitting the same category (with different case or whitespace)
//! overwrites the limit instead of creating a second ceiling.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::{Connection, Row};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    balance::percent_of,
    database_id::{BudgetId, HouseholdId},
    endpoints,
    html::{
        BUTTON_DELETE_STYLE, CARD_CAPTION_STYLE, CARD_STYLE, FORM_TEXT_INPUT_STYLE,
        PAGE_CONTAINER_STYLE, base, format_currency, progress_bar,
    },
    navigation::NavBar,
    session::CurrentUser,
    transaction::{
        CategorySpend, MonthQuery, Transaction, TransactionKind, format_month_param,
        get_month_transactions, month_navigation, month_title, parse_month_param,
        variable_spend_by_category,
    },
    user::require_household,
};

/// A per-household, per-category spending ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    /// The ID of the budget.
    pub id: BudgetId,
    /// The household the budget belongs to.
    pub household_id: HouseholdId,
    /// The category label as last entered by a user.
    pub category: String,
    /// The normalized category used as the upsert key.
    pub category_key: String,
    /// The spending ceiling for the category.
    pub limit: f64,
}

/// Lowercase `category` and collapse whitespace runs to single
/// underscores, producing the deterministic upsert key.
pub fn normalize_category(category: &str) -> String {
    category
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Create the budget table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                household_id INTEGER NOT NULL,
                category TEXT NOT NULL,
                category_key TEXT NOT NULL,
                limit_amount REAL NOT NULL,
                FOREIGN KEY(household_id) REFERENCES household(id) ON UPDATE CASCADE ON DELETE CASCADE,
                UNIQUE(household_id, category_key)
                )",
        (),
    )?;

    Ok(())
}

/// Create or overwrite the budget for `category`.
///
/// The upsert key is the household plus the normalized category, so
/// submitting "Eating Out", "eating out", and "eating   out" all update
/// one budget. The stored label follows the latest submission.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyCategory] if the category is blank,
/// - [Error::InvalidAmount] if the limit is not a positive number,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn set_budget_limit(
    household_id: HouseholdId,
    category: &str,
    limit: f64,
    connection: &Connection,
) -> Result<Budget, Error> {
    let category = category.trim();

    if category.is_empty() {
        return Err(Error::EmptyCategory);
    }

    if !limit.is_finite() || limit <= 0.0 {
        return Err(Error::InvalidAmount(limit));
    }

    let category_key = normalize_category(category);

    connection.execute(
        "INSERT INTO budget (household_id, category, category_key, limit_amount)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(household_id, category_key)
         DO UPDATE SET category = excluded.category, limit_amount = excluded.limit_amount",
        (household_id, category, &category_key, limit),
    )?;

    let budget = connection
        .prepare(
            "SELECT id, household_id, category, category_key, limit_amount FROM budget
             WHERE household_id = ?1 AND category_key = ?2",
        )?
        .query_row((household_id, &category_key), map_budget_row)?;

    Ok(budget)
}

/// Retrieve a budget from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid budget,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_budget(id: BudgetId, connection: &Connection) -> Result<Budget, Error> {
    let budget = connection
        .prepare(
            "SELECT id, household_id, category, category_key, limit_amount FROM budget
             WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_budget_row)?;

    Ok(budget)
}

/// Retrieve all of a household's budgets, ordered by category.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_budgets(
    household_id: HouseholdId,
    connection: &Connection,
) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(
            "SELECT id, household_id, category, category_key, limit_amount FROM budget
             WHERE household_id = :household_id ORDER BY category ASC",
        )?
        .query_map(&[(":household_id", &household_id)], map_budget_row)?
        .map(|maybe_budget| maybe_budget.map_err(|error| error.into()))
        .collect()
}

/// Delete a budget by ID.
///
/// Already-recorded spend is untouched: historical months keep their
/// transactions with the now-unbounded category.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingBudget] if `id` does not refer to a valid budget,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_budget(id: BudgetId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM budget WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingBudget);
    }

    Ok(())
}

fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        household_id: row.get(1)?,
        category: row.get(2)?,
        category_key: row.get(3)?,
        limit: row.get(4)?,
    })
}

/// A budget paired with the viewed month's spend for its category.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetStatus {
    /// The budget being tracked.
    pub budget: Budget,
    /// The month's variable spend recorded against the budget's category.
    pub spent: f64,
}

impl BudgetStatus {
    /// Whether the month's spend exceeds the ceiling.
    pub fn over_budget(&self) -> bool {
        self.spent > self.budget.limit
    }

    /// How far over the ceiling the month's spend is, or zero.
    pub fn overage(&self) -> f64 {
        (self.spent - self.budget.limit).max(0.0)
    }

    /// The month's spend as a percentage of the ceiling.
    pub fn percent_used(&self) -> f64 {
        percent_of(self.spent, self.budget.limit)
    }
}

/// Pair every budget with its category's spend for the month.
///
/// Spend is matched on the normalized category, so entries recorded under
/// "eating out" count against an "Eating Out" budget.
pub fn budget_statuses(budgets: Vec<Budget>, spend: &[CategorySpend]) -> Vec<BudgetStatus> {
    budgets
        .into_iter()
        .map(|budget| {
            let spent = spend
                .iter()
                .filter(|category| normalize_category(&category.category) == budget.category_key)
                .map(|category| category.total)
                .sum();

            BudgetStatus { budget, spent }
        })
        .collect()
}

/// The month's spend in categories with no budget, by category.
pub fn unbudgeted_spend(budgets: &[Budget], spend: &[CategorySpend]) -> Vec<CategorySpend> {
    spend
        .iter()
        .filter(|category| {
            let key = normalize_category(&category.category);
            !budgets.iter().any(|budget| budget.category_key == key)
        })
        .cloned()
        .collect()
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The state needed for the expenses pages and budget endpoints.
#[derive(Debug, Clone)]
pub struct BudgetState {
    /// The database connection for managing budgets.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Display the budgets and variable expenses for the viewed month.
pub async fn get_expenses_page(
    State(state): State<BudgetState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(query): Query<MonthQuery>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let household_id = require_household(user_id, &connection)?;
    let viewed = query.viewed_month();

    let budgets = get_budgets(household_id, &connection)
        .inspect_err(|error| tracing::error!("could not get budgets: {error}"))?;
    let transactions = get_month_transactions(household_id, viewed, &connection)
        .inspect_err(|error| tracing::error!("could not get transactions: {error}"))?;

    let spend = variable_spend_by_category(&transactions);
    let unbudgeted = unbudgeted_spend(&budgets, &spend);
    let statuses = budget_statuses(budgets, &spend);

    Ok(expenses_view(viewed, &statuses, &unbudgeted).into_response())
}

fn expenses_view(
    viewed: time::Date,
    statuses: &[BudgetStatus],
    unbudgeted: &[CategorySpend],
) -> Markup {
    let nav_bar = NavBar::new(endpoints::EXPENSES_VIEW).into_html();
    let total_limit: f64 = statuses.iter().map(|status| status.budget.limit).sum();
    let total_spent: f64 =
        statuses.iter().map(|status| status.spent).sum::<f64>()
            + unbudgeted.iter().map(|category| category.total).sum::<f64>();
    let spent_style = if total_spent > total_limit {
        "text-xl font-bold text-red-500"
    } else {
        "text-xl font-bold text-green-500"
    };

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            (month_navigation(endpoints::EXPENSES_VIEW, viewed))

            div class="grid grid-cols-2 gap-4"
            {
                div class=(CARD_STYLE)
                {
                    p class=(CARD_CAPTION_STYLE) { "Budget Ceilings" }
                    p class="text-xl font-bold" { (format_currency(total_limit)) }
                }

                div class=(CARD_STYLE)
                {
                    p class=(CARD_CAPTION_STYLE) { "Total Spent" }
                    p class=(spent_style) { (format_currency(total_spent)) }
                }
            }

            (set_budget_form(viewed))

            div class="space-y-4"
            {
                @for status in statuses {
                    (budget_card(status, viewed))
                }
            }

            @if !unbudgeted.is_empty() {
                section class=(CARD_STYLE)
                {
                    h3 class="font-semibold mb-2" { "Spending Without a Budget" }

                    @for category in unbudgeted {
                        div class="flex justify-between text-sm py-1"
                        {
                            span { (category.category) }
                            span { (format_currency(category.total)) }
                        }
                    }
                }
            }
        }
    };

    base("Expenses", &content)
}

fn set_budget_form(viewed: time::Date) -> Markup {
    html! {
        form
            hx-post=(endpoints::POST_BUDGET)
            hx-target-error="#alert-container"
            class="flex flex-col md:flex-row gap-3"
        {
            input type="hidden" name="month" value=(format_month_param(viewed));

            input
                type="text"
                name="category"
                placeholder="Category"
                required
                class=(FORM_TEXT_INPUT_STYLE);

            input
                type="number"
                name="limit"
                step="0.01"
                min="0.01"
                placeholder="Limit (R$)"
                required
                class=(FORM_TEXT_INPUT_STYLE);

            button
                type="submit"
                class="px-4 py-2 rounded font-semibold text-white bg-blue-600 hover:bg-blue-700"
            {
                "Set Budget"
            }
        }
    }
}

fn budget_card(status: &BudgetStatus, viewed: time::Date) -> Markup {
    let detail_url = format!(
        "{}?month={}",
        endpoints::format_endpoint(endpoints::BUDGET_DETAIL_VIEW, status.budget.id),
        format_month_param(viewed)
    );
    let delete_url = endpoints::format_endpoint(endpoints::DELETE_BUDGET, status.budget.id);
    let bar_style = if status.over_budget() {
        "bg-red-500"
    } else {
        "bg-blue-500"
    };

    html! {
        div class=(CARD_STYLE)
        {
            div class="flex justify-between items-start mb-3"
            {
                div
                {
                    h3 class="font-bold text-lg" { (status.budget.category) }

                    p class="text-xs text-gray-500 dark:text-gray-400"
                    {
                        (format_currency(status.spent)) " / " (format_currency(status.budget.limit))
                    }

                    @if status.over_budget() {
                        p class="text-xs text-red-500 font-semibold"
                        {
                            (format_currency(status.overage())) " over budget"
                        }
                    }
                }

                div class="flex items-center gap-3"
                {
                    a href=(detail_url) class="text-sm text-blue-600 hover:text-blue-500 underline"
                    {
                        "Entries"
                    }

                    button
                        hx-delete=(delete_url)
                        hx-confirm="Remove this budget? Recorded spending is kept."
                        hx-target-error="#alert-container"
                        class=(BUTTON_DELETE_STYLE)
                    {
                        "Remove"
                    }
                }
            }

            (progress_bar(status.percent_used(), bar_style))

            (quick_add_form(&status.budget.category, viewed))
        }
    }
}

fn quick_add_form(category: &str, viewed: time::Date) -> Markup {
    html! {
        form
            hx-post=(endpoints::POST_TRANSACTION)
            hx-target-error="#alert-container"
            class="flex gap-2 mt-3"
        {
            input type="hidden" name="month" value=(format_month_param(viewed));
            input type="hidden" name="category" value=(category);
            input type="hidden" name="kind" value="VARIABLE";

            input
                type="text"
                name="description"
                placeholder={ "Spent on " (category) }
                class=(FORM_TEXT_INPUT_STYLE);

            input
                type="number"
                name="amount"
                step="0.01"
                min="0.01"
                placeholder="0.00"
                required
                class=(FORM_TEXT_INPUT_STYLE);

            button
                type="submit"
                class="px-3 rounded bg-blue-600/20 text-blue-500 hover:bg-blue-600 hover:text-white"
            {
                "+"
            }
        }
    }
}

/// Display one budget's variable expenses for the viewed month, with
/// per-entry edit and delete actions.
pub async fn get_budget_detail_page(
    Path(budget_id): Path<BudgetId>,
    State(state): State<BudgetState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(query): Query<MonthQuery>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let household_id = require_household(user_id, &connection)?;
    let viewed = query.viewed_month();

    let budget = get_budget(budget_id, &connection)?;
    let transactions = get_month_transactions(household_id, viewed, &connection)?;

    let entries: Vec<&Transaction> = transactions
        .iter()
        .filter(|transaction| {
            transaction.kind == TransactionKind::Variable
                && normalize_category(&transaction.category) == budget.category_key
        })
        .collect();

    Ok(budget_detail_view(&budget, viewed, &entries).into_response())
}

fn budget_detail_view(budget: &Budget, viewed: time::Date, entries: &[&Transaction]) -> Markup {
    let nav_bar = NavBar::new(endpoints::EXPENSES_VIEW).into_html();
    let total: f64 = entries.iter().map(|entry| entry.amount).sum();
    let back_url = format!(
        "{}?month={}",
        endpoints::EXPENSES_VIEW,
        format_month_param(viewed)
    );

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            a href=(back_url) class="text-sm text-blue-600 hover:text-blue-500 underline"
            {
                "< Back to budgets"
            }

            h1 class="text-2xl font-bold"
            {
                (budget.category) " - " (month_title(viewed))
            }

            @if entries.is_empty() {
                p class="text-center text-gray-500 py-8"
                {
                    "Nothing recorded in this category this month."
                }
            } @else {
                div class="space-y-2"
                {
                    @for entry in entries {
                        (entry_row(entry))
                    }
                }

                div class="flex justify-between font-bold border-t border-gray-300 dark:border-gray-700 pt-3"
                {
                    span { "Total" }
                    span { (format_currency(total)) }
                }
            }
        }
    };

    base("Expense Entries", &content)
}

fn entry_row(entry: &Transaction) -> Markup {
    let edit_url = endpoints::format_endpoint(endpoints::EDIT_TRANSACTION_VIEW, entry.id);
    let delete_url = endpoints::format_endpoint(endpoints::DELETE_TRANSACTION, entry.id);

    html! {
        div class="flex justify-between items-center p-3 rounded border border-gray-200 dark:border-gray-800"
        {
            div
            {
                p class="text-sm font-medium" { (entry.description) }
                p class="text-xs text-gray-500" { (entry.date) }
            }

            div class="flex items-center gap-3"
            {
                span class="font-bold" { (format_currency(entry.amount)) }

                a href=(edit_url) class="text-sm text-blue-600 hover:text-blue-500 underline"
                {
                    "Edit"
                }

                button
                    hx-delete=(delete_url)
                    hx-confirm="Delete this expense?"
                    hx-target-error="#alert-container"
                    class=(BUTTON_DELETE_STYLE)
                {
                    "Delete"
                }
            }
        }
    }
}

/// The form data for creating or overwriting a budget.
#[derive(Debug, Deserialize)]
pub struct BudgetForm {
    /// The category to cap.
    pub category: String,
    /// The spending ceiling.
    pub limit: f64,
    /// The viewed month, used for the redirect back.
    pub month: Option<String>,
}

/// A route handler for creating or overwriting a budget.
pub async fn create_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Form(form): Form<BudgetForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let household_id = match require_household(user_id, &connection) {
        Ok(household_id) => household_id,
        Err(error) => return error.into_alert_response(),
    };

    match set_budget_limit(household_id, &form.category, form.limit, &connection) {
        Ok(_) => {
            let month = form
                .month
                .as_deref()
                .and_then(parse_month_param)
                .unwrap_or_else(|| OffsetDateTime::now_utc().date());

            (
                HxRedirect(format!(
                    "{}?month={}",
                    endpoints::EXPENSES_VIEW,
                    format_month_param(month)
                )),
                StatusCode::SEE_OTHER,
            )
                .into_response()
        }
        Err(error) => {
            tracing::error!("An unexpected error occurred while setting a budget: {error}");
            error.into_alert_response()
        }
    }
}

/// A route handler for deleting a budget.
///
/// Recorded spend is untouched; only the ceiling goes away.
pub async fn delete_budget_endpoint(
    Path(budget_id): Path<BudgetId>,
    State(state): State<BudgetState>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match delete_budget(budget_id, &connection) {
        Ok(()) => (
            HxRedirect(endpoints::EXPENSES_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(Error::DeleteMissingBudget) => Error::DeleteMissingBudget.into_alert_response(),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while deleting budget {budget_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod normalize_category_tests {
    use super::normalize_category;

    #[test]
    fn lowercases_and_collapses_whitespace() {
        assert_eq!(normalize_category("Eating Out"), "eating_out");
        assert_eq!(normalize_category("  Eating \t  Out  "), "eating_out");
        assert_eq!(normalize_category("UBER"), "uber");
    }
}

#[cfg(test)]
mod budget_query_tests {
    use crate::{Error, transaction::test_utils::test_household};

    use super::{delete_budget, get_budget, get_budgets, set_budget_limit};

    #[test]
    fn set_budget_creates_row() {
        let (conn, household_id, _) = test_household();

        let budget = set_budget_limit(household_id, "Groceries", 800.0, &conn).unwrap();

        assert!(budget.id > 0);
        assert_eq!(budget.category, "Groceries");
        assert_eq!(budget.category_key, "groceries");
        assert_eq!(budget.limit, 800.0);
    }

    #[test]
    fn upsert_is_idempotent_across_case_and_whitespace() {
        let (conn, household_id, _) = test_household();

        let first = set_budget_limit(household_id, "Eating Out", 300.0, &conn).unwrap();
        let second = set_budget_limit(household_id, "  eating   OUT ", 450.0, &conn).unwrap();

        assert_eq!(first.id, second.id, "upsert must update, not insert");
        assert_eq!(second.limit, 450.0);
        assert_eq!(second.category, "eating   OUT");

        let budgets = get_budgets(household_id, &conn).unwrap();
        assert_eq!(budgets.len(), 1);
    }

    #[test]
    fn households_do_not_share_budgets() {
        let (conn, household_id, _) = test_household();
        let other_user =
            crate::user::get_or_create_user("bea@example.com", "Bea", &conn).unwrap();
        let other_household =
            crate::household::create_household(&other_user, 3000.0, &conn).unwrap();

        set_budget_limit(household_id, "Groceries", 800.0, &conn).unwrap();
        set_budget_limit(other_household.id, "Groceries", 500.0, &conn).unwrap();

        let budgets = get_budgets(household_id, &conn).unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].limit, 800.0);
    }

    #[test]
    fn set_budget_rejects_blank_category() {
        let (conn, household_id, _) = test_household();

        let result = set_budget_limit(household_id, "   ", 100.0, &conn);

        assert_eq!(result, Err(Error::EmptyCategory));
    }

    #[test]
    fn set_budget_rejects_non_positive_limit() {
        let (conn, household_id, _) = test_household();

        let result = set_budget_limit(household_id, "Groceries", 0.0, &conn);

        assert_eq!(result, Err(Error::InvalidAmount(0.0)));
    }

    #[test]
    fn delete_budget_removes_row() {
        let (conn, household_id, _) = test_household();
        let budget = set_budget_limit(household_id, "Groceries", 800.0, &conn).unwrap();

        delete_budget(budget.id, &conn).unwrap();

        assert_eq!(get_budget(budget.id, &conn), Err(Error::NotFound));
    }

    #[test]
    fn delete_missing_budget_fails() {
        let (conn, _, _) = test_household();

        assert_eq!(delete_budget(999, &conn), Err(Error::DeleteMissingBudget));
    }

    #[test]
    fn deleting_budget_keeps_recorded_spend() {
        use time::macros::date;

        use crate::transaction::{
            core::{count_transactions, create_transaction},
            test_utils::new_variable_transaction,
        };

        let (conn, household_id, user_id) = test_household();
        let budget = set_budget_limit(household_id, "Groceries", 800.0, &conn).unwrap();
        create_transaction(
            new_variable_transaction(household_id, user_id, 120.0, date!(2026 - 08 - 10)),
            &conn,
        )
        .unwrap();

        delete_budget(budget.id, &conn).unwrap();

        assert_eq!(count_transactions(&conn), Ok(1));
    }
}
