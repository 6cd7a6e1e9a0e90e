//! The fixed costs page: the viewed month's bills, a quick-add form, and
//! predicted/paid totals.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::Date;

use crate::{
    AppState, Error,
    endpoints,
    html::{
        BUTTON_DELETE_STYLE, CARD_CAPTION_STYLE, CARD_STYLE, FORM_LABEL_STYLE,
        FORM_TEXT_INPUT_STYLE, PAGE_CONTAINER_STYLE, base, format_currency,
    },
    navigation::NavBar,
    session::CurrentUser,
    transaction::{
        core::{Transaction, TransactionKind},
        month::{
            MonthQuery, format_month_param, get_month_transactions, month_navigation, paid_total,
        },
    },
    user::require_household,
};

/// The state needed for the fixed costs page.
#[derive(Debug, Clone)]
pub struct FixedCostsPageState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for FixedCostsPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Display the viewed month's fixed costs.
pub async fn get_fixed_costs_page(
    State(state): State<FixedCostsPageState>,
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

    let transactions = get_month_transactions(household_id, viewed, &connection)
        .inspect_err(|error| tracing::error!("could not get transactions: {error}"))?;

    let bills: Vec<&Transaction> = transactions
        .iter()
        .filter(|transaction| matches!(transaction.kind, TransactionKind::Fixed { .. }))
        .collect();

    Ok(fixed_costs_view(viewed, &bills).into_response())
}

fn fixed_costs_view(viewed: Date, bills: &[&Transaction]) -> Markup {
    let nav_bar = NavBar::new(endpoints::FIXED_COSTS_VIEW).into_html();
    let total: f64 = bills.iter().map(|bill| bill.amount).sum();
    let paid = paid_total(bills.iter().copied());

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            (month_navigation(endpoints::FIXED_COSTS_VIEW, viewed))

            (quick_add_form(viewed))

            div class="grid grid-cols-2 gap-4"
            {
                div class=(CARD_STYLE)
                {
                    p class=(CARD_CAPTION_STYLE) { "Expected Total" }
                    p class="text-xl font-bold" { (format_currency(total)) }
                }

                div class=(CARD_STYLE)
                {
                    p class=(CARD_CAPTION_STYLE) { "Paid So Far" }
                    p class="text-xl font-bold text-green-500" { (format_currency(paid)) }
                }
            }

            @if bills.is_empty() {
                p class="text-center text-gray-500 py-8"
                {
                    "No bills recorded for this month."
                }
            } @else {
                div class="space-y-2"
                {
                    @for bill in bills {
                        (bill_row(bill))
                    }
                }
            }
        }
    };

    base("Fixed Costs", &content)
}

fn quick_add_form(viewed: Date) -> Markup {
    html! {
        form
            hx-post=(endpoints::POST_FIXED_SERIES)
            hx-target-error="#alert-container"
            class="flex flex-col md:flex-row gap-3 md:items-end p-4 rounded-xl bg-white dark:bg-gray-800 border border-gray-200 dark:border-gray-700"
        {
            input type="hidden" name="month" value=(format_month_param(viewed));

            div class="flex-1"
            {
                label for="description" class=(FORM_LABEL_STYLE) { "Description" }

                input
                    id="description"
                    type="text"
                    name="description"
                    placeholder="e.g. Rent"
                    required
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div class="md:w-32"
            {
                label for="amount" class=(FORM_LABEL_STYLE) { "Amount (R$)" }

                input
                    id="amount"
                    type="number"
                    name="amount"
                    step="0.01"
                    min="0.01"
                    placeholder="0.00"
                    required
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div class="md:w-24"
            {
                label for="due_day" class=(FORM_LABEL_STYLE) { "Due Day" }

                input
                    id="due_day"
                    type="number"
                    name="due_day"
                    min="1"
                    max="31"
                    placeholder="Day"
                    required
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            label class="flex items-center gap-2 text-sm py-2"
            {
                input type="checkbox" name="recurring" value="on";
                "Repeat until December"
            }

            button
                type="submit"
                class="px-4 py-2 rounded font-semibold text-white bg-blue-600 hover:bg-blue-700"
            {
                "Add"
            }
        }
    }
}

fn bill_row(bill: &Transaction) -> Markup {
    let toggle_url = endpoints::format_endpoint(endpoints::TOGGLE_PAID, bill.id);
    let delete_url = endpoints::format_endpoint(endpoints::DELETE_TRANSACTION, bill.id);
    let series_id = bill.kind.series_id();

    html! {
        div class="flex justify-between items-center p-4 rounded-lg bg-white dark:bg-gray-800 border border-gray-200 dark:border-gray-700"
        {
            div class="flex items-center gap-4"
            {
                button
                    hx-post=(toggle_url)
                    hx-target-error="#alert-container"
                    title=(if bill.is_paid { "Mark as unpaid" } else { "Mark as paid" })
                    class=(if bill.is_paid { "text-green-500" } else { "text-gray-400 hover:text-green-500" })
                {
                    @if bill.is_paid { "[x]" } @else { "[ ]" }
                }

                div
                {
                    h4 class="font-semibold" { (bill.description) }

                    p class="text-xs text-gray-500"
                    {
                        "Due " (bill.date)

                        @if series_id.is_some() {
                            " - repeats monthly"
                        }
                    }
                }
            }

            div class="flex items-center gap-3"
            {
                span class="font-bold" { (format_currency(bill.amount)) }

                button
                    hx-delete=(delete_url)
                    hx-confirm="Delete this bill?"
                    hx-target-error="#alert-container"
                    class=(BUTTON_DELETE_STYLE)
                {
                    "Delete"
                }

                @if let Some(series_id) = series_id {
                    button
                        hx-delete=(endpoints::format_endpoint(endpoints::DELETE_SERIES, series_id))
                        hx-confirm="Delete this bill for every remaining month?"
                        hx-target-error="#alert-container"
                        class=(BUTTON_DELETE_STYLE)
                    {
                        "Delete All"
                    }
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
