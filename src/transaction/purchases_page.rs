//! The purchases page: the viewed month's installments, the new-purchase
//! form, and the month total.

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
        core::{InstallmentDetail, Transaction, TransactionKind},
        month::{MonthQuery, get_month_transactions, month_navigation},
    },
    user::require_household,
};

/// The categories offered for new purchases.
const PURCHASE_CATEGORIES: [&str; 5] = ["Other", "Electronics", "Clothes", "Home", "Travel"];

/// The state needed for the purchases page.
#[derive(Debug, Clone)]
pub struct PurchasesPageState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for PurchasesPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Display the viewed month's installments.
pub async fn get_purchases_page(
    State(state): State<PurchasesPageState>,
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

    let installments: Vec<(&Transaction, &InstallmentDetail)> = transactions
        .iter()
        .filter_map(|transaction| match &transaction.kind {
            TransactionKind::Installment(detail) => Some((transaction, detail)),
            _ => None,
        })
        .collect();

    Ok(purchases_view(viewed, &installments).into_response())
}

fn purchases_view(viewed: Date, installments: &[(&Transaction, &InstallmentDetail)]) -> Markup {
    let nav_bar = NavBar::new(endpoints::PURCHASES_VIEW).into_html();
    let total: f64 = installments
        .iter()
        .map(|(transaction, _)| transaction.amount)
        .sum();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            (month_navigation(endpoints::PURCHASES_VIEW, viewed))

            div class=(CARD_STYLE)
            {
                p class=(CARD_CAPTION_STYLE) { "Installments This Month" }
                p class="text-2xl font-bold" { (format_currency(total)) }
            }

            (new_purchase_form())

            @if installments.is_empty() {
                p class="text-center text-gray-500 py-8"
                {
                    "No installments for this month."
                }
            } @else {
                div class="space-y-2"
                {
                    @for (transaction, detail) in installments {
                        (installment_row(transaction, detail))
                    }
                }
            }
        }
    };

    base("Purchases", &content)
}

fn new_purchase_form() -> Markup {
    html! {
        section class=(CARD_STYLE)
        {
            h3 class="font-semibold mb-3" { "New Purchase" }

            form
                hx-post=(endpoints::POST_PURCHASE)
                hx-target-error="#alert-container"
                class="space-y-3"
            {
                div
                {
                    label for="description" class=(FORM_LABEL_STYLE) { "What did you buy?" }

                    input
                        id="description"
                        type="text"
                        name="description"
                        placeholder="e.g. iPhone 15"
                        required
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                div class="grid grid-cols-2 gap-3"
                {
                    div
                    {
                        label for="total_amount" class=(FORM_LABEL_STYLE) { "Total Amount (R$)" }

                        input
                            id="total_amount"
                            type="number"
                            name="total_amount"
                            step="0.01"
                            min="0.01"
                            placeholder="5000.00"
                            required
                            class=(FORM_TEXT_INPUT_STYLE);
                    }

                    div
                    {
                        label for="installments" class=(FORM_LABEL_STYLE) { "Installments" }

                        input
                            id="installments"
                            type="number"
                            name="installments"
                            min="1"
                            max="48"
                            value="1"
                            required
                            class=(FORM_TEXT_INPUT_STYLE);
                    }
                }

                div class="grid grid-cols-2 gap-3"
                {
                    div
                    {
                        label for="category" class=(FORM_LABEL_STYLE) { "Category" }

                        select
                            id="category"
                            name="category"
                            class=(FORM_TEXT_INPUT_STYLE)
                        {
                            @for category in PURCHASE_CATEGORIES {
                                option value=(category) { (category) }
                            }
                        }
                    }

                    div
                    {
                        label for="start_date" class=(FORM_LABEL_STYLE) { "First Installment" }

                        input
                            id="start_date"
                            type="date"
                            name="start_date"
                            required
                            class=(FORM_TEXT_INPUT_STYLE);
                    }
                }

                button
                    type="submit"
                    class="w-full py-3 rounded-lg font-bold text-white bg-blue-600 hover:bg-blue-700"
                {
                    "Record Purchase"
                }
            }
        }
    }
}

fn installment_row(transaction: &Transaction, detail: &InstallmentDetail) -> Markup {
    let toggle_url = endpoints::format_endpoint(endpoints::TOGGLE_PAID, transaction.id);
    let delete_url = endpoints::format_endpoint(endpoints::DELETE_TRANSACTION, transaction.id);
    let delete_series_url =
        endpoints::format_endpoint(endpoints::DELETE_SERIES, detail.series_id);

    html! {
        div class="flex justify-between items-center p-4 rounded-lg bg-white dark:bg-gray-800 border border-gray-200 dark:border-gray-700"
        {
            div class="flex items-center gap-4"
            {
                button
                    hx-post=(toggle_url)
                    hx-target-error="#alert-container"
                    title=(if transaction.is_paid { "Mark as unpaid" } else { "Mark as paid" })
                    class=(if transaction.is_paid { "text-green-500" } else { "text-gray-400 hover:text-green-500" })
                {
                    @if transaction.is_paid { "[x]" } @else { "[ ]" }
                }

                div
                {
                    h4 class="font-semibold" { (transaction.description) }

                    p class="text-xs text-gray-500"
                    {
                        (transaction.category) " - " (transaction.date)
                    }
                }
            }

            div class="flex items-center gap-3"
            {
                div class="text-right"
                {
                    p class="font-bold" { (format_currency(transaction.amount)) }

                    p class="text-xs text-blue-500"
                    {
                        (detail.number) " / " (detail.count)
                    }
                }

                button
                    hx-delete=(delete_url)
                    hx-confirm="Delete only this installment?"
                    hx-target-error="#alert-container"
                    class=(BUTTON_DELETE_STYLE)
                {
                    "Delete"
                }

                button
                    hx-delete=(delete_series_url)
                    hx-confirm="Delete the whole purchase, including installments in other months?"
                    hx-target-error="#alert-container"
                    class=(BUTTON_DELETE_STYLE)
                {
                    "Delete All"
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
