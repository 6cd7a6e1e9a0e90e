//! The overview page: the three balance figures for the viewed month and
//! the per-kind summary cards linking to the tab pages.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error,
    balance::{BalanceInputs, Balances, MonthPosition, month_position, percent_of, project, trailing_average},
    budget::get_budgets,
    endpoints,
    html::{
        CARD_CAPTION_STYLE, CARD_STYLE, PAGE_CONTAINER_STYLE, base, donut, format_currency,
        progress_bar,
    },
    household::get_household,
    navigation::NavBar,
    session::CurrentUser,
    timezone::get_local_offset,
    transaction::{
        MonthQuery, MonthlyTotals, get_month_transactions, month_navigation, shift_months,
        totals_by_kind, variable_total_for_month,
    },
    user::{get_user, require_household},
};

/// The state needed for displaying the overview page.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The database connection for reading transactions and budgets.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "America/Sao_Paulo".
    pub local_timezone: String,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Everything the overview needs to render one viewed month.
struct OverviewData {
    viewed: Date,
    income: f64,
    totals: MonthlyTotals,
    balances: Balances,
    budget_ceiling: f64,
    position: MonthPosition,
}

/// Display the monthly overview for the acting user's household.
pub async fn get_overview_page(
    State(state): State<DashboardState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(query): Query<MonthQuery>,
) -> Result<Response, Error> {
    let local_offset = get_local_offset(&state.local_timezone).ok_or_else(|| {
        tracing::error!("Invalid timezone {}", state.local_timezone);
        Error::InvalidTimezoneError(state.local_timezone.clone())
    })?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let household_id = require_household(user_id, &connection)?;
    let household = get_household(household_id, &connection)?;
    let user = get_user(user_id, &connection)?;

    let today = OffsetDateTime::now_utc().to_offset(local_offset).date();
    let viewed = query.viewed_month();

    let transactions = get_month_transactions(household_id, viewed, &connection)
        .inspect_err(|error| tracing::error!("could not get transactions: {error}"))?;
    let totals = totals_by_kind(&transactions);

    // The trailing average always looks at today's month and the one
    // before it, independent of which month is being viewed.
    let current_variable = variable_total_for_month(household_id, today, &connection)?;
    let previous_variable =
        variable_total_for_month(household_id, shift_months(today, -1), &connection)?;

    let budget_ceiling: f64 = get_budgets(household_id, &connection)?
        .iter()
        .map(|budget| budget.limit)
        .sum();

    let position = month_position(viewed, today);
    let income = household.settings.monthly_income;

    let balances = project(&BalanceInputs {
        income,
        totals,
        trailing_average: trailing_average(current_variable, previous_variable),
        budget_ceiling,
        position,
    });

    let data = OverviewData {
        viewed,
        income,
        totals,
        balances,
        budget_ceiling,
        position,
    };

    Ok(overview_view(&user.display_name, &data).into_response())
}

fn overview_view(display_name: &str, data: &OverviewData) -> Markup {
    let nav_bar = NavBar::new(endpoints::OVERVIEW_VIEW).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold" { "Hello, " (display_name) }

            (month_navigation(endpoints::OVERVIEW_VIEW, data.viewed))

            (actual_balance_card(data))

            div class="grid grid-cols-1 lg:grid-cols-3 gap-4"
            {
                (predicted_balance_card(&data.balances))
                (planned_balance_card(data))
                (committed_card(data))
            }

            div class="grid grid-cols-1 md:grid-cols-3 gap-4"
            {
                (kind_link_card(
                    "Fixed Costs",
                    endpoints::FIXED_COSTS_VIEW,
                    data.totals.fixed,
                    percent_of(data.totals.fixed, data.income),
                    "of income",
                    "text-purple-500",
                ))
                (kind_link_card(
                    "Purchases",
                    endpoints::PURCHASES_VIEW,
                    data.totals.installments,
                    percent_of(data.totals.installments, data.income),
                    "of income",
                    "text-blue-500",
                ))
                (kind_link_card(
                    "Variable Expenses",
                    endpoints::EXPENSES_VIEW,
                    data.totals.variable,
                    percent_of(data.totals.variable, data.budget_ceiling),
                    "of budgets",
                    "text-yellow-500",
                ))
            }
        }
    };

    base("Overview", &content)
}

fn actual_balance_card(data: &OverviewData) -> Markup {
    let caption = match data.position {
        MonthPosition::Future => "Projected Balance",
        MonthPosition::Current | MonthPosition::Past => "Actual Balance",
    };
    let balance_style = if data.balances.actual > 0.0 {
        "text-5xl font-bold tracking-tight text-green-500"
    } else {
        "text-5xl font-bold tracking-tight text-red-500"
    };
    let percent_spent = percent_of(data.totals.total(), data.income);
    let bar_style = if data.balances.actual < 0.0 {
        "bg-red-600"
    } else {
        "bg-green-500"
    };

    html! {
        section class=(CARD_STYLE)
        {
            p class=(CARD_CAPTION_STYLE) { (caption) }

            h2 class=(balance_style) { (format_currency(data.balances.actual)) }

            div class="mt-4"
            {
                div class="flex justify-between text-xs text-gray-500 mb-1"
                {
                    span { "Income committed" }
                    span { (format!("{percent_spent:.0}%")) }
                }

                (progress_bar(percent_spent, bar_style))
            }
        }
    }
}

fn predicted_balance_card(balances: &Balances) -> Markup {
    html! {
        div class=(CARD_STYLE)
        {
            p class=(CARD_CAPTION_STYLE) { "Predicted Balance" }

            p class="text-2xl font-bold" { (format_currency(balances.predicted)) }

            div class="flex justify-between text-xs mt-2 text-gray-500"
            {
                span { "Variable estimate:" }
                span class="text-yellow-500 font-bold"
                {
                    (format_currency(balances.projected_variable))
                }
            }
        }
    }
}

fn planned_balance_card(data: &OverviewData) -> Markup {
    html! {
        div class=(CARD_STYLE)
        {
            p class=(CARD_CAPTION_STYLE) { "Planned Balance" }

            p class="text-2xl font-bold" { (format_currency(data.balances.planned)) }

            div class="flex justify-between text-xs mt-2 text-gray-500"
            {
                span { "Budget ceiling:" }
                span class="text-blue-500 font-bold" { (format_currency(data.budget_ceiling)) }
            }
        }
    }
}

fn committed_card(data: &OverviewData) -> Markup {
    let percent_committed = percent_of(data.totals.committed(), data.income);

    html! {
        div class=(CARD_STYLE)
        {
            p class=(CARD_CAPTION_STYLE) { "Committed Income" }

            div class="flex items-center justify-between"
            {
                div
                {
                    span class="text-4xl font-bold tracking-tighter"
                    {
                        (format!("{percent_committed:.0}%"))
                    }

                    p class="text-xs text-gray-500" { "fixed + installments" }
                }

                (donut(percent_committed, "text-purple-500"))
            }

            div class="flex justify-between text-xs mt-2 text-gray-500"
            {
                span { "Total:" }
                span class="text-purple-500 font-bold"
                {
                    (format_currency(data.totals.committed()))
                }
            }
        }
    }
}

fn kind_link_card(
    title: &str,
    url: &str,
    amount: f64,
    percent: f64,
    percent_label: &str,
    donut_style: &str,
) -> Markup {
    html! {
        a
            href=(url)
            class="block bg-white dark:bg-gray-800 p-5 rounded-xl border border-gray-200
                dark:border-gray-700 hover:border-blue-500/50 transition"
        {
            p class=(CARD_CAPTION_STYLE) { (title) }

            div class="flex items-center justify-between mt-2"
            {
                div
                {
                    p class="text-xl font-bold" { (format_currency(amount)) }

                    p class="text-xs text-gray-500"
                    {
                        (format!("{percent:.0}% ")) (percent_label)
                    }
                }

                (donut(percent, donut_style))
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
