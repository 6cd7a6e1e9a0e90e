//! The household model, its database functions, and the settings page.
//!
//! A household is the sharing and ownership boundary: every transaction
//! and budget belongs to exactly one. Members are the users whose
//! `household_id` points at it; the household's row ID doubles as the
//! invite code shown on the settings page.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Form;
use maud::{Markup, html};
use rusqlite::{Connection, Row, Transaction as SqlTransaction};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    database_id::{HouseholdId, UserId},
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, CARD_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        PAGE_CONTAINER_STYLE, base,
    },
    navigation::NavBar,
    session::CurrentUser,
    user::{User, get_user, set_user_household},
};

/// The per-household settings that drive balance projections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HouseholdSettings {
    /// The household's total monthly income.
    pub monthly_income: f64,
    /// The day of the month the household's card statement closes.
    pub closing_day: u8,
}

/// The day the card statement closes when a household is first created.
const DEFAULT_CLOSING_DAY: u8 = 10;

/// The sharing and ownership boundary that all records belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct Household {
    /// The ID of the household. Shown to users as the invite code.
    pub id: HouseholdId,
    /// The display name of the household.
    pub name: String,
    /// The user who created the household.
    pub owner_user_id: UserId,
    /// When the household was created.
    pub created_at: OffsetDateTime,
    /// Monthly income and card-closing day.
    pub settings: HouseholdSettings,
}

/// Create the household table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_household_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS household (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                owner_user_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                monthly_income REAL NOT NULL DEFAULT 0,
                closing_day INTEGER NOT NULL DEFAULT 10
                )",
        (),
    )?;

    Ok(())
}

/// Create a household owned by `owner` and make them its first member.
///
/// Both writes (the household row and repointing the owner's
/// `household_id`) commit in one SQL transaction.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn create_household(
    owner: &User,
    monthly_income: f64,
    connection: &Connection,
) -> Result<Household, Error> {
    let created_at = OffsetDateTime::now_utc();
    let name = format!("{}'s household", owner.display_name);

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Immediate)?;

    transaction.execute(
        "INSERT INTO household (name, owner_user_id, created_at, monthly_income, closing_day)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            &name,
            owner.id,
            created_at,
            monthly_income,
            DEFAULT_CLOSING_DAY,
        ),
    )?;

    let household_id = transaction.last_insert_rowid();

    transaction.execute(
        "UPDATE user SET household_id = ?1 WHERE id = ?2",
        (household_id, owner.id),
    )?;

    transaction.commit()?;

    Ok(Household {
        id: household_id,
        name,
        owner_user_id: owner.id,
        created_at,
        settings: HouseholdSettings {
            monthly_income,
            closing_day: DEFAULT_CLOSING_DAY,
        },
    })
}

/// Retrieve a household from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid household,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_household(id: HouseholdId, connection: &Connection) -> Result<Household, Error> {
    let household = connection
        .prepare(
            "SELECT id, name, owner_user_id, created_at, monthly_income, closing_day
             FROM household WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_household_row)?;

    Ok(household)
}

/// Update a household's income and closing day in place.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid household,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_household_settings(
    id: HouseholdId,
    settings: HouseholdSettings,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE household SET monthly_income = ?1, closing_day = ?2 WHERE id = ?3",
        (settings.monthly_income, settings.closing_day, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Add `user_id` to the household with `household_id`.
///
/// Joining overwrites any previous membership; access to the prior
/// household's data is discarded, not merged.
///
/// # Errors
/// This function will return a:
/// - [Error::HouseholdNotFound] if `household_id` does not refer to a valid household,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn join_household(
    user_id: UserId,
    household_id: HouseholdId,
    connection: &Connection,
) -> Result<Household, Error> {
    let household = match get_household(household_id, connection) {
        Ok(household) => household,
        Err(Error::NotFound) => return Err(Error::HouseholdNotFound(household_id)),
        Err(error) => return Err(error),
    };

    set_user_household(user_id, household.id, connection)?;

    Ok(household)
}

fn map_household_row(row: &Row) -> Result<Household, rusqlite::Error> {
    Ok(Household {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_user_id: row.get(2)?,
        created_at: row.get(3)?,
        settings: HouseholdSettings {
            monthly_income: row.get(4)?,
            closing_day: row.get(5)?,
        },
    })
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The state needed for the settings page and household endpoints.
#[derive(Debug, Clone)]
pub struct HouseholdState {
    /// The database connection for managing households.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for HouseholdState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Display the settings page.
///
/// Users with a household see the income/closing-day form and the invite
/// code; users without one see the create and join forms.
pub async fn get_settings_page(
    State(state): State<HouseholdState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user(user_id, &connection)?;

    let household = match user.household_id {
        Some(household_id) => Some(get_household(household_id, &connection)?),
        None => None,
    };

    Ok(settings_view(household.as_ref()).into_response())
}

fn settings_view(household: Option<&Household>) -> Markup {
    let nav_bar = NavBar::new(endpoints::SETTINGS_VIEW).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold" { "Settings" }

            @match household {
                Some(household) => {
                    (household_settings_form(household))
                    (invite_code_section(household))
                }
                None => {
                    (create_household_form())
                    (join_household_form())
                }
            }
        }
    };

    base("Settings", &content)
}

fn household_settings_form(household: &Household) -> Markup {
    html! {
        section class=(CARD_STYLE)
        {
            h2 class="text-lg font-semibold mb-4" { "Household Parameters" }

            form
                method="post"
                action=(endpoints::PUT_HOUSEHOLD_SETTINGS)
                class="space-y-4"
            {
                div
                {
                    label for="monthly_income" class=(FORM_LABEL_STYLE) { "Monthly Income (R$)" }

                    input
                        id="monthly_income"
                        type="number"
                        name="monthly_income"
                        step="0.01"
                        min="0"
                        value=(household.settings.monthly_income)
                        required
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                div
                {
                    label for="closing_day" class=(FORM_LABEL_STYLE) { "Card Closing Day" }

                    input
                        id="closing_day"
                        type="number"
                        name="closing_day"
                        min="1"
                        max="31"
                        value=(household.settings.closing_day)
                        required
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Update Settings" }
            }
        }
    }
}

fn invite_code_section(household: &Household) -> Markup {
    let copy_script = format!("navigator.clipboard.writeText('{}')", household.id);

    html! {
        section class=(CARD_STYLE)
        {
            h2 class="text-lg font-semibold mb-2" { "Invite a Partner" }

            p class="text-sm text-gray-500 dark:text-gray-400 mb-4"
            {
                "Ask them to sign in and paste this code into \"Join a Household\"."
            }

            div class="flex gap-2 items-center p-3 rounded border border-dashed border-gray-400 dark:border-gray-600"
            {
                code class="flex-1 font-mono text-green-600 dark:text-green-400"
                {
                    (household.id)
                }

                // Best effort: the clipboard API may be unavailable, in
                // which case the code can still be copied by hand.
                button
                    type="button"
                    onclick=(copy_script)
                    class="px-3 py-1 text-sm rounded bg-gray-100 hover:bg-gray-200 dark:bg-gray-700 dark:hover:bg-gray-600"
                {
                    "Copy"
                }
            }
        }
    }
}

fn create_household_form() -> Markup {
    html! {
        section class=(CARD_STYLE)
        {
            h2 class="text-lg font-semibold mb-2" { "Create Your Household" }

            p class="text-sm text-gray-500 dark:text-gray-400 mb-4"
            {
                "Set your monthly income to start tracking bills, purchases, and budgets."
            }

            form
                method="post"
                action=(endpoints::POST_HOUSEHOLD)
                class="space-y-4"
            {
                div
                {
                    label for="monthly_income" class=(FORM_LABEL_STYLE) { "Monthly Income (R$)" }

                    input
                        id="monthly_income"
                        type="number"
                        name="monthly_income"
                        step="0.01"
                        min="0"
                        placeholder="5000.00"
                        required
                        autofocus
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Create Household" }
            }
        }
    }
}

fn join_household_form() -> Markup {
    html! {
        section class=(CARD_STYLE)
        {
            h2 class="text-lg font-semibold mb-2" { "Join a Household" }

            form
                method="post"
                action=(endpoints::JOIN_HOUSEHOLD)
                class="flex gap-2"
            {
                input
                    type="text"
                    name="invite_code"
                    placeholder="Paste the invite code here..."
                    required
                    class=(FORM_TEXT_INPUT_STYLE);

                button type="submit" class="px-6 py-2 rounded font-semibold text-white bg-gray-600 hover:bg-gray-500"
                {
                    "Join"
                }
            }
        }
    }
}

/// The form data for creating a household.
#[derive(Debug, Deserialize)]
pub struct CreateHouseholdForm {
    /// The household's total monthly income.
    pub monthly_income: f64,
}

/// A route handler for creating a household for the acting user.
pub async fn create_household_endpoint(
    State(state): State<HouseholdState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Form(form): Form<CreateHouseholdForm>,
) -> Response {
    if !form.monthly_income.is_finite() || form.monthly_income < 0.0 {
        return Error::InvalidAmount(form.monthly_income).into_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let user = match get_user(user_id, &connection) {
        Ok(user) => user,
        Err(error) => return error.into_response(),
    };

    match create_household(&user, form.monthly_income, &connection) {
        Ok(_) => Redirect::to(endpoints::SETTINGS_VIEW).into_response(),
        Err(error) => {
            tracing::error!("An unexpected error occurred while creating a household: {error}");
            error.into_response()
        }
    }
}

/// The form data for updating household settings.
#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    /// The household's total monthly income.
    pub monthly_income: f64,
    /// The day of the month the household's card statement closes.
    pub closing_day: u8,
}

/// A route handler for updating the acting user's household settings.
pub async fn update_settings_endpoint(
    State(state): State<HouseholdState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Form(form): Form<SettingsForm>,
) -> Response {
    if !form.monthly_income.is_finite() || form.monthly_income < 0.0 {
        return Error::InvalidAmount(form.monthly_income).into_response();
    }

    if !(1..=31).contains(&form.closing_day) {
        return Error::InvalidDayOfMonth(form.closing_day).into_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let household_id = match get_user(user_id, &connection).map(|user| user.household_id) {
        Ok(Some(household_id)) => household_id,
        Ok(None) => return Error::MissingHousehold.into_response(),
        Err(error) => return error.into_response(),
    };

    let settings = HouseholdSettings {
        monthly_income: form.monthly_income,
        closing_day: form.closing_day,
    };

    match update_household_settings(household_id, settings, &connection) {
        Ok(()) => Redirect::to(endpoints::SETTINGS_VIEW).into_response(),
        Err(error) => {
            tracing::error!("An unexpected error occurred while updating settings: {error}");
            error.into_response()
        }
    }
}

/// The form data for joining a household by invite code.
#[derive(Debug, Deserialize)]
pub struct JoinHouseholdForm {
    /// The invite code shown on the other member's settings page.
    pub invite_code: String,
}

/// A route handler for joining an existing household.
pub async fn join_household_endpoint(
    State(state): State<HouseholdState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Form(form): Form<JoinHouseholdForm>,
) -> Response {
    let household_id = match form.invite_code.trim().parse::<HouseholdId>() {
        Ok(household_id) => household_id,
        Err(_) => return Error::HouseholdNotFound(-1).into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match join_household(user_id, household_id, &connection) {
        Ok(_) => Redirect::to(endpoints::SETTINGS_VIEW).into_response(),
        Err(error) => {
            tracing::error!("Could not join household {household_id}: {error}");
            error.into_response()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod household_query_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        db::initialize,
        user::{get_or_create_user, get_user},
    };

    use super::{
        HouseholdSettings, create_household, get_household, join_household,
        update_household_settings,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn create_household_makes_owner_a_member() {
        let conn = get_test_connection();
        let owner = get_or_create_user("ana@example.com", "Ana", &conn).unwrap();

        let household = create_household(&owner, 5000.0, &conn).unwrap();

        assert!(household.id > 0);
        assert_eq!(household.owner_user_id, owner.id);
        assert_eq!(household.settings.monthly_income, 5000.0);

        let owner = get_user(owner.id, &conn).unwrap();
        assert_eq!(owner.household_id, Some(household.id));
    }

    #[test]
    fn get_household_round_trips() {
        let conn = get_test_connection();
        let owner = get_or_create_user("ana@example.com", "Ana", &conn).unwrap();
        let created = create_household(&owner, 5000.0, &conn).unwrap();

        let fetched = get_household(created.id, &conn).unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.name, created.name);
        assert_eq!(fetched.owner_user_id, created.owner_user_id);
        assert_eq!(fetched.settings, created.settings);
    }

    #[test]
    fn get_household_with_invalid_id_returns_not_found() {
        let conn = get_test_connection();

        let result = get_household(1337, &conn);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn update_settings_changes_income_and_closing_day() {
        let conn = get_test_connection();
        let owner = get_or_create_user("ana@example.com", "Ana", &conn).unwrap();
        let household = create_household(&owner, 5000.0, &conn).unwrap();

        let settings = HouseholdSettings {
            monthly_income: 6200.0,
            closing_day: 5,
        };
        update_household_settings(household.id, settings, &conn).unwrap();

        let updated = get_household(household.id, &conn).unwrap();
        assert_eq!(updated.settings, settings);
    }

    #[test]
    fn join_household_repoints_membership() {
        let conn = get_test_connection();
        let owner = get_or_create_user("ana@example.com", "Ana", &conn).unwrap();
        let household = create_household(&owner, 5000.0, &conn).unwrap();
        let partner = get_or_create_user("bea@example.com", "Bea", &conn).unwrap();

        join_household(partner.id, household.id, &conn).unwrap();

        let partner = get_user(partner.id, &conn).unwrap();
        assert_eq!(partner.household_id, Some(household.id));
    }

    #[test]
    fn join_household_with_invalid_code_fails() {
        let conn = get_test_connection();
        let user = get_or_create_user("ana@example.com", "Ana", &conn).unwrap();

        let result = join_household(user.id, 999, &conn);

        assert_eq!(result, Err(Error::HouseholdNotFound(999)));
    }

    #[test]
    fn switching_households_discards_previous_membership() {
        let conn = get_test_connection();
        let ana = get_or_create_user("ana@example.com", "Ana", &conn).unwrap();
        let bea = get_or_create_user("bea@example.com", "Bea", &conn).unwrap();
        let first = create_household(&ana, 5000.0, &conn).unwrap();
        let second = create_household(&bea, 3000.0, &conn).unwrap();

        join_household(ana.id, second.id, &conn).unwrap();

        let ana = get_user(ana.id, &conn).unwrap();
        assert_eq!(ana.household_id, Some(second.id));
        assert_ne!(ana.household_id, Some(first.id));
    }
}

#[cfg(test)]
mod settings_page_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, extract::State, http::StatusCode, response::Response};
    use rusqlite::Connection;
    use scraper::{Html, Selector};

    use crate::{db::initialize, session::CurrentUser, user::get_or_create_user};

    use super::{HouseholdState, create_household, get_settings_page};

    fn get_test_state() -> HouseholdState {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        HouseholdState {
            db_connection: Arc::new(Mutex::new(conn)),
        }
    }

    async fn parse_html(response: Response) -> Html {
        let body = response.into_body();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body).to_string();

        Html::parse_document(&text)
    }

    #[tokio::test]
    async fn shows_create_and_join_forms_without_household() {
        let state = get_test_state();
        let user =
            get_or_create_user("ana@example.com", "Ana", &state.db_connection.lock().unwrap())
                .unwrap();

        let response = get_settings_page(State(state), Extension(CurrentUser(user.id)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html(response).await;

        let forms: Vec<_> = html.select(&Selector::parse("form").unwrap()).collect();
        assert_eq!(forms.len(), 2, "want create and join forms");
    }

    #[tokio::test]
    async fn shows_invite_code_with_household() {
        let state = get_test_state();
        let household = {
            let connection = state.db_connection.lock().unwrap();
            let user = get_or_create_user("ana@example.com", "Ana", &connection).unwrap();
            create_household(&user, 5000.0, &connection).unwrap()
        };

        let response = get_settings_page(
            State(state),
            Extension(CurrentUser(household.owner_user_id)),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html(response).await;

        let code: String = html
            .select(&Selector::parse("code").unwrap())
            .next()
            .expect("No invite code found")
            .text()
            .collect();
        assert_eq!(code.trim(), household.id.to_string());
    }
}
