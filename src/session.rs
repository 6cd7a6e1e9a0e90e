//! Session handling: the signed cookie naming the acting user, the guard
//! middleware protecting every page, and the sign-in/sign-out routes.
//!
//! This is the stand-in for the external identity provider: sign-in
//! creates-or-finds a user row by email and stores the user ID in a
//! private (signed and encrypted) cookie. There are no credentials.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    Form, PrivateCookieJar,
    cookie::{Cookie, Key, SameSite},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use time::Duration;

use crate::{
    AppState, Error,
    database_id::UserId,
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, base,
    },
    user::get_or_create_user,
};

pub(crate) const COOKIE_USER_ID: &str = "user_id";

/// The default duration for which session cookies are valid.
pub(crate) const DEFAULT_COOKIE_DURATION: Duration = Duration::days(30);

/// The acting user's ID, inserted into the request by the session guard.
///
/// Route handlers receive it with `Extension(CurrentUser(user_id))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentUser(pub UserId);

/// The state needed for the session guard and sign-in routes.
#[derive(Clone)]
pub struct SessionState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which session cookies are valid.
    pub cookie_duration: Duration,
    /// The database connection for looking up users at sign-in.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SessionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<SessionState> for Key {
    fn from_ref(state: &SessionState) -> Self {
        state.cookie_key.clone()
    }
}

/// Add the session cookie to the cookie jar, naming the acting user.
///
/// Returns the cookie jar with the cookie added.
pub fn set_session_cookie(
    jar: PrivateCookieJar,
    user_id: UserId,
    duration: Duration,
) -> PrivateCookieJar {
    let expiry = time::OffsetDateTime::now_utc() + duration;

    jar.add(
        Cookie::build((COOKIE_USER_ID, user_id.to_string()))
            .expires(expiry)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Set the session cookie to an invalid value and set its max age to zero,
/// which should delete the cookie on the client side.
pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_USER_ID, "deleted"))
            .expires(time::OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Read the acting user's ID from the session cookie.
///
/// # Errors
/// Returns [Error::NotSignedIn] if the cookie is missing or does not hold
/// a valid user ID.
pub fn get_user_id_from_cookies(jar: &PrivateCookieJar) -> Result<UserId, Error> {
    jar.get(COOKIE_USER_ID)
        .and_then(|cookie| cookie.value().parse::<UserId>().ok())
        .ok_or(Error::NotSignedIn)
}

#[inline]
async fn session_guard_internal(
    state: SessionState,
    request: Request,
    next: Next,
    get_redirect: impl Fn(&str) -> Response,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}. Redirecting to sign-in page.");
            return get_redirect(endpoints::SIGN_IN_VIEW);
        }
    };

    let user_id = match get_user_id_from_cookies(&jar) {
        Ok(user_id) => user_id,
        Err(_) => return get_redirect(endpoints::SIGN_IN_VIEW),
    };

    parts.extensions.insert(CurrentUser(user_id));
    let request = Request::from_parts(parts, body);

    next.run(request).await
}

/// Middleware function that checks for a valid session cookie.
/// The user ID is placed into the request and the request executed
/// normally if the cookie is valid, otherwise a redirect to the sign-in
/// page is returned.
///
/// **Note**: Route handlers can use the function argument
/// `Extension(CurrentUser(user_id))` to receive the user ID.
pub async fn session_guard(
    State(state): State<SessionState>,
    request: Request,
    next: Next,
) -> Response {
    session_guard_internal(state, request, next, |redirect_url| {
        Redirect::to(redirect_url).into_response()
    })
    .await
}

/// Middleware function that checks for a valid session cookie.
/// The user ID is placed into the request and the request executed
/// normally if the cookie is valid, otherwise an HTMX redirect to the
/// sign-in page is returned.
pub async fn session_guard_hx(
    State(state): State<SessionState>,
    request: Request,
    next: Next,
) -> Response {
    session_guard_internal(state, request, next, |redirect_url| {
        (HxRedirect(redirect_url.to_owned()), StatusCode::OK).into_response()
    })
    .await
}

fn sign_in_view() -> Markup {
    let sign_in_endpoint = endpoints::SIGN_IN_API;

    let content = html! {
        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="text-xl font-bold leading-tight tracking-tight py-6 md:text-2xl"
            {
                "Who is keeping the books today?"
            }

            form
                method="post"
                action=(sign_in_endpoint)
                class="w-full space-y-4 md:space-y-6"
            {
                div
                {
                    label for="email" class=(FORM_LABEL_STYLE) { "Email" }

                    input
                        id="email"
                        type="email"
                        name="email"
                        placeholder="you@example.com"
                        required
                        autofocus
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                div
                {
                    label for="display_name" class=(FORM_LABEL_STYLE) { "Name" }

                    input
                        id="display_name"
                        type="text"
                        name="display_name"
                        placeholder="Your name"
                        required
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Sign In" }
            }
        }
    };

    base("Sign In", &content)
}

/// Route handler for the sign-in page.
pub async fn get_sign_in_page() -> Response {
    sign_in_view().into_response()
}

/// The form data for establishing a session.
#[derive(Debug, Deserialize)]
pub struct SignInForm {
    /// The address identifying the user.
    pub email: String,
    /// The name to store when the user is seen for the first time.
    pub display_name: String,
}

/// A route handler that creates-or-finds the user and sets the session
/// cookie, then redirects to the overview.
pub async fn sign_in(
    State(state): State<SessionState>,
    jar: PrivateCookieJar,
    Form(form): Form<SignInForm>,
) -> Response {
    let email = form.email.trim();
    let display_name = form.display_name.trim();

    if email.is_empty() || display_name.is_empty() {
        return Redirect::to(endpoints::SIGN_IN_VIEW).into_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_or_create_user(email, display_name, &connection) {
        Ok(user) => {
            let jar = set_session_cookie(jar, user.id, state.cookie_duration);

            (jar, Redirect::to(endpoints::OVERVIEW_VIEW)).into_response()
        }
        Err(error) => {
            tracing::error!("An unexpected error occurred while signing in: {error}");
            error.into_response()
        }
    }
}

/// A route handler that clears the session cookie and redirects to the
/// sign-in page.
pub async fn sign_out(jar: PrivateCookieJar) -> Response {
    let jar = clear_session_cookie(jar);

    (jar, Redirect::to(endpoints::SIGN_IN_VIEW)).into_response()
}
