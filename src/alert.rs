//! Alert fragments for displaying success and error messages to users.
//!
//! Alerts are rendered into the `#alert-container` element, either as the
//! body of an htmx error response (via `hx-target-error`) or as a success
//! confirmation for actions that do not navigate away.

use axum::response::{IntoResponse, Response};
use maud::{Markup, html};

/// A message shown to the user in the fixed alert container.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// An action completed and has extra detail worth showing.
    Success {
        message: String,
        details: String,
    },
    /// An action completed; one line is enough.
    SuccessSimple {
        message: String,
    },
    /// An action failed.
    Error {
        message: String,
        details: String,
    },
}

impl Alert {
    /// Create a new error alert.
    pub fn error(message: &str, details: &str) -> Self {
        Self::Error {
            message: message.to_owned(),
            details: details.to_owned(),
        }
    }

    /// Create a new error alert without details.
    pub fn error_simple(message: &str) -> Self {
        Self::error(message, "")
    }

    /// Create a new success alert without details.
    pub fn success_simple(message: &str) -> Self {
        Self::SuccessSimple {
            message: message.to_owned(),
        }
    }

    pub fn into_html(self) -> Markup {
        let (container_style, message, details) = match self {
            Alert::Success { message, details } => (SUCCESS_STYLE, message, details),
            Alert::SuccessSimple { message } => (SUCCESS_STYLE, message, String::new()),
            Alert::Error { message, details } => (ERROR_STYLE, message, details),
        };

        html!(
            div
                class=(container_style)
                role="alert"
                onclick="this.remove()"
            {
                p class="font-semibold" { (message) }

                @if !details.is_empty() {
                    p class="text-sm" { (details) }
                }
            }
        )
    }
}

const SUCCESS_STYLE: &str = "p-4 mb-4 rounded-lg border cursor-pointer \
    text-green-800 bg-green-50 border-green-300 \
    dark:bg-gray-800 dark:text-green-400 dark:border-green-800";

const ERROR_STYLE: &str = "p-4 mb-4 rounded-lg border cursor-pointer \
    text-red-800 bg-red-50 border-red-300 \
    dark:bg-gray-800 dark:text-red-400 dark:border-red-800";

impl IntoResponse for Alert {
    fn into_response(self) -> Response {
        self.into_html().into_response()
    }
}
