//! Transaction management for the budgeting application.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model with its kind enum, and per-record database
//!   functions
//! - The generators that expand installment purchases and recurring fixed
//!   costs into dated record series
//! - The monthly aggregation queries and month arithmetic
//! - The fixed costs, purchases, and edit pages with their endpoints

pub(crate) mod core;
pub(crate) mod create_endpoints;
pub(crate) mod edit_page;
pub(crate) mod fixed_costs_page;
pub(crate) mod generate;
pub(crate) mod modify_endpoints;
pub(crate) mod month;
pub(crate) mod purchases_page;

#[cfg(test)]
pub(crate) mod test_utils;

pub use core::{Transaction, TransactionKind, create_transaction_table};
pub use create_endpoints::{
    create_fixed_cost_endpoint, create_purchase_endpoint, create_transaction_endpoint,
};
pub use edit_page::{edit_transaction_endpoint, get_edit_transaction_page};
pub use fixed_costs_page::get_fixed_costs_page;
pub use generate::create_series_table;
pub use modify_endpoints::{
    delete_series_endpoint, delete_transaction_endpoint, toggle_paid_endpoint,
};
pub use month::{
    CategorySpend, MonthQuery, MonthlyTotals, format_month_param, get_month_transactions,
    month_navigation, month_title, parse_month_param, shift_months, totals_by_kind,
    variable_spend_by_category, variable_total_for_month,
};
pub use purchases_page::get_purchases_page;
