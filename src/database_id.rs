//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// The ID of a transaction record.
pub type TransactionId = i64;

/// The ID of a generated record series (an installment purchase or a
/// recurring fixed cost). All records created from one user intent share
/// one series ID.
pub type SeriesId = i64;

/// The ID of a budget.
pub type BudgetId = i64;

/// The ID of a household.
pub type HouseholdId = i64;

/// The ID of a user.
pub type UserId = i64;
