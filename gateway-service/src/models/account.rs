//! Prepaid credit account.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A caller's credit balance. The account id is an opaque caller-supplied
/// string; accounts are auto-created with a configured starting balance on
/// first reference.
///
/// The balance is decremented after generation completes, so it may dip
/// below zero on the request that exhausts it. The credit gate rejects the
/// next request.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub balance: Decimal,
    pub created_utc: DateTime<Utc>,
}

impl Account {
    /// Whether the account can fund a new generation request.
    pub fn has_credits(&self) -> bool {
        self.balance > Decimal::ZERO
    }
}
