//! Comp ledger: append-only, per-(venue, player) balances.

pub mod ledger;
pub mod models;
pub mod repository;

pub use ledger::{CompLedger, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
pub use models::{
    CompAccount, CompBalance, CompKind, CompLedgerEntry, NewCompEntry, RedemptionCategory,
    balance_after, check_redemption, derive_balance,
};
pub use repository::CompRepository;
