pub mod aggregate;
pub mod ledger;

pub use aggregate::RatingAggregate;
pub use ledger::RatingLedger;
