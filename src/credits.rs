/// Credit balance, spend tokens and transaction history.
pub mod ledger;
