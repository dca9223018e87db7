//! Domain models and engine rules for procurement documents

mod approval;
mod ledger;
mod master;
mod material;
mod order;
mod receipt;
mod report;
mod requisition;
mod tax;

pub use approval::*;
pub use ledger::*;
pub use master::*;
pub use material::*;
pub use order::*;
pub use receipt::*;
pub use report::*;
pub use requisition::*;
pub use tax::*;
