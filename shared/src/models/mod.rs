//! Domain models for the Kindergarten Kitchen Management Platform

mod ledger;
mod notification;
mod portion;
mod product;
mod recipe;
mod report;
mod serving;
mod unit;

pub use ledger::*;
pub use notification::*;
pub use portion::*;
pub use product::*;
pub use recipe::*;
pub use report::*;
pub use serving::*;
pub use unit::*;
