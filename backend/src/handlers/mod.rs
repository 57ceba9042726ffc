//! HTTP request handlers

pub mod health;
pub mod inventory;
pub mod notification;
pub mod portions;
pub mod products;
pub mod recipes;
pub mod reporting;
pub mod servings;
pub mod units;
pub mod ws;

pub use health::*;
pub use inventory::*;
pub use notification::*;
pub use portions::*;
pub use products::*;
pub use recipes::*;
pub use reporting::*;
pub use servings::*;
pub use units::*;
pub use ws::*;
