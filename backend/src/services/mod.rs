//! Business logic services for the kindergarten kitchen inventory

pub mod inventory;
pub mod notification;
pub mod portions;
pub mod product;
pub mod recipe;
pub mod reporting;
pub mod scheduler;
pub mod serving;
pub mod units;

pub use inventory::InventoryService;
pub use notification::{EventBus, NotificationService};
pub use portions::PortionService;
pub use product::ProductService;
pub use recipe::RecipeService;
pub use reporting::ReportingService;
pub use serving::ServingService;
pub use units::UnitService;
