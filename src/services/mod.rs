//! Services module
//!
//! Business logic services that coordinate between the HTTP layer,
//! repository and file store.

pub mod access;
pub mod folders;
pub mod items;
pub mod reports;
pub(crate) mod tree;

pub use folders::FoldersService;
pub use items::ItemsService;
pub use reports::ReportsService;
