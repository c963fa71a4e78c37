//! Storage module
//!
//! Provides on-disk storage for uploaded files and thumbnail generation.

pub mod file_store;
pub mod thumbnails;

pub use file_store::{thumbnail_name, FileCategory, FileStore, StoredFile};
