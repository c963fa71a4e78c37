//! Application configuration constants
//!
//! Central location for all configuration constants, resource limits,
//! and validation boundaries used throughout the application.

// ===== Storage Quota =====

/// Default per-user storage quota in bytes (1 GiB)
pub const DEFAULT_STORAGE_QUOTA_BYTES: i64 = 1_073_741_824;

// ===== Upload Limits =====

/// Maximum accepted upload size in bytes (5 MiB).
/// Larger files are rejected before any disk write happens.
pub const MAX_UPLOAD_SIZE_BYTES: usize = 5 * 1024 * 1024;

/// MIME types accepted for image uploads
pub const ALLOWED_IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// MIME type accepted for PDF uploads
pub const PDF_MIME_TYPE: &str = "application/pdf";

// ===== Thumbnails =====

/// Thumbnail edge length in pixels; thumbnails are always square
pub const THUMBNAIL_SIZE: u32 = 200;

/// Filename prefix for generated thumbnails, stored beside the original
pub const THUMBNAIL_PREFIX: &str = "thumb-";

// ===== Naming =====

/// Maximum length for folder and item names
pub const MAX_NAME_LENGTH: usize = 255;

/// Suffix appended when copying without an explicit new name
pub const COPY_NAME_SUFFIX: &str = " (Copy)";

// ===== PIN Protection =====

/// Minimum PIN length in digits
pub const MIN_PIN_LENGTH: usize = 4;

/// Maximum PIN length in digits
pub const MAX_PIN_LENGTH: usize = 6;

// ===== Listing =====

/// Default page size for listings
pub const DEFAULT_PAGE_LIMIT: i64 = 20;

/// Hard ceiling on page size; prevents a single request from
/// materializing the whole table
pub const MAX_PAGE_LIMIT: i64 = 100;
