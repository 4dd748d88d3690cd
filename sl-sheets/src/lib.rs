//! Google Sheets append-only log client for sheetline.
//!
//! Pure HTTP client: service-account authentication and the
//! `values.append` call, nothing else.

mod auth;
mod client;
mod error;

pub use auth::ServiceAccountKey;
pub use client::{HEADER, LogRow, RowAppender, SheetsClient};
pub use error::{Result, SheetsError};
