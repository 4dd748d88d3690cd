//! WhatsApp Cloud API I/O for sheetline.
//!
//! This crate is pure I/O: it flattens webhook notification payloads into
//! `InboundMessage` values and sends outbound text replies. Durability and
//! routing live elsewhere.

mod parse;
mod traits;
mod types;
mod whatsapp;

pub use parse::parse_notification;
pub use traits::ReplySender;
pub use types::{InboundMessage, KIND_UNKNOWN, SENDER_UNKNOWN, TEXT_UNSUPPORTED};
pub use whatsapp::WhatsAppCloudSender;
