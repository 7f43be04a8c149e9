//! Wyffle Common
//!
//! Types shared by the platform server and the notification dispatcher:
//! - Outbox items written alongside state changes
//! - Environment variable helpers used by every binary
//! - Tracing initialisation

pub mod env;
pub mod logging;
pub mod outbox;
pub mod serde_helpers;

pub use outbox::{NotificationKind, OutboxItem, OutboxStatus};
