//! Email sender adapters.
//!
//! - `LoggingEmailSender` - Writes each message to the trace log; the
//!   default when no mail transport is configured
//! - `RecordingEmailSender` - Keeps sent messages in memory for assertions

mod logging;
mod recording;

pub use logging::LoggingEmailSender;
pub use recording::{EmailKind, RecordingEmailSender, SentEmail};
