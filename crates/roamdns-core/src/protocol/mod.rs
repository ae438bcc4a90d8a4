//! Wire protocol between the reporter and the server
//!
//! - [`messages`]: the `Request`/`Response` envelope
//! - [`codec`]: one-JSON-value-per-message framing over a byte stream
//!
//! A decode failure only aborts the exchange it happened in; callers log it
//! and drop the connection.

pub mod codec;
pub mod messages;

pub use codec::{MAX_MESSAGE_LEN, read_message, write_message};
pub use messages::{Command, Request, Response, Status};
