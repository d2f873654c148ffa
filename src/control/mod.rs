//! Framed text control channel.
//!
//! Lines look like `"[05] hello\r\n"`. The receive side keeps a single slot:
//! a new message overwrites an unread one, and the consumer decides when the
//! transport may read the next record.

pub mod channel;
pub mod link;
pub mod message;
pub mod sender;

pub use channel::MessageChannel;
pub use link::ControlLink;
pub use message::{ControlMessage, MessageCode, encode_line, parse_record};
pub use sender::{MessageSender, format_inference};
