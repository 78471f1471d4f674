//! Email parsing: the streaming MBOX scanner and the per-message MIME parser.

pub mod mbox;
pub mod message;
