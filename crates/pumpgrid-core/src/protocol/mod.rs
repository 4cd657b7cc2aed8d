//! Wire protocol: the JSON envelope and the typed payloads carried inside it.

pub mod envelope;
pub mod messages;

pub use envelope::{Envelope, ProtocolError};
pub use messages::{EdgeRequest, WebRequest};
