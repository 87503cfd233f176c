pub mod envelope;

pub use envelope::{ErrorBody, Envelope, MessageType};
