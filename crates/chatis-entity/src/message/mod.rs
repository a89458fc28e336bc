//! Direct messages and their file attachments.

pub mod file;
pub mod model;

pub use file::FileDescriptor;
pub use model::{Message, MessageRecord, NewMessage};
