pub mod chat;
pub mod format;
pub mod register;
pub mod sessions;
pub mod sync;
