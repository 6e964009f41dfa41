//! User domain module.
//!
//! - `model`: user account record
//! - `repository`: typed access to the `users` table

mod model;
mod repository;

pub use model::User;
pub use repository::UserRepository;
