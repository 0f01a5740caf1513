//! Picshare database layer
//!
//! SQLite-backed repositories for users and the image catalog. The schema is
//! embedded from `migrations/` and applied by [`connect`].

pub mod db;

pub use db::pool::{connect, MIGRATOR};
pub use db::{ImageRepository, UserRepository};
