pub mod auth;
pub mod catalog;
pub mod reconciler;
pub mod spool;
pub mod users;
