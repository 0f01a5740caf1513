//! Repositories
//
// Connection pool and migrations
pub mod pool;
//
// Image catalog: images, file metadata, palettes, likes
pub mod image;
//
// User accounts
pub mod user;

pub use image::ImageRepository;
pub use user::UserRepository;
