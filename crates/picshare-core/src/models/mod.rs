//! Data models for the application

mod auth;
mod color;
mod image;
mod user;

pub use auth::TokenPair;
pub use color::{HexColor, InvalidColor};
pub use image::{
    FileInfo, Image, ImageDetails, ImageFileMetadata, ImageFilter, ImageOrder, ImageSortField,
    ImageUpdate, NewImage, Page, Pagination, VisualFeatures,
};
pub use user::{Credentials, Role, User, UserSummary, UserUpdate};
