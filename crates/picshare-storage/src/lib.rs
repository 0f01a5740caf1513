//! Picshare Storage Library
//!
//! Persists the raw bytes of uploaded images, keyed by image id.
//!
//! # Storage key format
//!
//! Every backend stores an image under `images/{image_id}`. Keys must not
//! contain `..` or a leading `/`; key generation lives in the `keys` module.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod object;
pub mod traits;

pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use object::ObjectStorage;
pub use picshare_core::StorageBackend;
pub use traits::{ByteStream, FileUpload, ImageStorage, LoadedFile, StorageError, StorageResult};
