//! Shared constants

/// Prefix for versioned API routes.
pub const API_PREFIX: &str = "/api/v1";

/// Default number of palette colors extracted per image.
pub const DEFAULT_PALETTE_SIZE: usize = 5;

/// Pixels with an alpha channel below this value are ignored when building the palette.
pub const PALETTE_ALPHA_THRESHOLD: u8 = 125;

/// Default and maximum page sizes for list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;
