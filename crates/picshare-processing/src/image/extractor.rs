//! Visual feature extraction: dimensions, dominant and average colors, palette.

use std::collections::HashMap;
use std::io::{BufRead, Cursor, Seek};

use image::{DynamicImage, GenericImageView, ImageReader};
use picshare_core::constants::PALETTE_ALPHA_THRESHOLD;
use picshare_core::models::{HexColor, VisualFeatures};

use super::quantize::{quantize, Histogram};
use crate::error::ExtractionError;

/// Derives [`VisualFeatures`] from encoded image bytes.
///
/// Images with at most `palette_size` distinct colors get exactly those colors,
/// most frequent first and ties broken by RGB value. Richer images are reduced
/// by median-cut quantization. Either way the dominant color is the first
/// palette entry when the palette is non-empty.
#[derive(Debug, Clone, Copy)]
pub struct VisualFeatureExtractor {
    palette_size: usize,
}

impl VisualFeatureExtractor {
    pub fn new(palette_size: usize) -> Self {
        VisualFeatureExtractor { palette_size }
    }

    /// Decode the image readable from `reader` and analyse it.
    pub fn extract<R: BufRead + Seek>(&self, reader: R) -> Result<VisualFeatures, ExtractionError> {
        let reader = ImageReader::new(reader)
            .with_guessed_format()
            .map_err(|e| ExtractionError::CorruptImageData(e.to_string()))?;

        if reader.format().is_none() {
            return Err(ExtractionError::UnsupportedImageFormat(
                "unrecognized image signature".to_string(),
            ));
        }

        let img = reader.decode()?;
        self.extract_from_image(&img)
    }

    pub fn extract_bytes(&self, data: &[u8]) -> Result<VisualFeatures, ExtractionError> {
        self.extract(Cursor::new(data))
    }

    /// Analyse an already decoded image.
    pub fn extract_from_image(&self, img: &DynamicImage) -> Result<VisualFeatures, ExtractionError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(ExtractionError::CorruptImageData(
                "image has no pixels".to_string(),
            ));
        }

        let rgba = img.to_rgba8();
        let mut sums = [0u64; 3];
        for pixel in rgba.pixels() {
            for (acc, channel) in sums.iter_mut().zip(&pixel.0[..3]) {
                *acc += u64::from(*channel);
            }
        }
        let pixel_count = u64::from(width) * u64::from(height);
        let average_color = mean_color(sums, pixel_count);

        let limit = self.palette_size.max(1);
        let opaque = rgba
            .pixels()
            .filter(|p| p.0[3] >= PALETTE_ALPHA_THRESHOLD)
            .map(|p| [p.0[0], p.0[1], p.0[2]]);
        let mut tally = ColorTally::collect(opaque, limit);
        // Fully transparent images still get a palette.
        if tally.histogram.is_empty() {
            tally = ColorTally::collect(rgba.pixels().map(|p| [p.0[0], p.0[1], p.0[2]]), limit);
        }
        let ranked = tally.ranked(limit);

        let dominant_color = ranked
            .first()
            .map(|rgb| HexColor::from_rgb(rgb[0], rgb[1], rgb[2]))
            .unwrap_or_else(|| average_color.clone());

        let mut palette: Vec<HexColor> = Vec::with_capacity(self.palette_size);
        for rgb in &ranked {
            if palette.len() == self.palette_size {
                break;
            }
            let color = HexColor::from_rgb(rgb[0], rgb[1], rgb[2]);
            if !palette.contains(&color) {
                palette.push(color);
            }
        }

        tracing::debug!(
            width,
            height,
            palette_len = palette.len(),
            dominant = %dominant_color,
            "Extracted visual features"
        );

        Ok(VisualFeatures {
            width,
            height,
            dominant_color,
            average_color,
            palette,
        })
    }
}

/// Palette pixels, as exact counts while there are few distinct colors and
/// as a reduced histogram for quantization.
struct ColorTally {
    histogram: Histogram,
    /// `None` once more than `limit` distinct colors were seen.
    exact: Option<HashMap<[u8; 3], u64>>,
}

impl ColorTally {
    fn collect(pixels: impl Iterator<Item = [u8; 3]>, limit: usize) -> Self {
        let mut histogram = Histogram::new();
        let mut exact = Some(HashMap::new());
        for rgb in pixels {
            histogram.add(rgb);
            if let Some(counts) = exact.as_mut() {
                *counts.entry(rgb).or_insert(0u64) += 1;
                if counts.len() > limit {
                    exact = None;
                }
            }
        }
        ColorTally { histogram, exact }
    }

    /// Colors most significant first, at most `limit` of them.
    fn ranked(self, limit: usize) -> Vec<[u8; 3]> {
        match self.exact {
            Some(counts) => {
                let mut colors: Vec<([u8; 3], u64)> = counts.into_iter().collect();
                colors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
                colors.into_iter().map(|(rgb, _)| rgb).collect()
            }
            None => quantize(&self.histogram, limit)
                .into_iter()
                .map(|swatch| swatch.rgb)
                .collect(),
        }
    }
}

fn mean_color(sums: [u64; 3], count: u64) -> HexColor {
    let half = count / 2;
    let channel = |sum: u64| u8::try_from((sum + half) / count).unwrap_or(u8::MAX);
    HexColor::from_rgb(channel(sums[0]), channel(sums[1]), channel(sums[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(rgb));
        encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
    }

    #[test]
    fn test_solid_color_png() {
        let data = solid_png(10, 10, [255, 0, 0]);
        let features = VisualFeatureExtractor::new(5).extract_bytes(&data).unwrap();

        assert_eq!(features.width, 10);
        assert_eq!(features.height, 10);
        assert_eq!(features.dominant_color.as_str(), "#ff0000");
        assert_eq!(features.average_color.as_str(), "#ff0000");
        assert_eq!(features.palette, vec![features.dominant_color.clone()]);
    }

    #[test]
    fn test_solid_color_jpeg_is_close_to_source() {
        let img = RgbImage::from_pixel(10, 10, Rgb([255, 0, 0]));
        let data = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);
        let features = VisualFeatureExtractor::new(5).extract_bytes(&data).unwrap();

        assert_eq!((features.width, features.height), (10, 10));
        let [r, g, b] = features.average_color.rgb();
        assert!(r > 240 && g < 16 && b < 16, "got {}", features.average_color);
        assert_eq!(features.palette.first(), Some(&features.dominant_color));
    }

    #[test]
    fn test_dimensions_are_true_pixel_dimensions() {
        let data = solid_png(37, 5, [1, 2, 3]);
        let features = VisualFeatureExtractor::new(3).extract_bytes(&data).unwrap();
        assert_eq!((features.width, features.height), (37, 5));
    }

    #[test]
    fn test_palette_bounded_by_distinct_colors_and_size() {
        // Left half red, right quarter blue, remaining quarter green.
        let img = RgbImage::from_fn(8, 4, |x, _| match x {
            0..=3 => Rgb([255, 0, 0]),
            4..=5 => Rgb([0, 0, 255]),
            _ => Rgb([0, 255, 0]),
        });
        let data = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);

        let features = VisualFeatureExtractor::new(5).extract_bytes(&data).unwrap();
        assert_eq!(features.palette.len(), 3);
        assert_eq!(features.dominant_color.as_str(), "#ff0000");
        assert_eq!(features.palette[0], features.dominant_color);

        let features = VisualFeatureExtractor::new(2).extract_bytes(&data).unwrap();
        assert_eq!(features.palette.len(), 2);
        assert_eq!(features.palette[0], features.dominant_color);
    }

    #[test]
    fn test_near_identical_colors_are_kept_apart() {
        let pixels = [[10, 10, 10], [10, 10, 10], [12, 12, 12], [200, 50, 50]];
        let img = RgbImage::from_fn(4, 1, |x, _| Rgb(pixels[x as usize]));
        let extractor = VisualFeatureExtractor::new(5);
        let features = extractor
            .extract_from_image(&DynamicImage::ImageRgb8(img.clone()))
            .unwrap();

        let palette: Vec<&str> = features.palette.iter().map(HexColor::as_str).collect();
        assert_eq!(palette, vec!["#0a0a0a", "#0c0c0c", "#c83232"]);
        assert_eq!(features.dominant_color.as_str(), "#0a0a0a");

        // More distinct colors than the palette holds: quantized instead.
        let features = VisualFeatureExtractor::new(2)
            .extract_from_image(&DynamicImage::ImageRgb8(img))
            .unwrap();
        assert_eq!(features.palette.len(), 2);
        assert_eq!(features.palette[0], features.dominant_color);
    }

    #[test]
    fn test_equal_counts_are_ordered_by_rgb() {
        let img = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([0, 0, 9])
            } else {
                Rgb([0, 0, 8])
            }
        });
        let features = VisualFeatureExtractor::new(5)
            .extract_from_image(&DynamicImage::ImageRgb8(img))
            .unwrap();
        assert_eq!(features.dominant_color.as_str(), "#000008");
        assert_eq!(features.palette[1].as_str(), "#000009");
    }

    #[test]
    fn test_average_is_pixel_mean_and_order_independent() {
        let a = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
        let b = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) });

        let extractor = VisualFeatureExtractor::new(5);
        let fa = extractor.extract_from_image(&DynamicImage::ImageRgb8(a)).unwrap();
        let fb = extractor.extract_from_image(&DynamicImage::ImageRgb8(b)).unwrap();

        assert_eq!(fa.average_color, fb.average_color);
        assert_eq!(fa.average_color.as_str(), "#808080");
    }

    #[test]
    fn test_zero_palette_size_still_reports_dominant() {
        let data = solid_png(4, 4, [0, 128, 0]);
        let features = VisualFeatureExtractor::new(0).extract_bytes(&data).unwrap();
        assert!(features.palette.is_empty());
        assert_eq!(features.dominant_color.as_str(), "#008000");
    }

    #[test]
    fn test_transparent_pixels_ignored_for_palette() {
        let img = RgbaImage::from_fn(4, 1, |x, _| {
            if x == 0 {
                Rgba([0, 0, 255, 255])
            } else {
                Rgba([255, 0, 0, 0])
            }
        });
        let features = VisualFeatureExtractor::new(5)
            .extract_from_image(&DynamicImage::ImageRgba8(img))
            .unwrap();
        assert_eq!(features.palette.len(), 1);
        assert_eq!(features.dominant_color.as_str(), "#0000ff");
    }

    #[test]
    fn test_unrecognized_bytes_are_unsupported() {
        let err = VisualFeatureExtractor::new(5)
            .extract_bytes(b"definitely not an image, just some text")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedImageFormat(_)));
    }

    #[test]
    fn test_truncated_png_is_corrupt() {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([x as u8 * 4, y as u8 * 4, 7]));
        let data = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);
        let truncated = &data[..data.len() / 2];

        let err = VisualFeatureExtractor::new(5)
            .extract_bytes(truncated)
            .unwrap_err();
        assert!(matches!(err, ExtractionError::CorruptImageData(_)));
    }
}
