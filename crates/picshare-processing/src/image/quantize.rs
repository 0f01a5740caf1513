//! Median-cut color quantization (modified MMCQ).
//!
//! Pixels are bucketed into a 5-bit-per-channel histogram. The color space
//! box enclosing all occupied buckets is split repeatedly at the population
//! median of its longest side until the requested number of boxes exists or
//! every box holds a single bucket. For the first three quarters of the
//! splits the most populated box is chosen; afterwards population times
//! volume is used so large sparse regions also get represented.
//!
//! Each bucket also keeps the channel sums of the pixels that fell in it,
//! so a box's color is the exact mean of its real pixels rather than the
//! center of its bucket range.

const SIGBITS: u32 = 5;
const RSHIFT: u32 = 8 - SIGBITS;
const SIDE: usize = 1 << SIGBITS;
const HISTO_SIZE: usize = SIDE * SIDE * SIDE;
const FRACT_BY_POPULATION: f64 = 0.75;

#[derive(Debug, Clone, Copy, Default)]
struct Bin {
    count: u64,
    sum: [u64; 3],
}

fn index(r: usize, g: usize, b: usize) -> usize {
    (r << (2 * SIGBITS)) | (g << SIGBITS) | b
}

/// Reduced-precision color histogram.
#[derive(Debug, Clone)]
pub struct Histogram {
    bins: Vec<Bin>,
    total: u64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Histogram {
            bins: vec![Bin::default(); HISTO_SIZE],
            total: 0,
        }
    }

    pub fn add(&mut self, rgb: [u8; 3]) {
        let idx = index(
            usize::from(rgb[0] >> RSHIFT),
            usize::from(rgb[1] >> RSHIFT),
            usize::from(rgb[2] >> RSHIFT),
        );
        let bin = &mut self.bins[idx];
        bin.count += 1;
        for (acc, channel) in bin.sum.iter_mut().zip(rgb) {
            *acc += u64::from(channel);
        }
        self.total += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn bin(&self, coords: [usize; 3]) -> &Bin {
        &self.bins[index(coords[0], coords[1], coords[2])]
    }
}

impl FromIterator<[u8; 3]> for Histogram {
    fn from_iter<I: IntoIterator<Item = [u8; 3]>>(iter: I) -> Self {
        let mut histogram = Histogram::new();
        for rgb in iter {
            histogram.add(rgb);
        }
        histogram
    }
}

/// A quantized color and the number of pixels it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swatch {
    pub rgb: [u8; 3],
    pub population: u64,
}

/// Box in bucket coordinates, inclusive on both ends, shrunk to its occupied buckets.
#[derive(Debug, Clone)]
struct ColorBox {
    lo: [usize; 3],
    hi: [usize; 3],
    population: u64,
    sum: [u64; 3],
    occupied: usize,
}

/// Visit every bucket coordinate inside `lo..=hi`.
fn for_each_coord(lo: [usize; 3], hi: [usize; 3], mut f: impl FnMut([usize; 3])) {
    for r in lo[0]..=hi[0] {
        for g in lo[1]..=hi[1] {
            for b in lo[2]..=hi[2] {
                f([r, g, b]);
            }
        }
    }
}

impl ColorBox {
    fn fit(histogram: &Histogram, lo: [usize; 3], hi: [usize; 3]) -> Option<ColorBox> {
        let mut min = [usize::MAX; 3];
        let mut max = [0usize; 3];
        let mut population = 0u64;
        let mut sum = [0u64; 3];
        let mut occupied = 0usize;

        for_each_coord(lo, hi, |coords| {
            let bin = histogram.bin(coords);
            if bin.count == 0 {
                return;
            }
            for c in 0..3 {
                min[c] = min[c].min(coords[c]);
                max[c] = max[c].max(coords[c]);
                sum[c] += bin.sum[c];
            }
            population += bin.count;
            occupied += 1;
        });

        (population > 0).then_some(ColorBox {
            lo: min,
            hi: max,
            population,
            sum,
            occupied,
        })
    }

    fn volume(&self) -> u64 {
        (0..3)
            .map(|c| (self.hi[c] - self.lo[c] + 1) as u64)
            .product()
    }

    fn splittable(&self) -> bool {
        self.occupied > 1
    }

    fn slice_population(&self, histogram: &Histogram, axis: usize, value: usize) -> u64 {
        let mut lo = self.lo;
        let mut hi = self.hi;
        lo[axis] = value;
        hi[axis] = value;
        let mut population = 0;
        for_each_coord(lo, hi, |coords| population += histogram.bin(coords).count);
        population
    }

    /// Cut along the longest side at the population median.
    ///
    /// Both halves are non-empty: the box is fitted, so its lowest and highest
    /// planes on every axis hold pixels, and the cut never passes either.
    fn split(&self, histogram: &Histogram) -> Option<(ColorBox, ColorBox)> {
        if !self.splittable() {
            return None;
        }
        let axis = (0..3).max_by_key(|&c| self.hi[c] - self.lo[c])?;
        if self.hi[axis] == self.lo[axis] {
            return None;
        }

        let mut cumulative = 0u64;
        let mut cut = self.lo[axis];
        for value in self.lo[axis]..self.hi[axis] {
            cumulative += self.slice_population(histogram, axis, value);
            cut = value;
            if cumulative * 2 >= self.population {
                break;
            }
        }

        let mut left_hi = self.hi;
        left_hi[axis] = cut;
        let mut right_lo = self.lo;
        right_lo[axis] = cut + 1;

        let left = ColorBox::fit(histogram, self.lo, left_hi)?;
        let right = ColorBox::fit(histogram, right_lo, self.hi)?;
        Some((left, right))
    }

    fn mean(&self) -> [u8; 3] {
        let half = self.population / 2;
        let mut rgb = [0u8; 3];
        for (out, total) in rgb.iter_mut().zip(self.sum) {
            *out = u8::try_from((total + half) / self.population).unwrap_or(u8::MAX);
        }
        rgb
    }
}

/// Reduce `histogram` to at most `max_colors` swatches, most populated first.
///
/// Fewer swatches are returned when the histogram has fewer occupied buckets.
/// An empty histogram yields no swatches.
pub fn quantize(histogram: &Histogram, max_colors: usize) -> Vec<Swatch> {
    let max_colors = max_colors.max(1);
    let Some(initial) = ColorBox::fit(histogram, [0; 3], [SIDE - 1; 3]) else {
        return Vec::new();
    };

    let population_phase = (max_colors as f64 * FRACT_BY_POPULATION).ceil() as usize;
    let mut boxes = vec![initial];

    while boxes.len() < max_colors {
        let by_population = boxes.len() < population_phase;
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.splittable())
            .max_by_key(|(_, b)| {
                if by_population {
                    b.population
                } else {
                    b.population.saturating_mul(b.volume())
                }
            })
            .map(|(i, _)| i);

        let Some(i) = candidate else {
            break;
        };
        let target = boxes.swap_remove(i);
        match target.split(histogram) {
            Some((left, right)) => {
                boxes.push(left);
                boxes.push(right);
            }
            None => {
                boxes.push(target);
                break;
            }
        }
    }

    let mut swatches: Vec<Swatch> = boxes
        .iter()
        .map(|b| Swatch {
            rgb: b.mean(),
            population: b.population,
        })
        .collect();
    swatches.sort_by(|a, b| {
        b.population
            .cmp(&a.population)
            .then_with(|| a.rgb.cmp(&b.rgb))
    });
    swatches
}
