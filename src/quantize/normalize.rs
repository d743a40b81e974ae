use crate::foundation::core::Array;
use crate::foundation::error::{TabvidError, TabvidResult};

/// Bits per pixel sample. Only 8 and 16 are representable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BitDepth {
    /// 8-bit samples, `0..=255`.
    Eight,
    /// 16-bit samples, `0..=65535`.
    Sixteen,
}

impl BitDepth {
    /// Number of bits.
    pub fn bits(self) -> u32 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
        }
    }

    /// Largest pixel value, `2^bits - 1`.
    pub fn max_pixel(self) -> u16 {
        match self {
            Self::Eight => u8::MAX as u16,
            Self::Sixteen => u16::MAX,
        }
    }
}

impl TryFrom<u32> for BitDepth {
    type Error = TabvidError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(Self::Eight),
            16 => Ok(Self::Sixteen),
            other => Err(TabvidError::validation(format!(
                "unsupported bit depth {other} (expected 8 or 16)"
            ))),
        }
    }
}

impl From<BitDepth> for u32 {
    fn from(b: BitDepth) -> Self {
        b.bits()
    }
}

/// Declared `(min, max)` value range, serialized as a two-element array.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct ValueRange {
    min: f64,
    max: f64,
}

impl ValueRange {
    /// Validated range: both ends finite and `min <= max`.
    pub fn new(min: f64, max: f64) -> TabvidResult<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(TabvidError::validation(format!(
                "value range ({min}, {max}) must be finite"
            )));
        }
        if min > max {
            return Err(TabvidError::validation(format!(
                "value range min {min} exceeds max {max}"
            )));
        }
        Ok(Self { min, max })
    }

    /// Lower bound.
    pub fn min(self) -> f64 {
        self.min
    }

    /// Upper bound.
    pub fn max(self) -> f64 {
        self.max
    }

    /// `max - min`.
    pub fn span(self) -> f64 {
        self.max - self.min
    }

    /// Range collapsed to a single point.
    pub fn is_degenerate(self) -> bool {
        self.max == self.min
    }
}

impl TryFrom<(f64, f64)> for ValueRange {
    type Error = TabvidError;

    fn try_from((min, max): (f64, f64)) -> Result<Self, Self::Error> {
        Self::new(min, max)
    }
}

impl From<ValueRange> for (f64, f64) {
    fn from(r: ValueRange) -> Self {
        (r.min, r.max)
    }
}

/// Parameters of the affine value <-> pixel map, persisted in the sidecar.
///
/// `pixel = round((value - min) / (max - min) * (2^bits - 1))`. When `scaled` is `false` the
/// pixels hold the values verbatim (integer data that already fits the pixel range).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NormalizationParams {
    /// Value mapped to pixel 0.
    pub min: f64,
    /// Value mapped to the largest pixel.
    pub max: f64,
    /// Pixel bit depth.
    pub bit_depth: BitDepth,
    /// Whether the affine map was applied.
    pub scaled: bool,
}

impl NormalizationParams {
    /// Range collapsed to a point; every pixel decodes to `min`.
    pub fn is_degenerate(&self) -> bool {
        self.scaled && self.max == self.min
    }

    /// Worst-case absolute error introduced by quantization, `(max - min) / (2^bits - 1)`.
    pub fn quantization_bound(&self) -> f64 {
        if !self.scaled {
            return 0.0;
        }
        (self.max - self.min) / f64::from(self.bit_depth.max_pixel())
    }

    fn value_of(&self, pixel: f64) -> f64 {
        if !self.scaled {
            return pixel;
        }
        if self.is_degenerate() {
            return self.min;
        }
        pixel / f64::from(self.bit_depth.max_pixel()) * (self.max - self.min) + self.min
    }
}

/// Quantize `array` into `[0, 2^bits - 1]` using `range`.
///
/// Values may overshoot the range by `tolerance * span` (or `tolerance * max(|min|, 1)` for a
/// degenerate range) and are clamped; anything further out, or NaN, is a range violation.
pub fn normalize(
    array: &Array<f64>,
    range: ValueRange,
    bit_depth: BitDepth,
    tolerance: f64,
) -> TabvidResult<(Array<u16>, NormalizationParams)> {
    check_in_range(array.data(), range, tolerance)?;

    let params = NormalizationParams {
        min: range.min(),
        max: range.max(),
        bit_depth,
        scaled: true,
    };
    let max_px = bit_depth.max_pixel();
    let pixels = if params.is_degenerate() {
        let mid = max_px / 2;
        array.map(|_| mid)
    } else {
        let scale = f64::from(max_px) / range.span();
        array.map(|v| ((v - range.min()) * scale).round().clamp(0.0, f64::from(max_px)) as u16)
    };
    Ok((pixels, params))
}

/// Reject NaN and values beyond `range` widened by the tolerance slack.
pub(crate) fn check_in_range(
    values: &[f64],
    range: ValueRange,
    tolerance: f64,
) -> TabvidResult<()> {
    if tolerance.is_nan() || tolerance < 0.0 {
        return Err(TabvidError::validation(format!(
            "range tolerance must be >= 0, got {tolerance}"
        )));
    }
    let slack = if range.is_degenerate() {
        tolerance * range.min().abs().max(1.0)
    } else {
        tolerance * range.span()
    };
    let (lo, hi) = (range.min() - slack, range.max() + slack);
    if let Some((i, v)) = values
        .iter()
        .enumerate()
        .find(|(_, v)| v.is_nan() || **v < lo || **v > hi)
    {
        return Err(TabvidError::range_violation(format!(
            "element {i} = {v} lies outside value range [{}, {}]",
            range.min(),
            range.max()
        )));
    }
    Ok(())
}

/// Store integer data verbatim when every value is an integer inside `[0, 2^bits - 1]`.
///
/// Returns `None` when the data does not fit, in which case callers fall back to [`normalize`].
pub fn normalize_verbatim(
    array: &Array<f64>,
    bit_depth: BitDepth,
) -> Option<(Array<u16>, NormalizationParams)> {
    let max_px = f64::from(bit_depth.max_pixel());
    let fits = array
        .data()
        .iter()
        .all(|v| v.fract() == 0.0 && (0.0..=max_px).contains(v));
    if !fits {
        return None;
    }
    let params = NormalizationParams {
        min: 0.0,
        max: max_px,
        bit_depth,
        scaled: false,
    };
    Some((array.map(|v| *v as u16), params))
}

/// Map pixels (integer samples or real pixel-scale values) back to data values.
pub fn denormalize<T: Copy + Into<f64>>(
    pixels: &Array<T>,
    params: &NormalizationParams,
) -> Array<f64> {
    pixels.map(|p| params.value_of((*p).into()))
}

#[cfg(test)]
#[path = "../../tests/unit/quantize/normalize.rs"]
mod tests;
