use crate::foundation::error::{TabvidError, TabvidResult};
use crate::quantize::normalize::BitDepth;

/// Raw pixel layouts exchanged with the codec, named after their `ffmpeg` `pix_fmt`.
///
/// Planar formats store channel `i` as plane `i`; packed formats interleave channels per pixel.
/// 16-bit formats are little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PixelFormat {
    /// `gray`: one 8-bit plane.
    Gray,
    /// `gray16le`: one 16-bit plane.
    Gray16,
    /// `ya8`: two interleaved 8-bit channels.
    Ya8,
    /// `ya16le`: two interleaved 16-bit channels.
    Ya16,
    /// `gbrp`: three 8-bit planes, no alpha, no padding.
    Gbrp,
    /// `gbrp16le`: three 16-bit planes.
    Gbrp16,
    /// `gbrap`: four 8-bit planes.
    Gbrap,
    /// `gbrap16le`: four 16-bit planes.
    Gbrap16,
    /// `rgb24`: three interleaved 8-bit channels.
    Rgb24,
    /// `rgb48le`: three interleaved 16-bit channels.
    Rgb48,
}

const ALL: [PixelFormat; 10] = [
    PixelFormat::Gray,
    PixelFormat::Gray16,
    PixelFormat::Ya8,
    PixelFormat::Ya16,
    PixelFormat::Gbrp,
    PixelFormat::Gbrp16,
    PixelFormat::Gbrap,
    PixelFormat::Gbrap16,
    PixelFormat::Rgb24,
    PixelFormat::Rgb48,
];

impl PixelFormat {
    /// The `ffmpeg` `pix_fmt` name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::Gray16 => "gray16le",
            Self::Ya8 => "ya8",
            Self::Ya16 => "ya16le",
            Self::Gbrp => "gbrp",
            Self::Gbrp16 => "gbrp16le",
            Self::Gbrap => "gbrap",
            Self::Gbrap16 => "gbrap16le",
            Self::Rgb24 => "rgb24",
            Self::Rgb48 => "rgb48le",
        }
    }

    /// Channels per pixel.
    pub fn channels(self) -> usize {
        match self {
            Self::Gray | Self::Gray16 => 1,
            Self::Ya8 | Self::Ya16 => 2,
            Self::Gbrp | Self::Gbrp16 | Self::Rgb24 | Self::Rgb48 => 3,
            Self::Gbrap | Self::Gbrap16 => 4,
        }
    }

    /// Sample depth.
    pub fn bit_depth(self) -> BitDepth {
        match self {
            Self::Gray | Self::Ya8 | Self::Gbrp | Self::Gbrap | Self::Rgb24 => BitDepth::Eight,
            Self::Gray16 | Self::Ya16 | Self::Gbrp16 | Self::Gbrap16 | Self::Rgb48 => {
                BitDepth::Sixteen
            }
        }
    }

    /// Whether channels are stored as separate planes. Single-channel formats count as planar.
    pub fn is_planar(self) -> bool {
        !matches!(self, Self::Ya8 | Self::Ya16 | Self::Rgb24 | Self::Rgb48)
    }

    /// Bytes per sample (1 or 2).
    pub fn bytes_per_sample(self) -> usize {
        match self.bit_depth() {
            BitDepth::Eight => 1,
            BitDepth::Sixteen => 2,
        }
    }

    /// Bytes in one `width x height` frame.
    pub fn frame_bytes(self, width: usize, height: usize) -> usize {
        width * height * self.channels() * self.bytes_per_sample()
    }

    /// Default layout for `channels` samples of `bit_depth`: planar wherever a planar format exists.
    pub fn for_layout(channels: usize, bit_depth: BitDepth) -> TabvidResult<Self> {
        let fmt = match (channels, bit_depth) {
            (1, BitDepth::Eight) => Self::Gray,
            (1, BitDepth::Sixteen) => Self::Gray16,
            (2, BitDepth::Eight) => Self::Ya8,
            (2, BitDepth::Sixteen) => Self::Ya16,
            (3, BitDepth::Eight) => Self::Gbrp,
            (3, BitDepth::Sixteen) => Self::Gbrp16,
            (4, BitDepth::Eight) => Self::Gbrap,
            (4, BitDepth::Sixteen) => Self::Gbrap16,
            (c, _) => {
                return Err(TabvidError::validation(format!(
                    "no pixel format carries {c} channels (supported: 1 to 4)"
                )));
            }
        };
        Ok(fmt)
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = TabvidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL.iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| TabvidError::validation(format!("unknown pixel format '{s}'")))
    }
}

impl TryFrom<String> for PixelFormat {
    type Error = TabvidError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PixelFormat> for String {
    fn from(f: PixelFormat) -> Self {
        f.name().to_string()
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/frame/pixel_format.rs"]
mod tests;
