use crate::foundation::core::{Array, Shape};
use crate::foundation::error::{TabvidError, TabvidResult};
use crate::frame::pixel_format::PixelFormat;

/// Frame count and per-frame layout of a sequence, enough to decode raw codec output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameGeometry {
    /// Number of frames.
    pub frames: usize,
    /// Frame width in pixels.
    pub width: usize,
    /// Frame height in pixels.
    pub height: usize,
    /// Raw pixel layout.
    pub pixel_format: PixelFormat,
}

impl FrameGeometry {
    /// Geometry implied by an array shape.
    ///
    /// No spatial dims gives 1x1 frames, one spatial dim `n` gives `n`x1, more fold every
    /// spatial dim but the last into the height.
    pub fn for_shape(shape: &Shape, pixel_format: PixelFormat) -> Self {
        let (height, width) = match shape.spatial() {
            [] => (1, 1),
            [n] => (1, *n),
            [rest @ .., w] => (rest.iter().product(), *w),
        };
        Self {
            frames: shape.frames(),
            width,
            height,
            pixel_format,
        }
    }

    /// Bytes in one frame.
    pub fn frame_bytes(&self) -> usize {
        self.pixel_format.frame_bytes(self.width, self.height)
    }
}

/// Ordered frames of identical geometry in the codec's raw byte layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSequence {
    /// Frame width in pixels.
    pub width: usize,
    /// Frame height in pixels.
    pub height: usize,
    /// Raw pixel layout.
    pub pixel_format: PixelFormat,
    /// Frame bytes in timeline order.
    pub frames: Vec<Vec<u8>>,
}

impl FrameSequence {
    /// Geometry of this sequence.
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry {
            frames: self.frames.len(),
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
        }
    }

    /// Split a contiguous raw byte stream into frames of `geometry`.
    pub fn from_raw(geometry: FrameGeometry, raw: &[u8]) -> TabvidResult<Self> {
        let frame_bytes = geometry.frame_bytes();
        if frame_bytes == 0 || raw.len() != frame_bytes * geometry.frames {
            return Err(TabvidError::shape_mismatch(format!(
                "raw stream holds {} bytes, expected {} frames of {frame_bytes} bytes",
                raw.len(),
                geometry.frames
            )));
        }
        Ok(Self {
            width: geometry.width,
            height: geometry.height,
            pixel_format: geometry.pixel_format,
            frames: raw.chunks_exact(frame_bytes).map(<[u8]>::to_vec).collect(),
        })
    }
}

fn write_sample(dst: &mut Vec<u8>, v: u16, fmt: PixelFormat) {
    match fmt.bytes_per_sample() {
        1 => dst.push(v as u8),
        _ => dst.extend_from_slice(&v.to_le_bytes()),
    }
}

fn read_sample(src: &[u8], idx: usize, bytes: usize) -> u16 {
    if bytes == 1 {
        u16::from(src[idx])
    } else {
        u16::from_le_bytes([src[2 * idx], src[2 * idx + 1]])
    }
}

/// Lay out a `(frames, ...spatial..., channels)` array as raw frames of `pixel_format`.
///
/// The channel count must equal the pixel format's; nothing is padded.
pub fn pack(array: &Array<u16>, pixel_format: PixelFormat) -> TabvidResult<FrameSequence> {
    let shape = array.shape();
    if array.data().is_empty() {
        return Err(TabvidError::validation("cannot pack an empty array"));
    }
    let channels = shape.channels();
    if channels != pixel_format.channels() {
        return Err(TabvidError::validation(format!(
            "array has {channels} channels but pixel format {pixel_format} carries {}; \
             channels are never padded",
            pixel_format.channels()
        )));
    }
    let max = pixel_format.bit_depth().max_pixel();
    if let Some(v) = array.data().iter().find(|v| **v > max) {
        return Err(TabvidError::validation(format!(
            "sample {v} does not fit {pixel_format}"
        )));
    }

    let geom = FrameGeometry::for_shape(shape, pixel_format);
    let pixels = geom.width * geom.height;
    let frame_len = pixels * channels;

    let frames = array
        .data()
        .chunks_exact(frame_len)
        .map(|frame| {
            let mut out = Vec::with_capacity(geom.frame_bytes());
            if pixel_format.is_planar() {
                for c in 0..channels {
                    for p in 0..pixels {
                        write_sample(&mut out, frame[p * channels + c], pixel_format);
                    }
                }
            } else {
                for &v in frame {
                    write_sample(&mut out, v, pixel_format);
                }
            }
            out
        })
        .collect();

    Ok(FrameSequence {
        width: geom.width,
        height: geom.height,
        pixel_format,
        frames,
    })
}

/// Inverse of [`pack`]: rebuild the array with the declared `shape`.
pub fn unpack(seq: &FrameSequence, shape: &Shape) -> TabvidResult<Array<u16>> {
    let expected = FrameGeometry::for_shape(shape, seq.pixel_format);
    if seq.geometry() != expected {
        return Err(TabvidError::shape_mismatch(format!(
            "decoded {} frames of {}x{} {}, expected {} frames of {}x{} for shape {shape}",
            seq.frames.len(),
            seq.width,
            seq.height,
            seq.pixel_format,
            expected.frames,
            expected.width,
            expected.height
        )));
    }
    let channels = shape.channels();
    if channels != seq.pixel_format.channels() {
        return Err(TabvidError::shape_mismatch(format!(
            "shape {shape} declares {channels} channels, pixel format {} carries {}",
            seq.pixel_format,
            seq.pixel_format.channels()
        )));
    }

    let pixels = expected.width * expected.height;
    let bytes = seq.pixel_format.bytes_per_sample();
    let mut data = Vec::with_capacity(shape.len());
    for (i, frame) in seq.frames.iter().enumerate() {
        if frame.len() != expected.frame_bytes() {
            return Err(TabvidError::shape_mismatch(format!(
                "frame {i} holds {} bytes, expected {}",
                frame.len(),
                expected.frame_bytes()
            )));
        }
        if seq.pixel_format.is_planar() {
            for p in 0..pixels {
                for c in 0..channels {
                    data.push(read_sample(frame, c * pixels + p, bytes));
                }
            }
        } else {
            data.extend((0..pixels * channels).map(|idx| read_sample(frame, idx, bytes)));
        }
    }
    Array::new(shape.clone(), data)
}

#[cfg(test)]
#[path = "../../tests/unit/frame/pack.rs"]
mod tests;
