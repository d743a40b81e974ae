use crate::foundation::error::{TabvidError, TabvidResult};

/// Array shape interpreted as `(frames, ...spatial..., channels)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Create a validated shape: at least two dimensions, all strictly positive.
    pub fn new(dims: Vec<usize>) -> TabvidResult<Self> {
        if dims.len() < 2 {
            return Err(TabvidError::shape_mismatch(format!(
                "shape {dims:?} must have at least a frame and a channel dimension"
            )));
        }
        if dims.contains(&0) {
            return Err(TabvidError::shape_mismatch(format!(
                "shape {dims:?} must not contain zero-sized dimensions"
            )));
        }
        Ok(Self(dims))
    }

    /// Borrow the raw dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of frames (leading dimension).
    pub fn frames(&self) -> usize {
        self.0[0]
    }

    /// Number of channels (trailing dimension).
    pub fn channels(&self) -> usize {
        self.0[self.0.len() - 1]
    }

    /// Spatial dimensions between the frame and channel axes.
    pub fn spatial(&self) -> &[usize] {
        &self.0[1..self.0.len() - 1]
    }

    /// Elements in one frame, i.e. `product(shape[1..])`.
    pub fn per_frame(&self) -> usize {
        self.0[1..].iter().product()
    }

    /// Total element count.
    pub fn len(&self) -> usize {
        self.0.iter().product()
    }

    /// Shapes are never empty once validated; provided for clippy symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Same shape with the channel axis replaced.
    pub fn with_channels(&self, channels: usize) -> TabvidResult<Self> {
        let mut dims = self.0.clone();
        let last = dims.len() - 1;
        dims[last] = channels;
        Self::new(dims)
    }
}

impl TryFrom<Vec<usize>> for Shape {
    type Error = TabvidError;

    fn try_from(dims: Vec<usize>) -> Result<Self, Self::Error> {
        Self::new(dims)
    }
}

impl From<Shape> for Vec<usize> {
    fn from(s: Shape) -> Self {
        s.0
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Dense row-major n-dimensional array.
#[derive(Clone, Debug, PartialEq)]
pub struct Array<T> {
    shape: Shape,
    data: Vec<T>,
}

impl<T> Array<T> {
    /// Wrap `data` with `shape`, checking the element count.
    pub fn new(shape: Shape, data: Vec<T>) -> TabvidResult<Self> {
        if shape.len() != data.len() {
            return Err(TabvidError::shape_mismatch(format!(
                "shape {shape} holds {} elements, got {}",
                shape.len(),
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Borrow the shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Borrow the elements in row-major order.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Consume the array and return its elements.
    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Number of `(channels)`-long samples, i.e. the row count of the `(samples, channels)` view.
    pub fn samples(&self) -> usize {
        self.data.len() / self.shape.channels()
    }

    /// Elementwise map preserving the shape.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Array<U> {
        Array {
            shape: self.shape.clone(),
            data: self.data.iter().map(f).collect(),
        }
    }
}

/// Original element type of a column group, restored on decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 32-bit IEEE float.
    Float32,
    /// 64-bit IEEE float.
    Float64,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
}

impl DType {
    /// Whether values of this type are floating point.
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Bytes per element in the source representation.
    pub fn size_bytes(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Float32 | Self::Int32 | Self::UInt32 => 4,
            Self::Float64 | Self::Int64 | Self::UInt64 => 8,
        }
    }

    /// Inclusive representable range for integer types, `None` for floats.
    pub fn integer_bounds(self) -> Option<(f64, f64)> {
        match self {
            Self::Float32 | Self::Float64 => None,
            Self::Int8 => Some((i8::MIN as f64, i8::MAX as f64)),
            Self::Int16 => Some((i16::MIN as f64, i16::MAX as f64)),
            Self::Int32 => Some((i32::MIN as f64, i32::MAX as f64)),
            Self::Int64 => Some((i64::MIN as f64, i64::MAX as f64)),
            Self::UInt8 => Some((0.0, u8::MAX as f64)),
            Self::UInt16 => Some((0.0, u16::MAX as f64)),
            Self::UInt32 => Some((0.0, u32::MAX as f64)),
            Self::UInt64 => Some((0.0, u64::MAX as f64)),
        }
    }

    /// Coerce a reconstructed value back into this type's value set.
    ///
    /// Integers are rounded and clamped, `Float32` is rounded through `f32`.
    pub fn coerce(self, v: f64) -> f64 {
        match self {
            Self::Float64 => v,
            Self::Float32 => v as f32 as f64,
            _ => match self.integer_bounds() {
                Some((lo, hi)) if v.is_finite() => v.round().clamp(lo, hi),
                _ => v,
            },
        }
    }

    /// Common type of a column group: the shared type, or `Float64` when mixed.
    pub fn common(types: impl IntoIterator<Item = DType>) -> Option<DType> {
        let mut it = types.into_iter();
        let first = it.next()?;
        if it.all(|t| t == first) {
            Some(first)
        } else {
            Some(Self::Float64)
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
