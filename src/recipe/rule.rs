use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::foundation::core::Shape;
use crate::foundation::error::{TabvidError, TabvidResult};
use crate::frame::pixel_format::PixelFormat;
use crate::quantize::normalize::{BitDepth, ValueRange};
use crate::reduce::pca::check_components;

/// Codec used when a rule does not name one; the designated lossless codec.
pub const DEFAULT_CODEC: &str = "ffv1";

const KEY_CODEC: &str = "c:v";
const KEY_PIX_FMT: &str = "pix_fmt";
const KEY_CONTAINER: &str = "container";

/// Free-form codec options keyed like `ffmpeg` output options.
///
/// `c:v` names the codec, `pix_fmt` forces a pixel format and `container` forces the output
/// extension. Every other entry is forwarded to the codec as `-key value`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CodecOptions(BTreeMap<String, String>);

impl CodecOptions {
    /// Empty options (default codec).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing any previous value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up a raw option.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Codec identifier (`c:v`), defaulting to [`DEFAULT_CODEC`].
    pub fn codec(&self) -> &str {
        self.get(KEY_CODEC).unwrap_or(DEFAULT_CODEC)
    }

    /// Explicit pixel format, if one was forced.
    pub fn pixel_format(&self) -> TabvidResult<Option<PixelFormat>> {
        self.get(KEY_PIX_FMT).map(str::parse).transpose()
    }

    /// Explicit container extension, if one was forced.
    pub fn container(&self) -> Option<&str> {
        self.get(KEY_CONTAINER)
    }

    /// Options forwarded verbatim to the codec, in key order.
    pub fn extra_args(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(k, _)| ![KEY_CODEC, KEY_PIX_FMT, KEY_CONTAINER].contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Replacement policy for NaN cells, applied before normalization.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NanFill {
    /// Replace with a constant.
    Value(f64),
    /// Replace with the mean of the non-NaN values.
    Mean,
    /// Replace with the minimum of the non-NaN values.
    Min,
    /// Replace with the maximum of the non-NaN values.
    Max,
}

/// How one output array maps to source columns and how it is encoded.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConversionRule {
    /// Source columns in frame element order.
    pub columns: Vec<String>,
    /// `(frames, ...spatial..., channels)`; one table row per frame.
    pub shape: Shape,
    /// Principal components to keep along the channel axis; `0` disables reduction.
    #[serde(default)]
    pub pca_components: usize,
    /// Codec selection and options.
    #[serde(default)]
    pub codec_options: CodecOptions,
    /// Pixel sample depth.
    #[serde(default = "default_bit_depth")]
    pub bit_depth: BitDepth,
    /// Declared value range; the observed range is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_range: Option<ValueRange>,
    /// NaN replacement; NaNs are a range violation when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nan_fill: Option<NanFill>,
}

/// Extensions owned by the sidecar and the staging files.
const RESERVED_CONTAINERS: [&str; 3] = ["json", "tmp", "partial"];

fn check_container(container: &str) -> TabvidResult<()> {
    if container.is_empty()
        || !container.chars().all(|c| c.is_ascii_alphanumeric())
        || RESERVED_CONTAINERS
            .iter()
            .any(|r| r.eq_ignore_ascii_case(container))
    {
        return Err(TabvidError::validation(format!(
            "container '{container}' is not a usable video extension"
        )));
    }
    Ok(())
}

fn default_bit_depth() -> BitDepth {
    BitDepth::Eight
}

impl ConversionRule {
    /// Rule with default codec, 8-bit depth, no reduction and an observed value range.
    pub fn new(columns: Vec<String>, shape: Shape) -> Self {
        Self {
            columns,
            shape,
            pca_components: 0,
            codec_options: CodecOptions::default(),
            bit_depth: default_bit_depth(),
            value_range: None,
            nan_fill: None,
        }
    }

    /// Keep `n` principal components.
    pub fn pca(mut self, n: usize) -> Self {
        self.pca_components = n;
        self
    }

    /// Set the pixel depth.
    pub fn bit_depth(mut self, bit_depth: BitDepth) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    /// Declare the value range.
    pub fn value_range(mut self, range: ValueRange) -> Self {
        self.value_range = Some(range);
        self
    }

    /// Set a codec option (`c:v`, `pix_fmt`, `container`, or a forwarded key).
    pub fn codec_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.codec_options = self.codec_options.set(key, value);
        self
    }

    /// Set the NaN replacement policy.
    pub fn nan_fill(mut self, fill: NanFill) -> Self {
        self.nan_fill = Some(fill);
        self
    }

    /// Channel count after optional reduction.
    pub fn packed_channels(&self) -> usize {
        if self.pca_components > 0 {
            self.pca_components
        } else {
            self.shape.channels()
        }
    }

    /// Static checks that need no data: column list, shape and component count.
    pub fn validate(&self) -> TabvidResult<()> {
        if self.columns.is_empty() {
            return Err(TabvidError::validation("rule selects no columns"));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = self.columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(TabvidError::validation(format!(
                "column '{dup}' is selected twice"
            )));
        }
        if self.shape.per_frame() != self.columns.len() {
            return Err(TabvidError::shape_mismatch(format!(
                "shape {} holds {} elements per frame but {} columns are selected",
                self.shape,
                self.shape.per_frame(),
                self.columns.len()
            )));
        }
        check_components(self.pca_components, self.shape.channels())?;
        if let Some(fmt) = self.codec_options.pixel_format()? {
            if fmt.channels() != self.packed_channels() {
                return Err(TabvidError::validation(format!(
                    "pix_fmt {fmt} carries {} channels, rule packs {}",
                    fmt.channels(),
                    self.packed_channels()
                )));
            }
            if fmt.bit_depth() != self.bit_depth {
                return Err(TabvidError::validation(format!(
                    "pix_fmt {fmt} is {}-bit, rule declares {}-bit",
                    fmt.bit_depth().bits(),
                    self.bit_depth.bits()
                )));
            }
        }
        if let Some(container) = self.codec_options.container() {
            check_container(container)?;
        }
        if let Some(NanFill::Value(v)) = self.nan_fill
            && !v.is_finite()
        {
            return Err(TabvidError::validation("nan_fill value must be finite"));
        }
        Ok(())
    }

    /// Pixel format used to pack this rule: the forced one, or the planar default.
    pub fn pixel_format(&self) -> TabvidResult<PixelFormat> {
        match self.codec_options.pixel_format()? {
            Some(fmt) => Ok(fmt),
            None => PixelFormat::for_layout(self.packed_channels(), self.bit_depth),
        }
    }
}

/// Named conversion rules; each entry produces one video and one sidecar.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Recipe(BTreeMap<String, ConversionRule>);

impl Recipe {
    /// Empty recipe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule under a unique, filesystem-safe name.
    pub fn insert(&mut self, name: impl Into<String>, rule: ConversionRule) -> TabvidResult<()> {
        let name = name.into();
        validate_name(&name)?;
        if self.0.contains_key(&name) {
            return Err(TabvidError::validation(format!(
                "duplicate rule name '{name}'"
            )));
        }
        self.0.insert(name, rule);
        Ok(())
    }

    /// Builder-style [`Recipe::insert`].
    pub fn with(mut self, name: impl Into<String>, rule: ConversionRule) -> TabvidResult<Self> {
        self.insert(name, rule)?;
        Ok(self)
    }

    /// Look up a rule.
    pub fn get(&self, name: &str) -> Option<&ConversionRule> {
        self.0.get(name)
    }

    /// Rules in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConversionRule)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the recipe has no rules.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check every rule name; rule bodies are validated when they run.
    pub fn validate_names(&self) -> TabvidResult<()> {
        self.0.keys().try_for_each(|k| validate_name(k))
    }

    /// Parse a recipe from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> TabvidResult<Self> {
        let recipe: Self = serde_json::from_reader(r)
            .map_err(|e| TabvidError::validation(format!("parse recipe JSON: {e}")))?;
        recipe.validate_names()?;
        Ok(recipe)
    }

    /// Parse a recipe from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> TabvidResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            TabvidError::validation(format!("open recipe JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Pretty JSON rendering.
    pub fn to_json_string(&self) -> TabvidResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TabvidError::serde(format!("serialize recipe: {e}")))
    }
}

/// Rule names become file stems; reject anything that could escape the job directory.
pub(crate) fn validate_name(name: &str) -> TabvidResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control)
    {
        return Err(TabvidError::validation(format!(
            "'{name}' is not a valid array name"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/recipe/rule.rs"]
mod tests;
