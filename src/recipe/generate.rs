use std::collections::BTreeSet;

use crate::foundation::core::{DType, Shape};
use crate::foundation::error::{TabvidError, TabvidResult};
use crate::foundation::math::min_max_ignoring_nan;
use crate::quantize::normalize::{BitDepth, ValueRange};
use crate::recipe::rule::{CodecOptions, ConversionRule, NanFill, Recipe, validate_name};
use crate::table::Table;

/// Knobs for [`generate`].
#[derive(Clone, Debug, Default)]
pub struct GeneratorOptions {
    /// Codec options copied into every rule.
    pub codec_options: CodecOptions,
    /// Force one bit depth; by default floats get 16 bits and small integers 8.
    pub bit_depth: Option<BitDepth>,
}

/// Propose a recipe for `table` by grouping columns that share a name prefix.
///
/// `temp1, temp2, temp3` become one group `temp` laid out as `(rows, 1, 1, 3)`; any group whose
/// size is not a multiple of 3 is laid out single-channel. Groups keep first-appearance order and
/// members keep table order.
pub fn generate(table: &Table, opts: &GeneratorOptions) -> TabvidResult<Recipe> {
    let rows = table.rows();
    if table.columns().is_empty() || rows == 0 {
        return Err(TabvidError::validation(
            "cannot generate a recipe for an empty table",
        ));
    }

    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for name in table.column_names() {
        let prefix = group_prefix(name);
        match groups.iter_mut().find(|(p, _)| *p == prefix) {
            Some((_, members)) => members.push(name.to_string()),
            None => groups.push((prefix, vec![name.to_string()])),
        }
    }

    let mut recipe = Recipe::new();
    let mut used = BTreeSet::new();
    for (i, (prefix, columns)) in groups.into_iter().enumerate() {
        let name = unique_name(group_name(&prefix, i), &mut used);
        let rule = rule_for_group(table, columns, rows, opts)?;
        tracing::debug!(group = %name, columns = rule.columns.len(), shape = %rule.shape, "generated rule");
        recipe.insert(name, rule)?;
    }
    Ok(recipe)
}

fn rule_for_group(
    table: &Table,
    columns: Vec<String>,
    rows: usize,
    opts: &GeneratorOptions,
) -> TabvidResult<ConversionRule> {
    let n = columns.len();
    let channels = if n.is_multiple_of(3) { 3 } else { 1 };
    let shape = Shape::new(vec![rows, 1, n / channels, channels])?;

    let (values, dtype) = table.select_rows(&columns)?;
    let (min, max) = min_max_ignoring_nan(&values).unwrap_or((0.0, 0.0));
    let has_nan = values.iter().any(|v| v.is_nan());
    let bit_depth = opts
        .bit_depth
        .unwrap_or_else(|| default_bit_depth(dtype, min, max));

    let mut rule = ConversionRule::new(columns, shape)
        .bit_depth(bit_depth)
        .value_range(ValueRange::new(min, max)?);
    rule.codec_options = opts.codec_options.clone();
    if has_nan {
        rule = rule.nan_fill(NanFill::Mean);
    }
    Ok(rule)
}

fn default_bit_depth(dtype: DType, min: f64, max: f64) -> BitDepth {
    if !dtype.is_float() && min >= 0.0 && max <= f64::from(BitDepth::Eight.max_pixel()) {
        BitDepth::Eight
    } else {
        BitDepth::Sixteen
    }
}

fn group_prefix(column: &str) -> String {
    let prefix = column.trim_end_matches(|c: char| c.is_ascii_digit());
    if prefix.is_empty() {
        "col".to_string()
    } else {
        prefix.to_string()
    }
}

fn group_name(prefix: &str, index: usize) -> String {
    let trimmed: String = prefix
        .trim_end_matches(['_', '-', '.'])
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    if validate_name(&trimmed).is_ok() {
        trimmed
    } else {
        format!("group{index}")
    }
}

fn unique_name(base: String, used: &mut BTreeSet<String>) -> String {
    let mut name = base.clone();
    let mut k = 2;
    while used.contains(&name) {
        name = format!("{base}_{k}");
        k += 1;
    }
    used.insert(name.clone());
    name
}

#[cfg(test)]
#[path = "../../tests/unit/recipe/generate.rs"]
mod tests;
