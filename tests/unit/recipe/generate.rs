use super::*;
use crate::table::Column;

fn col(name: &str, dtype: DType, values: Vec<f64>) -> Column {
    Column::new(name, dtype, values)
}

fn sample_table() -> Table {
    Table::new(vec![
        col("temp1", DType::Float64, vec![1.0, 2.0]),
        col("id", DType::UInt8, vec![3.0, 4.0]),
        col("temp2", DType::Float64, vec![0.5, 9.0]),
        col("temp3", DType::Float64, vec![-1.0, 3.0]),
        col("count", DType::Int32, vec![0.0, 70_000.0]),
    ])
    .unwrap()
}

#[test]
fn groups_by_prefix_in_first_appearance_order() {
    let recipe = generate(&sample_table(), &GeneratorOptions::default()).unwrap();
    assert_eq!(recipe.len(), 3);

    let temp = recipe.get("temp").unwrap();
    assert_eq!(temp.columns, vec!["temp1", "temp2", "temp3"]);
    assert_eq!(temp.shape.dims(), &[2, 1, 1, 3]);
    assert_eq!(temp.value_range, Some(ValueRange::new(-1.0, 9.0).unwrap()));
    assert_eq!(temp.bit_depth, BitDepth::Sixteen);
    assert_eq!(temp.pca_components, 0);
    temp.validate().unwrap();

    let id = recipe.get("id").unwrap();
    assert_eq!(id.shape.dims(), &[2, 1, 1, 1]);
    assert_eq!(id.bit_depth, BitDepth::Eight);

    assert_eq!(recipe.get("count").unwrap().bit_depth, BitDepth::Sixteen);
}

#[test]
fn numeric_names_fall_into_col_group() {
    let t = Table::new(vec![
        col("0", DType::Float32, vec![1.0]),
        col("1", DType::Float32, vec![2.0]),
    ])
    .unwrap();
    let recipe = generate(&t, &GeneratorOptions::default()).unwrap();
    let rule = recipe.get("col").unwrap();
    assert_eq!(rule.columns, vec!["0", "1"]);
    assert_eq!(rule.shape.dims(), &[1, 1, 2, 1]);
}

#[test]
fn separators_are_trimmed_and_names_made_unique() {
    let t = Table::new(vec![
        col("a_1", DType::Float64, vec![1.0]),
        col("a-1", DType::Float64, vec![1.0]),
        col("__1", DType::Float64, vec![1.0]),
    ])
    .unwrap();
    let recipe = generate(&t, &GeneratorOptions::default()).unwrap();
    let names: Vec<_> = recipe.iter().map(|(n, _)| n.to_string()).collect();
    assert_eq!(names, vec!["a", "a_2", "group2"]);
}

#[test]
fn nan_columns_get_a_fill_policy() {
    let t = Table::new(vec![col("x", DType::Float64, vec![f64::NAN, 2.0, 4.0])]).unwrap();
    let rule = generate(&t, &GeneratorOptions::default())
        .unwrap()
        .get("x")
        .cloned()
        .unwrap();
    assert_eq!(rule.nan_fill, Some(NanFill::Mean));
    assert_eq!(rule.value_range, Some(ValueRange::new(2.0, 4.0).unwrap()));

    let all_nan = Table::new(vec![col("y", DType::Float64, vec![f64::NAN])]).unwrap();
    let rule = generate(&all_nan, &GeneratorOptions::default()).unwrap();
    assert_eq!(
        rule.get("y").unwrap().value_range,
        Some(ValueRange::new(0.0, 0.0).unwrap())
    );
}

#[test]
fn options_override_codec_and_depth() {
    let opts = GeneratorOptions {
        codec_options: CodecOptions::new().set("c:v", "libx264"),
        bit_depth: Some(BitDepth::Eight),
    };
    let recipe = generate(&sample_table(), &opts).unwrap();
    for (_, rule) in recipe.iter() {
        assert_eq!(rule.bit_depth, BitDepth::Eight);
        assert_eq!(rule.codec_options.codec(), "libx264");
    }
}

#[test]
fn generation_is_deterministic() {
    let t = sample_table();
    let a = generate(&t, &GeneratorOptions::default()).unwrap();
    let b = generate(&t, &GeneratorOptions::default()).unwrap();
    assert_eq!(a.to_json_string().unwrap(), b.to_json_string().unwrap());
}

#[test]
fn empty_table_is_rejected() {
    assert!(generate(&Table::default(), &GeneratorOptions::default()).is_err());
}
