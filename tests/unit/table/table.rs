use super::*;

fn sample() -> Table {
    Table::new(vec![
        Column::new("a0", DType::Float32, vec![1.0, 2.0, 3.0]),
        Column::new("a1", DType::Float32, vec![4.0, 5.0, 6.0]),
        Column::new("b", DType::Int32, vec![7.0, 8.0, 9.0]),
    ])
    .unwrap()
}

#[test]
fn rejects_duplicate_names_and_ragged_columns() {
    let dup = Table::new(vec![
        Column::new("x", DType::Float64, vec![1.0]),
        Column::new("x", DType::Float64, vec![2.0]),
    ]);
    assert!(matches!(dup, Err(TabvidError::Validation(_))));

    let ragged = Table::new(vec![
        Column::new("x", DType::Float64, vec![1.0]),
        Column::new("y", DType::Float64, vec![2.0, 3.0]),
    ]);
    assert!(ragged.is_err());
}

#[test]
fn select_rows_is_row_major_and_reports_common_dtype() {
    let t = sample();
    let (block, dtype) = t.select_rows(&["a1".into(), "a0".into()]).unwrap();
    assert_eq!(block, vec![4.0, 1.0, 5.0, 2.0, 6.0, 3.0]);
    assert_eq!(dtype, DType::Float32);

    let (_, mixed) = t.select_rows(&["a0".into(), "b".into()]).unwrap();
    assert_eq!(mixed, DType::Float64);

    assert!(t.select_rows(&["missing".into()]).is_err());
}

#[test]
fn from_rows_inverts_select_rows() {
    let t = sample();
    let names: Vec<String> = vec!["a0".into(), "a1".into()];
    let (block, dtype) = t.select_rows(&names).unwrap();
    let back = Table::from_rows(&names, dtype, &block).unwrap();
    assert_eq!(back.columns(), &t.columns()[..2]);
    assert_eq!(back.cell("a1", 2), Some(6.0));
}

#[test]
fn json_round_trip_keeps_nan_and_order() {
    let t = Table::new(vec![
        Column::new("z", DType::Float64, vec![f64::NAN, 1.5]),
        Column::new("a", DType::UInt8, vec![3.0, 4.0]),
    ])
    .unwrap();
    let s = serde_json::to_string(&t).unwrap();
    assert!(s.contains("null"));
    let back = Table::from_reader(s.as_bytes()).unwrap();
    assert_eq!(back.column_names().collect::<Vec<_>>(), vec!["z", "a"]);
    assert!(back.cell("z", 0).unwrap().is_nan());
    assert_eq!(back.cell("z", 1), Some(1.5));
}

#[test]
fn json_rejects_duplicate_columns() {
    let s = r#"{"columns":[{"name":"x","dtype":"float64","values":[1]},{"name":"x","dtype":"float64","values":[2]}]}"#;
    assert!(Table::from_reader(s.as_bytes()).is_err());
}
