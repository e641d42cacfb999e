use super::*;

fn index(prefix: &str, dtype: DataType) -> (std::path::PathBuf, ColumnIndex) {
    let dir = temp_dir(prefix);
    std::fs::create_dir_all(&dir).unwrap();
    let idx = ColumnIndex::create(dir.join("id.idx"), "id", dtype).unwrap();
    (dir, idx)
}

#[test]
fn point_lookup_and_delete() -> anyhow::Result<()> {
    let (_dir, mut idx) = index("idx_point", DataType::Integer);
    idx.insert(&Value::Integer(7), 0)?;
    idx.insert(&Value::Integer(3), 10)?;
    assert_eq!(idx.search(&Value::Integer(7))?, Some(0));
    assert_eq!(idx.search(&Value::Integer(99))?, None);

    assert!(idx.delete(&Value::Integer(7))?);
    assert_eq!(idx.search(&Value::Integer(7))?, None);
    assert_eq!(idx.len()?, 1);
    Ok(())
}

#[test]
fn range_walks_keys_in_order() -> anyhow::Result<()> {
    let (_dir, mut idx) = index("idx_range", DataType::Integer);
    for (key, loc) in [(30, 0), (10, 10), (20, 20), (40, 30)] {
        idx.insert(&Value::Integer(key), loc)?;
    }
    assert_eq!(idx.range(None, None)?, vec![10, 20, 0, 30]);
    assert_eq!(idx.range(Some(&Value::Integer(20)), Some(&Value::Integer(30)))?, vec![20, 0]);
    assert_eq!(idx.range(Some(&Value::Integer(25)), None)?, vec![0, 30]);
    assert_eq!(idx.range(None, Some(&Value::Integer(10)))?, vec![10]);
    assert!(idx.range(Some(&Value::Integer(40)), Some(&Value::Integer(10)))?.is_empty());
    assert!(matches!(idx.range(Some(&Value::Null), None), Err(DbError::InvalidArgument(_))));
    Ok(())
}

#[test]
fn snapshot_is_written_only_on_flush() -> anyhow::Result<()> {
    let (dir, mut idx) = index("idx_flush", DataType::Float);
    idx.insert(&Value::Float(1.5), 0)?;
    idx.insert(&Value::Float(-2.0), 5)?;
    assert!(idx.is_dirty());

    let mut reread = ColumnIndex::new(dir.join("id.idx"), "id", DataType::Float);
    assert!(reread.is_empty()?);

    idx.flush()?;
    assert!(!idx.is_dirty());
    let mut reread = ColumnIndex::new(dir.join("id.idx"), "id", DataType::Float);
    assert_eq!(reread.range(None, None)?, vec![5, 0]);

    let snapshot: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(dir.join("id.idx"))?)?;
    assert_eq!(snapshot["column"], "id");
    assert_eq!(snapshot["data_type"], "FLOAT");
    assert_eq!(snapshot["location_type"], "u64");
    assert_eq!(snapshot["entries"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test]
fn snapshot_for_another_type_is_refused() {
    let (dir, mut idx) = index("idx_mismatch", DataType::Integer);
    idx.insert(&Value::Integer(1), 0).unwrap();
    idx.flush().unwrap();

    let mut wrong = ColumnIndex::new(dir.join("id.idx"), "id", DataType::String);
    assert!(matches!(wrong.load(), Err(DbError::Decoding(_))));
}

#[test]
fn null_keys_are_skipped() -> anyhow::Result<()> {
    let (_dir, mut idx) = index("idx_null", DataType::Integer);
    idx.insert(&Value::Null, 0)?;
    assert!(idx.is_empty()?);
    Ok(())
}
