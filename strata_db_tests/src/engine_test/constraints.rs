use super::*;

fn accounts(prefix: &str) -> Database {
    let mut db = test_db(prefix);
    db.create_table(
        TableDef::new(
            "accounts",
            vec![
                Column::new("id", DataType::Integer),
                Column::new("email", DataType::String).not_null(),
                Column::new("handle", DataType::String),
                Column::new("active", DataType::Boolean).default_value(true),
                Column::new("since", DataType::Date).default_value("2024-01-01"),
            ],
        )
        .primary_key("id")
        .unique("handle"),
    )
    .unwrap();
    db
}

#[test]
fn duplicate_primary_key_leaves_the_table_untouched() {
    let mut db = accounts("cons_pk");
    db.insert_named(None, "accounts", &[("id", 1.into()), ("email", "a@x".into())])
        .unwrap();
    let err = db
        .insert_named(None, "accounts", &[("id", 1.into()), ("email", "b@x".into())])
        .unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");
    assert_eq!(db.row_count("accounts").unwrap(), 1);
    assert_eq!(db.index_len("accounts", "email").unwrap(), 1);
}

#[test]
fn primary_key_is_not_null() {
    let mut db = accounts("cons_pk_null");
    let err = db
        .insert(None, "accounts", vec![Value::Null, "a@x".into(), Value::Null, true.into(), Value::Null])
        .unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");
}

#[test]
fn not_null_column_refuses_null() {
    let mut db = accounts("cons_not_null");
    let err = db.insert_named(None, "accounts", &[("id", 1.into())]).unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");
    assert_eq!(db.row_count("accounts").unwrap(), 0);
}

#[test]
fn unique_allows_many_nulls_but_no_repeats() -> anyhow::Result<()> {
    let mut db = accounts("cons_unique");
    db.insert_named(None, "accounts", &[("id", 1.into()), ("email", "a".into())])?;
    db.insert_named(None, "accounts", &[("id", 2.into()), ("email", "b".into())])?;
    db.insert_named(None, "accounts", &[("id", 3.into()), ("email", "c".into()), ("handle", "cc".into())])?;
    let err = db
        .insert_named(None, "accounts", &[("id", 4.into()), ("email", "d".into()), ("handle", "cc".into())])
        .unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");
    assert_eq!(db.row_count("accounts")?, 3);
    Ok(())
}

#[test]
fn update_may_not_create_a_duplicate_key() -> anyhow::Result<()> {
    let mut db = accounts("cons_update_pk");
    db.insert_named(None, "accounts", &[("id", 1.into()), ("email", "a".into())])?;
    db.insert_named(None, "accounts", &[("id", 2.into()), ("email", "b".into())])?;

    let pred = Predicate::from(Condition::eq("id", 2));
    let err = db
        .update(None, "accounts", &[("id", 1.into())], Some(&pred), false)
        .unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");

    // two rows moving onto one key within the same statement
    let err = db.update(None, "accounts", &[("id", 7.into())], None, false).unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");

    // a row keeping its own key is fine
    let res = db.update(None, "accounts", &[("id", 2.into())], Some(&pred), false)?;
    assert_eq!(res.affected, 1);
    assert_eq!(ints(&db.select(None, "accounts", &Query::all())?, "id"), vec![1, 2]);
    Ok(())
}

#[test]
fn defaults_fill_omitted_columns() -> anyhow::Result<()> {
    let mut db = accounts("cons_defaults");
    db.insert_named(None, "accounts", &[("email", "a".into()), ("id", 9.into())])?;
    let rows = db.lookup(None, "accounts", "id", 9)?;
    assert_eq!(rows[0][2], Value::Null);
    assert_eq!(rows[0][3], Value::Boolean(true));
    assert_eq!(rows[0][4].to_string(), "2024-01-01");
    Ok(())
}

#[test]
fn named_insert_rejects_unknown_or_repeated_columns() {
    let mut db = accounts("cons_named");
    let err = db
        .insert_named(None, "accounts", &[("id", 1.into()), ("email", "a".into()), ("nick", "x".into())])
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)), "{err}");

    let err = db
        .insert_named(None, "accounts", &[("id", 1.into()), ("id", 2.into()), ("email", "a".into())])
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)), "{err}");
}

#[test]
fn wrong_arity_and_uncoercible_values_are_violations() {
    let mut db = accounts("cons_types");
    let err = db.insert(None, "accounts", vec![1.into(), "a".into()]).unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");

    let err = db
        .insert(None, "accounts", vec![1.into(), "a".into(), Value::Null, "maybe".into(), Value::Null])
        .unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");

    let err = db
        .insert(None, "accounts", vec![1.into(), "a".into(), Value::Null, true.into(), "31/12/2024".into()])
        .unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");
    assert_eq!(db.row_count("accounts").unwrap(), 0);
}

#[test]
fn overlong_string_is_rejected() {
    let mut db = accounts("cons_width");
    let err = db
        .insert_named(None, "accounts", &[("id", 1.into()), ("email", "someone.with.a.long@address.example".into())])
        .unwrap_err();
    assert!(matches!(err, DbError::Encoding(_) | DbError::ConstraintViolation(_)), "{err}");
    assert_eq!(db.row_count("accounts").unwrap(), 0);
}

#[test]
fn negative_zero_collides_with_zero_on_a_float_key() -> anyhow::Result<()> {
    let mut db = test_db("cons_float_zero");
    db.create_table(TableDef::new(
        "readings",
        vec![Column::new("level", DataType::Float).primary()],
    ))?;
    db.insert(None, "readings", vec![Value::Float(-0.0)])?;

    let err = db.insert(None, "readings", vec![Value::Float(0.0)]).unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");
    let err = db.insert(None, "readings", vec!["0".into()]).unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");
    assert_eq!(db.row_count("readings")?, 1);

    assert_eq!(db.lookup(None, "readings", "level", 0.0f32)?.len(), 1);
    let pred = Predicate::from(Condition::eq("level", 0.0f32));
    assert_eq!(db.select(None, "readings", &Query::all().filter(&pred))?.len(), 1);
    Ok(())
}

#[test]
fn float_past_the_integer_range_is_refused() -> anyhow::Result<()> {
    let mut db = test_db("cons_int_bound");
    db.create_table(TableDef::new("counters", vec![Column::new("n", DataType::Integer)]))?;

    for too_big in [2_147_483_648.0f32, -2_147_483_904.0] {
        let err = db.insert(None, "counters", vec![Value::Float(too_big)]).unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(_)), "{too_big}: {err}");
    }
    assert_eq!(db.row_count("counters")?, 0);

    db.insert(None, "counters", vec![Value::Float(-2_147_483_648.0)])?;
    db.insert(None, "counters", vec![Value::Float(2_147_483_520.0)])?;
    let rs = db.select(None, "counters", &Query::all())?;
    assert_eq!(ints(&rs, "n"), vec![i32::MIN, 2_147_483_520]);
    Ok(())
}

#[test]
fn default_must_fit_the_column_width() {
    let mut db = test_db("cons_default_width");
    let err = db
        .create_table(TableDef::new(
            "notes",
            vec![
                Column::new("id", DataType::Integer),
                Column::new("body", DataType::String).default_value("this default is far too long"),
            ],
        ))
        .unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");
    assert!(db.table_names().is_empty());
    assert!(!db.path().join("tables/notes").exists());
}
