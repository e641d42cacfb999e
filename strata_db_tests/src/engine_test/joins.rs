use super::*;

/// orders(id, user_id) = (1,10),(2,99); users(id, name) = (10,"Ann"),(20,"Bo")
fn shop(prefix: &str) -> Database {
    let mut db = test_db(prefix);
    db.create_table(TableDef::new(
        "orders",
        vec![Column::new("id", DataType::Integer), Column::new("user_id", DataType::Integer)],
    ))
    .unwrap();
    db.create_table(TableDef::new(
        "users",
        vec![Column::new("id", DataType::Integer), Column::new("name", DataType::String)],
    ))
    .unwrap();
    db.insert(None, "orders", vec![1.into(), 10.into()]).unwrap();
    db.insert(None, "orders", vec![2.into(), 99.into()]).unwrap();
    db.insert(None, "users", vec![10.into(), "Ann".into()]).unwrap();
    db.insert(None, "users", vec![20.into(), "Bo".into()]).unwrap();
    db
}

fn row(values: [Value; 4]) -> Vec<Value> {
    values.to_vec()
}

#[test]
fn left_join_pads_unmatched_left_rows() -> anyhow::Result<()> {
    let mut db = shop("join_left");
    let spec = JoinSpec::new(JoinKind::Left, "orders", "user_id", "users", "id");
    let rs = db.join(None, &spec, &Query::all())?;
    assert_eq!(rs.columns, vec!["orders.id", "orders.user_id", "users.id", "users.name"]);
    assert_eq!(
        rs.rows,
        vec![
            row([1.into(), 10.into(), 10.into(), "Ann".into()]),
            row([2.into(), 99.into(), Value::Null, Value::Null]),
        ]
    );
    Ok(())
}

#[test]
fn inner_join_keeps_matches_only() -> anyhow::Result<()> {
    let mut db = shop("join_inner");
    let spec = JoinSpec::new(JoinKind::Inner, "orders", "orders.user_id", "users", "users.id");
    let rs = db.join(None, &spec, &Query::all())?;
    assert_eq!(rs.rows, vec![row([1.into(), 10.into(), 10.into(), "Ann".into()])]);
    Ok(())
}

#[test]
fn right_join_pads_unmatched_right_rows() -> anyhow::Result<()> {
    let mut db = shop("join_right");
    let spec = JoinSpec::new(JoinKind::Right, "orders", "user_id", "users", "id");
    let rs = db.join(None, &spec, &Query::all())?;
    assert_eq!(
        rs.rows,
        vec![
            row([1.into(), 10.into(), 10.into(), "Ann".into()]),
            row([Value::Null, Value::Null, 20.into(), "Bo".into()]),
        ]
    );
    Ok(())
}

#[test]
fn full_join_keeps_both_sides() -> anyhow::Result<()> {
    let mut db = shop("join_full");
    let spec = JoinSpec::new(JoinKind::Full, "orders", "user_id", "users", "id");
    let rs = db.join(None, &spec, &Query::all())?;
    assert_eq!(rs.len(), 3);
    assert_eq!(rs.rows[2], row([Value::Null, Value::Null, 20.into(), "Bo".into()]));
    Ok(())
}

#[test]
fn null_keys_never_match() -> anyhow::Result<()> {
    let mut db = shop("join_null");
    db.insert(None, "orders", vec![3.into(), Value::Null])?;
    db.insert(None, "users", vec![Value::Null, "Ghost".into()])?;
    let spec = JoinSpec::new(JoinKind::Inner, "orders", "user_id", "users", "id");
    assert_eq!(db.join(None, &spec, &Query::all())?.len(), 1);
    Ok(())
}

#[test]
fn filter_order_and_projection_apply_to_joined_rows() -> anyhow::Result<()> {
    let mut db = shop("join_query");
    let spec = JoinSpec::new(JoinKind::Left, "orders", "user_id", "users", "id");
    let cols = ["orders.id", "name"];
    let pred = Predicate::from(Condition::is_null("users.name"));
    let rs = db.join(None, &spec, &Query::all().columns(&cols).filter(&pred))?;
    assert_eq!(rs.columns, vec!["orders.id", "users.name"]);
    assert_eq!(rs.rows, vec![vec![Value::Integer(2), Value::Null]]);

    let desc = OrderBy::desc("orders.id");
    let rs = db.join(None, &spec, &Query::all().order_by(&desc).limit(1))?;
    assert_eq!(ints(&rs, "orders.id"), vec![2]);
    Ok(())
}

#[test]
fn bare_id_is_ambiguous_after_a_join() {
    let mut db = shop("join_ambiguous");
    let spec = JoinSpec::new(JoinKind::Inner, "orders", "user_id", "users", "id");
    let cols = ["id"];
    let err = db.join(None, &spec, &Query::all().columns(&cols)).unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)), "{err}");
}

#[test]
fn invalid_join_specs_are_refused() {
    let mut db = shop("join_invalid");
    let self_join = JoinSpec::new(JoinKind::Inner, "orders", "id", "orders", "user_id");
    assert!(matches!(db.join(None, &self_join, &Query::all()), Err(DbError::InvalidArgument(_))));

    let mixed = JoinSpec::new(JoinKind::Inner, "orders", "id", "users", "name");
    assert!(matches!(db.join(None, &mixed, &Query::all()), Err(DbError::InvalidArgument(_))));

    let missing = JoinSpec::new(JoinKind::Inner, "orders", "nope", "users", "id");
    assert!(matches!(db.join(None, &missing, &Query::all()), Err(DbError::NotFound(_))));

    let no_table = JoinSpec::new(JoinKind::Inner, "orders", "id", "ghosts", "id");
    assert!(matches!(db.join(None, &no_table, &Query::all()), Err(DbError::NotFound(_))));
}
