use super::*;

#[test]
fn instance_creates_lists_and_drops_databases() -> anyhow::Result<()> {
    let inst = instance("inst_lifecycle");
    assert!(inst.list_databases()?.is_empty());

    inst.create_database("zeta")?.close()?;
    inst.create_database("alpha")?.close()?;
    assert_eq!(inst.list_databases()?, vec!["alpha", "zeta"]);
    assert!(inst.database_exists("alpha"));
    assert!(!inst.database_exists("beta"));

    assert!(matches!(inst.create_database("alpha"), Err(DbError::AlreadyExists(_))));
    assert!(matches!(inst.open_database("beta"), Err(DbError::NotFound(_))));

    inst.drop_database("alpha")?;
    assert!(!inst.database_exists("alpha"));
    assert!(matches!(inst.drop_database("alpha"), Err(DbError::NotFound(_))));
    assert_eq!(inst.list_databases()?, vec!["zeta"]);
    Ok(())
}

#[test]
fn database_names_must_be_identifiers() {
    let inst = instance("inst_names");
    for bad in ["", "has space", "../escape", "a/b"] {
        assert!(matches!(inst.create_database(bad), Err(DbError::InvalidArgument(_))), "{bad:?}");
        assert!(!inst.database_exists(bad));
    }
}

#[test]
fn descriptor_files_are_laid_out_per_database() -> anyhow::Result<()> {
    let inst = instance("inst_layout");
    let mut db = inst.create_database("shop")?;
    with_people(&mut db);
    let dir = db.path().to_path_buf();
    assert_eq!(dir, inst.config().root.join("shop"));
    assert!(dir.join("database.json").is_file());
    assert!(dir.join("tables/people/data.bin").is_file());
    assert!(dir.join("tables/people/table.json").is_file());
    assert!(dir.join("tables/people/city.idx").is_file());

    let descriptor: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(dir.join("database.json"))?)?;
    assert_eq!(descriptor["name"], "shop");
    Ok(())
}

#[test]
fn data_survives_close_and_reopen() -> anyhow::Result<()> {
    let inst = instance("inst_reopen");
    {
        let mut db = inst.create_database("shop")?;
        with_people(&mut db);
        let bob = Predicate::from(Condition::eq("id", 2));
        db.update(None, "people", &[("age", 36.into())], Some(&bob), false)?;
        db.close()?;
    }

    let mut db = inst.open_database("shop")?;
    assert_eq!(db.name(), "shop");
    assert_eq!(db.table_names(), vec!["people"]);
    let schema = db.schema("people")?;
    assert_eq!(schema.primary_key.as_deref(), Some("id"));
    assert!(!schema.columns[1].is_nullable);

    let by_id = OrderBy::asc("id");
    let rs = db.select(None, "people", &Query::all().order_by(&by_id))?;
    assert_eq!(ints(&rs, "id"), vec![1, 2, 3, 4, 5]);
    assert_eq!(db.lookup(None, "people", "age", 36)?.len(), 1);
    assert!(db.lookup(None, "people", "age", 35)?.is_empty());

    // constraints still bite after reopening
    let err = db
        .insert(None, "people", vec![1.into(), "Dup".into(), Value::Null, Value::Null])
        .unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");
    Ok(())
}

#[test]
fn dropping_the_handle_flushes_indexes() -> anyhow::Result<()> {
    let inst = instance("inst_drop_flush");
    {
        let mut db = inst.create_database("shop")?;
        with_people(&mut db);
    }
    let snapshot = inst.config().root.join("shop/tables/people/id.idx");
    let parsed: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(snapshot)?)?;
    assert_eq!(parsed["entries"].as_array().map(Vec::len), Some(5));
    Ok(())
}

#[test]
fn dropped_table_is_gone_after_reopen() -> anyhow::Result<()> {
    let inst = instance("inst_drop_table");
    {
        let mut db = inst.create_database("shop")?;
        with_people(&mut db);
        db.drop_table("people")?;
        assert!(!db.path().join("tables/people").exists());
    }
    let db = inst.open_database("shop")?;
    assert!(db.table_names().is_empty());
    assert!(matches!(db.schema("people"), Err(DbError::NotFound(_))));
    Ok(())
}

#[test]
fn failed_table_drop_keeps_the_catalog_entry() -> anyhow::Result<()> {
    let mut db = test_db("inst_drop_fail");
    with_people(&mut db);
    std::fs::remove_dir_all(db.path().join("tables/people"))?;

    let err = db.drop_table("people").unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)), "{err}");
    assert_eq!(db.table_names(), vec!["people"]);
    assert!(db.schema("people").is_ok());

    let raw = std::fs::read_to_string(db.path().join("database.json"))?;
    let descriptor: serde_json::Value = serde_json::from_str(&raw)?;
    assert_eq!(descriptor["tables"][0]["name"], "people");
    Ok(())
}

#[test]
fn config_loads_from_json_with_defaults() -> anyhow::Result<()> {
    let dir = temp_dir("config_json");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("engine.json");
    std::fs::write(&path, format!(r#"{{"root": "{}", "transaction_log": false}}"#, dir.join("data").display()))?;

    let config = EngineConfig::from_json_file(&path)?;
    assert_eq!(config.root, dir.join("data"));
    assert!(config.flush_on_commit);
    assert!(!config.transaction_log);

    let inst = Instance::new(config)?;
    let db = inst.create_database("quiet")?;
    db.begin()?;
    assert!(!db.path().join("transaction.log").exists());

    std::fs::write(&path, "{ \"flush_on_commit\": true }")?;
    assert!(EngineConfig::from_json_file(&path).is_err());
    Ok(())
}
