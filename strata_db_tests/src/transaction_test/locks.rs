use super::*;
use std::sync::Arc;
use std::thread;

#[test]
fn exclusive_excludes_everyone_else() -> anyhow::Result<()> {
    let txns = TransactionManager::in_memory();
    let (a, b) = (txns.begin()?, txns.begin()?);

    assert!(txns.acquire_lock(a, "items", LockMode::Exclusive)?);
    assert!(!txns.acquire_lock(b, "items", LockMode::Shared)?);
    assert!(!txns.acquire_lock(b, "items", LockMode::Exclusive)?);
    // re-requesting a held lock is fine, and never downgrades
    assert!(txns.acquire_lock(a, "items", LockMode::Shared)?);
    assert_eq!(txns.lock_mode(a, "items"), Some(LockMode::Exclusive));
    // other resources are unaffected
    assert!(txns.acquire_lock(b, "orders", LockMode::Exclusive)?);
    Ok(())
}

#[test]
fn shared_locks_coexist_and_block_upgrades() -> anyhow::Result<()> {
    let txns = TransactionManager::in_memory();
    let (a, b) = (txns.begin()?, txns.begin()?);
    assert!(txns.acquire_lock(a, "items", LockMode::Shared)?);
    assert!(txns.acquire_lock(b, "items", LockMode::Shared)?);
    assert!(!txns.acquire_lock(a, "items", LockMode::Exclusive)?);

    assert!(txns.release_lock(b, "items")?);
    assert!(!txns.release_lock(b, "items")?);
    assert!(txns.acquire_lock(a, "items", LockMode::Exclusive)?);
    assert_eq!(txns.lock_mode(a, "items"), Some(LockMode::Exclusive));
    Ok(())
}

#[test]
fn commit_and_abort_release_every_lock() -> anyhow::Result<()> {
    let txns = TransactionManager::in_memory();
    let (a, b, c) = (txns.begin()?, txns.begin()?, txns.begin()?);
    txns.acquire_lock(a, "items", LockMode::Exclusive)?;
    txns.acquire_lock(a, "orders", LockMode::Shared)?;
    assert!(!txns.acquire_lock(c, "items", LockMode::Shared)?);

    txns.commit(a)?;
    assert_eq!(txns.lock_mode(a, "items"), None);
    assert!(txns.acquire_lock(c, "items", LockMode::Exclusive)?);

    struct Nothing;
    impl strata_db_core::transaction::UndoTarget for Nothing {
        fn undo(&mut self, _: &strata_db_core::transaction::Change) -> strata_db_core::Result<()> {
            Ok(())
        }
    }
    txns.acquire_lock(b, "orders", LockMode::Exclusive)?;
    txns.abort(c, &mut Nothing)?;
    assert_eq!(txns.lock_mode(c, "items"), None);
    assert!(txns.acquire_lock(b, "items", LockMode::Exclusive)?);
    Ok(())
}

#[test]
fn lock_calls_need_an_active_transaction() {
    let txns = TransactionManager::in_memory();
    assert!(matches!(
        txns.acquire_lock(42, "items", LockMode::Shared),
        Err(DbError::NoActiveTransaction(42))
    ));
    assert!(matches!(txns.release_lock(42, "items"), Err(DbError::NoActiveTransaction(42))));
}

#[test]
fn threads_share_one_manager() -> anyhow::Result<()> {
    let txns = Arc::new(TransactionManager::in_memory());
    let holder = txns.begin()?;
    assert!(txns.acquire_lock(holder, "items", LockMode::Exclusive)?);

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let txns = Arc::clone(&txns);
            thread::spawn(move || -> strata_db_core::Result<bool> {
                let id = txns.begin()?;
                txns.acquire_lock(id, "items", LockMode::Shared)
            })
        })
        .collect();
    for w in workers {
        assert!(!w.join().expect("worker panicked")?);
    }

    txns.commit(holder)?;
    let ids: Vec<_> = (0..4)
        .map(|_| {
            let txns = Arc::clone(&txns);
            thread::spawn(move || -> strata_db_core::Result<u64> {
                let id = txns.begin()?;
                assert!(txns.acquire_lock(id, "items", LockMode::Shared)?);
                Ok(id)
            })
        })
        .map(|h| h.join().expect("worker panicked"))
        .collect::<strata_db_core::Result<_>>()?;
    // every begin got its own id
    let mut sorted: Vec<u64> = ids;
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), 4);
    Ok(())
}

#[test]
fn database_auto_locks_conflict_between_transactions() -> anyhow::Result<()> {
    let mut db = items_db("lock_auto");
    let (reader, writer) = (db.begin()?, db.begin()?);

    db.select(Some(reader), "items", &Query::all())?;
    let err = db
        .insert(Some(writer), "items", vec![4.into(), "cog".into(), 1.into()])
        .unwrap_err();
    assert!(matches!(err, DbError::LockConflict { txn, .. } if txn == writer), "{err}");
    assert_eq!(db.row_count("items")?, 3);

    db.commit(reader)?;
    db.insert(Some(writer), "items", vec![4.into(), "cog".into(), 1.into()])?;
    assert_eq!(db.transactions().lock_mode(writer, "items"), Some(LockMode::Exclusive));
    db.commit(writer)?;
    Ok(())
}

#[test]
fn writes_share_lock_foreign_key_neighbours() -> anyhow::Result<()> {
    let mut db = items_db("lock_fk");
    db.create_table(
        TableDef::new(
            "stock",
            vec![Column::new("item", DataType::Integer), Column::new("bin", DataType::String)],
        )
        .foreign_key(ForeignKey::new("item", "items", "id")),
    )?;
    let (a, b) = (db.begin()?, db.begin()?);
    db.insert(Some(a), "stock", vec![1.into(), "A1".into()])?;
    let txns = db.transactions();
    assert_eq!(txns.lock_mode(a, "stock"), Some(LockMode::Exclusive));
    assert_eq!(txns.lock_mode(a, "items"), Some(LockMode::Shared));

    // the parent is readable but not writable by others
    db.select(Some(b), "items", &Query::all())?;
    let pred = Predicate::from(Condition::eq("id", 3));
    let err = db.delete(Some(b), "items", Some(&pred), false).unwrap_err();
    assert!(matches!(err, DbError::LockConflict { .. }), "{err}");
    Ok(())
}

#[test]
fn commit_requires_exclusive_on_written_tables() -> anyhow::Result<()> {
    init_tracing();
    let mut db = items_db("lock_commit_check");
    let id = db.begin()?;
    db.insert(Some(id), "items", vec![4.into(), "cog".into(), 1.into()])?;
    assert!(db.release_lock(id, "items")?);

    let err = db.commit(id).unwrap_err();
    assert!(matches!(err, DbError::LockConflict { .. }), "{err}");
    assert_eq!(db.status(id), Some(TxnStatus::Active));

    assert!(db.acquire_lock(id, "items", LockMode::Exclusive)?);
    db.commit(id)?;
    assert_eq!(db.status(id), Some(TxnStatus::Committed));
    Ok(())
}
