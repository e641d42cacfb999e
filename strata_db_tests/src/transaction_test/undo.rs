use super::*;
use strata_db_core::transaction::{Change, UndoTarget};

#[test]
fn abort_removes_inserted_rows() -> anyhow::Result<()> {
    let mut db = items_db("undo_insert");
    let before = all_rows(&mut db, "items");

    let id = db.begin()?;
    db.insert(Some(id), "items", vec![4.into(), "cog".into(), 5.into()])?;
    db.insert_named(Some(id), "items", &[("id", 5.into()), ("label", "pin".into())])?;
    assert_eq!(db.row_count("items")?, 5);

    db.abort(id)?;
    assert_eq!(db.status(id), Some(TxnStatus::Aborted));
    assert_eq!(all_rows(&mut db, "items"), before);
    assert!(db.lookup(None, "items", "id", 4)?.is_empty());
    assert_eq!(db.index_len("items", "label")?, 3);
    Ok(())
}

#[test]
fn abort_restores_updated_rows() -> anyhow::Result<()> {
    let mut db = items_db("undo_update");
    let before = all_rows(&mut db, "items");

    let id = db.begin()?;
    let big = Predicate::from(Condition::ge("qty", 20));
    db.update(Some(id), "items", &[("qty", 0.into())], Some(&big), false)?;
    db.update(Some(id), "items", &[("label", "washer".into())], Some(&Predicate::from(Condition::eq("id", 2))), false)?;
    assert_eq!(db.lookup(None, "items", "label", "washer")?.len(), 1);

    db.abort(id)?;
    assert_eq!(all_rows(&mut db, "items"), before);
    assert!(db.lookup(None, "items", "label", "washer")?.is_empty());
    assert_eq!(db.lookup(None, "items", "qty", 30)?.len(), 1);
    Ok(())
}

#[test]
fn abort_reinserts_deleted_rows() -> anyhow::Result<()> {
    let mut db = items_db("undo_delete");
    let id = db.begin()?;
    let res = db.delete(Some(id), "items", Some(&Predicate::from(Condition::lt("qty", 25))), false)?;
    assert_eq!(res.affected, 2);
    assert_eq!(db.row_count("items")?, 1);

    db.abort(id)?;
    assert_eq!(db.row_count("items")?, 3);
    assert_eq!(db.lookup(None, "items", "label", "bolt")?.len(), 1);
    assert_eq!(db.index_len("items", "id")?, 3);
    Ok(())
}

#[test]
fn abort_undoes_mixed_work_newest_first() -> anyhow::Result<()> {
    let mut db = items_db("undo_mixed");
    let before = all_rows(&mut db, "items");

    let id = db.begin()?;
    db.insert(Some(id), "items", vec![4.into(), "cog".into(), 40.into()])?;
    db.update(Some(id), "items", &[("qty", 41.into())], Some(&Predicate::from(Condition::eq("id", 4))), false)?;
    db.delete(Some(id), "items", Some(&Predicate::from(Condition::eq("id", 1))), false)?;
    db.abort(id)?;

    let mut after = all_rows(&mut db, "items");
    let mut expected = before;
    // deleted rows come back at the end of the heap
    let key = |r: &Row| match r[0] {
        Value::Integer(n) => n,
        _ => i32::MAX,
    };
    after.sort_by_key(key);
    expected.sort_by_key(key);
    assert_eq!(after, expected);
    Ok(())
}

#[test]
fn committed_work_stays() -> anyhow::Result<()> {
    let mut db = items_db("undo_commit");
    let id = db.begin()?;
    db.insert(Some(id), "items", vec![4.into(), "cog".into(), 5.into()])?;
    db.commit(id)?;

    assert!(matches!(db.abort(id), Err(DbError::NoActiveTransaction(_))));
    assert_eq!(db.row_count("items")?, 4);
    Ok(())
}

#[test]
fn failed_write_is_not_undone_twice() -> anyhow::Result<()> {
    let mut db = items_db("undo_failed_write");
    let id = db.begin()?;
    db.insert(Some(id), "items", vec![4.into(), "cog".into(), 5.into()])?;
    // rejected before anything is recorded
    assert!(db.insert(Some(id), "items", vec![4.into(), "dup".into(), 5.into()]).is_err());
    // rejected at encode time, after the change was recorded
    assert!(db.insert(Some(id), "items", vec![6.into(), "a label far too long to fit".into(), 5.into()]).is_err());
    assert_eq!(db.transactions().changes(id)?.len(), 1);

    db.abort(id)?;
    assert_eq!(db.row_count("items")?, 3);
    Ok(())
}

#[test]
fn failing_undo_leaves_the_transaction_active() -> anyhow::Result<()> {
    struct Flaky {
        fail: bool,
        seen: Vec<Change>,
    }
    impl UndoTarget for Flaky {
        fn undo(&mut self, change: &Change) -> strata_db_core::Result<()> {
            if self.fail {
                return Err(DbError::NotFound("row".to_string()));
            }
            self.seen.push(change.clone());
            Ok(())
        }
    }

    let txns = TransactionManager::in_memory();
    let id = txns.begin()?;
    txns.acquire_lock(id, "items", LockMode::Exclusive)?;
    let first = Change::Insert {
        table: "items".to_string(),
        values: vec![Value::Integer(1)],
    };
    let second = Change::Delete {
        table: "items".to_string(),
        rows: vec![vec![Value::Integer(2)]],
    };
    txns.record(id, first.clone())?;
    txns.record(id, second.clone())?;

    let mut target = Flaky { fail: true, seen: Vec::new() };
    let err = txns.abort(id, &mut target).unwrap_err();
    assert!(matches!(err, DbError::UndoFailed(_)), "{err}");
    assert_eq!(txns.status(id), Some(TxnStatus::Active));
    assert_eq!(txns.changes(id)?.len(), 2);
    assert_eq!(txns.lock_mode(id, "items"), Some(LockMode::Exclusive));

    target.fail = false;
    txns.abort(id, &mut target)?;
    assert_eq!(target.seen, vec![second, first]);
    assert_eq!(txns.status(id), Some(TxnStatus::Aborted));
    Ok(())
}
