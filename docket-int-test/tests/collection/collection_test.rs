use docket::doc;
use docket::errors::ErrorKind;
use docket::index::IndexMode;
use docket_int_test::test_util::{cleanup, create_test_context, id, insert_test_docs, run_test};

#[test]
fn test_ensure_collection_is_idempotent() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_collection("users")?;
            db.ensure_collection("users")?;
            db.ensure_collection("Users")?;
            assert_eq!(db.get_collections()?, vec!["Users".to_string(), "users".to_string()]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_collection_names() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let too_long = "x".repeat(256);
            for name in ["", "a/b", "a|b", too_long.as_str()] {
                let err = db.ensure_collection(name).unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::InvalidArgument, "{:?}", name);
                let err = db.remove_collection(name).unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::InvalidArgument, "{:?}", name);
                let err = db.del(name, id(1)).unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::InvalidArgument, "{:?}", name);
                let err = db.remove_index(name, "/a", IndexMode::string()).unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::InvalidArgument, "{:?}", name);
            }
            db.ensure_collection(&"x".repeat(255))?;
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_remove_collection_and_recreate() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            db.ensure_index("users", "/name", IndexMode::string().unique())?;

            db.remove_collection("users")?;
            assert!(!db.get_collections()?.contains(&"users".to_string()));
            assert_eq!(db.get("users", id(1))?, None);

            // a fresh collection: IDs restart and the old index is gone
            assert_eq!(db.put_new("users", doc!({"name": "Alice"}))?, id(1));
            assert_eq!(db.put_new("users", doc!({"name": "Alice"}))?, id(2));

            db.remove_collection("missing")?;
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_rename_collection_keeps_state() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            db.ensure_index("users", "/name", IndexMode::string().unique())?;

            db.rename_collection("users", "people")?;
            assert_eq!(db.get_collections()?, vec!["people".to_string()]);
            assert_eq!(db.get("people", id(2))?.and_then(|d| d.get("/name").cloned()), Some("Bob".into()));
            assert_eq!(db.put_new("people", doc!({"name": "Eve"}))?, id(5));

            let err = db.put_new("people", doc!({"name": "Eve"})).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ConstraintViolation);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_rename_collection_errors() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_collection("a")?;
            db.ensure_collection("b")?;
            assert_eq!(db.rename_collection("missing", "c").unwrap_err().kind(), &ErrorKind::NotFound);
            assert_eq!(db.rename_collection("a", "b").unwrap_err().kind(), &ErrorKind::AlreadyExists);
            assert_eq!(db.rename_collection("a", "x/y").unwrap_err().kind(), &ErrorKind::InvalidArgument);
            assert_eq!(db.get_collections()?, vec!["a".to_string(), "b".to_string()]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_store_meta() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            db.ensure_index("users", "/address/city", IndexMode::string())?;
            db.ensure_index("users", "/age", IndexMode::float())?;
            db.ensure_collection("empty")?;

            let meta = db.get_meta()?;
            assert_eq!(meta.collection_names(), vec!["empty".to_string(), "users".to_string()]);
            let users = meta.collection("users").unwrap();
            assert_eq!(users.rnum, 4);
            assert_eq!(users.index("/address/city").unwrap().rnum, 4);
            assert_eq!(users.index("/age").unwrap().rnum, 3);
            assert_eq!(users.index("/age").unwrap().index_mode()?, IndexMode::float());

            let json: serde_json::Value = serde_json::from_str(&db.get_meta_json(false)?).unwrap();
            assert_eq!(json["collections"][1]["name"], "users");
            Ok(())
        },
        cleanup,
    )
}
