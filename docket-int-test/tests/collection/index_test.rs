use docket::doc;
use docket::errors::ErrorKind;
use docket::index::IndexMode;
use docket::query::QueryParams;
use docket_int_test::test_util::{cleanup, create_memory_context, create_test_context, id, insert_test_docs, run_test};

#[test]
fn test_unique_index_rejects_duplicates() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index("users", "/name", IndexMode::string().unique())?;
            db.put_new("users", doc!({"name": "A"}))?;
            let err = db.put_new("users", doc!({"name": "A"})).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ConstraintViolation);

            let meta = db.get_meta()?;
            let users = meta.collection("users").unwrap();
            assert_eq!(users.rnum, 1);
            assert_eq!(users.index("/name").unwrap().rnum, 1);

            // the rejected insert did not consume an ID
            assert_eq!(db.put_new("users", doc!({"name": "B"}))?, id(2));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unique_index_allows_replacing_own_value() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index("users", "/name", IndexMode::string().unique())?;
            let first = db.put_new("users", doc!({"name": "A", "v": 1}))?;
            db.put("users", doc!({"name": "A", "v": 2}), first)?;
            let second = db.put_new("users", doc!({"name": "B"}))?;

            let err = db.put("users", doc!({"name": "A"}), second).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ConstraintViolation);
            assert_eq!(db.get("users", second)?, Some(doc!({"name": "B"})));

            db.del("users", first)?;
            db.put("users", doc!({"name": "A"}), second)?;
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unique_index_over_existing_duplicates_fails() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            db.put_new("users", doc!({"city": "Paris"}))?;
            db.put_new("users", doc!({"city": "Paris"}))?;
            let err = db
                .ensure_index("users", "/city", IndexMode::string().unique())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ConstraintViolation);
            let meta = db.get_meta()?;
            assert!(meta.collection("users").unwrap().indexes.is_empty());

            db.ensure_index("users", "/city", IndexMode::string())?;
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_index_definitions() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index("users", "/age", IndexMode::integer())?;
            db.ensure_index("users", "/age", IndexMode::integer())?;
            db.ensure_index("users", "/age", IndexMode::float())?;
            let err = db.ensure_index("users", "/age", IndexMode::integer().unique()).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::AlreadyExists);
            let err = db.ensure_index("users", "age", IndexMode::integer()).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidArgument);

            let meta = db.get_meta()?;
            assert_eq!(meta.collection("users").unwrap().indexes.len(), 2);

            db.remove_index("users", "/age", IndexMode::float())?;
            db.remove_index("users", "/age", IndexMode::float())?;
            db.remove_index("missing", "/age", IndexMode::float())?;
            let meta = db.get_meta()?;
            assert_eq!(meta.collection("users").unwrap().indexes.len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_indexes_follow_writes() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            db.ensure_index("users", "/address/city", IndexMode::string())?;
            db.ensure_index("users", "/tags", IndexMode::string())?;

            let paris = |db: &docket::Docket| {
                db.count_matching("users", r#"/address/[city = "Paris"]"#, &QueryParams::new())
            };
            assert_eq!(paris(&db)?, 2);

            db.merge_or_put_json("users", r#"{"address": {"city": "Lyon"}}"#, id(1))?;
            assert_eq!(paris(&db)?, 1);
            db.del("users", id(3))?;
            assert_eq!(paris(&db)?, 0);

            // array values index every element
            let devs = db.count_matching("users", r#"/[tags = "dev"]"#, &QueryParams::new())?;
            assert_eq!(devs, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_index_types_coerce_values() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index("n", "/v", IndexMode::integer())?;
            db.put_new("n", doc!({"v": 3}))?;
            db.put_new("n", doc!({"v": 3.0}))?;
            db.put_new("n", doc!({"v": 3.5}))?;
            db.put_new("n", doc!({"v": "3"}))?;

            let meta = db.get_meta()?;
            assert_eq!(meta.collection("n").unwrap().index("/v").unwrap().rnum, 2);
            assert_eq!(db.count_matching("n", "/[v = 3]", &QueryParams::new())?, 2);
            assert_eq!(db.count_matching("n", "/[v > 3]", &QueryParams::new())?, 1);
            Ok(())
        },
        cleanup,
    )
}
