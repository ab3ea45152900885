use docket::errors::ErrorKind;
use docket::index::IndexMode;
use docket::query::{QueryParams, QueryState, Visit};
use docket::doc;
use docket_int_test::test_util::{cleanup, create_memory_context, create_test_context, id, insert_test_docs, run_test};
use serde_json::json;

#[test]
fn test_apply_merge_patch() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            let mut query = db.compile("users", r#"/address/[city = "Paris"] | apply {"active": false, "tags": null}"#)?;
            assert_eq!(db.update(&mut query)?, 2);
            assert_eq!(query.state(), QueryState::Completed);

            let alice = db.get("users", id(1))?.unwrap();
            assert_eq!(alice.get("/active"), Some(&json!(false)));
            assert_eq!(alice.get("/tags"), None);
            assert_eq!(db.count_matching("users", "/[active = false]", &QueryParams::new())?, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_apply_patch_array_keeps_indexes_current() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            db.ensure_index("users", "/age", IndexMode::float())?;
            let mut query = db.compile(
                "users",
                r#"/[age >= 25] | apply [{"op": "replace", "path": "/age", "value": 40}]"#,
            )?;
            assert_eq!(db.update(&mut query)?, 2);
            assert_eq!(db.count_matching("users", "/[age = 40]", &QueryParams::new())?, 2);
            assert_eq!(db.count_matching("users", "/[age < 30]", &QueryParams::new())?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failing_patch_stops_update() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            // Dave has no age, the test operation fails on him
            let mut query = db.compile(
                "users",
                r#"/=[1, 4] | apply [{"op": "test", "path": "/age", "value": 30}, {"op": "add", "path": "/seen", "value": true}]"#,
            )?;
            assert!(db.update(&mut query).is_err());
            assert_eq!(query.state(), QueryState::Failed);
            assert_eq!(db.get("users", id(1))?.unwrap().get("/seen"), Some(&json!(true)));
            assert_eq!(db.get("users", id(4))?.unwrap().get("/seen"), None);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unique_collision_keeps_earlier_updates() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index("accounts", "/email", IndexMode::string().unique())?;
            for email in ["a@example.com", "b@example.com", "c@example.com"] {
                db.put_new("accounts", doc!({"email": email}))?;
            }

            // the first document takes the value, the second collides
            let mut query = db.compile("accounts", r#"/* | apply {"email": "same@example.com"}"#)?;
            let err = db.update(&mut query).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ConstraintViolation);
            assert_eq!(query.state(), QueryState::Failed);

            // each document write is atomic on its own; the query is not
            assert_eq!(db.get("accounts", id(1))?, Some(doc!({"email": "same@example.com"})));
            assert_eq!(db.get("accounts", id(2))?, Some(doc!({"email": "b@example.com"})));
            assert_eq!(db.get("accounts", id(3))?, Some(doc!({"email": "c@example.com"})));

            let meta = db.get_meta()?;
            let accounts = meta.collection("accounts").unwrap();
            assert_eq!(accounts.index("/email").unwrap().rnum, 3);
            let params = QueryParams::new();
            assert_eq!(db.count_matching("accounts", r#"/[email = "a@example.com"]"#, &params)?, 0);
            assert_eq!(db.count_matching("accounts", r#"/[email = "same@example.com"]"#, &params)?, 1);
            assert_eq!(db.count_matching("accounts", r#"/[email = "b@example.com"]"#, &params)?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_delete_matches() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            db.ensure_index("users", "/name", IndexMode::string().unique())?;
            let mut query = db.compile("users", "/[active = true] | del")?;
            assert_eq!(db.update(&mut query)?, 2);
            assert_eq!(db.get("users", id(1))?, None);
            assert_eq!(db.get("users", id(3))?, None);
            assert_eq!(db.count_matching("users", "/*", &QueryParams::new())?, 2);

            // deleted names are free again
            db.put_new("users", doc!({"name": "Alice"}))?;
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_update_respects_limit() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            let mut query = db.compile("users", "/* | desc /name | limit 1 | del")?;
            assert_eq!(db.update(&mut query)?, 1);
            assert_eq!(db.get("users", id(4))?, None);
            assert_eq!(db.count_matching("users", "/*", &QueryParams::new())?, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_update_requires_modification() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            let mut query = db.compile("users", "/*")?;
            let err = db.update(&mut query).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidArgument);

            let mut query = db.compile("users", r#"/* | del | apply {"a": 1}"#)?;
            let err = db.update(&mut query).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
            assert_eq!(db.count_matching("users", "/[a = 1]", &QueryParams::new())?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_count_ignores_modification() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            let mut query = db.compile("users", "/* | del")?;
            assert_eq!(db.count(&mut query)?, 4);
            assert_eq!(db.get_meta()?.collection("users").unwrap().rnum, 4);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_visitor_sees_modified_documents() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            let mut query = db.compile("users", r#"/[age > :min] | apply {"senior": true} | /name + /senior"#)?;
            query.bind("min", 20)?;

            let mut seen = Vec::new();
            let summary = db.execute(&mut query, |id, document| {
                seen.push((id.value(), document.clone()));
                if seen.len() == 1 {
                    Visit::Stop
                } else {
                    Visit::Continue
                }
            })?;
            assert!(summary.is_cancelled());
            assert_eq!(seen, vec![(1, doc!({"name": "Alice", "senior": true}))]);
            // the stop came after the first modification, Bob is untouched
            assert_eq!(db.get("users", id(2))?.unwrap().get("/senior"), None);
            Ok(())
        },
        cleanup,
    )
}
