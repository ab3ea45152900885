use docket::collection::PatchOperation;
use docket::doc;
use docket::errors::ErrorKind;
use docket_int_test::test_util::{cleanup, create_memory_context, create_test_context, id, run_test};
use serde_json::json;

#[test]
fn test_put_new_assigns_increasing_ids() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let ids = (0..5)
                .map(|i| db.put_new("c", doc!({"i": i})))
                .collect::<Result<Vec<_>, _>>()?;
            assert_eq!(ids, (1..=5).map(id).collect::<Vec<_>>());

            db.del("c", id(5))?;
            db.del("c", id(3))?;
            assert_eq!(db.put_new("c", doc!({"i": 5}))?, id(6));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_ids_are_scoped_per_collection() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            assert_eq!(db.put_new("a", doc!({}))?, id(1));
            assert_eq!(db.put_new("a", doc!({}))?, id(2));
            assert_eq!(db.put_new("b", doc!({}))?, id(1));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_put_replaces_and_advances_counter() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            db.put("c", doc!({"v": 1}), id(7))?;
            db.put("c", doc!({"v": 2}), id(7))?;
            assert_eq!(db.get("c", id(7))?, Some(doc!({"v": 2})));
            assert_eq!(db.put_new("c", doc!({"v": 3}))?, id(8));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_merge_or_put() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            db.merge_or_put("c", &json!({"a": 1, "b": {"c": 2}}), id(1))?;
            assert_eq!(db.get("c", id(1))?, Some(doc!({"a": 1, "b": {"c": 2}})));

            db.merge_or_put("c", &json!({"a": null, "b": {"d": 3}}), id(1))?;
            assert_eq!(db.get("c", id(1))?, Some(doc!({"b": {"c": 2, "d": 3}})));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_patch_operations() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            let doc_id = db.put_new("c", doc!({"name": "A", "tags": ["x"], "old": 1}))?;
            let ops = PatchOperation::parse_all(
                r#"[
                    {"op": "add", "path": "/tags/-", "value": "y"},
                    {"op": "replace", "path": "/name", "value": "B"},
                    {"op": "move", "from": "/old", "path": "/new"},
                    {"op": "copy", "from": "/name", "path": "/alias"},
                    {"op": "test", "path": "/new", "value": 1}
                ]"#,
            )?;
            db.patch("c", &ops, doc_id)?;
            assert_eq!(
                db.get("c", doc_id)?,
                Some(doc!({"name": "B", "tags": ["x", "y"], "new": 1, "alias": "B"}))
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failed_patch_changes_nothing() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            let doc_id = db.put_new("c", doc!({"a": 1}))?;
            let result = db.patch_json(
                "c",
                r#"[{"op": "replace", "path": "/a", "value": 2}, {"op": "remove", "path": "/missing"}]"#,
                doc_id,
            );
            assert!(result.is_err());
            assert_eq!(db.get("c", doc_id)?, Some(doc!({"a": 1})));

            let err = db.patch_json("c", r#"[{"op": "add", "path": "/a", "value": 1}]"#, id(99)).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::NotFound);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_del_is_idempotent() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            let doc_id = db.put_new("c", doc!({"a": 1}))?;
            assert!(db.del("c", doc_id)?);
            assert!(!db.del("c", doc_id)?);
            assert!(!db.del("missing", doc_id)?);
            assert_eq!(db.get("c", doc_id)?, None);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_json_round_trip() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            let text = r#"{"name":"A","nested":{"list":[1,2.5,"x",null,true]},"unicode":"é"}"#;
            let doc_id = db.put_new_json("c", text)?;
            assert_eq!(db.get_json("c", doc_id, false)?.as_deref(), Some(text));

            let pretty = db.get_json("c", doc_id, true)?.unwrap();
            let reparsed: serde_json::Value = serde_json::from_str(&pretty).unwrap();
            assert_eq!(reparsed, serde_json::from_str::<serde_json::Value>(text).unwrap());

            let err = db.put_new_json("c", r#"{"a": "#).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
            Ok(())
        },
        cleanup,
    )
}
