use docket::collection::DocumentId;
use docket::doc;
use docket::errors::ErrorKind;
use docket::query::{Param, QueryParams, QueryState, Visit};
use docket::Docket;
use docket_int_test::test_util::{cleanup, create_memory_context, create_test_context, insert_test_docs, run_test};
use serde_json::{json, Value};

fn find_ids(db: &Docket, text: &str, params: &QueryParams) -> Vec<u64> {
    let mut ids = Vec::new();
    db.find("users", text, params, |id, _| {
        ids.push(id.value());
        Visit::Continue
    })
    .unwrap();
    ids
}

fn names(db: &Docket, text: &str) -> Vec<Value> {
    let mut names = Vec::new();
    db.find("users", text, &QueryParams::new(), |_, document| {
        names.push(document.get("/name").cloned().unwrap_or(Value::Null));
        Visit::Continue
    })
    .unwrap();
    names
}

#[test]
fn test_users_example() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.put_new("users", doc!({"name": "A", "age": 30}))?;
            db.put_new("users", doc!({"name": "B", "age": 25}))?;
            db.put_new("users", doc!({"name": "C", "age": 19}))?;

            assert_eq!(db.count_matching("users", "/[age > 20]", &QueryParams::new())?, 2);
            let params = QueryParams::new().with("age", 29);
            assert_eq!(db.count_matching("users", "/[age > :age]", &params)?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_count_equals_visited() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            for text in [
                "/*",
                "/[age >= 25]",
                "/[active = true] | skip 1",
                r#"/address/[city = "Paris"]"#,
                "/[age > 1] or /[active = null]",
                r#"/**/[zip = "0150"]"#,
                "/* | limit 2 | desc /name",
            ] {
                let mut streamed = db.compile("users", text)?;
                let summary = db.execute(&mut streamed, |_, _| Visit::Continue)?;
                let mut counted = db.compile("users", text)?;
                assert_eq!(db.count(&mut counted)?, summary.visited(), "{}", text);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_visitor_stop_after_first_match() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            let mut query = db.compile("users", "/*")?;
            let mut visits = 0;
            let summary = db.execute(&mut query, |_, _| {
                visits += 1;
                Visit::Stop
            })?;
            assert_eq!(visits, 1);
            assert_eq!(summary.visited(), 1);
            assert_eq!(summary.state(), QueryState::Cancelled);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_node_paths() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            let none = QueryParams::new();
            assert_eq!(find_ids(&db, "/age", &none), vec![1, 2, 3]);
            assert_eq!(find_ids(&db, r#"/address/[city = "Paris"]"#, &none), vec![1, 3]);
            assert_eq!(find_ids(&db, r#"/*/[city = "Rome"]"#, &none), vec![4]);
            assert_eq!(find_ids(&db, r#"/**/[zip re "^750"]"#, &none), vec![1, 3]);
            assert_eq!(find_ids(&db, "/tags/0", &none), vec![1, 2]);
            assert_eq!(find_ids(&db, "/=[4, 2, 9]", &none), vec![2, 4]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_comparisons() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            let none = QueryParams::new();
            assert_eq!(find_ids(&db, "/[age < 25.5]", &none), vec![2, 3]);
            assert_eq!(find_ids(&db, "/[age != 30]", &none), vec![2, 3]);
            assert_eq!(find_ids(&db, r#"/[name in ["Bob", "Dave"]]"#, &none), vec![2, 4]);
            assert_eq!(find_ids(&db, r#"/[tags ni "admin"]"#, &none), vec![1]);
            assert_eq!(find_ids(&db, r#"/[name re "^[A-C]"]"#, &none), vec![1, 2, 3]);
            assert_eq!(find_ids(&db, "/[active = null]", &none), vec![4]);
            assert_eq!(find_ids(&db, r#"/[age = "30"]"#, &none), Vec::<u64>::new());
            assert_eq!(find_ids(&db, "/[not (age > 20) and active = true]", &none), vec![3]);
            assert_eq!(find_ids(&db, "not /age", &none), vec![4]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_placeholders() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;

            let params = QueryParams::new()
                .with("city", "Paris")
                .with("min", 20)
                .with_positional(0, 1);
            assert_eq!(
                find_ids(&db, "/address/[city = :city] and /[age > :min] | skip :?", &params),
                Vec::<u64>::new()
            );
            let params = QueryParams::new().with("city", "Paris").with("min", 19.0).with_positional(0, 0);
            assert_eq!(
                find_ids(&db, "/address/[city = :city] and /[age > :min] | skip :?", &params),
                vec![1, 3]
            );

            let params = QueryParams::try_from(&json!({"ids": 3}))?;
            assert_eq!(find_ids(&db, "/=[1, :ids]", &params), vec![1, 3]);

            let mut query = db.compile("users", "/[name re :pattern]")?;
            query.bind("pattern", Param::Text("b$".into()))?;
            let err = query.bind("pattern", "(").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
            assert_eq!(db.count(&mut query)?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unbound_and_unknown_placeholders() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            let mut query = db.compile("users", "/[age > :age] | limit :n")?;
            query.bind("age", 1)?;
            let err = db.count(&mut query).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
            assert!(err.message().contains(":n"));

            let err = db
                .count_matching("users", "/[age > :age]", &QueryParams::new().with("nope", 1))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_syntax_errors_report_position() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            let err = db.compile("users", "/[age >> 1]").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
            assert!(err.message().contains("position 7"), "{}", err.message());
            for text in ["", "/[", "/[age > ]", "/* | limit -1", "/* | bogus"] {
                assert!(db.compile("users", text).is_err(), "{:?}", text);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_ordering_skip_limit() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            assert_eq!(names(&db, "/* | asc /age"), vec![json!("Dave"), json!("Carol"), json!("Bob"), json!("Alice")]);
            assert_eq!(names(&db, "/* | desc /name | skip 1 | limit 2"), vec![json!("Carol"), json!("Bob")]);
            assert_eq!(names(&db, "/* | asc /address/city | limit 3"), vec![json!("Bob"), json!("Alice"), json!("Carol")]);
            assert!(names(&db, "/* | limit 0").is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_projection() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            let mut seen = Vec::new();
            db.find("users", "/=1 | /name + /address/city", &QueryParams::new(), |_, document| {
                seen.push(document.clone());
                Visit::Continue
            })?;
            db.find("users", "/=2 | /address/{city,zip}", &QueryParams::new(), |_, document| {
                seen.push(document.clone());
                Visit::Continue
            })?;
            db.find("users", "/=4 | all -/address", &QueryParams::new(), |_, document| {
                seen.push(document.clone());
                Visit::Continue
            })?;
            assert_eq!(
                seen,
                vec![
                    doc!({"name": "Alice", "address": {"city": "Paris"}}),
                    doc!({"address": {"city": "Oslo", "zip": "0150"}}),
                    doc!({"name": "Dave", "active": null}),
                ]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_visitor_skip() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            let mut seen: Vec<DocumentId> = Vec::new();
            let mut query = db.compile("users", "/*")?;
            let summary = db.execute(&mut query, |id, _| {
                seen.push(id);
                if seen.len() == 1 {
                    Visit::Skip(2)
                } else {
                    Visit::Continue
                }
            })?;
            assert_eq!(seen.iter().map(|id| id.value()).collect::<Vec<_>>(), vec![1, 4]);
            assert_eq!(summary.visited(), 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_query_on_missing_collection() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            let mut query = db.compile("ghosts", "/*")?;
            let summary = db.execute(&mut query, |_, _| Visit::Continue)?;
            assert_eq!(summary.visited(), 0);
            assert_eq!(summary.state(), QueryState::Completed);
            assert!(db.get_collections()?.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_query_executes_once() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            let mut query = db.compile("users", "/*")?;
            db.count(&mut query)?;
            assert_eq!(query.state(), QueryState::Completed);
            let err = db.count(&mut query).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
            Ok(())
        },
        cleanup,
    )
}
