use docket::index::IndexMode;
use docket::query::{QueryParams, QueryPlan, Visit};
use docket::Docket;
use docket_int_test::test_util::{cleanup, create_memory_context, id, insert_test_docs, run_test};

fn plan_of(db: &Docket, text: &str) -> QueryPlan {
    let query = db.compile("users", text).unwrap();
    db.explain(&query).unwrap()
}

#[test]
fn test_id_set_plan() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            assert_eq!(plan_of(&db, "/=[3, 1]"), QueryPlan::IdSet(vec![id(1), id(3)]));
            assert_eq!(plan_of(&db, "/=2").to_string(), "IdSet [2]");
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_full_scan_without_usable_index() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            assert_eq!(plan_of(&db, "/[age > 20]"), QueryPlan::FullScan);

            db.ensure_index("users", "/age", IndexMode::integer())?;
            // integer indexes serve equality only
            assert_eq!(plan_of(&db, "/[age > 20]"), QueryPlan::FullScan);
            assert_eq!(plan_of(&db, "/[age != 30]"), QueryPlan::FullScan);
            assert_eq!(plan_of(&db, "/[age > 20] or /[age = 30]"), QueryPlan::FullScan);
            assert!(matches!(plan_of(&db, "/[age = 30]"), QueryPlan::IndexScan(_)));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_index_scan_selection() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            db.ensure_index("users", "/address/city", IndexMode::string())?;
            db.ensure_index("users", "/name", IndexMode::string())?;
            db.ensure_index("users", "/name", IndexMode::string().unique())
                .unwrap_err();
            db.ensure_index("users", "/age", IndexMode::float())?;

            let QueryPlan::IndexScan(scan) = plan_of(&db, r#"/address/[city = "Paris"]"#) else {
                panic!("expected an index scan");
            };
            assert_eq!(scan.index().path(), "/address/city");
            assert!(scan.is_index_only());

            let QueryPlan::IndexScan(scan) = plan_of(&db, r#"/[age >= 25] and /[active = true]"#) else {
                panic!("expected an index scan");
            };
            assert_eq!(scan.index().path(), "/age");
            assert_eq!(scan.index().mode(), IndexMode::float());
            assert!(!scan.is_index_only());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unique_index_preferred_for_equality() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index("users", "/code", IndexMode::integer())?;
            db.ensure_index("users", "/code", IndexMode::float().unique())?;
            db.put_new("users", docket::doc!({"code": 7}))?;
            db.put_new("users", docket::doc!({"code": 7.5}))?;

            let QueryPlan::IndexScan(scan) = plan_of(&db, "/[code = 7]") else {
                panic!("expected an index scan");
            };
            assert!(scan.index().is_unique());
            assert_eq!(scan.index().mode(), IndexMode::float().unique());
            assert_eq!(scan.candidates().len(), 2);
            assert_eq!(db.count_matching("users", "/[code = 7]", &QueryParams::new())?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_results_do_not_depend_on_indexes() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            insert_test_docs(&db, "users")?;
            let queries = [
                r#"/address/[city = "Paris"]"#,
                r#"/address/[city in ["Oslo", "Rome"]]"#,
                "/[age >= 25]",
                "/[age < 25] and /[active = true]",
                r#"/[tags = "dev"]"#,
                r#"/[name > "B"] | limit 2"#,
            ];
            let before = queries
                .iter()
                .map(|text| db.count_matching("users", text, &QueryParams::new()))
                .collect::<Result<Vec<_>, _>>()?;

            db.ensure_index("users", "/address/city", IndexMode::string())?;
            db.ensure_index("users", "/age", IndexMode::float())?;
            db.ensure_index("users", "/tags", IndexMode::string())?;
            db.ensure_index("users", "/name", IndexMode::string().unique())?;

            let after = queries
                .iter()
                .map(|text| db.count_matching("users", text, &QueryParams::new()))
                .collect::<Result<Vec<_>, _>>()?;
            assert_eq!(before, after);
            assert_eq!(after, vec![2, 2, 2, 1, 2, 2]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_float_index_keeps_wide_integers_exact() {
    run_test(
        create_memory_context,
        |ctx| {
            let db = ctx.db();
            db.put_new("numbers", docket::doc!({"n": 9007199254740993_i64}))?;
            db.put_new("numbers", docket::doc!({"n": 9007199254740992.0}))?;
            let queries = [
                "/[n = 9007199254740992]",
                "/[n > 9007199254740992]",
                "/[n >= 9007199254740993]",
                "/[n < 9007199254740993]",
            ];
            let counts = |db: &Docket| {
                queries
                    .iter()
                    .map(|text| db.count_matching("numbers", text, &QueryParams::new()))
                    .collect::<Result<Vec<_>, _>>()
            };
            let before = counts(&db)?;

            db.ensure_index("numbers", "/n", IndexMode::float())?;
            for text in queries {
                let query = db.compile("numbers", text)?;
                let QueryPlan::IndexScan(scan) = db.explain(&query)? else {
                    panic!("expected an index scan for {}", text);
                };
                assert!(scan.is_index_only(), "{}", text);

                let mut streamed = db.compile("numbers", text)?;
                let visited = db.execute(&mut streamed, |_, _| Visit::Continue)?.visited();
                let mut counted = db.compile("numbers", text)?;
                assert_eq!(db.count(&mut counted)?, visited, "{}", text);
            }
            assert_eq!(counts(&db)?, before);
            assert_eq!(before, vec![1, 1, 1, 1]);
            Ok(())
        },
        cleanup,
    )
}
