use docket::collection::{Document, DocumentId};
use docket::errors::DocketResult;
use docket::{doc, Docket};
use std::backtrace::Backtrace;
use std::time::Instant;
use std::{env, fs};

/// Runs a test between a setup and a teardown step.
///
/// The teardown runs whether the test body succeeds or fails; a panic or an
/// error from any step fails the test with the collected message.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> DocketResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> DocketResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> DocketResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();
    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => after(ctx).map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            },
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });

    let message = match result {
        Ok(Ok(_)) => return,
        Ok(Err((e, bt))) => {
            if !bt.is_empty() && !bt.contains("disabled") {
                eprintln!("\nBacktrace:\n{}", bt);
            }
            e
        }
        Err(panic_err) => {
            if let Some(s) = panic_err.downcast_ref::<&str>() {
                format!("Panic: {}", s)
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                format!("Panic: {}", s)
            } else {
                "Panic: unknown payload".to_string()
            }
        }
    };
    panic!("Test failed after {:?}: {}", start_time.elapsed(), message);
}

#[derive(Clone)]
pub struct TestContext {
    path: String,
    db: Docket,
}

impl TestContext {
    pub fn new(path: String, db: Docket) -> Self {
        Self { path, db }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn db(&self) -> Docket {
        self.db.clone()
    }
}

pub fn random_path() -> String {
    let id = uuid::Uuid::new_v4();
    env::temp_dir()
        .join(format!("docket-{}.json", id))
        .to_string_lossy()
        .to_string()
}

/// Opens a store backed by an image file in the temp directory.
pub fn create_test_context() -> DocketResult<TestContext> {
    let path = random_path();
    let db = Docket::builder().db_path(&path).open_or_create()?;
    Ok(TestContext::new(path, db))
}

/// Opens a purely in-memory store.
pub fn create_memory_context() -> DocketResult<TestContext> {
    let db = Docket::builder().open_or_create()?;
    Ok(TestContext::new(String::new(), db))
}

pub fn cleanup(ctx: TestContext) -> DocketResult<()> {
    let db = ctx.db();
    if !db.is_closed() {
        db.close()?;
    }
    remove_file(ctx.path());
    Ok(())
}

pub fn remove_file(path: &str) {
    if path.is_empty() || !std::path::Path::new(path).exists() {
        return;
    }
    if let Err(e) = fs::remove_file(path) {
        eprintln!("Warning: Failed to remove {}: {:?}", path, e);
    }
}

pub fn id(value: u64) -> DocumentId {
    DocumentId::new(value).unwrap()
}

pub fn create_test_docs() -> Vec<Document> {
    vec![
        doc!({
            "name": "Alice",
            "age": 30,
            "address": {"city": "Paris", "zip": "75001"},
            "tags": ["admin", "dev"],
            "active": true
        }),
        doc!({
            "name": "Bob",
            "age": 25,
            "address": {"city": "Oslo", "zip": "0150"},
            "tags": ["dev"],
            "active": false
        }),
        doc!({
            "name": "Carol",
            "age": 19.5,
            "address": {"city": "Paris", "zip": "75002"},
            "tags": [],
            "active": true
        }),
        doc!({
            "name": "Dave",
            "address": {"city": "Rome"},
            "active": null
        }),
    ]
}

/// Inserts [`create_test_docs`] into `collection`; the documents get IDs 1 to 4.
pub fn insert_test_docs(db: &Docket, collection: &str) -> DocketResult<Vec<DocumentId>> {
    create_test_docs()
        .into_iter()
        .map(|document| db.put_new(collection, document))
        .collect()
}
