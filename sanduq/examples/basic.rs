//! Basic example of the Sanduq DI box.
//!
//! Run with `RUST_LOG=sanduq_container=debug cargo run --example basic`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sanduq::prelude::*;
use sanduq::web::{Request, ScopeMiddleware};

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

#[derive(Clone)]
struct Config {
    database_url: String,
    debug: bool,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

struct RequestId(u64);

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

/// Looks a user up.
#[sanduq::function]
fn find_user(db: Arc<Database>, request: Arc<RequestId>, id: u64) -> String {
    format!("#{} {}", request.0, db.query(&format!("SELECT * FROM users WHERE id = {id}")))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("sanduq_container=debug")
        .init();

    let stack = Stack::named("app");

    // Decorated once, resolved against whatever container is on the stack.
    let find_user = stack
        .pass_("db")
        .apply(stack.pass_("request").apply(find_user()));

    let container = Container::new();
    container.put_value(
        "config",
        Config {
            database_url: "postgres://localhost/myapp".to_string(),
            debug: true,
        },
    )?;
    container.put_value("logger", Arc::new(ConsoleLogger) as Arc<dyn Logger>)?;
    container.put(
        "db",
        Put::try_factory({
            let container = container.clone();
            move || {
                let config = container.get_as::<Config>("config")?;
                let logger = container.get_as::<Arc<dyn Logger>>("logger")?;
                Ok::<_, Error>(Database {
                    url: config.database_url.clone(),
                    logger: Arc::clone(&*logger),
                })
            }
        })
        .scope::<Singleton>(),
    )?;
    container.put_scoped::<Request, _, _>("request", || {
        RequestId(NEXT_REQUEST.fetch_add(1, Ordering::SeqCst))
    })?;

    println!("✅ Container built successfully!");
    println!("{container:?}");

    let config = container.get_as::<Config>("config")?;
    println!("📋 Config: database_url={}, debug={}", config.database_url, config.debug);

    let _app = stack.push(container);
    let middleware = ScopeMiddleware::new();

    // === Two requests, each with its own request id ===
    for user in [42_u64, 7] {
        middleware.run(|| -> Result<()> {
            let result = find_user.call(Args::new().kwarg("id", user))?;
            println!("👤 {}", result.downcast_ref::<String>().map_or("?", String::as_str));
            Ok(())
        })?;
    }

    // === Swap the database for a test double ===
    {
        let testing = Container::new();
        testing.put_value(
            "db",
            Database {
                url: "sqlite::memory:".to_string(),
                logger: Arc::new(ConsoleLogger),
            },
        )?;
        let _testing = stack.push_chained(testing);

        middleware.run(|| -> Result<()> {
            let result = find_user.call(Args::new().kwarg("id", 1_u64))?;
            println!("🧪 {}", result.downcast_ref::<String>().map_or("?", String::as_str));
            Ok(())
        })?;
    }

    println!("\n🎉 Everything works!");
    Ok(())
}
