//! Tests for functions built with `#[sanduq::function]`.

use std::sync::Arc;

use sanduq::prelude::*;
use sanduq::{CallError, Error};

#[derive(Debug)]
struct Config {
    greeting: String,
}

/// Greets `name`.
#[sanduq::function]
fn greet(config: Arc<Config>, name: &str, #[default(1_usize)] times: usize) -> String {
    vec![format!("{} {name}", config.greeting); times].join(", ")
}

#[sanduq::function(name = "parse_port")]
fn parse(raw: String) -> std::result::Result<u16, std::num::ParseIntError> {
    raw.parse()
}

#[sanduq::function]
fn shared(config: Arc<Config>) -> Arc<Config> {
    config
}

#[sanduq::function]
fn describe(anything: Value) -> String {
    anything.type_name().to_string()
}

#[sanduq::function]
fn nested(container: Container) -> Result<u32> {
    container.get_as::<u32>("missing").map(|n| *n)
}

#[sanduq::function]
async fn fetch(config: Arc<Config>, #[default(String::from("/"))] path: String) -> String {
    tokio::task::yield_now().await;
    format!("{}{path}", config.greeting)
}

fn configured() -> Container {
    let container = Container::new();
    container
        .put_value(
            "config",
            Config {
                greeting: "hello".into(),
            },
        )
        .unwrap();
    container
}

#[test]
fn builds_a_documented_function() {
    let greet = greet();
    assert_eq!(greet.name(), "greet");
    assert_eq!(greet.doc(), Some("Greets `name`."));

    let names: Vec<_> = greet.signature().params().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["config", "name", "times"]);
}

#[test]
fn injects_and_applies_defaults() {
    let greet = configured().pass_("config").apply(greet());

    let once = greet
        .call(Args::new().kwarg("name", String::from("ada")))
        .unwrap();
    assert_eq!(once.downcast_ref::<String>().unwrap(), "hello ada");

    let twice = greet
        .call(
            Args::new()
                .kwarg("name", String::from("ada"))
                .kwarg("times", 2_usize),
        )
        .unwrap();
    assert_eq!(twice.downcast_ref::<String>().unwrap(), "hello ada, hello ada");
}

#[test]
fn explicit_arguments_beat_injection() {
    let greet = configured().pass_("config").apply(greet());
    let other = Config {
        greeting: "hey".into(),
    };

    let out = greet
        .call(
            Args::new()
                .kwarg("config", other)
                .kwarg("name", String::from("bo")),
        )
        .unwrap();
    assert_eq!(out.downcast_ref::<String>().unwrap(), "hey bo");
}

#[test]
fn wrong_argument_type_is_reported() {
    let greet = configured().pass_("config").apply(greet());
    let err = greet.call(Args::new().kwarg("name", 7_u8)).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[test]
fn fallible_bodies_surface_their_errors() {
    let parse = parse();
    assert_eq!(parse.name(), "parse_port");

    let port = parse.call(Args::new().arg(String::from("8080"))).unwrap();
    assert_eq!(port.downcast_ref::<u16>(), Some(&8080));

    let err = parse.call(Args::new().arg(String::from("http"))).unwrap_err();
    assert!(matches!(err, Error::Failed(_)));

    let err = parse.call(Args::new()).unwrap_err();
    assert!(matches!(
        err,
        Error::Call(CallError::MissingArgument { ref function, .. }) if function == "parse_port"
    ));
}

#[test]
fn crate_errors_pass_through_unchanged() {
    let err = nested()
        .call(Args::new().arg(Container::new()))
        .unwrap_err();
    assert!(err.is_missing(&Key::from("missing")));
}

#[test]
fn shared_values_keep_their_identity() {
    let container = configured();
    let shared = container.pass_("config").apply(shared());

    let out = shared.call(Args::new()).unwrap();
    let stored = container.get("config").unwrap();
    assert!(Value::ptr_eq(&out, &stored));
}

#[test]
fn raw_values_are_passed_as_is() {
    let out = describe().call(Args::new().arg(3_i64)).unwrap();
    assert_eq!(out.downcast_ref::<String>().unwrap(), "i64");
}

#[test]
fn resolves_against_the_stack_at_call_time() {
    let stack = Stack::named("greetings");
    let greet = stack.pass_("config").apply(greet());
    let args = || Args::new().kwarg("name", String::from("x"));

    assert!(matches!(greet.call(args()), Err(Error::NoActiveContainer)));

    let english = configured();
    let german = Container::new();
    german
        .put_value(
            "config",
            Config {
                greeting: "hallo".into(),
            },
        )
        .unwrap();

    let _outer = stack.push(english);
    assert_eq!(greet.call(args()).unwrap().downcast_ref::<String>().unwrap(), "hello x");
    {
        let _inner = stack.push(german);
        assert_eq!(greet.call(args()).unwrap().downcast_ref::<String>().unwrap(), "hallo x");
    }
    assert_eq!(greet.call(args()).unwrap().downcast_ref::<String>().unwrap(), "hello x");
}

#[tokio::test]
async fn async_functions_are_injected() {
    let fetch = configured().pass_("config").apply(fetch());
    assert_eq!(fetch.name(), "fetch");

    let root = fetch.call(Args::new()).await.unwrap();
    assert_eq!(root.downcast_ref::<String>().unwrap(), "hello/");

    let page = fetch
        .call(Args::new().kwarg("path", String::from("/about")))
        .await
        .unwrap();
    assert_eq!(page.downcast_ref::<String>().unwrap(), "hello/about");
}

#[tokio::test]
async fn async_injection_errors_surface_on_await() {
    let fetch = Container::new().pass_("config").apply(fetch());
    let err = fetch.call(Args::new()).await.unwrap_err();
    assert!(err.is_missing(&Key::from("config")));
}
