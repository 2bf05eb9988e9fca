//! Ledger integration tests
//!
//! The materializer exercised the way the session uses it: through the
//! dispatch table, with untyped arguments.

mod common;

use serde_json::json;

use common::{create_test_user, setup_test_db};
use tally_gateway::ledger::{Category, TransactionMaterializer, TransactionRepo};
use tally_gateway::model::ToolInvocationRequest;
use tally_gateway::tools::ToolRegistry;

fn setup() -> (TransactionRepo, ToolRegistry) {
    let db = setup_test_db();
    create_test_user(&db, "user-1");
    let repo = TransactionRepo::new(db.clone());

    let mut tools = ToolRegistry::new();
    tools.register(
        TransactionMaterializer::declaration(),
        Box::new(TransactionMaterializer::new(repo.clone(), "user-1", "sess-1")),
    );

    (repo, tools)
}

fn request(call_id: &str, name: &str, args: serde_json::Value) -> ToolInvocationRequest {
    let serde_json::Value::Object(arguments) = args else {
        panic!("args must be an object");
    };
    ToolInvocationRequest {
        call_id: call_id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

#[tokio::test]
async fn valid_invocation_persists_and_succeeds() {
    let (repo, tools) = setup();

    let result = tools
        .dispatch(&request(
            "call-1",
            "add_to_database",
            json!({"amount": 25.50, "category": "Food & Dining", "description": "Coffee"}),
        ))
        .await;

    assert!(result.is_success());
    assert_eq!(result.call_id, "call-1");
    assert_eq!(result.payload["status"], "success");

    let recent = repo.list_recent("user-1", 10).unwrap();
    assert_eq!(recent.len(), 1);
    assert!((recent[0].amount - 25.50).abs() < f64::EPSILON);
    assert_eq!(recent[0].category, Category::FoodAndDining);
    assert_eq!(recent[0].description.as_deref(), Some("Coffee"));
    assert_eq!(recent[0].user_id, "user-1");
    assert_eq!(recent[0].input_method, "voice");
}

#[tokio::test]
async fn negative_amount_is_rejected_without_persisting() {
    let (repo, tools) = setup();

    let result = tools
        .dispatch(&request(
            "call-1",
            "add_to_database",
            json!({"amount": -5, "category": "Food & Dining"}),
        ))
        .await;

    assert!(!result.is_success());
    assert!(
        result.payload["error"]
            .as_str()
            .unwrap()
            .contains("positive")
    );
    assert_eq!(repo.count("user-1").unwrap(), 0);
}

#[tokio::test]
async fn unknown_category_is_rejected_not_coerced() {
    let (repo, tools) = setup();

    let result = tools
        .dispatch(&request(
            "call-1",
            "add_to_database",
            json!({"amount": 12, "category": "Mystery"}),
        ))
        .await;

    assert!(!result.is_success());
    assert!(
        result.payload["error"]
            .as_str()
            .unwrap()
            .contains("unknown category")
    );
    assert_eq!(repo.count("user-1").unwrap(), 0);
}

#[tokio::test]
async fn non_numeric_amount_is_rejected_at_the_schema() {
    let (repo, tools) = setup();

    let result = tools
        .dispatch(&request(
            "call-1",
            "add_to_database",
            json!({"amount": "a lot", "category": "Other"}),
        ))
        .await;

    assert!(!result.is_success());
    assert_eq!(repo.count("user-1").unwrap(), 0);
}

#[tokio::test]
async fn unknown_tool_name_gets_a_failure_result() {
    let (repo, tools) = setup();

    let result = tools
        .dispatch(&request("call-1", "delete_everything", json!({})))
        .await;

    assert!(!result.is_success());
    assert!(
        result.payload["error"]
            .as_str()
            .unwrap()
            .contains("no such tool")
    );
    assert_eq!(repo.count("user-1").unwrap(), 0);

    // The registry keeps dispatching after an unknown name
    let ok = tools
        .dispatch(&request(
            "call-2",
            "add_to_database",
            json!({"amount": 3, "category": "Other"}),
        ))
        .await;
    assert!(ok.is_success());
}

#[tokio::test]
async fn replayed_call_id_does_not_double_insert() {
    let (repo, tools) = setup();
    let args = json!({"amount": 9.99, "category": "Shopping"});

    let first = tools
        .dispatch(&request("call-7", "add_to_database", args.clone()))
        .await;
    let second = tools
        .dispatch(&request("call-7", "add_to_database", args))
        .await;

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(
        first.payload["transaction_id"],
        second.payload["transaction_id"]
    );
    assert_eq!(repo.count("user-1").unwrap(), 1);
}

#[tokio::test]
async fn recent_listing_is_newest_first_and_limited() {
    let (repo, tools) = setup();

    for (i, category) in ["Groceries", "Travel", "Fitness"].iter().enumerate() {
        let result = tools
            .dispatch(&request(
                &format!("call-{i}"),
                "add_to_database",
                json!({"amount": (i + 1) as f64, "category": category}),
            ))
            .await;
        assert!(result.is_success());
    }

    let recent = repo.list_recent("user-1", 2).unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent[0].occurred_at >= recent[1].occurred_at);
    assert_eq!(repo.count("user-1").unwrap(), 3);
}
