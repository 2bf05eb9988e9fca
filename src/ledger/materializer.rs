//! Transaction materializer - the `add_to_database` tool handler
//!
//! Converts a validated tool payload into a persisted transaction record
//! attributed to the session's user. Never constructed from raw model
//! text; only the dispatch table reaches this code.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::{Category, TransactionRepo};
use crate::tools::{ParamKind, ParamSpec, ToolDeclaration, ToolHandler};
use crate::{Error, Result};

/// Tool name advertised to the model
pub const ADD_TO_DATABASE: &str = "add_to_database";

/// Structured payload extracted from a successful tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedTransaction {
    pub amount: f64,
    pub category: Category,
    pub description: Option<String>,
}

impl ExtractedTransaction {
    /// Validate raw tool arguments into a typed payload
    ///
    /// # Errors
    ///
    /// Returns a validation error for a missing or non-positive amount,
    /// or an unknown category
    pub fn from_arguments(args: &Map<String, Value>) -> Result<Self> {
        let amount = args
            .get("amount")
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::Validation("amount must be a number".to_string()))?;

        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::Validation(format!(
                "amount must be positive, got {amount}"
            )));
        }

        let category: Category = args
            .get("category")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Validation("category must be a string".to_string()))?
            .parse()?;

        let description = args
            .get("description")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);

        Ok(Self {
            amount,
            category,
            description,
        })
    }
}

/// Persists extracted transactions for one user within one session
///
/// Closed over the storage handle only, so it is safe to invoke from the
/// receiver task. Idempotent per call id: at-least-once tool delivery
/// cannot double-insert.
pub struct TransactionMaterializer {
    repo: TransactionRepo,
    user_id: String,
    session_id: String,
}

impl TransactionMaterializer {
    #[must_use]
    pub fn new(
        repo: TransactionRepo,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    /// The declaration advertised to the model for this handler
    #[must_use]
    pub fn declaration() -> ToolDeclaration {
        ToolDeclaration {
            name: ADD_TO_DATABASE.to_string(),
            description:
                "Adds an entry of spending or income to the user's personal database".to_string(),
            params: vec![
                ParamSpec::required("amount", ParamKind::Number),
                ParamSpec::required("category", ParamKind::String),
                ParamSpec::optional("description", ParamKind::String),
            ],
        }
    }
}

#[async_trait]
impl ToolHandler for TransactionMaterializer {
    async fn invoke(&self, call_id: &str, args: &Map<String, Value>) -> Result<Value> {
        let extracted = ExtractedTransaction::from_arguments(args)?;

        let record = self.repo.create_for_call(
            &self.session_id,
            call_id,
            &self.user_id,
            extracted.amount,
            extracted.category,
            extracted.description.as_deref(),
        )?;

        tracing::info!(
            id = %record.id,
            amount = record.amount,
            category = %record.category,
            "transaction recorded"
        );

        Ok(json!({
            "status": "success",
            "transaction_id": record.id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{UserRepo, init_memory};

    fn setup() -> (TransactionRepo, TransactionMaterializer) {
        let pool = init_memory().unwrap();
        UserRepo::new(pool.clone()).find_or_create("user-1").unwrap();
        let repo = TransactionRepo::new(pool);
        let materializer = TransactionMaterializer::new(repo.clone(), "user-1", "sess-1");
        (repo, materializer)
    }

    fn args(value: Value) -> Map<String, Value> {
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        map
    }

    #[tokio::test]
    async fn valid_arguments_persist_a_record() {
        let (repo, materializer) = setup();

        let payload = materializer
            .invoke(
                "call-1",
                &args(json!({
                    "amount": 25.50,
                    "category": "Food & Dining",
                    "description": "Coffee",
                })),
            )
            .await
            .unwrap();

        assert_eq!(payload["status"], "success");

        let recent = repo.list_recent("user-1", 10).unwrap();
        assert_eq!(recent.len(), 1);
        assert!((recent[0].amount - 25.50).abs() < f64::EPSILON);
        assert_eq!(recent[0].category, Category::FoodAndDining);
        assert_eq!(recent[0].description.as_deref(), Some("Coffee"));
        assert_eq!(recent[0].input_method, "voice");
    }

    #[tokio::test]
    async fn negative_amount_fails_without_persisting() {
        let (repo, materializer) = setup();

        let result = materializer
            .invoke(
                "call-1",
                &args(json!({"amount": -5, "category": "Food & Dining"})),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(repo.count("user-1").unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_category_fails_without_persisting() {
        let (repo, materializer) = setup();

        let result = materializer
            .invoke("call-1", &args(json!({"amount": 5, "category": "Bribes"})))
            .await;

        assert!(result.is_err());
        assert_eq!(repo.count("user-1").unwrap(), 0);
    }

    #[tokio::test]
    async fn replayed_call_id_persists_once() {
        let (repo, materializer) = setup();
        let arguments = args(json!({"amount": 10, "category": "Groceries"}));

        let first = materializer.invoke("call-1", &arguments).await.unwrap();
        let second = materializer.invoke("call-1", &arguments).await.unwrap();

        assert_eq!(first["transaction_id"], second["transaction_id"]);
        assert_eq!(repo.count("user-1").unwrap(), 1);
    }

    #[test]
    fn blank_description_is_dropped() {
        let extracted = ExtractedTransaction::from_arguments(&args(json!({
            "amount": 1.0,
            "category": "Other",
            "description": "   ",
        })))
        .unwrap();

        assert!(extracted.description.is_none());
    }

    #[test]
    fn declaration_matches_registered_name() {
        let declaration = TransactionMaterializer::declaration();
        assert_eq!(declaration.name, ADD_TO_DATABASE);
        assert_eq!(declaration.params.len(), 3);
    }
}
