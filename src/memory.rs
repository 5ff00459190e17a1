//! In-memory model
//!
//! A [`Model`] over a vector of JSON rows. Backs the demo binary and the
//! test suites; every asynchronous operation resolves on the tokio runtime.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};

use crate::cache::Arg;
use crate::model::{Invocation, Model};

const OPERATIONS: &[&str] = &[
    "find_all",
    "find_one",
    "find_by_pk",
    "count",
    "create",
    "update",
    "destroy",
    "describe",
];

/// In-memory model with per-operation call counting.
pub struct MemoryModel {
    name: String,
    rows: Arc<RwLock<Vec<Value>>>,
    associations: Vec<String>,
    calls: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
    latency: Option<Duration>,
}

impl MemoryModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Arc::new(RwLock::new(Vec::new())),
            associations: Vec::new(),
            calls: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            latency: None,
        }
    }

    /// Seeds the model with rows.
    pub fn with_rows(self, rows: Vec<Value>) -> Self {
        *self.rows.write() = rows;
        self
    }

    /// Models returned by [`Model::associate`].
    pub fn with_associations<I, S>(mut self, related: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.associations = related.into_iter().map(Into::into).collect();
        self
    }

    /// Delays every asynchronous operation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes later invocations of `operation` fail asynchronously.
    pub fn fail_operation(&self, operation: &str) {
        self.failing.lock().insert(operation.to_string());
    }

    /// Number of times `operation` reached this model.
    pub fn calls(&self, operation: &str) -> usize {
        self.calls.lock().get(operation).copied().unwrap_or(0)
    }

    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    fn deferred<F>(&self, operation: &str, work: F) -> Invocation
    where
        F: FnOnce(&RwLock<Vec<Value>>) -> anyhow::Result<Value> + Send + 'static,
    {
        let rows = self.rows.clone();
        let latency = self.latency;
        let failure = self
            .failing
            .lock()
            .contains(operation)
            .then(|| anyhow!("{}.{} failed", self.name, operation));

        Invocation::deferred(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            if let Some(error) = failure {
                return Err(error);
            }
            work(&rows)
        })
    }
}

/// `where` clause of an options argument, as a JSON object.
fn where_clause(args: &[Arg]) -> Map<String, Value> {
    args.first()
        .and_then(|options| options.get("where"))
        .and_then(Arg::to_json)
        .and_then(|clause| match clause {
            Value::Object(fields) => Some(fields),
            _ => None,
        })
        .unwrap_or_default()
}

fn matches(row: &Value, clause: &Map<String, Value>) -> bool {
    clause
        .iter()
        .all(|(field, expected)| row.get(field) == Some(expected))
}

fn project(row: &Value, args: &[Arg]) -> Value {
    match args.get(1) {
        Some(Arg::Func(mapper)) => mapper.call(row.clone()),
        _ => row.clone(),
    }
}

impl Model for MemoryModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn operations(&self) -> Vec<String> {
        OPERATIONS.iter().map(|s| s.to_string()).collect()
    }

    fn invoke(&self, operation: &str, args: &[Arg]) -> anyhow::Result<Invocation> {
        *self.calls.lock().entry(operation.to_string()).or_default() += 1;

        let clause = where_clause(args);
        let args: Vec<Arg> = args.to_vec();

        let invocation = match operation {
            "find_all" => self.deferred(operation, move |rows| {
                let found = rows
                    .read()
                    .iter()
                    .filter(|row| matches(row, &clause))
                    .map(|row| project(row, &args))
                    .collect();
                Ok(Value::Array(found))
            }),
            "find_one" => self.deferred(operation, move |rows| {
                Ok(rows
                    .read()
                    .iter()
                    .find(|row| matches(row, &clause))
                    .map(|row| project(row, &args))
                    .unwrap_or(Value::Null))
            }),
            "find_by_pk" => {
                let pk = args.first().and_then(Arg::to_json).unwrap_or(Value::Null);
                self.deferred(operation, move |rows| {
                    Ok(rows
                        .read()
                        .iter()
                        .find(|row| row.get("id") == Some(&pk))
                        .map(|row| project(row, &args))
                        .unwrap_or(Value::Null))
                })
            }
            "count" => self.deferred(operation, move |rows| {
                let count = rows.read().iter().filter(|row| matches(row, &clause)).count();
                Ok(json!(count))
            }),
            "create" => {
                let Some(Value::Object(mut values)) = args.first().and_then(Arg::to_json) else {
                    bail!("{}.create expects an object of values", self.name);
                };
                self.deferred(operation, move |rows| {
                    let mut rows = rows.write();
                    if !values.contains_key("id") {
                        let next = rows
                            .iter()
                            .filter_map(|row| row.get("id").and_then(Value::as_i64))
                            .max()
                            .unwrap_or(0)
                            + 1;
                        values.insert("id".to_string(), json!(next));
                    }
                    let row = Value::Object(values);
                    rows.push(row.clone());
                    Ok(row)
                })
            }
            "update" => {
                let Some(Value::Object(values)) = args.first().and_then(Arg::to_json) else {
                    bail!("{}.update expects an object of values", self.name);
                };
                let clause = where_clause(&args[1..]);
                self.deferred(operation, move |rows| {
                    let mut updated = 0;
                    for row in rows.write().iter_mut() {
                        if !matches(row, &clause) {
                            continue;
                        }
                        if let Value::Object(fields) = row {
                            for (k, v) in &values {
                                fields.insert(k.clone(), v.clone());
                            }
                            updated += 1;
                        }
                    }
                    Ok(json!(updated))
                })
            }
            "destroy" => self.deferred(operation, move |rows| {
                let mut rows = rows.write();
                let before = rows.len();
                rows.retain(|row| !matches(row, &clause));
                Ok(json!(before - rows.len()))
            }),
            "describe" => Invocation::Ready(json!({
                "name": self.name,
                "operations": OPERATIONS,
                "associations": self.associations,
            })),
            other => bail!("{} has no operation {}", self.name, other),
        };

        Ok(invocation)
    }

    fn associate(&self) -> Vec<String> {
        self.associations.clone()
    }
}

// == Demo Fixture ==
/// One seeded model per name, each holding three rows and associated with the
/// next name in the list. Backs the demo binary.
pub fn demo_models(names: &[String]) -> Vec<Arc<dyn Model>> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let rows = (1..=3)
                .map(|id| json!({"id": id, "name": format!("{} {}", name.to_lowercase(), id)}))
                .collect();
            let model = MemoryModel::new(name.clone())
                .with_rows(rows)
                .with_associations(names.get(i + 1).cloned());
            Arc::new(model) as Arc<dyn Model>
        })
        .collect()
}

impl fmt::Debug for MemoryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryModel")
            .field("name", &self.name)
            .field("rows", &self.row_count())
            .field("associations", &self.associations)
            .finish_non_exhaustive()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FnRef;

    fn users() -> MemoryModel {
        MemoryModel::new("User").with_rows(vec![
            json!({"id": 1, "name": "ada", "team": "core"}),
            json!({"id": 2, "name": "grace", "team": "core"}),
            json!({"id": 3, "name": "linus", "team": "kernel"}),
        ])
    }

    fn options(clause: Value) -> Arg {
        Arg::from(json!({ "where": clause }))
    }

    async fn run(model: &MemoryModel, op: &str, args: &[Arg]) -> Value {
        model.invoke(op, args).unwrap().resolve().await.unwrap()
    }

    #[tokio::test]
    async fn test_find_all_filters_rows() {
        let model = users();

        let found = run(&model, "find_all", &[options(json!({"team": "core"}))]).await;

        assert_eq!(found.as_array().unwrap().len(), 2);
        assert_eq!(model.calls("find_all"), 1);
    }

    #[tokio::test]
    async fn test_find_all_applies_mapper() {
        let model = users();
        let names = FnRef::new("name", |row: Value| row["name"].clone());

        let found = run(&model, "find_all", &[options(json!({})), Arg::Func(names)]).await;

        assert_eq!(found, json!(["ada", "grace", "linus"]));
    }

    #[tokio::test]
    async fn test_find_one_and_by_pk() {
        let model = users();

        let one = run(&model, "find_one", &[options(json!({"name": "linus"}))]).await;
        let by_pk = run(&model, "find_by_pk", &[Arg::Int(2)]).await;
        let missing = run(&model, "find_by_pk", &[Arg::Int(99)]).await;

        assert_eq!(one["id"], json!(3));
        assert_eq!(by_pk["name"], json!("grace"));
        assert!(missing.is_null());
    }

    #[tokio::test]
    async fn test_writes() {
        let model = users();

        let created = run(&model, "create", &[Arg::from(json!({"name": "barbara"}))]).await;
        assert_eq!(created["id"], json!(4));

        let updated = run(
            &model,
            "update",
            &[
                Arg::from(json!({"team": "infra"})),
                options(json!({"team": "core"})),
            ],
        )
        .await;
        assert_eq!(updated, json!(2));

        let destroyed = run(&model, "destroy", &[options(json!({"team": "infra"}))]).await;
        assert_eq!(destroyed, json!(2));
        assert_eq!(model.row_count(), 2);
    }

    #[tokio::test]
    async fn test_describe_is_ready() {
        let model = users().with_associations(["Post"]);

        let invocation = model.invoke("describe", &[]).unwrap();

        assert!(matches!(invocation, Invocation::Ready(_)));
        assert_eq!(model.associate(), vec!["Post".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_operation() {
        let model = users();
        model.fail_operation("count");

        let result = model.invoke("count", &[]).unwrap().resolve().await;

        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_operation() {
        let model = users();
        assert!(model.invoke("explode", &[]).is_err());
    }

    #[tokio::test]
    async fn test_demo_models_are_seeded_and_chained() {
        let names = vec!["Post".to_string(), "User".to_string()];
        let models = demo_models(&names);

        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name(), "Post");
        assert_eq!(models[0].associate(), vec!["User".to_string()]);
        assert!(models[1].associate().is_empty());

        let found = models[1]
            .invoke("find_one", &[options(json!({"id": 2}))])
            .unwrap()
            .resolve()
            .await
            .unwrap();
        assert_eq!(found["name"], "user 2");
    }
}
