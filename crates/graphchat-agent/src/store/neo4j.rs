//! Neo4j over its HTTP Query API (`POST /db/{database}/query/v2`).
//!
//! Every statement is sent with `accessMode: "Read"`, so the server itself
//! refuses writes even if a query slips past [`crate::guard`].

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{GraphStore, Record};
use crate::error::GraphStoreError;

const NODE_PROPERTIES: &str = "CALL db.schema.nodeTypeProperties() \
     YIELD nodeLabels, propertyName, propertyTypes \
     RETURN nodeLabels, propertyName, propertyTypes";

const RELATIONSHIP_PROPERTIES: &str = "CALL db.schema.relTypeProperties() \
     YIELD relType, propertyName, propertyTypes \
     RETURN relType, propertyName, propertyTypes";

const RELATIONSHIP_PATTERNS: &str = "MATCH (a)-[r]->(b) \
     WITH DISTINCT labels(a) AS source, type(r) AS relationship, labels(b) AS target \
     RETURN source, relationship, target LIMIT 200";

/// Upper bound on rows read while introspecting the schema.
const SCHEMA_ROW_LIMIT: usize = 1_000;

/// Connection settings for [`Neo4jStore`].
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    /// HTTP base URI, e.g. `http://localhost:7474`.
    pub uri: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Deadline for each HTTP call.
    pub timeout: Duration,
}

pub struct Neo4jStore {
    client: Client,
    endpoint: String,
    username: String,
    password: String,
}

impl std::fmt::Debug for Neo4jStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jStore")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Neo4jStore {
    pub fn new(config: &Neo4jConfig) -> Result<Self, GraphStoreError> {
        let client = Client::builder()
            .user_agent(concat!("graphchat-agent/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| GraphStoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/db/{}/query/v2",
                config.uri.trim_end_matches('/'),
                config.database
            ),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    async fn execute(&self, statement: &str, row_limit: usize) -> Result<Vec<Record>, GraphStoreError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .header(ACCEPT, "application/json")
            .json(&json!({ "statement": statement, "accessMode": "Read" }))
            .send()
            .await
            .map_err(|e| GraphStoreError::Unavailable(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GraphStoreError::Unavailable(e.to_string()))?;
        debug!(status, bytes = body.len(), "neo4j query answered");
        parse_response(status, &body, row_limit)
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn schema(&self) -> Result<String, GraphStoreError> {
        let nodes = self.execute(NODE_PROPERTIES, SCHEMA_ROW_LIMIT).await?;
        let relationships = self.execute(RELATIONSHIP_PROPERTIES, SCHEMA_ROW_LIMIT).await?;
        let patterns = self.execute(RELATIONSHIP_PATTERNS, SCHEMA_ROW_LIMIT).await?;
        Ok(format_schema(&nodes, &relationships, &patterns))
    }

    async fn run_read(&self, query: &str, row_limit: usize) -> Result<Vec<Record>, GraphStoreError> {
        self.execute(query, row_limit).await
    }
}

// ── Response decoding ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    errors: Vec<QueryErrorBody>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    fields: Vec<String>,
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct QueryErrorBody {
    code: String,
    message: String,
}

fn parse_response(status: u16, body: &str, row_limit: usize) -> Result<Vec<Record>, GraphStoreError> {
    let parsed: Result<QueryResponse, _> = serde_json::from_str(body);
    match parsed {
        Ok(response) if !response.errors.is_empty() => Err(classify(&response.errors[0])),
        Ok(response) if (200..300).contains(&status) => {
            let data = response
                .data
                .ok_or_else(|| GraphStoreError::Decode("response has no data".into()))?;
            Ok(data
                .values
                .into_iter()
                .take(row_limit)
                .map(|row| data.fields.iter().cloned().zip(row).collect())
                .collect())
        }
        _ if status == 401 || status == 403 || status >= 500 => {
            Err(GraphStoreError::Unavailable(format!("HTTP {status}")))
        }
        Ok(_) => Err(GraphStoreError::Decode(format!(
            "HTTP {status} without error details"
        ))),
        Err(e) => Err(GraphStoreError::Decode(e.to_string())),
    }
}

fn classify(error: &QueryErrorBody) -> GraphStoreError {
    let code = error.code.as_str();
    if code.starts_with("Neo.ClientError.Security")
        || code.starts_with("Neo.TransientError")
        || code.starts_with("Neo.DatabaseError")
    {
        GraphStoreError::Unavailable(format!("{code}: {}", error.message))
    } else {
        GraphStoreError::Query {
            code: error.code.clone(),
            message: error.message.clone(),
        }
    }
}

// ── Schema formatting ────────────────────────────────────────────────────────

fn strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn property(row: &Record) -> Option<String> {
    let name = row.get("propertyName")?.as_str()?;
    let kind = strings(row.get("propertyTypes"))
        .first()
        .map(|t| t.to_uppercase())
        .unwrap_or_else(|| "ANY".to_owned());
    Some(format!("{name}: {kind}"))
}

fn format_schema(nodes: &[Record], relationships: &[Record], patterns: &[Record]) -> String {
    let mut node_props: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in nodes {
        let label = strings(row.get("nodeLabels")).join(":");
        if label.is_empty() {
            continue;
        }
        let entry = node_props.entry(label).or_default();
        entry.extend(property(row));
    }

    let mut rel_props: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in relationships {
        let Some(rel) = row.get("relType").and_then(Value::as_str) else {
            continue;
        };
        let rel = rel.trim_start_matches(':').trim_matches('`').to_owned();
        let entry = rel_props.entry(rel).or_default();
        entry.extend(property(row));
    }

    let edges: BTreeSet<String> = patterns
        .iter()
        .filter_map(|row| {
            let rel = row.get("relationship")?.as_str()?;
            Some(format!(
                "(:{})-[:{}]->(:{})",
                strings(row.get("source")).join(":"),
                rel,
                strings(row.get("target")).join(":")
            ))
        })
        .collect();

    let mut out = String::from("Node properties:\n");
    for (label, props) in &node_props {
        out.push_str(&format!("{label} {{{}}}\n", props.join(", ")));
    }
    out.push_str("Relationship properties:\n");
    for (rel, props) in rel_props.iter().filter(|(_, p)| !p.is_empty()) {
        out.push_str(&format!("{rel} {{{}}}\n", props.join(", ")));
    }
    out.push_str("The relationships:\n");
    for edge in &edges {
        out.push_str(edge);
        out.push('\n');
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
