//! The closed set of operations the model may invoke.

use serde_json::{Map, Value, json};

use crate::error::ModelError;

/// One of the four agent operations, with its parsed arguments.
#[derive(Debug, Clone, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AgentTool {
    /// Describe node labels, relationship types and properties.
    GetSchema,
    /// Turn a question into a Cypher query.  Defaults to the user's question.
    GenerateQuery { question: Option<String> },
    /// Execute a query read-only.  Defaults to the last generated query.
    RunQuery { query: Option<String> },
    /// Produce the final answer from everything retrieved so far.
    SynthesizeAnswer,
}

impl AgentTool {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Arguments as the JSON object the model would have sent.
    pub fn arguments(&self) -> Value {
        match self {
            AgentTool::GenerateQuery { question: Some(q) } => json!({ "question": q }),
            AgentTool::RunQuery { query: Some(q) } => json!({ "query": q }),
            _ => json!({}),
        }
    }

    /// Function-calling descriptors for all four tools.
    pub fn descriptors() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "get_schema",
                description: "Retrieve the graph database schema: node labels, relationship \
                              types and their properties.",
                parameters: json!({ "type": "object", "properties": {} }),
            },
            ToolDescriptor {
                name: "generate_query",
                description: "Generate a Cypher query that answers the question, based on the \
                              database schema. Always call this before run_query.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "question": {
                            "type": "string",
                            "description": "The question in natural language"
                        }
                    }
                }),
            },
            ToolDescriptor {
                name: "run_query",
                description: "Run a read-only Cypher query against the graph database and \
                              return the matching records.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The Cypher query to execute"
                        }
                    }
                }),
            },
            ToolDescriptor {
                name: "synthesize_answer",
                description: "Write the final answer for the user from the data retrieved so \
                              far. This is the last step.",
                parameters: json!({ "type": "object", "properties": {} }),
            },
        ]
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentToolCall {
    /// Provider-assigned id, echoed back with the tool's output.
    pub id: String,
    pub tool: AgentTool,
}

impl AgentToolCall {
    pub fn new(id: impl Into<String>, tool: AgentTool) -> Self {
        Self {
            id: id.into(),
            tool,
        }
    }

    /// Parse a function call from its name and JSON-encoded arguments.
    pub fn parse(id: impl Into<String>, name: &str, arguments: &str) -> Result<Self, ModelError> {
        let args: Map<String, Value> = if arguments.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(arguments).map_err(|e| {
                ModelError::Malformed(format!("arguments of `{name}` are not a JSON object: {e}"))
            })?
        };
        let text = |key: &str| {
            args.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };

        let tool = match name {
            "get_schema" => AgentTool::GetSchema,
            "generate_query" => AgentTool::GenerateQuery {
                question: text("question"),
            },
            "run_query" => AgentTool::RunQuery {
                query: text("query").or_else(|| text("cypher_query")),
            },
            "synthesize_answer" => AgentTool::SynthesizeAnswer,
            other => return Err(ModelError::Malformed(format!("unknown tool `{other}`"))),
        };
        Ok(Self::new(id, tool))
    }
}

/// A callable tool as advertised to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}

// ── Tests ──────────────────────────────────────────────────────────────────────
