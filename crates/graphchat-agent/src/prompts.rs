//! Prompt templates and transcript builders.

use graphchat_types::ChatMessage;

use crate::model::TranscriptMessage;

pub const SYSTEM_PROMPT: &str = "\
You are a helpful assistant that answers questions using a Neo4j graph database.
Use the available tools to retrieve information from the database and provide accurate answers.
Fetch the schema first, generate a Cypher query with generate_query, execute it with run_query,
and finish by calling synthesize_answer. Limit answers to 5 results.";

const QUERY_GENERATION_PROMPT: &str = "\
Task: generate a Cypher statement to query a graph database.
Instructions:
Use only the provided relationship types and properties in the schema.
Do not use any other relationship types or properties that are not provided.
Only read data: never create, update or delete anything.
Respond with the Cypher statement only, without explanations or apologies.

Schema:
";

const ANSWER_PROMPT: &str = "\
You are an assistant that helps to form nice and human understandable answers.
The context section contains the records returned by database queries; treat it as
authoritative and never correct it with your own knowledge.
If the context is empty, say that you don't know the answer.
Do not mention that the answer is based on database records.";

/// Appended to answers synthesized from partial results.
pub const INCOMPLETE_NOTE: &str =
    "\n\n(Note: this answer may be incomplete, the database could not be fully queried.)";

/// Returned by `get_schema` when the store could not be introspected.
pub const FALLBACK_SCHEMA: &str = "\
Schema unavailable. Use generic MATCH patterns, for example
MATCH (n) RETURN labels(n), n LIMIT 5";

/// The transcript that drives tool selection.
pub fn agent_transcript(history: &[ChatMessage], question: &str) -> Vec<TranscriptMessage> {
    let mut transcript = Vec::with_capacity(history.len() + 2);
    transcript.push(TranscriptMessage::System(SYSTEM_PROMPT.to_owned()));
    transcript.extend(history.iter().map(TranscriptMessage::from));
    transcript.push(TranscriptMessage::User(question.to_owned()));
    transcript
}

pub fn query_generation(schema: &str, question: &str) -> Vec<TranscriptMessage> {
    vec![
        TranscriptMessage::System(format!("{QUERY_GENERATION_PROMPT}{schema}")),
        TranscriptMessage::User(question.to_owned()),
    ]
}

/// The transcript whose streamed completion becomes the final answer.
pub fn synthesis(
    history: &[ChatMessage],
    question: &str,
    results: &[String],
) -> Vec<TranscriptMessage> {
    let context = if results.is_empty() {
        "(no records)".to_owned()
    } else {
        results.join("\n")
    };

    let mut transcript = Vec::with_capacity(history.len() + 2);
    transcript.push(TranscriptMessage::System(ANSWER_PROMPT.to_owned()));
    transcript.extend(history.iter().map(TranscriptMessage::from));
    transcript.push(TranscriptMessage::User(format!(
        "Context:\n{context}\n\nQuestion: {question}"
    )));
    transcript
}
