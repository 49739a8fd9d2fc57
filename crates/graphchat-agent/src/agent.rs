//! The bounded tool-use loop.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use graphchat_types::{ChatMessage, StreamChunk};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::error::{AgentError, GraphStoreError, ModelError};
use crate::guard;
use crate::model::{LanguageModel, ModelTurn, TranscriptMessage};
use crate::prompts;
use crate::schema::SchemaCache;
use crate::store::GraphStore;
use crate::tool::{AgentTool, AgentToolCall};

/// Frames buffered between the agent task and the HTTP response.
const CHUNK_BUFFER: usize = 32;

/// Tool output for queries requested after the failure budget is spent.
const QUERY_BUDGET_SPENT: &str = "Error: the query budget is exhausted; no more queries will run.";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model turns allowed before synthesis is forced.
    pub max_iterations: usize,
    /// Rows kept from each query result.
    pub max_result_rows: usize,
    /// Characters kept from each string field of a result.
    pub max_field_chars: usize,
    /// Failed query executions tolerated before synthesis is forced.
    pub max_query_attempts: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            max_result_rows: 5,
            max_field_chars: 500,
            max_query_attempts: 2,
        }
    }
}

/// States visited by a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    Start,
    Schema,
    QueryGen,
    QueryExec,
    Synthesize,
    Done,
    Failed,
}

/// What a run did.
#[derive(Debug, Clone, Default)]
pub struct AgentRun {
    pub trace: Vec<AgentState>,
    /// Model turns spent choosing tools.
    pub iterations: usize,
    /// Set when synthesis was forced by the iteration cap or repeated query
    /// failures.
    pub incomplete: bool,
    /// Rendered results of every successful query.
    pub results: Vec<String>,
    /// The streamed answer, as sent.
    pub answer: String,
}

enum QueryOutcome {
    Rows(String),
    /// A recoverable failure, described for the model.
    Rejected(String),
}

pub struct GraphQueryAgent {
    store: Arc<dyn GraphStore>,
    model: Arc<dyn LanguageModel>,
    schema: SchemaCache,
    config: AgentConfig,
}

impl GraphQueryAgent {
    pub fn new(
        store: Arc<dyn GraphStore>,
        model: Arc<dyn LanguageModel>,
        config: AgentConfig,
    ) -> Self {
        Self {
            store,
            model,
            schema: SchemaCache::new(),
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Answer `question` on a background task.
    ///
    /// The returned stream yields the synthesized answer as content chunks
    /// followed by exactly one terminal chunk, which carries an error if the
    /// run failed.  Dropping the stream cancels the run.
    pub fn answer(
        self: &Arc<Self>,
        question: String,
        history: Vec<ChatMessage>,
    ) -> ReceiverStream<StreamChunk> {
        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let agent = Arc::clone(self);

        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = tx.closed() => {
                    info!("answer stream dropped, cancelling agent run");
                    return;
                }
                outcome = agent.run(&question, &history, &tx) => outcome,
            };

            let last = match outcome {
                Ok(run) => {
                    info!(
                        iterations = run.iterations,
                        incomplete = run.incomplete,
                        results = run.results.len(),
                        "agent run finished"
                    );
                    StreamChunk::done()
                }
                Err(AgentError::Cancelled) => return,
                Err(e) => StreamChunk::error(e.client_message()),
            };
            let _ = tx.send(last).await;
        });

        ReceiverStream::new(rx)
    }

    /// Run the loop to completion, sending answer tokens to `sink`.
    ///
    /// Only content chunks are sent; the caller emits the terminal chunk.
    pub async fn run(
        &self,
        question: &str,
        history: &[ChatMessage],
        sink: &mpsc::Sender<StreamChunk>,
    ) -> Result<AgentRun, AgentError> {
        let mut run = AgentRun {
            trace: vec![AgentState::Start],
            ..AgentRun::default()
        };

        match self.drive(question, history, sink, &mut run).await {
            Ok(()) => {
                debug!(trace = ?run.trace, "agent trace");
                Ok(run)
            }
            Err(AgentError::Cancelled) => {
                info!(trace = ?run.trace, "answer stream closed, agent run cancelled");
                Err(AgentError::Cancelled)
            }
            Err(e) => {
                run.trace.push(AgentState::Failed);
                error!(error = %e, trace = ?run.trace, "agent run failed");
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        question: &str,
        history: &[ChatMessage],
        sink: &mpsc::Sender<StreamChunk>,
        run: &mut AgentRun,
    ) -> Result<(), AgentError> {
        let tools = AgentTool::descriptors();
        let mut transcript = prompts::agent_transcript(history, question);
        let mut last_query: Option<String> = None;
        let mut query_failures = 0;

        loop {
            if run.iterations >= self.config.max_iterations {
                warn!(
                    iterations = run.iterations,
                    "iteration cap reached, synthesizing from partial results"
                );
                run.incomplete = true;
                break;
            }
            run.iterations += 1;

            let turn = {
                let (transcript, tools) = (&transcript, &tools);
                retry_once(move || self.model.complete(transcript, tools))
                    .await
                    .map_err(AgentError::Model)?
            };
            let calls = match turn {
                ModelTurn::ToolCalls(calls) => calls,
                ModelTurn::Text(_) => {
                    debug!("model answered without a tool call, forcing synthesis");
                    break;
                }
            };

            transcript.push(TranscriptMessage::Assistant {
                content: None,
                tool_calls: calls.clone(),
            });

            let mut synthesize = false;
            for AgentToolCall { id, tool } in calls {
                debug!(tool = tool.name(), "tool call");
                let output = match tool {
                    AgentTool::GetSchema => {
                        run.trace.push(AgentState::Schema);
                        self.schema.get(self.store.as_ref()).await
                    }
                    AgentTool::GenerateQuery { question: asked } => {
                        run.trace.push(AgentState::QueryGen);
                        let query = self
                            .generate_query(asked.as_deref().unwrap_or(question))
                            .await?;
                        last_query = Some(query.clone());
                        query
                    }
                    AgentTool::RunQuery { query } => {
                        run.trace.push(AgentState::QueryExec);
                        match query.or_else(|| last_query.clone()) {
                            None => "Error: there is no query to run. Call generate_query first."
                                .to_owned(),
                            Some(_) if query_failures >= self.config.max_query_attempts => {
                                debug!("query budget spent, skipping execution");
                                QUERY_BUDGET_SPENT.to_owned()
                            }
                            Some(query) => match self.execute(&query).await? {
                                QueryOutcome::Rows(rendered) => {
                                    run.results.push(rendered.clone());
                                    rendered
                                }
                                QueryOutcome::Rejected(feedback) => {
                                    query_failures += 1;
                                    feedback
                                }
                            },
                        }
                    }
                    AgentTool::SynthesizeAnswer => {
                        synthesize = true;
                        "Writing the final answer.".to_owned()
                    }
                };
                transcript.push(TranscriptMessage::Tool {
                    call_id: id,
                    content: output,
                });
            }

            if synthesize {
                break;
            }
            if query_failures >= self.config.max_query_attempts {
                warn!(
                    failures = query_failures,
                    "query attempts exhausted, synthesizing incomplete answer"
                );
                run.incomplete = true;
                break;
            }
        }

        self.synthesize(question, history, sink, run).await
    }

    async fn generate_query(&self, question: &str) -> Result<String, AgentError> {
        let schema = self.schema.get(self.store.as_ref()).await;
        let transcript = prompts::query_generation(&schema, question);
        let (model, transcript) = (&self.model, &transcript);

        let query = retry_once(move || async move {
            let text = model.generate(transcript).await?;
            let query = guard::strip_code_fences(&text);
            if query.is_empty() {
                return Err(ModelError::Malformed("empty query".into()));
            }
            Ok(query)
        })
        .await
        .map_err(AgentError::QueryGeneration)?;

        debug!(%query, "query generated");
        Ok(query)
    }

    async fn execute(&self, query: &str) -> Result<QueryOutcome, AgentError> {
        let query = guard::strip_code_fences(query);
        if let Err(rejected) = guard::ensure_read_only(&query) {
            warn!(%query, "write query rejected");
            return Ok(QueryOutcome::Rejected(format!("Error: {rejected}")));
        }

        match self.store.run_read(&query, self.config.max_result_rows).await {
            Ok(records) if records.is_empty() => Ok(QueryOutcome::Rejected(
                "No results found. Try a different query.".to_owned(),
            )),
            Ok(records) => {
                let bounded = guard::bound_records(
                    records,
                    self.config.max_result_rows,
                    self.config.max_field_chars,
                );
                Ok(QueryOutcome::Rows(guard::render_records(&bounded)))
            }
            Err(GraphStoreError::Unavailable(reason)) => Err(AgentError::StoreUnavailable(reason)),
            Err(e) => {
                debug!(error = %e, "query failed");
                Ok(QueryOutcome::Rejected(format!(
                    "Error executing Cypher query: {e}"
                )))
            }
        }
    }

    async fn synthesize(
        &self,
        question: &str,
        history: &[ChatMessage],
        sink: &mpsc::Sender<StreamChunk>,
        run: &mut AgentRun,
    ) -> Result<(), AgentError> {
        run.trace.push(AgentState::Synthesize);
        let transcript = prompts::synthesis(history, question, &run.results);

        let mut tokens = {
            let transcript = &transcript;
            retry_once(move || self.model.stream(transcript))
                .await
                .map_err(AgentError::Model)?
        };

        while let Some(token) = tokens.next().await {
            let token = token.map_err(AgentError::Model)?;
            run.answer.push_str(&token);
            sink.send(StreamChunk::content(token))
                .await
                .map_err(|_| AgentError::Cancelled)?;
        }

        if run.incomplete {
            run.answer.push_str(prompts::INCOMPLETE_NOTE);
            sink.send(StreamChunk::content(prompts::INCOMPLETE_NOTE))
                .await
                .map_err(|_| AgentError::Cancelled)?;
        }

        run.trace.push(AgentState::Done);
        Ok(())
    }
}

/// Run `attempt`, and once more if it fails.
async fn retry_once<T, F, Fut>(mut attempt: F) -> Result<T, ModelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    match attempt().await {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!(error = %e, "model call failed, retrying once");
            attempt().await
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream;
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;
    use crate::model::TokenStream;
    use crate::store::Record;
    use crate::tool::ToolDescriptor;

    // ── Fakes ────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeModel {
        /// Answers to tool-offering completions.
        turns: Mutex<VecDeque<Result<ModelTurn, ModelError>>>,
        /// Answer once `turns` runs dry.
        repeat: Option<ModelTurn>,
        /// Answers to plain generations (query generation).
        queries: Mutex<VecDeque<Result<String, ModelError>>>,
        tokens: Vec<String>,
        /// Transcripts seen by tool-offering completions.
        seen: Mutex<Vec<Vec<TranscriptMessage>>>,
    }

    impl FakeModel {
        fn turns(turns: Vec<Result<ModelTurn, ModelError>>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
                tokens: vec!["Hack".into(), "athon".into()],
                ..Self::default()
            }
        }

        fn with_queries(self, queries: Vec<Result<String, ModelError>>) -> Self {
            *self.queries.lock().unwrap() = queries.into();
            self
        }

        fn tool_rounds(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModel for FakeModel {
        async fn complete(
            &self,
            transcript: &[TranscriptMessage],
            tools: &[ToolDescriptor],
        ) -> Result<ModelTurn, ModelError> {
            if tools.is_empty() {
                return self
                    .queries
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Ok("MATCH (n) RETURN n LIMIT 5".into()))
                    .map(ModelTurn::Text);
            }
            self.seen.lock().unwrap().push(transcript.to_vec());
            match self.turns.lock().unwrap().pop_front() {
                Some(turn) => turn,
                None => Ok(self
                    .repeat
                    .clone()
                    .unwrap_or_else(|| ModelTurn::Text("done".into()))),
            }
        }

        async fn stream(&self, _: &[TranscriptMessage]) -> Result<TokenStream, ModelError> {
            let tokens: Vec<Result<String, ModelError>> =
                self.tokens.iter().cloned().map(Ok).collect();
            Ok(Box::pin(stream::iter(tokens)))
        }
    }

    #[derive(Default)]
    struct FakeStore {
        results: Mutex<VecDeque<Result<Vec<Record>, GraphStoreError>>>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn answering(results: Vec<Result<Vec<Record>, GraphStoreError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                ..Self::default()
            }
        }

        fn executed(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GraphStore for FakeStore {
        async fn schema(&self) -> Result<String, GraphStoreError> {
            Ok("Node properties:\nActivity {name: STRING}\n".into())
        }

        async fn run_read(&self, query: &str, _: usize) -> Result<Vec<Record>, GraphStoreError> {
            self.queries.lock().unwrap().push(query.to_owned());
            self.results.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(GraphStoreError::Query {
                    code: "Neo.ClientError.Statement.SyntaxError".into(),
                    message: "Invalid input".into(),
                })
            })
        }
    }

    fn call(tool: AgentTool) -> Result<ModelTurn, ModelError> {
        Ok(ModelTurn::ToolCalls(vec![AgentToolCall::new(
            format!("call_{}", tool.name()),
            tool,
        )]))
    }

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn agent(store: Arc<FakeStore>, model: Arc<FakeModel>) -> Arc<GraphQueryAgent> {
        Arc::new(GraphQueryAgent::new(store, model, AgentConfig::default()))
    }

    async fn run(agent: &GraphQueryAgent) -> (Result<AgentRun, AgentError>, Vec<StreamChunk>) {
        let (tx, mut rx) = mpsc::channel(64);
        let outcome = agent.run("Which activities are there?", &[], &tx).await;
        drop(tx);
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        (outcome, chunks)
    }

    // ── Scenarios ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn answers_through_all_four_tools() {
        let store = Arc::new(FakeStore::answering(vec![Ok(vec![record(
            json!({ "a.name": "Hackathon" }),
        )])]));
        let model = Arc::new(
            FakeModel::turns(vec![
                call(AgentTool::GetSchema),
                call(AgentTool::GenerateQuery { question: None }),
                call(AgentTool::RunQuery { query: None }),
                call(AgentTool::SynthesizeAnswer),
            ])
            .with_queries(vec![Ok("```cypher\nMATCH (a:Activity) RETURN a.name\n```".into())]),
        );
        let agent = agent(store.clone(), model.clone());

        let (outcome, chunks) = run(&agent).await;
        let run = outcome.unwrap();

        assert_eq!(
            run.trace,
            vec![
                AgentState::Start,
                AgentState::Schema,
                AgentState::QueryGen,
                AgentState::QueryExec,
                AgentState::Synthesize,
                AgentState::Done,
            ]
        );
        assert_eq!(run.iterations, 4);
        assert!(!run.incomplete);
        assert_eq!(run.results, vec![r#"[{"a.name":"Hackathon"}]"#.to_owned()]);
        assert_eq!(run.answer, "Hackathon");
        assert_eq!(store.executed(), vec!["MATCH (a:Activity) RETURN a.name".to_owned()]);
        assert_eq!(
            chunks,
            vec![StreamChunk::content("Hack"), StreamChunk::content("athon")]
        );
    }

    #[tokio::test]
    async fn answer_stream_ends_with_done() {
        let store = Arc::new(FakeStore::default());
        let model = Arc::new(FakeModel::turns(vec![call(AgentTool::SynthesizeAnswer)]));
        let agent = agent(store, model);

        let chunks: Vec<_> = agent.answer("q".into(), Vec::new()).collect().await;
        assert_eq!(
            chunks,
            vec![
                StreamChunk::content("Hack"),
                StreamChunk::content("athon"),
                StreamChunk::done(),
            ]
        );
    }

    #[tokio::test]
    async fn repeated_bad_queries_force_incomplete_synthesis() {
        let store = Arc::new(FakeStore::default());
        let model = Arc::new(FakeModel::turns(vec![
            call(AgentTool::GenerateQuery { question: None }),
            call(AgentTool::RunQuery { query: None }),
            call(AgentTool::GenerateQuery { question: None }),
            call(AgentTool::RunQuery { query: None }),
            call(AgentTool::RunQuery { query: None }),
        ]));
        let agent = agent(store.clone(), model.clone());

        let (outcome, chunks) = run(&agent).await;
        let run = outcome.unwrap();

        assert!(run.incomplete);
        assert!(run.results.is_empty());
        assert_eq!(run.iterations, 4);
        assert_eq!(store.executed().len(), 2);
        assert_eq!(
            &run.trace[run.trace.len() - 2..],
            &[AgentState::Synthesize, AgentState::Done]
        );
        assert!(!run.trace.contains(&AgentState::Failed));
        assert_eq!(
            chunks.last(),
            Some(&StreamChunk::content(prompts::INCOMPLETE_NOTE))
        );
    }

    #[tokio::test]
    async fn empty_results_count_as_failures() {
        let store = Arc::new(FakeStore::answering(vec![Ok(Vec::new()), Ok(Vec::new())]));
        let model = Arc::new(FakeModel::turns(vec![
            call(AgentTool::RunQuery {
                query: Some("MATCH (n:Nothing) RETURN n".into()),
            }),
            call(AgentTool::RunQuery {
                query: Some("MATCH (n:Nobody) RETURN n".into()),
            }),
        ]));
        let agent = agent(store, model);

        let run = run(&agent).await.0.unwrap();
        assert!(run.incomplete);
        assert_eq!(run.iterations, 2);
    }

    #[tokio::test]
    #[traced_test]
    async fn iteration_cap_forces_synthesis() {
        let store = Arc::new(FakeStore::default());
        let model = Arc::new(FakeModel {
            repeat: Some(ModelTurn::ToolCalls(vec![AgentToolCall::new(
                "loop",
                AgentTool::GetSchema,
            )])),
            tokens: vec!["partial".into()],
            ..FakeModel::default()
        });
        let config = AgentConfig {
            max_iterations: 3,
            ..AgentConfig::default()
        };
        let agent = GraphQueryAgent::new(store, model.clone(), config);

        let run = run(&agent).await.0.unwrap();

        assert_eq!(run.iterations, 3);
        assert_eq!(model.tool_rounds(), 3);
        assert!(run.incomplete);
        assert_eq!(run.trace.last(), Some(&AgentState::Done));
        assert_eq!(run.answer, format!("partial{}", prompts::INCOMPLETE_NOTE));
        assert!(logs_contain("iteration cap reached"));
    }

    #[tokio::test]
    async fn free_text_turn_forces_synthesis() {
        let store = Arc::new(FakeStore::default());
        let model = Arc::new(FakeModel::turns(vec![Ok(ModelTurn::Text(
            "I think the answer is 42".into(),
        ))]));
        let agent = agent(store, model);

        let run = run(&agent).await.0.unwrap();
        assert_eq!(
            run.trace,
            vec![AgentState::Start, AgentState::Synthesize, AgentState::Done]
        );
        assert!(!run.incomplete);
    }

    #[tokio::test]
    async fn store_outage_fails_with_single_error_chunk() {
        let store = Arc::new(FakeStore::answering(vec![Err(
            GraphStoreError::Unavailable("connection refused".into()),
        )]));
        let model = Arc::new(FakeModel::turns(vec![call(AgentTool::RunQuery {
            query: Some("MATCH (n) RETURN n".into()),
        })]));
        let agent = agent(store, model);

        let chunks: Vec<_> = agent.answer("q".into(), Vec::new()).collect().await;
        assert_eq!(chunks, vec![StreamChunk::error("store unavailable")]);
    }

    #[tokio::test]
    async fn model_failure_is_retried_once() {
        let store = Arc::new(FakeStore::default());
        let model = Arc::new(FakeModel::turns(vec![
            Err(ModelError::Unavailable("timeout".into())),
            call(AgentTool::SynthesizeAnswer),
        ]));
        let agent = agent(store, model.clone());

        let run = run(&agent).await.0.unwrap();
        assert_eq!(model.tool_rounds(), 2);
        assert_eq!(run.iterations, 1);
    }

    #[tokio::test]
    async fn second_model_failure_fails_the_run() {
        let store = Arc::new(FakeStore::default());
        let model = Arc::new(FakeModel::turns(vec![
            Err(ModelError::Unavailable("timeout".into())),
            Err(ModelError::Unavailable("timeout".into())),
        ]));
        let agent = agent(store, model);

        let chunks: Vec<_> = agent.answer("q".into(), Vec::new()).collect().await;
        assert_eq!(chunks, vec![StreamChunk::error("language model unavailable")]);
    }

    #[tokio::test]
    async fn query_generation_failure_is_reported() {
        let store = Arc::new(FakeStore::default());
        let model = Arc::new(
            FakeModel::turns(vec![call(AgentTool::GenerateQuery { question: None })])
                .with_queries(vec![Ok("   ".into()), Ok("```\n```".into())]),
        );
        let agent = agent(store, model);

        let (outcome, chunks) = run(&agent).await;
        assert!(matches!(outcome, Err(AgentError::QueryGeneration(_))));
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn write_queries_never_reach_the_store() {
        let store = Arc::new(FakeStore::default());
        let model = Arc::new(FakeModel::turns(vec![
            call(AgentTool::RunQuery {
                query: Some("MATCH (n) DETACH DELETE n".into()),
            }),
            call(AgentTool::SynthesizeAnswer),
        ]));
        let agent = agent(store.clone(), model.clone());

        let run = run(&agent).await.0.unwrap();
        assert!(store.executed().is_empty());
        assert!(!run.incomplete);

        let seen = model.seen.lock().unwrap();
        let Some(TranscriptMessage::Tool { content, .. }) = seen[1].last() else {
            panic!("expected tool output at the end of the transcript");
        };
        assert!(content.contains("DETACH"), "{content}");
    }

    #[tokio::test]
    async fn run_query_without_a_query_is_not_a_failure() {
        let store = Arc::new(FakeStore::default());
        let model = Arc::new(FakeModel::turns(vec![
            call(AgentTool::RunQuery { query: None }),
            call(AgentTool::RunQuery { query: None }),
            call(AgentTool::SynthesizeAnswer),
        ]));
        let agent = agent(store.clone(), model);

        let run = run(&agent).await.0.unwrap();
        assert!(!run.incomplete);
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn failure_budget_holds_within_one_model_turn() {
        let store = Arc::new(FakeStore::default());
        let calls = (0..6)
            .map(|i| {
                AgentToolCall::new(
                    format!("call_{i}"),
                    AgentTool::RunQuery {
                        query: Some(format!("MATCH (n) RETURN n.bogus{i}")),
                    },
                )
            })
            .collect();
        let model = Arc::new(FakeModel::turns(vec![Ok(ModelTurn::ToolCalls(calls))]));
        let agent = agent(store.clone(), model.clone());

        let run = run(&agent).await.0.unwrap();

        assert_eq!(store.executed().len(), 2);
        assert!(run.incomplete);
        assert_eq!(run.iterations, 1);
        assert_eq!(model.tool_rounds(), 1);
    }

    /// Hangs in `run_read`, holding `held` until the call is dropped.
    struct HangingStore {
        started: tokio::sync::Notify,
        held: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
    }

    #[async_trait]
    impl GraphStore for HangingStore {
        async fn schema(&self) -> Result<String, GraphStoreError> {
            Ok(String::new())
        }

        async fn run_read(&self, _: &str, _: usize) -> Result<Vec<Record>, GraphStoreError> {
            let _held = self.held.lock().unwrap().take();
            self.started.notify_one();
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn dropping_the_stream_cancels_the_run() {
        let (held, released) = tokio::sync::oneshot::channel::<()>();
        let store = Arc::new(HangingStore {
            started: tokio::sync::Notify::new(),
            held: Mutex::new(Some(held)),
        });
        let model = Arc::new(FakeModel::turns(vec![call(AgentTool::RunQuery {
            query: Some("MATCH (n) RETURN n".into()),
        })]));
        let agent = Arc::new(GraphQueryAgent::new(
            store.clone(),
            model,
            AgentConfig::default(),
        ));

        let chunks = agent.answer("q".into(), Vec::new());
        store.started.notified().await;
        drop(chunks);

        // The in-flight query is dropped along with the run.
        let released = tokio::time::timeout(std::time::Duration::from_secs(5), released)
            .await
            .expect("run was not cancelled");
        assert!(released.is_err());
    }

    #[tokio::test]
    #[traced_test]
    async fn cancelled_run_is_not_a_failure() {
        let store = Arc::new(FakeStore::default());
        let model = Arc::new(FakeModel::turns(vec![call(AgentTool::SynthesizeAnswer)]));
        let agent = agent(store, model);

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let outcome = agent.run("q", &[], &tx).await;

        assert!(matches!(outcome, Err(AgentError::Cancelled)));
        assert!(logs_contain("agent run cancelled"));
        assert!(!logs_contain("agent run failed"));
    }
}
