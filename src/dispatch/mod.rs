//! Handler dispatch
//!
//! Deterministic behaviors keyed by (handler, command type). A pair without an entry is a
//! miss (`Ok(None)`) and the coordinator falls back to the handler's generative path.
//! Missing parameters and user mistakes come back as messages; only unexpected store
//! failures are errors.

pub mod analysis;
pub mod files;

use crate::agent::ids;
use crate::command::{CommandType, StructuredCommand};
use crate::storage::{FileStore, FileStoreError};
use analysis::AnalysisKind;
use files::ReadStyle;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("{handler_id} could not access the file store: {source}")]
    Store {
        handler_id: String,
        #[source]
        source: FileStoreError,
    },
}

impl DispatchError {
    pub fn store<S: Into<String>>(handler_id: S, source: FileStoreError) -> Self {
        Self::Store {
            handler_id: handler_id.into(),
            source,
        }
    }
}

/// Per-request identifiers carried into dispatch for tracing
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub conversation_id: String,
}

impl RequestContext {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            conversation_id: conversation_id.into(),
        }
    }
}

/// Command types each handler answers deterministically
const DISPATCH_TABLE: [(&str, &[CommandType]); 3] = [
    (
        ids::SCRIPT,
        &[
            CommandType::Create,
            CommandType::Read,
            CommandType::List,
            CommandType::Delete,
        ],
    ),
    (
        ids::FILE,
        &[
            CommandType::Create,
            CommandType::Read,
            CommandType::List,
            CommandType::Delete,
        ],
    ),
    (ids::DATA, &[CommandType::Analyze, CommandType::Read]),
];

/// Whether (handler, command type) has a deterministic behavior
pub fn has_behavior(handler_id: &str, command_type: CommandType) -> bool {
    DISPATCH_TABLE
        .iter()
        .any(|(id, types)| *id == handler_id && types.contains(&command_type))
}

pub struct HandlerDispatch {
    store: Arc<dyn FileStore>,
}

impl HandlerDispatch {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn FileStore> {
        &self.store
    }

    /// Run the deterministic behavior, `Ok(None)` on a miss
    pub async fn apply(
        &self,
        command: &StructuredCommand,
        handler_id: &str,
        ctx: &RequestContext,
    ) -> Result<Option<String>, DispatchError> {
        if !has_behavior(handler_id, command.command_type) {
            debug!(
                handler_id,
                command_type = %command.command_type,
                "No deterministic behavior"
            );
            return Ok(None);
        }

        let span = crate::dispatch_span!(
            request_id = %ctx.request_id,
            conversation_id = %ctx.conversation_id,
            handler_id,
            command_type = %command.command_type
        );

        self.run(command, handler_id).instrument(span).await
    }

    async fn run(
        &self,
        command: &StructuredCommand,
        handler_id: &str,
    ) -> Result<Option<String>, DispatchError> {
        let store = self.store.as_ref();
        let read_style = if handler_id == ids::DATA {
            ReadStyle::Stats
        } else {
            ReadStyle::Raw
        };

        match command.command_type {
            CommandType::Create => files::create(store, handler_id, command).await,
            CommandType::Read => files::read(store, handler_id, command, read_style).await,
            CommandType::List => files::list(store, handler_id, command).await,
            CommandType::Delete => files::delete(store, handler_id, command).await,
            CommandType::Analyze => Ok(Some(Self::analyze(command))),
            _ => Ok(None),
        }
    }

    fn analyze(command: &StructuredCommand) -> String {
        let filename = command.param("filename");
        let Some(content) = command.param("content") else {
            return match filename {
                Some(name) => format!("Could not load '{name}' for analysis: file not found"),
                None => "Nothing to analyze. Try: analyze <json|text|code|data|file>: <content>"
                    .to_string(),
            };
        };

        let requested = command.param("type").unwrap_or("file");
        let kind = AnalysisKind::resolve(requested, filename, content);
        analysis::analyze(kind, content, filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::detect;
    use crate::testing::mocks::MemoryFileStore;

    fn dispatch_with(store: MemoryFileStore) -> HandlerDispatch {
        HandlerDispatch::new(Arc::new(store))
    }

    fn ctx() -> RequestContext {
        RequestContext::new("test")
    }

    #[test]
    fn test_dispatch_table() {
        assert!(has_behavior(ids::SCRIPT, CommandType::Create));
        assert!(has_behavior(ids::FILE, CommandType::Delete));
        assert!(has_behavior(ids::DATA, CommandType::Analyze));
        assert!(has_behavior(ids::DATA, CommandType::Read));
        assert!(!has_behavior(ids::DATA, CommandType::Create));
        assert!(!has_behavior(ids::TEXT, CommandType::Search));
        assert!(!has_behavior(ids::COORDINATOR, CommandType::List));
    }

    #[tokio::test]
    async fn test_miss_returns_none() {
        let dispatch = dispatch_with(MemoryFileStore::new());
        let command = detect("search for rust tutorials").unwrap();
        let result = dispatch.apply(&command, ids::TEXT, &ctx()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_create_saves_file() {
        let store = MemoryFileStore::new();
        let dispatch = dispatch_with(store.clone());
        let command = detect("create script hello with content: console.log('hi')").unwrap();

        let message = dispatch
            .apply(&command, ids::SCRIPT, &ctx())
            .await
            .unwrap()
            .unwrap();
        assert!(message.contains("hello.js"));
        assert!(message.contains("17 bytes"));
        assert_eq!(store.read("hello.js").await.unwrap(), "console.log('hi')");
    }

    #[tokio::test]
    async fn test_create_too_large_is_message() {
        let store = MemoryFileStore::with_max_size(4);
        let dispatch = dispatch_with(store);
        let command = detect("create file big with content: way too long").unwrap();

        let message = dispatch
            .apply(&command, ids::FILE, &ctx())
            .await
            .unwrap()
            .unwrap();
        assert!(message.starts_with("Failed to create 'big.txt'"));
        assert!(message.contains("too large"));
    }

    #[tokio::test]
    async fn test_read_raw_and_fenced() {
        let store = MemoryFileStore::new();
        store.insert("notes.txt", "hello");
        store.insert("app.py", "print(1)");
        let dispatch = dispatch_with(store);

        let message = dispatch
            .apply(&detect("read notes.txt").unwrap(), ids::FILE, &ctx())
            .await
            .unwrap()
            .unwrap();
        assert!(message.contains("notes.txt"));
        assert!(message.contains("hello"));
        assert!(!message.contains("```"));

        let message = dispatch
            .apply(&detect("read app.py").unwrap(), ids::SCRIPT, &ctx())
            .await
            .unwrap()
            .unwrap();
        assert!(message.contains("```py\nprint(1)\n```"));
    }

    #[tokio::test]
    async fn test_read_as_data_agent_reports_counts() {
        let store = MemoryFileStore::new();
        store.insert("notes.txt", "one two\nthree");
        let dispatch = dispatch_with(store);

        let message = dispatch
            .apply(&detect("read notes.txt").unwrap(), ids::DATA, &ctx())
            .await
            .unwrap()
            .unwrap();
        assert!(message.contains("Lines: 2"));
        assert!(message.contains("Words: 3"));
        assert!(message.contains("Characters: 13"));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found_message() {
        let dispatch = dispatch_with(MemoryFileStore::new());
        let message = dispatch
            .apply(&detect("delete ghost.txt").unwrap(), ids::FILE, &ctx())
            .await
            .unwrap()
            .unwrap();
        assert!(message.contains("ghost.txt"));
        assert!(message.contains("not found"));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let store = MemoryFileStore::new();
        store.insert("a.js", "1");
        store.insert("b.md", "22");
        let dispatch = dispatch_with(store);

        let scripts = dispatch
            .apply(&detect("list scripts").unwrap(), ids::SCRIPT, &ctx())
            .await
            .unwrap()
            .unwrap();
        assert!(scripts.contains("a.js (1 bytes)"));
        assert!(!scripts.contains("b.md"));

        let agents = dispatch
            .apply(&detect("list agents").unwrap(), ids::FILE, &ctx())
            .await
            .unwrap();
        assert!(agents.is_none());
    }

    #[tokio::test]
    async fn test_list_empty_store() {
        let dispatch = dispatch_with(MemoryFileStore::new());
        let message = dispatch
            .apply(&detect("list documents").unwrap(), ids::FILE, &ctx())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message, "No documents found.");
    }

    #[tokio::test]
    async fn test_analyze_inline_json() {
        let dispatch = dispatch_with(MemoryFileStore::new());
        let message = dispatch
            .apply(
                &detect(r#"analyze json: {"a":1,"b":2}"#).unwrap(),
                ids::DATA,
                &ctx(),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(message.contains("Top-level keys: 2"));
        assert!(message.contains("a, b"));
        assert!(message.contains("a: number, b: number"));
    }

    #[tokio::test]
    async fn test_analyze_unresolved_filename() {
        let dispatch = dispatch_with(MemoryFileStore::new());
        let message = dispatch
            .apply(&detect("analyze file report.json").unwrap(), ids::DATA, &ctx())
            .await
            .unwrap()
            .unwrap();
        assert!(message.contains("report.json"));
        assert!(message.contains("not found"));
    }

    #[tokio::test]
    async fn test_io_failure_is_error() {
        let store = MemoryFileStore::new();
        store.fail_io("disk unplugged");
        let dispatch = dispatch_with(store);

        let result = dispatch
            .apply(&detect("list files").unwrap(), ids::FILE, &ctx())
            .await;
        assert!(matches!(result, Err(DispatchError::Store { .. })));
    }
}
