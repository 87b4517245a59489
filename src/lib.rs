//! Mother Agent - command detection and delegation
//!
//! Routes free-text user commands to specialized handlers ("agents"). Text is first
//! matched against a small command grammar; structured commands with a deterministic
//! behavior are answered locally, everything else goes through a generative backend.
//!
//! # Overview
//!
//! - [`command`]: pattern-based extraction of structured commands
//! - [`agent`]: handler descriptors and the capability registry
//! - [`routing`]: delegation decisions (direct mapping or one generative call)
//! - [`dispatch`]: deterministic handler behaviors over the file store
//! - [`coordinator`]: the end-to-end pipeline
//! - [`memory`], [`storage`], [`observability`]: injected collaborators
//!
//! # Quick Start
//!
//! ```rust
//! use mother_agent::agent::CapabilityRegistry;
//! use mother_agent::coordinator::{CommandRequest, Coordinator, CoordinatorOptions};
//! use mother_agent::memory::InMemoryHistory;
//! use mother_agent::observability::MetricsCollector;
//! use mother_agent::testing::{MemoryFileStore, MockLlmProvider};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let coordinator = Coordinator::new(
//!     Arc::new(CapabilityRegistry::builtin()),
//!     Arc::new(MockLlmProvider::new(vec![])),
//!     Arc::new(MemoryFileStore::new()),
//!     Arc::new(InMemoryHistory::default()),
//!     Arc::new(MetricsCollector::new()),
//!     CoordinatorOptions::default(),
//! );
//!
//! let response = coordinator
//!     .handle(CommandRequest::new(r#"analyze json: {"a":1,"b":2}"#))
//!     .await
//!     .unwrap();
//!
//! assert_eq!(response.delegated_agent, "data-agent");
//! assert!(response.response.contains("a: number, b: number"));
//! # }
//! ```

pub mod agent;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod routing;
pub mod storage;
pub mod testing;

pub use command::{detect, CommandType, StructuredCommand};
pub use config::{ConfigError, CoordinatorConfig};
pub use coordinator::{CommandRequest, CommandResponse, Coordinator, CoordinatorOptions};
pub use error::{CoordinatorError, CoordinatorResult, Recovered};
