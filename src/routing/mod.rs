//! Delegation: choosing the handler for a command
//!
//! - [`delegation`]: decision types, the direct command-type mapping and the generative
//!   delegator
//! - [`parse`]: tiered parsing of generative replies
//! - [`schema`]: the reply schema sent to structured-output capable backends

pub mod delegation;
pub mod parse;
pub mod schema;

pub use delegation::{
    direct_decision, direct_target, DelegationDecision, DelegationSource, GenerativeDelegator,
    DEFAULT_REASON,
};
pub use parse::{parse_reply, ParseTier, ParsedReply};
pub use schema::DelegationOutput;
