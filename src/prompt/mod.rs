//! Prompt construction and token budgeting.
//!
//! ```text
//!   ProfileOutcome ──► MetadataFragment ──► ChunkPlanner::chunk ──► ChunkPlan
//!                                               │                   ├─ LlmRequest (chunk 1)
//!                                          TokenCounter             ├─ LlmRequest (chunk 2)
//!                                                                   └─ TruncationRecord*
//! ```

mod chunker;
mod template;
mod tokens;

pub use chunker::{ChunkPlan, ChunkPlanner, LlmRequest, MetadataFragment, TruncationRecord};
pub use template::PromptTemplate;
pub use tokens::{HeuristicTokenCounter, TokenCounter, WorkerTokenCounter};
