//! Suggestions: turning model output into line-anchored edits
//!
//! ## Architecture
//!
//! - `types.rs`: `CodeIssue`, `FixSuggestion`, `FixResult`
//! - `parser.rs`: response contract parsing with code-block fallback
//! - `prompt.rs`: prompt construction
//! - `generator.rs`: async generation seam and fixture generator

mod generator;
mod parser;
mod prompt;
mod types;

pub use generator::{
    Completion, GenerationError, GenerationRequest, StaticGenerator, SuggestionGenerator,
};
pub use parser::{parse_fix_response, TEXT_PARSED_CONFIDENCE, TEXT_PARSED_TAG};
pub use prompt::{build_fix_prompt, RESPONSE_CONTRACT};
pub use types::{CodeIssue, FixResult, FixSuggestion, Location, Severity, TokenUsage};
