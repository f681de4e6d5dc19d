//! OpenAI-compatible provider client.
//!
//! OpenAI, Anthropic, Google and Groq all expose the
//! `/chat/completions` streaming protocol, differing only in base URL and
//! key. Errors are classified into [`FailureKind`](crate::selector::FailureKind)
//! so the optimizer can pick a replacement model.

mod backend;
mod error;
mod streaming;
mod types;

pub use backend::OpenAiCompatBackend;
pub use error::{classify_response, classify_status, classify_transport};
pub use streaming::{parse_sse_data, parse_sse_stream};
pub use types::*;
