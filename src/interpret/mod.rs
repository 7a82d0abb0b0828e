//! Natural language to SQL interpretation.

mod interpreter;
mod prompts;
mod types;

pub use interpreter::NlToSqlInterpreter;
pub use types::Intent;
