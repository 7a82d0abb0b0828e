//! Language model access.

mod openai;
mod traits;

pub use openai::OpenAiChatModel;
pub use traits::ChatModel;
