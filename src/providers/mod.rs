pub mod base;
pub mod openai;
pub mod vision;

pub use base::{ChatRequest, LLMProvider, LLMResponse, Message, RetryConfig, ToolCallRequest, ToolDefinition};
pub use openai::OpenAiProvider;
pub use vision::VisionClient;
