//! LLM gateway adapters implementing the
//! [`LlmGateway`](middleware_application::LlmGateway) port.

mod openai;

pub use openai::OpenAiGateway;
