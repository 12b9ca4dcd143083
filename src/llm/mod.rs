pub mod gateway;
pub mod media;
pub mod openai;

pub use openai::OpenAiGateway;
