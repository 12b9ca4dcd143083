pub mod error;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod request;
pub mod result;
pub mod schema;

pub use error::{ErrorCode, ErrorEnvelope};
pub use pipeline::RequestHandler;
pub use request::RequestBody;
pub use schema::SchemaVersion;
