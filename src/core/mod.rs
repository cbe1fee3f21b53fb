pub mod chat_stream;
pub mod message;
pub mod session;
