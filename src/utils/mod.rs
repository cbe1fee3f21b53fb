pub mod input;
pub mod url;
