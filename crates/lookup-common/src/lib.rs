pub mod document;
pub mod error;
pub mod literal;
pub mod upstream;
