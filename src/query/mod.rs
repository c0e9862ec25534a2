pub mod ast;
pub mod matcher;
pub mod types;
pub mod parser;
pub mod validator;
pub mod trigger;
pub mod highlight;
