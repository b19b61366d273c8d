pub mod ast;
pub mod parser;
pub mod span;
pub mod tokenizer;
pub mod tree_walk_interpreter;

/// Any failure of [`tree_walk_interpreter::Interpreter::run_source`], from
/// lexing to execution.
#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error(transparent)]
    Tokenize(#[from] tokenizer::TokenizeError),
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
    #[error(transparent)]
    Execution(#[from] tree_walk_interpreter::ExecutionError),
}

impl InterpretError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, InterpretError::Execution(e) if e.is_fatal())
    }
}
