use crate::formula::Ast;
use crate::position::Position;
use santiago::lexer::LexerError;
use santiago::parser::ParseError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid position: {0}")]
    InvalidPosition(Position),

    #[error("Invalid cell name: {0}")]
    InvalidCellName(String),

    #[error("{0}")]
    Lexer(String),

    #[error("{0}")]
    Parser(String),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Circular dependency detected: {0}")]
    CircularDependency(Position),
}

impl Error {
    /// True for every failure to turn formula text into an expression.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::Lexer(_) | Self::Parser(_) | Self::InvalidExpression(_) | Self::InvalidCellName(_)
        )
    }
}

impl From<LexerError> for Error {
    fn from(err: LexerError) -> Self {
        Self::Lexer(err.to_string())
    }
}

impl From<ParseError<Ast>> for Error {
    fn from(err: ParseError<Ast>) -> Self {
        Self::Parser(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn positions_are_named_in_messages() {
        let pos = Position::new(1, 27);
        assert_eq!(Error::InvalidPosition(pos).to_string(), "Invalid position: AB2");
        assert_eq!(
            Error::CircularDependency(pos).to_string(),
            "Circular dependency detected: AB2"
        );
    }
}
