//! Formula expressions: parsing, evaluation, rendering.
//!
//! Formula text is lexed and parsed with `santiago`, then lowered into a typed [`Expr`]
//! tree. The tree is what gets evaluated and rendered back into canonical text, so the
//! stored form of a formula does not depend on how the user spelled it.

use std::fmt::Write as _;

use santiago::grammar::{Associativity, Grammar};
use santiago::lexer::LexerRules;
use tracing::trace;

use crate::error::Error;
use crate::error::Error::InvalidExpression;
use crate::position::Position;
use crate::value::{FormulaError, Value};

/// Raw parse tree built by the grammar actions.
#[derive(Debug)]
pub enum Ast {
    Cell(String),
    Number(String),
    BinaryOperation(Vec<Ast>),
    UnaryOperation(Vec<Ast>),
    Parentheses(Vec<Ast>),
    OperatorAdd,
    OperatorSubtract,
    OperatorMultiply,
    OperatorDivide,
    LeftParenthesis,
    RightParenthesis,
}

/// Read access to cell values during evaluation.
pub trait CellLookup {
    /// Current value at `pos`, or `None` if `pos` cannot be addressed.
    fn lookup(&self, pos: Position) -> Option<Value>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

const UNARY_PRECEDENCE: u8 = 3;
const ATOM_PRECEDENCE: u8 = 4;

impl UnaryOp {
    fn symbol(self) -> char {
        match self {
            Self::Plus => '+',
            Self::Minus => '-',
        }
    }

    fn apply(self, operand: f64) -> f64 {
        match self {
            Self::Plus => operand,
            Self::Minus => -operand,
        }
    }
}

impl BinaryOp {
    fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
            Self::Divide => '/',
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Subtract => 1,
            Self::Multiply | Self::Divide => 2,
        }
    }

    /// Whether `a op (b op' c)` equals `a op b op' c` for operators of equal precedence.
    fn is_associative(self) -> bool {
        matches!(self, Self::Add | Self::Multiply)
    }

    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Subtract => lhs - rhs,
            Self::Multiply => lhs * rhs,
            Self::Divide => lhs / rhs,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Number(f64),
    Cell(Position),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    fn lower(ast: Ast) -> Result<Self, Error> {
        match ast {
            Ast::Number(raw) => match raw.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Self::Number(n)),
                _ => Err(InvalidExpression(raw)),
            },
            Ast::Cell(raw) => Ok(Self::Cell(raw.parse()?)),
            Ast::Parentheses(args) => match <[Ast; 3]>::try_from(args) {
                Ok([_, inner, _]) => Self::lower(inner),
                Err(args) => Err(InvalidExpression(format!("{args:?}"))),
            },
            Ast::UnaryOperation(args) => match <[Ast; 2]>::try_from(args) {
                Ok([op, operand]) => {
                    let op = match op {
                        Ast::OperatorAdd => UnaryOp::Plus,
                        Ast::OperatorSubtract => UnaryOp::Minus,
                        other => return Err(InvalidExpression(format!("{other:?}"))),
                    };
                    Ok(Self::Unary {
                        op,
                        operand: Box::new(Self::lower(operand)?),
                    })
                }
                Err(args) => Err(InvalidExpression(format!("{args:?}"))),
            },
            Ast::BinaryOperation(args) => match <[Ast; 3]>::try_from(args) {
                Ok([lhs, op, rhs]) => {
                    let op = match op {
                        Ast::OperatorAdd => BinaryOp::Add,
                        Ast::OperatorSubtract => BinaryOp::Subtract,
                        Ast::OperatorMultiply => BinaryOp::Multiply,
                        Ast::OperatorDivide => BinaryOp::Divide,
                        other => return Err(InvalidExpression(format!("{other:?}"))),
                    };
                    Ok(Self::Binary {
                        op,
                        lhs: Box::new(Self::lower(lhs)?),
                        rhs: Box::new(Self::lower(rhs)?),
                    })
                }
                Err(args) => Err(InvalidExpression(format!("{args:?}"))),
            },
            other => Err(InvalidExpression(format!("{other:?}"))),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Number(_) | Self::Cell(_) => ATOM_PRECEDENCE,
            Self::Unary { .. } => UNARY_PRECEDENCE,
            Self::Binary { op, .. } => op.precedence(),
        }
    }

    fn evaluate(&self, lookup: &dyn CellLookup) -> Result<f64, FormulaError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Cell(pos) => match lookup.lookup(*pos) {
                None => Err(FormulaError::Ref),
                Some(value) => number_from_cell(value),
            },
            Self::Unary { op, operand } => Ok(op.apply(operand.evaluate(lookup)?)),
            Self::Binary { op, lhs, rhs } => {
                let lhs = lhs.evaluate(lookup)?;
                let rhs = rhs.evaluate(lookup)?;
                let result = op.apply(lhs, rhs);
                if result.is_finite() {
                    Ok(result)
                } else {
                    Err(FormulaError::Div0)
                }
            }
        }
    }

    fn collect_cells(&self, cells: &mut Vec<Position>) {
        match self {
            Self::Number(_) => {}
            Self::Cell(pos) => cells.push(*pos),
            Self::Unary { operand, .. } => operand.collect_cells(cells),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_cells(cells);
                rhs.collect_cells(cells);
            }
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Self::Number(n) => {
                let _ = write!(out, "{n}");
            }
            Self::Cell(pos) => {
                let _ = write!(out, "{pos}");
            }
            Self::Unary { op, operand } => {
                out.push(op.symbol());
                operand.render_child(out, operand.precedence() < UNARY_PRECEDENCE);
            }
            Self::Binary { op, lhs, rhs } => {
                let precedence = op.precedence();
                lhs.render_child(out, lhs.precedence() < precedence);
                out.push(op.symbol());
                let rhs_precedence = rhs.precedence();
                let wrap = rhs_precedence < precedence
                    || (rhs_precedence == precedence && !op.is_associative());
                rhs.render_child(out, wrap);
            }
        }
    }

    fn render_child(&self, out: &mut String, parenthesize: bool) {
        if parenthesize {
            out.push('(');
            self.render(out);
            out.push(')');
        } else {
            self.render(out);
        }
    }
}

/// Numeric reading of a referenced cell's value.
fn number_from_cell(value: Value) -> Result<f64, FormulaError> {
    match value {
        Value::Num(n) => Ok(n),
        Value::Error(err) => Err(err),
        Value::Str(s) if s.is_empty() => Ok(0.0),
        Value::Str(s) => s
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or(FormulaError::Value),
    }
}

/// A parsed formula, without the leading `=`.
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    expr: Expr,
}

impl Formula {
    pub fn evaluate(&self, lookup: &dyn CellLookup) -> Result<f64, FormulaError> {
        self.expr.evaluate(lookup)
    }

    /// Canonical text of the expression, with only the parentheses precedence requires.
    pub fn expression(&self) -> String {
        let mut out = String::new();
        self.expr.render(&mut out);
        out
    }

    /// Distinct positions the expression reads, in (row, column) order.
    pub fn referenced_cells(&self) -> Vec<Position> {
        let mut cells = Vec::new();
        self.expr.collect_cells(&mut cells);
        cells.sort_unstable();
        cells.dedup();
        cells
    }
}

pub struct FormulaParser {
    lexer: LexerRules,
    grammar: Grammar<Ast>,
}

impl Default for FormulaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaParser {
    pub fn new() -> Self {
        Self {
            lexer: santiago::lexer_rules!(
                "DEFAULT" | "CELL" = pattern r"[A-Z]+[0-9]+";
                "DEFAULT" | "NUMBER" = pattern r"([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?";
                "DEFAULT" | "+" = string "+";
                "DEFAULT" | "-" = string "-";
                "DEFAULT" | "*" = string "*";
                "DEFAULT" | "/" = string "/";
                "DEFAULT" | "(" = string "(";
                "DEFAULT" | ")" = string ")";
                "DEFAULT" | "WS" = pattern r"\s" => |lexer| lexer.skip();
            ),
            grammar: santiago::grammar!(
                "expr" => rules "cell";
                "expr" => rules "number";

                "expr" => rules "leftp" "expr" "rightp" => Ast::Parentheses;

                "expr" => rules "expr" "add" "expr" =>
                    Ast::BinaryOperation;
                "expr" => rules "expr" "subtract" "expr" =>
                    Ast::BinaryOperation;
                "expr" => rules "expr" "multiply" "expr" =>
                    Ast::BinaryOperation;
                "expr" => rules "expr" "divide" "expr" =>
                    Ast::BinaryOperation;

                "expr" => rules "plus" "expr" =>
                    Ast::UnaryOperation;
                "expr" => rules "minus" "expr" =>
                    Ast::UnaryOperation;

                "add" => lexemes "+" =>
                    |_| Ast::OperatorAdd;
                "subtract" => lexemes "-" =>
                    |_| Ast::OperatorSubtract;
                "multiply" => lexemes "*" =>
                    |_| Ast::OperatorMultiply;
                "divide" => lexemes "/" =>
                    |_| Ast::OperatorDivide;
                "plus" => lexemes "+" =>
                    |_| Ast::OperatorAdd;
                "minus" => lexemes "-" =>
                    |_| Ast::OperatorSubtract;

                "cell" => lexemes "CELL" =>
                    |lexemes| Ast::Cell(lexemes[0].raw.clone());
                "number" => lexemes "NUMBER" =>
                    |lexemes| Ast::Number(lexemes[0].raw.clone());
                "leftp" => lexemes "(" =>
                    |_| Ast::LeftParenthesis;
                "rightp" => lexemes ")" =>
                    |_| Ast::RightParenthesis;

                Associativity::Left => rules "add" "subtract";
                Associativity::Left => rules "multiply" "divide";
                // Signs bind tighter than any binary operator and nest to the right
                Associativity::Right => rules "plus" "minus";
            ),
        }
    }

    /// Parses an expression (the formula text after `=`).
    pub fn parse(&self, expression: &str) -> Result<Formula, Error> {
        let lexemes = santiago::lexer::lex(&self.lexer, expression)?;
        if lexemes.is_empty() {
            return Err(InvalidExpression(expression.to_string()));
        }
        let trees = santiago::parser::parse(&self.grammar, &lexemes)?;
        // More than one tree means the grammar could not disambiguate the input
        let [tree] = trees.as_slice() else {
            return Err(InvalidExpression(expression.to_string()));
        };
        let expr = Expr::lower(tree.as_abstract_syntax_tree())?;
        trace!(expression, "parsed formula");
        Ok(Formula { expr })
    }
}
