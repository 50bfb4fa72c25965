use std::cell::RefCell;

use tracing::trace;

use crate::error::Error;
use crate::formula::{CellLookup, Formula, FormulaParser};
use crate::position::Position;
use crate::value::Value;

pub const FORMULA_SIGN: char = '=';
pub const ESCAPE_SIGN: char = '\'';

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) enum Content {
    #[default]
    Empty,
    /// Raw text as entered, escape sign included.
    Text(String),
    Formula(Formula),
}

impl Content {
    /// Classifies user input. Only text with something after the formula sign is a formula.
    pub(crate) fn parse(text: &str, parser: &FormulaParser) -> Result<Self, Error> {
        if text.is_empty() {
            return Ok(Self::Empty);
        }
        match text.strip_prefix(FORMULA_SIGN) {
            Some(expression) if !expression.is_empty() => {
                Ok(Self::Formula(parser.parse(expression)?))
            }
            _ => Ok(Self::Text(text.to_string())),
        }
    }

    pub(crate) fn referenced_cells(&self) -> Vec<Position> {
        match self {
            Self::Formula(formula) => formula.referenced_cells(),
            Self::Empty | Self::Text(_) => Vec::new(),
        }
    }
}

/// One grid slot: its content, the cached value of a formula, and the cells whose
/// formulas read this one.
#[derive(Debug, Default)]
pub(crate) struct Cell {
    content: Content,
    cache: RefCell<Option<Value>>,
    parents: Vec<Position>,
}

impl Cell {
    /// Replaces the content wholesale and returns the previous one. Parents are kept.
    pub(crate) fn set(&mut self, content: Content) -> Content {
        self.cache.replace(None);
        std::mem::replace(&mut self.content, content)
    }

    /// Value of the cell. A formula is evaluated against `lookup` only when nothing is
    /// cached.
    pub(crate) fn value(&self, lookup: &dyn CellLookup) -> Value {
        match &self.content {
            Content::Empty => Value::default(),
            Content::Text(text) => {
                Value::from(text.strip_prefix(ESCAPE_SIGN).unwrap_or(text.as_str()))
            }
            Content::Formula(formula) => {
                if let Some(value) = self.cache.borrow().as_ref() {
                    return value.clone();
                }
                let value = Value::from(formula.evaluate(lookup));
                trace!(%value, "evaluated formula");
                self.cache.replace(Some(value.clone()));
                value
            }
        }
    }

    pub(crate) fn text(&self) -> String {
        match &self.content {
            Content::Empty => String::new(),
            Content::Text(text) => text.clone(),
            Content::Formula(formula) => format!("{FORMULA_SIGN}{}", formula.expression()),
        }
    }

    pub(crate) fn referenced_cells(&self) -> Vec<Position> {
        self.content.referenced_cells()
    }

    pub(crate) fn is_empty(&self) -> bool {
        matches!(self.content, Content::Empty)
    }

    /// Empty and unreferenced, so the slot carries no state at all.
    pub(crate) fn is_vacant(&self) -> bool {
        self.is_empty() && self.parents.is_empty()
    }

    /// A formula whose value has to be computed before it can be read.
    pub(crate) fn needs_evaluation(&self) -> bool {
        matches!(self.content, Content::Formula(_)) && !self.is_cached()
    }

    pub(crate) fn is_cached(&self) -> bool {
        self.cache.borrow().is_some()
    }

    pub(crate) fn invalidate_cache(&self) {
        self.cache.replace(None);
    }

    pub(crate) fn add_parent(&mut self, pos: Position) {
        self.parents.push(pos);
    }

    pub(crate) fn remove_parent(&mut self, pos: Position) {
        self.parents.retain(|&parent| parent != pos);
    }

    pub(crate) fn parents(&self) -> &[Position] {
        &self.parents
    }

    pub(crate) fn has_parents(&self) -> bool {
        !self.parents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FormulaError;
    use pretty_assertions::assert_eq;
    use std::cell::Cell as Counter;

    /// Every position holds `value`; counts how often it is asked.
    struct Constant {
        value: Value,
        reads: Counter<usize>,
    }

    impl Constant {
        fn new(value: impl Into<Value>) -> Self {
            Self {
                value: value.into(),
                reads: Counter::new(0),
            }
        }
    }

    impl CellLookup for Constant {
        fn lookup(&self, _pos: Position) -> Option<Value> {
            self.reads.set(self.reads.get() + 1);
            Some(self.value.clone())
        }
    }

    fn cell(text: &str) -> Cell {
        let mut cell = Cell::default();
        cell.set(Content::parse(text, &FormulaParser::new()).unwrap());
        cell
    }

    #[test]
    fn input_is_classified() {
        let parser = FormulaParser::new();
        assert_eq!(Content::parse("", &parser), Ok(Content::Empty));
        assert_eq!(
            Content::parse("hello", &parser),
            Ok(Content::Text("hello".to_string()))
        );
        assert_eq!(
            Content::parse("=", &parser),
            Ok(Content::Text("=".to_string()))
        );
        assert!(matches!(
            Content::parse("=1+A2", &parser),
            Ok(Content::Formula(_))
        ));
        assert!(Content::parse("=1+", &parser).unwrap_err().is_parse_error());
    }

    #[test]
    fn escaped_text_keeps_sign_in_text_only() {
        let lookup = Constant::new(0);
        let c = cell("'123");
        assert_eq!(c.text(), "'123");
        assert_eq!(c.value(&lookup), Value::from("123"));

        let c = cell("'");
        assert_eq!(c.text(), "'");
        assert_eq!(c.value(&lookup), Value::from(""));
        assert!(!c.is_empty());
    }

    #[test]
    fn empty_cell_reads_as_empty_text() {
        let c = Cell::default();
        assert!(c.is_empty());
        assert!(c.is_vacant());
        assert_eq!(c.text(), "");
        assert_eq!(c.value(&Constant::new(1)), Value::from(""));
        assert!(c.referenced_cells().is_empty());
    }

    #[test]
    fn formula_text_is_canonical() {
        let c = cell("=(A1 + B1) * (2)");
        assert_eq!(c.text(), "=(A1+B1)*2");
        assert_eq!(
            c.referenced_cells(),
            vec![Position::new(0, 0), Position::new(0, 1)]
        );
    }

    #[test]
    fn formula_value_is_cached_until_invalidated() {
        let lookup = Constant::new(4);
        let c = cell("=A1*2");
        assert!(c.needs_evaluation());

        assert_eq!(c.value(&lookup), Value::Num(8.0));
        assert_eq!(c.value(&lookup), Value::Num(8.0));
        assert_eq!(lookup.reads.get(), 1);
        assert!(c.is_cached());
        assert!(!c.needs_evaluation());

        c.invalidate_cache();
        assert!(c.needs_evaluation());
        assert_eq!(c.value(&lookup), Value::Num(8.0));
        assert_eq!(lookup.reads.get(), 2);
    }

    #[test]
    fn errors_are_cached_as_values() {
        let lookup = Constant::new(0);
        let c = cell("=1/A1");
        assert_eq!(c.value(&lookup), Value::Error(FormulaError::Div0));
        assert!(c.is_cached());
    }

    #[test]
    fn set_replaces_content_and_keeps_parents() {
        let mut c = cell("=A1");
        c.add_parent(Position::new(3, 3));
        c.value(&Constant::new(1));

        let old = c.set(Content::Text("x".to_string()));
        assert!(matches!(old, Content::Formula(_)));
        assert!(!c.is_cached());
        assert_eq!(c.parents(), &[Position::new(3, 3)]);
    }

    #[test]
    fn parents_are_maintained() {
        let mut c = Cell::default();
        assert!(!c.has_parents());
        c.add_parent(Position::new(0, 1));
        c.add_parent(Position::new(2, 0));
        assert!(c.has_parents());
        assert!(!c.is_vacant());

        c.remove_parent(Position::new(0, 1));
        assert_eq!(c.parents(), &[Position::new(2, 0)]);
        c.remove_parent(Position::new(2, 0));
        assert!(c.is_vacant());
    }
}
