mod cell;
mod dependency;
mod error;
mod formula;
mod position;
mod sheet;
mod value;

pub use crate::cell::{ESCAPE_SIGN, FORMULA_SIGN};
pub use crate::error::Error;
pub use crate::error::Error::{CircularDependency, InvalidExpression, InvalidPosition};
pub use crate::formula::{CellLookup, Formula, FormulaParser};
pub use crate::position::{Limits, Position, Size};
pub use crate::sheet::{CellView, Sheet};
pub use crate::value::{FormulaError, Value};
