use std::fmt;
use std::io::{self, Write};

use tracing::{debug, trace};

use crate::cell::{Cell, Content};
use crate::dependency::{self, DependencyGraph};
use crate::error::Error;
use crate::error::Error::{CircularDependency, InvalidPosition};
use crate::formula::{CellLookup, FormulaParser};
use crate::position::{Limits, Position, Size};
use crate::value::Value;

/// A grid of cells whose formula values are computed lazily and cached until something
/// they read changes.
///
/// Storage is ragged: `cells[row]` only reaches the last column that holds content or
/// is referenced by a formula. The printable size is tracked separately and always
/// equals the bounding rectangle of non-empty cells.
pub struct Sheet {
    parser: FormulaParser,
    limits: Limits,
    cells: Vec<Vec<Cell>>,
    size: Size,
}

impl Default for Sheet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sheet")
            .field("limits", &self.limits)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Sheet {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            parser: FormulaParser::new(),
            limits,
            cells: Vec::new(),
            size: Size::default(),
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Sets the content at `pos` from user input.
    ///
    /// Empty text clears the cell. Text starting with `=` (and longer than that) is a
    /// formula, anything else is literal text. On error nothing in the sheet changes.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), Error> {
        self.check_position(pos)?;
        if text.is_empty() {
            return self.clear_cell(pos);
        }
        if self.cell(pos).is_some_and(|cell| cell.text() == text) {
            return Ok(());
        }

        let content = match Content::parse(text, &self.parser) {
            Ok(content) => content,
            Err(err) => {
                debug!(%pos, text, %err, "rejected unparsable formula");
                return Err(err);
            }
        };
        let references = self.in_range(content.referenced_cells());
        if dependency::creates_cycle(&*self, pos, &references) {
            debug!(%pos, text, "rejected circular reference");
            return Err(CircularDependency(pos));
        }

        self.invalidate(pos);
        let previous = self.cell_mut(pos).set(content);
        let previous = self.in_range(previous.referenced_cells());
        self.relink(pos, &previous, &references);

        self.size.rows = self.size.rows.max(pos.row + 1);
        self.size.cols = self.size.cols.max(pos.col + 1);
        self.compact();
        debug!(%pos, text, "set cell");
        Ok(())
    }

    /// View of the cell at `pos`, or `None` if `pos` lies outside the printable area.
    pub fn get_cell(&self, pos: Position) -> Result<Option<CellView<'_>>, Error> {
        self.check_position(pos)?;
        if !self.size.contains(pos) {
            return Ok(None);
        }
        Ok(Some(CellView {
            sheet: self,
            pos,
            cell: self.cell(pos),
        }))
    }

    pub fn clear_cell(&mut self, pos: Position) -> Result<(), Error> {
        self.check_position(pos)?;
        if self.cell(pos).map_or(true, Cell::is_empty) {
            return Ok(());
        }

        self.invalidate(pos);
        let previous = self.cell_mut(pos).set(Content::Empty);
        let previous = self.in_range(previous.referenced_cells());
        self.relink(pos, &previous, &[]);

        self.shrink_to_content();
        self.compact();
        debug!(%pos, "cleared cell");
        Ok(())
    }

    pub fn printable_size(&self) -> Size {
        self.size
    }

    /// Writes the value of every cell in the printable area, tab separated, one row per line.
    pub fn print_values(&self, output: &mut impl Write) -> io::Result<()> {
        self.print_cells(output, |pos| self.value_at(pos).to_string())
    }

    /// Writes the text of every cell in the printable area, tab separated, one row per line.
    pub fn print_texts(&self, output: &mut impl Write) -> io::Result<()> {
        self.print_cells(output, |pos| self.cell(pos).map(Cell::text).unwrap_or_default())
    }

    fn print_cells(
        &self,
        output: &mut impl Write,
        render: impl Fn(Position) -> String,
    ) -> io::Result<()> {
        for row in 0..self.size.rows {
            for col in 0..self.size.cols {
                if col > 0 {
                    output.write_all(b"\t")?;
                }
                output.write_all(render(Position::new(row, col)).as_bytes())?;
            }
            output.write_all(b"\n")?;
        }
        Ok(())
    }

    fn check_position(&self, pos: Position) -> Result<(), Error> {
        if self.limits.contains(pos) {
            Ok(())
        } else {
            Err(InvalidPosition(pos))
        }
    }

    fn in_range(&self, mut positions: Vec<Position>) -> Vec<Position> {
        positions.retain(|&pos| self.limits.contains(pos));
        positions
    }

    fn cell(&self, pos: Position) -> Option<&Cell> {
        self.cells.get(pos.row)?.get(pos.col)
    }

    /// Mutable cell at `pos`, growing storage to reach it.
    fn cell_mut(&mut self, pos: Position) -> &mut Cell {
        if self.cells.len() <= pos.row {
            self.cells.resize_with(pos.row + 1, Vec::new);
        }
        let row = &mut self.cells[pos.row];
        if row.len() <= pos.col {
            row.resize_with(pos.col + 1, Cell::default);
        }
        &mut row[pos.col]
    }

    /// Moves the edges leaving `pos` from `previous` to `current`.
    fn relink(&mut self, pos: Position, previous: &[Position], current: &[Position]) {
        for &referenced in previous {
            if let Some(cell) = self
                .cells
                .get_mut(referenced.row)
                .and_then(|row| row.get_mut(referenced.col))
            {
                cell.remove_parent(pos);
            }
        }
        for &referenced in current {
            self.cell_mut(referenced).add_parent(pos);
        }
    }

    /// Drops the cache of `pos` and of everything that reads it, directly or not.
    fn invalidate(&self, pos: Position) {
        let stale = dependency::dependents(self, pos);
        trace!(%pos, count = stale.len(), "invalidating cached values");
        for stale in stale {
            if let Some(cell) = self.cell(stale) {
                cell.invalidate_cache();
            }
        }
    }

    /// Value at `pos`, evaluating whatever formulas it needs first.
    fn value_at(&self, pos: Position) -> Value {
        let Some(cell) = self.cell(pos) else {
            return Value::default();
        };
        if cell.needs_evaluation() {
            self.evaluate_dependencies(pos);
        }
        cell.value(self)
    }

    /// Evaluates `root` and every uncached formula it reads, deepest first.
    ///
    /// An explicit stack keeps long reference chains from recursing: by the time a
    /// formula is evaluated, every formula it reads is already cached.
    fn evaluate_dependencies(&self, root: Position) {
        let mut stack = vec![(root, false)];
        while let Some((pos, expanded)) = stack.pop() {
            let Some(cell) = self.cell(pos) else {
                continue;
            };
            if !cell.needs_evaluation() {
                continue;
            }
            if expanded {
                trace!(%pos, "evaluating");
                cell.value(self);
                continue;
            }
            stack.push((pos, true));
            stack.extend(self.references(pos).into_iter().map(|pos| (pos, false)));
        }
    }

    fn shrink_to_content(&mut self) {
        while self.size.rows > 0 && self.row_is_blank(self.size.rows - 1) {
            self.size.rows -= 1;
        }
        while self.size.cols > 0 && self.col_is_blank(self.size.cols - 1) {
            self.size.cols -= 1;
        }
        if self.size.is_empty() {
            self.size = Size::default();
        }
    }

    fn row_is_blank(&self, row: usize) -> bool {
        self.cells
            .get(row)
            .map_or(true, |cells| cells.iter().take(self.size.cols).all(Cell::is_empty))
    }

    fn col_is_blank(&self, col: usize) -> bool {
        self.cells
            .iter()
            .take(self.size.rows)
            .all(|cells| cells.get(col).map_or(true, Cell::is_empty))
    }

    /// Releases trailing storage that holds neither content nor parents.
    fn compact(&mut self) {
        for row in &mut self.cells {
            while row.last().is_some_and(Cell::is_vacant) {
                row.pop();
            }
        }
        while self.cells.last().is_some_and(Vec::is_empty) {
            self.cells.pop();
        }
    }
}

impl DependencyGraph for Sheet {
    fn references(&self, pos: Position) -> Vec<Position> {
        self.cell(pos)
            .map(|cell| self.in_range(cell.referenced_cells()))
            .unwrap_or_default()
    }

    fn parents(&self, pos: Position) -> &[Position] {
        self.cell(pos).map(Cell::parents).unwrap_or_default()
    }
}

impl CellLookup for Sheet {
    fn lookup(&self, pos: Position) -> Option<Value> {
        self.limits.contains(pos).then(|| self.value_at(pos))
    }
}

/// Read-only handle to one cell of a [`Sheet`].
#[derive(Clone, Copy)]
pub struct CellView<'a> {
    sheet: &'a Sheet,
    pos: Position,
    cell: Option<&'a Cell>,
}

impl fmt::Debug for CellView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellView")
            .field("pos", &self.pos)
            .field("text", &self.text())
            .finish()
    }
}

impl<'a> CellView<'a> {
    pub fn position(&self) -> Position {
        self.pos
    }

    /// Computed value. Formulas are evaluated on first read and cached.
    pub fn value(&self) -> Value {
        self.sheet.value_at(self.pos)
    }

    /// Text as stored: escape sign kept, formulas in canonical form with a leading `=`.
    pub fn text(&self) -> String {
        self.cell.map(Cell::text).unwrap_or_default()
    }

    pub fn referenced_cells(&self) -> Vec<Position> {
        self.cell.map(Cell::referenced_cells).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.cell.map_or(true, Cell::is_empty)
    }

    /// Cells whose formulas read this one.
    pub fn parents(&self) -> &'a [Position] {
        self.cell.map(Cell::parents).unwrap_or_default()
    }

    pub fn has_parents(&self) -> bool {
        self.cell.is_some_and(Cell::has_parents)
    }
}
