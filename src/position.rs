use std::fmt;
use std::str::FromStr;

use crate::error::Error;

const LETTERS: usize = 26;

/// Zero-based cell coordinates. Ordering is by row, then column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Column letters for a zero-based column index (0 -> A, 25 -> Z, 26 -> AA).
    pub fn col_name(col: usize) -> String {
        let mut letters = Vec::new();
        let mut n = col as u128 + 1;
        while n > 0 {
            n -= 1;
            letters.push(b'A' + (n % LETTERS as u128) as u8);
            n /= LETTERS as u128;
        }
        letters.iter().rev().map(|&b| b as char).collect()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::col_name(self.col), self.row as u128 + 1)
    }
}

impl FromStr for Position {
    type Err = Error;

    /// Parses A1 notation: upper-case column letters followed by a one-based row.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidCellName(name.to_string());
        let split = name
            .find(|c: char| !c.is_ascii_uppercase())
            .ok_or_else(invalid)?;
        let (letters, digits) = name.split_at(split);
        if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let mut col = 0usize;
        for b in letters.bytes() {
            let digit = (b - b'A') as usize + 1;
            col = col
                .checked_mul(LETTERS)
                .and_then(|c| c.checked_add(digit))
                .ok_or_else(invalid)?;
        }
        let row = digits
            .parse::<usize>()
            .ok()
            .and_then(|r| r.checked_sub(1))
            .ok_or_else(invalid)?;

        Ok(Self::new(row, col - 1))
    }
}

/// Dimensions of a rectangle of cells anchored at `A1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub rows: usize,
    pub cols: usize,
}

impl Size {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }
}

/// Addressable extent of a sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_rows: usize,
    pub max_cols: usize,
}

impl Limits {
    pub const MAX_ROWS: usize = 16384;
    pub const MAX_COLS: usize = 16384;

    pub const fn new(max_rows: usize, max_cols: usize) -> Self {
        Self { max_rows, max_cols }
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.max_rows && pos.col < self.max_cols
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new(Self::MAX_ROWS, Self::MAX_COLS)
    }
}
