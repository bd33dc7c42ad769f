//! Tray address generation.
//!
//! A partition of `rows x cols` cells is addressed row-major: rows become
//! letters (`A`, `B`, ... `Z`, `AA`, `AB`, ...) and columns become 1-based
//! numbers appended to them, so a 3x2 partition yields `A1 A2 B1 B2 C1 C2`.
//! Partitions of the `large` cell type prefix every address with `LARGE-`.
//!
//! Everything here is pure and allocation-only; it is safe to call from any
//! number of coroutines or threads.

use crate::error::InventoryError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Literal prepended to every address of a `large` partition.
pub const LARGE_PREFIX: &str = "LARGE-";

/// Cell type of a partition; decides the address prefix policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    #[default]
    Normal,
    Large,
}

impl CellType {
    /// Column value stored in `partitions.cell_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Normal => "normal",
            CellType::Large => "large",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            CellType::Normal => "",
            CellType::Large => LARGE_PREFIX,
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellType {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(CellType::Normal),
            "large" => Ok(CellType::Large),
            other => Err(InventoryError::validation(
                "cell_type",
                format!("unknown cell type `{other}`, expected `normal` or `large`"),
            )),
        }
    }
}

/// One generated grid position.
///
/// `row` is the 0-based row ordinal, `column` the 1-based column number as it
/// appears in `address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridAddress {
    pub row: u32,
    pub column: u32,
    pub address: String,
}

/// Encode a 0-based row ordinal as bijective base-26 letters.
///
/// `0 -> A`, `25 -> Z`, `26 -> AA`, `701 -> ZZ`, `702 -> AAA`. Every ordinal
/// maps to a distinct string, so grids of any height stay collision-free.
pub fn row_letters(row: u32) -> String {
    let mut n = u64::from(row) + 1;
    let mut letters = Vec::with_capacity(4);
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// Inverse of [`row_letters`]. Returns `None` for empty input, non `A-Z`
/// characters, or ordinals that overflow `u32`.
pub fn row_from_letters(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for b in letters.bytes() {
        if !b.is_ascii_uppercase() {
            return None;
        }
        n = n.checked_mul(26)?.checked_add(u64::from(b - b'A') + 1)?;
        if n > u64::from(u32::MAX) + 1 {
            return None;
        }
    }
    u32::try_from(n - 1).ok()
}

/// Render the address of a single cell.
pub fn format_address(row: u32, column: u32, cell_type: CellType) -> String {
    format!("{}{}{}", cell_type.prefix(), row_letters(row), column)
}

/// Lazy row-major iterator over the addresses of a partition.
///
/// Row letters are computed once per row rather than once per cell.
#[derive(Debug, Clone)]
pub struct Addresses {
    rows: u32,
    cols: u32,
    cell_type: CellType,
    row: u32,
    column: u32,
    row_label: String,
}

impl Iterator for Addresses {
    type Item = GridAddress;

    fn next(&mut self) -> Option<GridAddress> {
        if self.cols == 0 || self.row >= self.rows {
            return None;
        }
        if self.column == 1 {
            self.row_label = row_letters(self.row);
        }
        let item = GridAddress {
            row: self.row,
            column: self.column,
            address: format!("{}{}{}", self.cell_type.prefix(), self.row_label, self.column),
        };
        if self.column == self.cols {
            self.column = 1;
            self.row += 1;
        } else {
            self.column += 1;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.cols == 0 || self.row >= self.rows {
            0
        } else {
            let full_rows = (self.rows - self.row - 1) as usize;
            full_rows * self.cols as usize + (self.cols - self.column + 1) as usize
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Addresses {}

/// Iterate the addresses of a `rows x cols` partition in row-major order.
pub fn addresses(rows: u32, cols: u32, cell_type: CellType) -> Addresses {
    Addresses {
        rows,
        cols,
        cell_type,
        row: 0,
        column: 1,
        row_label: String::new(),
    }
}

/// Generate every address of a `rows x cols` partition in row-major order.
///
/// Produces exactly `rows * cols` entries; a zero dimension yields none.
pub fn generate(rows: u32, cols: u32, cell_type: CellType) -> Vec<GridAddress> {
    addresses(rows, cols, cell_type).collect()
}

/// A typed-in address resolved back to its grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedAddress {
    pub row: u32,
    pub column: u32,
    pub cell_type: CellType,
}

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(LARGE-)?([A-Z]+)([1-9][0-9]*)$").expect("address pattern is valid")
});

/// Parse an address such as `B12` or `large-aa3` (case-insensitive).
pub fn parse_address(input: &str) -> Option<ParsedAddress> {
    let upper = input.trim().to_ascii_uppercase();
    let caps = ADDRESS_RE.captures(&upper)?;
    let cell_type = if caps.get(1).is_some() {
        CellType::Large
    } else {
        CellType::Normal
    };
    let row = row_from_letters(caps.get(2)?.as_str())?;
    let column = caps.get(3)?.as_str().parse::<u32>().ok()?;
    Some(ParsedAddress {
        row,
        column,
        cell_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn triples(rows: u32, cols: u32, cell_type: CellType) -> Vec<(u32, u32, String)> {
        generate(rows, cols, cell_type)
            .into_iter()
            .map(|g| (g.row, g.column, g.address))
            .collect()
    }

    #[test]
    fn test_generate_row_major_order() {
        let expected = vec![
            (0, 1, "A1".to_string()),
            (0, 2, "A2".to_string()),
            (1, 1, "B1".to_string()),
            (1, 2, "B2".to_string()),
            (2, 1, "C1".to_string()),
            (2, 2, "C2".to_string()),
        ];
        assert_eq!(triples(3, 2, CellType::Normal), expected);
    }

    #[test]
    fn test_generate_large_prefix() {
        assert_eq!(
            triples(1, 1, CellType::Large),
            vec![(0, 1, "LARGE-A1".to_string())]
        );
    }

    #[test]
    fn test_generate_beyond_single_letter_rows() {
        let cells = generate(27, 1, CellType::Normal);
        assert_eq!(cells.len(), 27);
        let unique: HashSet<_> = cells.iter().map(|c| c.address.as_str()).collect();
        assert_eq!(unique.len(), 27);
        assert_eq!(cells[25].address, "Z1");
        assert_eq!(cells[26].address, "AA1");
    }

    #[test]
    fn test_generate_count_and_uniqueness() {
        for rows in 1..=30 {
            for cols in [1, 2, 7, 12] {
                let cells = generate(rows, cols, CellType::Normal);
                assert_eq!(cells.len(), (rows * cols) as usize);
                let unique: HashSet<_> = cells.iter().map(|c| &c.address).collect();
                assert_eq!(unique.len(), cells.len(), "duplicate in {rows}x{cols}");
            }
        }
    }

    #[test]
    fn test_generate_zero_dimension_is_empty() {
        assert!(generate(0, 4, CellType::Normal).is_empty());
        assert!(generate(4, 0, CellType::Large).is_empty());
    }

    #[test]
    fn test_generate_is_deterministic() {
        assert_eq!(
            generate(5, 4, CellType::Large),
            generate(5, 4, CellType::Large)
        );
    }

    #[test]
    fn test_addresses_exact_size() {
        let mut iter = addresses(3, 4, CellType::Normal);
        assert_eq!(iter.len(), 12);
        iter.next();
        iter.next();
        iter.next();
        iter.next();
        iter.next();
        assert_eq!(iter.len(), 7);
        assert_eq!(iter.count(), 7);
    }

    #[test]
    fn test_row_letters_boundaries() {
        assert_eq!(row_letters(0), "A");
        assert_eq!(row_letters(25), "Z");
        assert_eq!(row_letters(26), "AA");
        assert_eq!(row_letters(27), "AB");
        assert_eq!(row_letters(51), "AZ");
        assert_eq!(row_letters(52), "BA");
        assert_eq!(row_letters(701), "ZZ");
        assert_eq!(row_letters(702), "AAA");
    }

    #[test]
    fn test_row_letters_inverse() {
        for row in (0..2000).chain([u32::MAX - 1, u32::MAX]) {
            assert_eq!(row_from_letters(&row_letters(row)), Some(row));
        }
        assert_eq!(row_from_letters(""), None);
        assert_eq!(row_from_letters("a"), None);
        assert_eq!(row_from_letters("A1"), None);
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("B12"),
            Some(ParsedAddress {
                row: 1,
                column: 12,
                cell_type: CellType::Normal
            })
        );
        assert_eq!(
            parse_address("large-aa3"),
            Some(ParsedAddress {
                row: 26,
                column: 3,
                cell_type: CellType::Large
            })
        );
        for bad in ["", "A0", "1A", "A", "LARGE-", "BIG-A1", "A-1"] {
            assert_eq!(parse_address(bad), None, "should reject {bad:?}");
        }
    }

    #[test]
    fn test_parse_inverts_generate() {
        for cell_type in [CellType::Normal, CellType::Large] {
            for g in generate(30, 3, cell_type) {
                let parsed = parse_address(&g.address).expect("generated address parses");
                assert_eq!(parsed.row, g.row);
                assert_eq!(parsed.column, g.column);
                assert_eq!(parsed.cell_type, cell_type);
                assert_eq!(format_address(parsed.row, parsed.column, cell_type), g.address);
            }
        }
    }

    #[test]
    fn test_cell_type_from_str() {
        assert_eq!("normal".parse::<CellType>().ok(), Some(CellType::Normal));
        assert_eq!(" LARGE ".parse::<CellType>().ok(), Some(CellType::Large));
        assert!("big".parse::<CellType>().is_err());
        assert_eq!(CellType::default(), CellType::Normal);
    }
}
