//! Valuation grid
//!
//! Enterprise valuations live on a discrete grid of price cells arranged in
//! rows. Cells can carry behavior tags: whether a par valuation may be placed
//! there, whether the cell belongs to the reserved subset used to open the
//! consolidation successor, and whether multiple purchases are allowed at
//! that price. Valuations move between cells only through this module so the
//! movement rules stay in one place.
//!
//! The grid is parsed from rows of short strings, one per cell: the price
//! followed by optional tag suffixes (`p` = par, `P` = reserved consolidation
//! par, `m` = multiple buy). An empty string is a gap with no cell.

use serde::{Deserialize, Serialize};

/// Position of a cell within the grid, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId {
    pub row: usize,
    pub col: usize,
}

/// Behavior tags a cell can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellTag {
    /// Par valuations may be placed on this cell.
    Par,
    /// Reserved cell used to open the consolidation successor.
    MergerPar,
    /// More than one certificate may be bought here in a single action.
    MultipleBuy,
}

/// A single price cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    price: i64,
    tags: Vec<CellTag>,
}

impl Cell {
    /// Price of the cell in currency units.
    pub fn price(&self) -> i64 {
        self.price
    }

    /// Check whether the cell carries a tag.
    pub fn has_tag(&self, tag: CellTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// How a valuation moves when certificates are sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellMovement {
    /// One step down per sale transaction, regardless of how many units the
    /// transaction contained.
    DownBlock,
    /// One step down per unit sold.
    DownPerUnit,
}

/// The discrete price grid enterprises occupy.
///
/// # Example
/// ```
/// use magnate_core::market::{CellTag, SellMovement, ValuationGrid};
///
/// let rows = vec![
///     vec!["82".to_string(), "86".to_string(), "92p".to_string()],
///     vec!["78".to_string(), "84p".to_string(), "88P".to_string()],
/// ];
/// let grid = ValuationGrid::from_spec(&rows, SellMovement::DownBlock).unwrap();
///
/// let par = grid.par_cell_for(84).unwrap();
/// assert_eq!(grid.price(par), Some(84));
/// assert_eq!(grid.cells_of_type(CellTag::MergerPar).len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationGrid {
    rows: Vec<Vec<Option<Cell>>>,
    sell_movement: SellMovement,
}

impl ValuationGrid {
    /// Parse a grid from rows of cell strings.
    ///
    /// Each entry is a price followed by tag suffixes (`p`, `P`, `m`); an
    /// empty string leaves a gap. Fails if a cell string is malformed or the
    /// grid contains no cells at all.
    pub fn from_spec(rows: &[Vec<String>], sell_movement: SellMovement) -> Result<Self, String> {
        let mut parsed = Vec::with_capacity(rows.len());
        for (r, row) in rows.iter().enumerate() {
            let mut cells = Vec::with_capacity(row.len());
            for (c, entry) in row.iter().enumerate() {
                if entry.is_empty() {
                    cells.push(None);
                    continue;
                }
                cells.push(Some(Self::parse_cell(entry).map_err(|e| {
                    format!("grid cell at row {}, col {}: {}", r, c, e)
                })?));
            }
            parsed.push(cells);
        }

        let grid = Self {
            rows: parsed,
            sell_movement,
        };
        if grid.num_cells() == 0 {
            return Err("grid contains no cells".to_string());
        }
        Ok(grid)
    }

    fn parse_cell(entry: &str) -> Result<Cell, String> {
        let digits: String = entry.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(format!("'{}' does not start with a price", entry));
        }
        let price: i64 = digits
            .parse()
            .map_err(|_| format!("'{}' has an unparseable price", entry))?;

        let mut tags = Vec::new();
        for suffix in entry[digits.len()..].chars() {
            let tag = match suffix {
                'p' => CellTag::Par,
                'P' => CellTag::MergerPar,
                'm' => CellTag::MultipleBuy,
                other => return Err(format!("unknown cell tag '{}'", other)),
            };
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        Ok(Cell { price, tags })
    }

    /// Look up a cell by id.
    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.rows.get(id.row).and_then(|row| row.get(id.col)).and_then(|c| c.as_ref())
    }

    /// Price of the cell at `id`, if one exists there.
    pub fn price(&self, id: CellId) -> Option<i64> {
        self.cell(id).map(Cell::price)
    }

    /// All cells carrying `tag`, in grid order (row-major).
    pub fn cells_of_type(&self, tag: CellTag) -> Vec<CellId> {
        let mut out = Vec::new();
        for (r, row) in self.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if let Some(cell) = cell {
                    if cell.has_tag(tag) {
                        out.push(CellId { row: r, col: c });
                    }
                }
            }
        }
        out
    }

    /// First par-tagged cell with exactly `price`, in grid order.
    pub fn par_cell_for(&self, price: i64) -> Option<CellId> {
        self.cells_of_type(CellTag::Par)
            .into_iter()
            .find(|id| self.price(*id) == Some(price))
    }

    /// Cell one step down from `id`, if the grid extends that far.
    pub fn down(&self, id: CellId) -> Option<CellId> {
        let below = CellId {
            row: id.row + 1,
            col: id.col,
        };
        self.cell(below).map(|_| below)
    }

    /// Cell a valuation lands on after a sale of `units_sold` units in one
    /// transaction, honouring the configured sell movement. Clamps at the
    /// bottom of the grid.
    ///
    /// # Example
    /// ```
    /// use magnate_core::market::{CellId, SellMovement, ValuationGrid};
    ///
    /// let rows = vec![
    ///     vec!["100".to_string()],
    ///     vec!["90".to_string()],
    ///     vec!["80".to_string()],
    /// ];
    /// let grid = ValuationGrid::from_spec(&rows, SellMovement::DownBlock).unwrap();
    /// let top = CellId { row: 0, col: 0 };
    ///
    /// // Down-block: a three-unit sale still moves one step.
    /// assert_eq!(grid.moved_after_sale(top, 3), CellId { row: 1, col: 0 });
    /// ```
    pub fn moved_after_sale(&self, from: CellId, units_sold: usize) -> CellId {
        let steps = match self.sell_movement {
            SellMovement::DownBlock => usize::from(units_sold > 0),
            SellMovement::DownPerUnit => units_sold,
        };
        let mut at = from;
        for _ in 0..steps {
            match self.down(at) {
                Some(next) => at = next,
                None => break,
            }
        }
        at
    }

    /// The configured sell movement rule.
    pub fn sell_movement(&self) -> &SellMovement {
        &self.sell_movement
    }

    /// Total number of cells (gaps excluded).
    pub fn num_cells(&self) -> usize {
        self.rows.iter().flatten().filter(|c| c.is_some()).count()
    }
}
