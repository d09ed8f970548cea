/*!
The grid is a rectangular torus. Cells are addressed by `(row, col)` and, for
storage, by their flattened index `row * cols + col`. Every cell knows the
cells within a fixed radius; this list is computed once and shared read-only
by everything that samples interaction partners.

```rust
use model::grid::{GridTopology, Neighbourhood};
let g = GridTopology::new(4, 4, 1, Neighbourhood::VonNeumann).unwrap();
assert_eq!(g.neighbors(0), &[12, 3, 1, 4]);
```
 */
use rand::{Rng, RngCore};
use serde_derive::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::CellId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

/// Which offsets within the radius count as neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Neighbourhood {
    /// Manhattan distance at most the radius. Radius 1 gives the four
    /// orthogonal neighbours of the original Axelrod model.
    VonNeumann,
    /// Chebyshev distance at most the radius.
    Moore,
}

impl std::str::FromStr for Neighbourhood {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "von-neumann" | "vonneumann" => Ok(Neighbourhood::VonNeumann),
            "moore" => Ok(Neighbourhood::Moore),
            _ => Err(format!("unknown neighbourhood {}", s)),
        }
    }
}

impl Neighbourhood {
    fn contains(self, dr: isize, dc: isize, radius: isize) -> bool {
        match self {
            Neighbourhood::VonNeumann => dr.abs() + dc.abs() <= radius,
            Neighbourhood::Moore => dr.abs() <= radius && dc.abs() <= radius,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GridTopology {
    rows: usize,
    cols: usize,
    radius: usize,
    neighbors: Vec<Vec<CellId>>,
}

impl GridTopology {
    pub fn new(
        rows: usize,
        cols: usize,
        radius: usize,
        shape: Neighbourhood,
    ) -> Result<GridTopology, ConfigError> {
        if rows == 0 || cols == 0 {
            return Err(ConfigError::EmptyGrid { rows, cols });
        }
        let r = radius as isize;
        let mut neighbors = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let own = row * cols + col;
                let mut around: Vec<CellId> = Vec::new();
                for dr in -r..=r {
                    for dc in -r..=r {
                        if (dr == 0 && dc == 0) || !shape.contains(dr, dc, r) {
                            continue;
                        }
                        let n_row = (row as isize + dr).rem_euclid(rows as isize) as usize;
                        let n_col = (col as isize + dc).rem_euclid(cols as isize) as usize;
                        let n = n_row * cols + n_col;
                        // Small tori wrap onto themselves: skip self and repeats.
                        if n != own && !around.contains(&n) {
                            around.push(n);
                        }
                    }
                }
                if around.is_empty() {
                    return Err(ConfigError::NoNeighbours { cell: own, radius });
                }
                neighbors.push(around);
            }
        }
        Ok(GridTopology {
            rows,
            cols,
            radius,
            neighbors,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Number of cells, i.e. the total agent count.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self, cell: Cell) -> CellId {
        cell.row * self.cols + cell.col
    }

    pub fn cell(&self, index: CellId) -> Cell {
        Cell {
            row: index / self.cols,
            col: index % self.cols,
        }
    }

    pub fn neighbors(&self, cell: CellId) -> &[CellId] {
        &self.neighbors[cell]
    }

    pub fn random_cell(&self, rng: &mut dyn RngCore) -> CellId {
        rng.gen_range(0..self.len())
    }

    pub fn random_neighbor(&self, cell: CellId, rng: &mut dyn RngCore) -> CellId {
        let around = &self.neighbors[cell];
        around[rng.gen_range(0..around.len())]
    }
}
