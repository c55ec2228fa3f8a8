use crate::{
    catalog::TileKind,
    tiling::{Placement, TilingProblem},
    Error, Grid,
};

/// Net tiling weight per cell. Squarer problems are folded onto `x >= y`,
/// cells below the diagonal stay zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageMatrix {
    grid: Grid<i32>,
}

impl CoverageMatrix {
    pub fn new(problem: &TilingProblem) -> Result<Self, Error> {
        let grid = Grid::new((problem.wx, problem.wy), |_| 0)
            .ok_or(Error::InvalidWidth(problem.wx, problem.wy))?;
        Ok(Self { grid })
    }

    /// Builds the matrix from `placements` alone, rejecting illegal ones
    pub fn from_placements(placements: &[Placement], problem: &TilingProblem) -> Result<Self, Error> {
        let mut res = Self::new(problem)?;
        for p in placements {
            let (x, y) = (i64::from(p.x), i64::from(p.y));
            problem.check_placement(&p.kind, x, y)?;
            res.add(problem, &p.kind, x, y);
        }
        Ok(res)
    }

    /// Adds the weight of `kind` at `(x, y)` without any legality check
    pub fn add(&mut self, problem: &TilingProblem, kind: &TileKind, x: i64, y: i64) {
        let w = i32::from(kind.weight);
        let grid = &mut self.grid;
        problem.for_each_cell(kind, x, y, |x, y| grid[(x, y)] += w);
    }

    pub fn get(&self, x: usize, y: usize) -> i32 {
        self.grid.get((x, y)).copied().unwrap_or(0)
    }

    pub fn grid(&self) -> &Grid<i32> {
        &self.grid
    }

    /// `required - coverage`
    pub fn deviation(&self, problem: &TilingProblem, x: usize, y: usize) -> i32 {
        problem.required(x, y) - self.get(x, y)
    }

    /// One more than the highest column with a deviating cell
    pub fn actual_lsb(&self, problem: &TilingProblem) -> usize {
        problem
            .cells()
            .into_iter()
            .filter(|&(x, y)| self.deviation(problem, x, y) != 0)
            .map(|(x, y)| x + y + 1)
            .max()
            .unwrap_or(0)
    }

    /// Number of exactly covered cells in column `actual_lsb - 1`, or 1 if
    /// nothing is truncated
    pub fn keep_bits(&self, problem: &TilingProblem, actual_lsb: usize) -> usize {
        if actual_lsb == 0 {
            return 1
        }
        problem
            .cells()
            .into_iter()
            .filter(|&(x, y)| (x + y + 1 == actual_lsb) && (self.deviation(problem, x, y) == 0))
            .count()
    }

    /// Checks the coverage invariant for every cell at or above `actual_lsb`
    pub fn check_exact_from(&self, problem: &TilingProblem, actual_lsb: usize) -> Result<(), Error> {
        for (x, y) in problem.cells() {
            if (x + y >= actual_lsb) && (self.deviation(problem, x, y) != 0) {
                return Err(Error::CoverageViolation {
                    x,
                    y,
                    found: self.get(x, y),
                    required: problem.required(x, y),
                })
            }
        }
        Ok(())
    }

    /// The full matrix with the folded half of a squarer mirrored back,
    /// otherwise a plain copy
    pub fn mirrored(&self, problem: &TilingProblem) -> Grid<i32> {
        let mut res = self.grid.clone();
        if problem.squarer {
            res.for_each_mut(|c, (x, y)| {
                if x < y {
                    *c = self.get(y, x);
                }
            });
        }
        res
    }
}
