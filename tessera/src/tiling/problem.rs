use crate::{
    analysis::prodsize,
    catalog::{Block, TileKind},
    Error,
};

/// Products wider than this do not fit the `u128` error arithmetic
pub const MAX_PRODUCT_WIDTH: usize = 120;

/// A covering problem, `error_budget` is in ulps of the exact product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilingProblem {
    pub wx: usize,
    pub wy: usize,
    pub signed: bool,
    pub squarer: bool,
    pub error_budget: u128,
    /// Hard cap on the number of DSP blocks
    pub max_dsp: Option<u32>,
}

/// Bit slicing metadata of one block output, relative to the tile anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputShape {
    pub block: Block,
    pub relative_weight: usize,
    pub width: usize,
    pub signed_x: bool,
    pub signed_y: bool,
    pub squarer: bool,
}

impl OutputShape {
    /// Whether the output is a two's complement number
    pub fn is_signed(&self) -> bool {
        if self.squarer {
            return false
        }
        let both_one = (self.block.width == 1) && (self.block.height == 1);
        if both_one {
            self.signed_x != self.signed_y
        } else {
            self.signed_x || self.signed_y
        }
    }
}

impl TilingProblem {
    pub fn new(wx: usize, wy: usize, signed: bool, error_budget: u128) -> Result<Self, Error> {
        let res = Self {
            wx,
            wy,
            signed,
            squarer: false,
            error_budget,
            max_dsp: None,
        };
        res.validate()?;
        Ok(res)
    }

    /// An unsigned squaring of a `w` bit operand
    pub fn squarer(w: usize, error_budget: u128) -> Result<Self, Error> {
        let res = Self {
            wx: w,
            wy: w,
            signed: false,
            squarer: true,
            error_budget,
            max_dsp: None,
        };
        res.validate()?;
        Ok(res)
    }

    pub fn with_max_dsp(mut self, max_dsp: Option<u32>) -> Self {
        self.max_dsp = max_dsp;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if (self.wx == 0) || (self.wy == 0) {
            return Err(Error::InvalidWidth(self.wx, self.wy))
        }
        if self.wx.saturating_add(self.wy) > MAX_PRODUCT_WIDTH {
            return Err(Error::WidthTooLarge(
                self.wx.saturating_add(self.wy),
                MAX_PRODUCT_WIDTH,
            ))
        }
        if self.squarer {
            if self.signed {
                return Err(Error::SignednessMismatch(
                    "squarers are generated for unsigned operands only".to_owned(),
                ))
            }
            if self.wx != self.wy {
                return Err(Error::ShapeMismatch(format!(
                    "a squarer needs equal word sizes, got {}x{}",
                    self.wx, self.wy
                )))
            }
        }
        Ok(())
    }

    /// The width of the exact product
    pub fn prodsize(&self) -> usize {
        prodsize(self.wx, self.wy, self.signed, self.signed)
    }

    /// The net tiling weight cell `(x, y)` must end up with. Squarer
    /// problems are folded onto `x >= y`, with off diagonal cells counting
    /// for both halves.
    pub fn required(&self, x: usize, y: usize) -> i32 {
        if !self.squarer {
            1
        } else if x == y {
            1
        } else if x > y {
            2
        } else {
            0
        }
    }

    /// The cell that `(x, y)` is accounted in
    pub fn fold(&self, x: usize, y: usize) -> (usize, usize) {
        if self.squarer {
            (x.max(y), x.min(y))
        } else {
            (x, y)
        }
    }

    /// `-1` for the partial products that have negative weight in a two's
    /// complement product
    pub fn sign_factor(&self, x: usize, y: usize) -> i32 {
        if self.signed && ((x + 1 == self.wx) != (y + 1 == self.wy)) {
            -1
        } else {
            1
        }
    }

    /// Every cell carrying weight, in order of ascending column and then
    /// ascending `y`
    pub fn cells(&self) -> Vec<(usize, usize)> {
        let mut v = vec![];
        for col in 0..(self.wx + self.wy - 1) {
            for y in 0..self.wy {
                if col < y {
                    break
                }
                let x = col - y;
                if (x < self.wx) && (self.required(x, y) > 0) {
                    v.push((x, y));
                }
            }
        }
        v
    }

    /// Calls `f` with the folded in-grid cells covered by `kind` at
    /// `(ax, ay)`
    pub fn for_each_cell<F: FnMut(usize, usize)>(&self, kind: &TileKind, ax: i64, ay: i64, mut f: F) {
        for block in kind.blocks() {
            let x0 = ax + i64::from(block.dx);
            let y0 = ay + i64::from(block.dy);
            let x_range = x0.max(0)..(x0 + i64::from(block.width)).min(self.wx as i64);
            for y in y0.max(0)..(y0 + i64::from(block.height)).min(self.wy as i64) {
                for x in x_range.clone() {
                    let (x, y) = self.fold(x as usize, y as usize);
                    f(x, y);
                }
            }
        }
    }

    /// Which operands of a block are read as two's complement
    pub fn block_signedness(&self, block: &Block, ax: i64, ay: i64) -> (bool, bool) {
        if !self.signed {
            return (false, false)
        }
        let x_top = ax + i64::from(block.dx) + i64::from(block.width) - 1;
        let y_top = ay + i64::from(block.dy) + i64::from(block.height) - 1;
        (x_top >= self.wx as i64 - 1, y_top >= self.wy as i64 - 1)
    }

    /// The outputs `kind` produces when anchored at `(ax, ay)`, one per block
    pub fn outputs(&self, kind: &TileKind, ax: i64, ay: i64) -> Vec<OutputShape> {
        kind.blocks()
            .into_iter()
            .map(|block| {
                let (signed_x, signed_y) = self.block_signedness(&block, ax, ay);
                let squarer = kind.is_squarer();
                let width = if squarer {
                    2 * block.width as usize
                } else {
                    prodsize(
                        block.width as usize,
                        block.height as usize,
                        signed_x,
                        signed_y,
                    )
                };
                OutputShape {
                    block,
                    relative_weight: (block.dx + block.dy) as usize,
                    width,
                    signed_x,
                    signed_y,
                    squarer,
                }
            })
            .collect()
    }

    /// Checks that `kind` may be placed at `(ax, ay)`
    pub fn check_placement(&self, kind: &TileKind, ax: i64, ay: i64) -> Result<(), Error> {
        if kind.weight == 0 {
            return Err(Error::ShapeMismatch(format!("{kind} has zero tiling weight")))
        }
        if !self.squarer {
            if kind.weight < 0 {
                return Err(Error::SignednessMismatch(format!(
                    "{kind} has a negative tiling weight, which only squarers can use"
                )))
            }
            if kind.is_squarer() {
                return Err(Error::ShapeMismatch(format!(
                    "{kind} is a squarer tile but the problem is not a squarer"
                )))
            }
        } else {
            if ax < ay {
                return Err(Error::ShapeMismatch(format!(
                    "{kind} at ({ax}, {ay}) is below the diagonal of a squarer"
                )))
            }
            if kind.is_squarer() && (ax != ay) {
                return Err(Error::ShapeMismatch(format!(
                    "squarer tile {kind} at ({ax}, {ay}) is not on the diagonal"
                )))
            }
        }
        let mut covers = false;
        self.for_each_cell(kind, ax, ay, |_, _| covers = true);
        if !covers {
            return Err(Error::ShapeMismatch(format!(
                "{kind} at ({ax}, {ay}) covers no cell of the {}x{} grid",
                self.wx, self.wy
            )))
        }
        if self.signed {
            let support = kind.signed_support();
            for block in kind.blocks() {
                let x0 = ax + i64::from(block.dx);
                let y0 = ay + i64::from(block.dy);
                // a block entirely past a signed edge would multiply sign
                // extension bits that no cell accounts for
                if (x0 >= self.wx as i64)
                    || (y0 >= self.wy as i64)
                    || (x0 + i64::from(block.width) <= 0)
                    || (y0 + i64::from(block.height) <= 0)
                {
                    return Err(Error::ShapeMismatch(format!(
                        "a block of {kind} at ({ax}, {ay}) lies outside of a signed grid"
                    )))
                }
                let (sx, sy) = self.block_signedness(&block, ax, ay);
                if (sx && !support.0) || (sy && !support.1) {
                    return Err(Error::SignednessMismatch(format!(
                        "{kind} at ({ax}, {ay}) touches a signed edge but does not support signed \
                         operands"
                    )))
                }
            }
        }
        Ok(())
    }

    pub fn is_legal(&self, kind: &TileKind, ax: i64, ay: i64) -> bool {
        self.check_placement(kind, ax, ay).is_ok()
    }

    /// All legal anchors of `kind`
    pub fn anchors(&self, kind: &TileKind) -> Vec<(i64, i64)> {
        let mut v = vec![];
        for ay in (1 - i64::from(kind.height()))..(self.wy as i64) {
            for ax in (1 - i64::from(kind.width()))..(self.wx as i64) {
                if self.is_legal(kind, ax, ay) {
                    v.push((ax, ay));
                }
            }
        }
        v
    }
}
