use std::fmt;

/// The closed set of tile families. Family specific geometry lives in
/// [TileParams], everything else is dispatched through [TileKind].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TileFamily {
    /// Small multipliers synthesized entirely from lookup tables
    Lut,
    /// A row of AND gates, the whole multiplier when one operand is one bit
    AndRow,
    /// A single hard multiplier block
    Dsp,
    /// Booth recoded arrays with one side of at most 5 bits
    Booth,
    /// Carry chain based multipliers with one side of exactly 2 bits
    TwoByK,
    /// Two cascaded hard blocks sharing one post adder
    SuperTile,
    /// Hard blocks of 16x24 arranged so that Karatsuba pairs share
    /// multipliers, `variant` is the order
    Karatsuba,
    /// LUT based squarers placed on the diagonal of a squarer grid
    SquarerLut,
}

impl TileFamily {
    pub const ALL: [TileFamily; 8] = [
        TileFamily::Lut,
        TileFamily::AndRow,
        TileFamily::Dsp,
        TileFamily::Booth,
        TileFamily::TwoByK,
        TileFamily::SuperTile,
        TileFamily::Karatsuba,
        TileFamily::SquarerLut,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TileFamily::Lut => "lut",
            TileFamily::AndRow => "and",
            TileFamily::Dsp => "dsp",
            TileFamily::Booth => "booth",
            TileFamily::TwoByK => "2xk",
            TileFamily::SuperTile => "super",
            TileFamily::Karatsuba => "kara",
            TileFamily::SquarerLut => "sqr",
        }
    }

    /// Whether the family can accept a two's complement operand on the `x`
    /// and `y` axes respectively
    pub fn signed_support(self) -> (bool, bool) {
        match self {
            TileFamily::Lut
            | TileFamily::AndRow
            | TileFamily::Dsp
            | TileFamily::Booth
            | TileFamily::TwoByK => (true, true),
            TileFamily::SuperTile | TileFamily::Karatsuba | TileFamily::SquarerLut => {
                (false, false)
            }
        }
    }

    /// Hard block or synthesized logic
    pub fn is_hard_block(self) -> bool {
        matches!(
            self,
            TileFamily::Dsp | TileFamily::SuperTile | TileFamily::Karatsuba
        )
    }
}

/// Geometry parameters of a tile kind. `width` and `height` are those of the
/// bounding box along `x` and `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileParams {
    pub width: u32,
    pub height: u32,
    pub variant: u32,
}

/// A rectangular sub product of a tile, relative to the tile anchor. Every
/// block produces one output of the tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    pub dx: u32,
    pub dy: u32,
    pub width: u32,
    pub height: u32,
}

impl Block {
    pub const fn new(dx: u32, dy: u32, width: u32, height: u32) -> Self {
        Self {
            dx,
            dy,
            width,
            height,
        }
    }

    pub fn contains(&self, dx: i64, dy: i64) -> bool {
        (dx >= i64::from(self.dx))
            && (dy >= i64::from(self.dy))
            && (dx < i64::from(self.dx + self.width))
            && (dy < i64::from(self.dy + self.height))
    }
}

/// Two 24x17 or 17x24 hard blocks per shape, the first always at the anchor
const SUPER_TILE_SHAPES: [(Block, Block); 12] = [
    (Block::new(0, 0, 24, 17), Block::new(0, 17, 24, 17)),
    (Block::new(0, 0, 24, 17), Block::new(24, 0, 24, 17)),
    (Block::new(0, 0, 17, 24), Block::new(0, 24, 17, 24)),
    (Block::new(0, 0, 17, 24), Block::new(17, 0, 17, 24)),
    (Block::new(0, 0, 24, 17), Block::new(24, 0, 17, 24)),
    (Block::new(0, 0, 17, 24), Block::new(17, 0, 24, 17)),
    (Block::new(0, 0, 24, 17), Block::new(0, 17, 17, 24)),
    (Block::new(0, 0, 17, 24), Block::new(0, 24, 24, 17)),
    (Block::new(0, 0, 24, 17), Block::new(24, 17, 24, 17)),
    (Block::new(0, 0, 17, 24), Block::new(17, 24, 17, 24)),
    (Block::new(0, 0, 24, 17), Block::new(24, 17, 17, 24)),
    (Block::new(0, 0, 17, 24), Block::new(17, 24, 24, 17)),
];

pub const KARATSUBA_BLOCK: (u32, u32) = (16, 24);
pub const KARATSUBA_STRIDE: u32 = 48;

/// An immutable tile type. Cheap to copy, placements carry their own copy
/// so that a solution can be analyzed without its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileKind {
    pub family: TileFamily,
    pub params: TileParams,
    /// The tiling weight, `±1` or `±2` for tiles counted twice in squarers
    pub weight: i8,
}

impl TileKind {
    /// Creates a rectangular kind
    pub fn new(family: TileFamily, width: u32, height: u32, weight: i8) -> Self {
        Self {
            family,
            params: TileParams {
                width,
                height,
                variant: 0,
            },
            weight,
        }
    }

    /// Super tile of the given shape number in `1..=12`
    pub fn super_tile(shape: u32, weight: i8) -> Option<Self> {
        let (b0, b1) = SUPER_TILE_SHAPES.get(usize::try_from(shape.checked_sub(1)?).ok()?)?;
        let width = (b0.dx + b0.width).max(b1.dx + b1.width);
        let height = (b0.dy + b0.height).max(b1.dy + b1.height);
        Some(Self {
            family: TileFamily::SuperTile,
            params: TileParams {
                width,
                height,
                variant: shape,
            },
            weight,
        })
    }

    /// Karatsuba arrangement of order `n`, covering `(n + 1)^2` blocks
    pub fn karatsuba(n: u32, weight: i8) -> Self {
        Self {
            family: TileFamily::Karatsuba,
            params: TileParams {
                width: KARATSUBA_STRIDE * n + KARATSUBA_BLOCK.0,
                height: KARATSUBA_STRIDE * n + KARATSUBA_BLOCK.1,
                variant: n,
            },
            weight,
        }
    }

    pub fn width(&self) -> u32 {
        self.params.width
    }

    pub fn height(&self) -> u32 {
        self.params.height
    }

    pub fn is_squarer(&self) -> bool {
        self.family == TileFamily::SquarerLut
    }

    pub fn signed_support(&self) -> (bool, bool) {
        self.family.signed_support()
    }

    /// The rectangular sub products making up this kind, disjoint by
    /// construction
    pub fn blocks(&self) -> Vec<Block> {
        match self.family {
            TileFamily::SuperTile => {
                match SUPER_TILE_SHAPES.get((self.params.variant as usize).wrapping_sub(1)) {
                    Some((b0, b1)) => vec![*b0, *b1],
                    None => vec![],
                }
            }
            TileFamily::Karatsuba => {
                let n = self.params.variant;
                let mut v = vec![];
                for j in 0..=n {
                    for i in 0..=n {
                        v.push(Block::new(
                            i * KARATSUBA_STRIDE,
                            j * KARATSUBA_STRIDE,
                            KARATSUBA_BLOCK.0,
                            KARATSUBA_BLOCK.1,
                        ));
                    }
                }
                v
            }
            _ => vec![Block::new(0, 0, self.params.width, self.params.height)],
        }
    }

    /// Returns if the relative position `(dx, dy)` is covered by the shape
    pub fn shape_valid(&self, dx: i64, dy: i64) -> bool {
        self.blocks().iter().any(|b| b.contains(dx, dy))
    }

    /// All covered relative cells, block by block
    pub fn cells(&self) -> Vec<(u32, u32)> {
        let mut v = vec![];
        for b in self.blocks() {
            for dy in 0..b.height {
                for dx in 0..b.width {
                    v.push((b.dx + dx, b.dy + dy));
                }
            }
        }
        v
    }

    /// Number of hard blocks this kind instantiates
    pub fn dsp_count(&self) -> u32 {
        match self.family {
            TileFamily::Dsp => 1,
            TileFamily::SuperTile => 2,
            // the diagonal products plus one shared multiplier per Karatsuba pair
            TileFamily::Karatsuba => {
                let n = self.params.variant;
                (n + 1) * (n + 2) / 2
            }
            _ => 0,
        }
    }
}

impl fmt::Display for TileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            TileFamily::SuperTile | TileFamily::Karatsuba => {
                write!(f, "{}{}", self.family.name(), self.params.variant)?
            }
            TileFamily::SquarerLut => write!(f, "{}{}", self.family.name(), self.params.width)?,
            _ => write!(
                f,
                "{}{}x{}",
                self.family.name(),
                self.params.width,
                self.params.height
            )?,
        }
        if self.weight != 1 {
            write!(f, "({:+})", self.weight)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_shapes() {
        for shape in 1..=12 {
            let kind = TileKind::super_tile(shape, 1).unwrap();
            // the two blocks are disjoint so the cell count is the sum
            assert_eq!(kind.cells().len(), 2 * 24 * 17);
            assert!(kind.shape_valid(0, 0));
            assert_eq!(kind.dsp_count(), 2);
        }
        assert!(TileKind::super_tile(0, 1).is_none());
        assert!(TileKind::super_tile(13, 1).is_none());

        let kara = TileKind::karatsuba(1, 1);
        assert_eq!((kara.width(), kara.height()), (64, 72));
        assert_eq!(kara.blocks().len(), 4);
        assert!(kara.shape_valid(48, 48));
        assert!(!kara.shape_valid(20, 0));
        assert_eq!(kara.dsp_count(), 3);
    }

    #[test]
    fn names() {
        assert_eq!(TileKind::new(TileFamily::Lut, 3, 2, 1).to_string(), "lut3x2");
        assert_eq!(
            TileKind::new(TileFamily::SquarerLut, 4, 4, -1).to_string(),
            "sqr4(-1)"
        );
        assert_eq!(TileKind::super_tile(7, 2).unwrap().to_string(), "super7(+2)");
    }
}
