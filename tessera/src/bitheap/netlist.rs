use std::collections::BTreeMap;

use awint::{awi::*, awint_dag::triple_arena::{ptr_struct, Arena}};

use crate::{
    catalog::TileKind,
    tiling::{Placement, TilingProblem},
    Error,
};

ptr_struct!(PSignal);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    X,
    Y,
}

/// Bits `lo..(lo + width)` of an operand. Bits below zero read as zero,
/// bits past the top read as the sign bit of a signed operand and as zero
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperandSlice {
    pub operand: Operand,
    pub lo: i64,
    pub width: usize,
    /// Whether the slice is read as a two's complement number
    pub signed: bool,
}

/// A product of two operand slices, the raw output of one tile block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub name: String,
    pub x: OperandSlice,
    pub y: OperandSlice,
    pub width: usize,
    pub signed: bool,
}

/// One output of a realized tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileOutput {
    pub signal: PSignal,
    pub relative_weight: usize,
    pub width: usize,
    pub signed_x: bool,
    pub signed_y: bool,
    pub squarer: bool,
}

impl TileOutput {
    pub fn is_signed(&self, block_width: u32, block_height: u32) -> bool {
        if self.squarer {
            return false
        }
        if (block_width == 1) && (block_height == 1) {
            self.signed_x != self.signed_y
        } else {
            self.signed_x || self.signed_y
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileInstance {
    pub name: String,
    pub kind: TileKind,
    pub outputs: Vec<TileOutput>,
}

/// Turns placements into hardware
pub trait TileRealizer {
    /// Realizes placement number `index`
    fn generate(
        &mut self,
        placement: &Placement,
        index: usize,
        problem: &TilingProblem,
    ) -> Result<TileInstance, Error>;
}

/// Records the product signals of realized tiles so that they can be
/// simulated
#[derive(Debug, Clone, Default)]
pub struct Netlist {
    pub signals: Arena<PSignal, Signal>,
    pub instances: Vec<TileInstance>,
    operand_widths: Option<(usize, usize, bool)>,
}

/// The values of every signal of a [Netlist] for one pair of operands
pub type SignalValues = BTreeMap<PSignal, Awi>;

impl Netlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, p: PSignal) -> Option<&Signal> {
        self.signals.get(p)
    }

    fn read_slice(slice: &OperandSlice, bits: &Bits, signed_operand: bool) -> Awi {
        let mut res = Awi::zero(bw(slice.width));
        for i in 0..slice.width {
            let j = slice.lo + i as i64;
            let b = if j < 0 {
                false
            } else if (j as usize) < bits.bw() {
                bits.get(j as usize).unwrap_or(false)
            } else {
                signed_operand && bits.msb()
            };
            // `i < slice.width`
            let _ = res.set(i, b);
        }
        res
    }

    /// Evaluates the signal `p` for the operands `x` and `y`, which must
    /// have the widths of the problem the netlist was generated for
    pub fn value(&self, p: PSignal, x: &Bits, y: &Bits) -> Result<Awi, Error> {
        let s = self
            .signals
            .get(p)
            .ok_or(Error::OtherStr("signal is not in the netlist"))?;
        let (wx, wy, signed) = self
            .operand_widths
            .ok_or(Error::OtherStr("nothing was realized yet"))?;
        if (x.bw() != wx) || (y.bw() != wy) {
            return Err(Error::ShapeMismatch(format!(
                "operands of widths {}x{} given to a {wx}x{wy} netlist",
                x.bw(),
                y.bw()
            )))
        }
        let operand = |o: Operand| match o {
            Operand::X => x,
            Operand::Y => y,
        };
        let a = Self::read_slice(&s.x, operand(s.x.operand), signed);
        let b = Self::read_slice(&s.y, operand(s.y.operand), signed);
        let w = bw(s.width);
        let extend = |dst: &mut Awi, src: &Awi, signed: bool| {
            if signed {
                dst.sign_resize_(src);
            } else {
                dst.zero_resize_(src);
            }
        };
        let mut lhs = Awi::zero(w);
        extend(&mut lhs, &a, s.x.signed);
        let mut rhs = Awi::zero(w);
        extend(&mut rhs, &b, s.y.signed);
        let mut res = Awi::zero(w);
        res.mul_add_(&lhs, &rhs)
            .ok_or(Error::OtherStr("product widths disagree"))?;
        Ok(res)
    }

    /// Evaluates every signal
    pub fn evaluate(&self, x: &Bits, y: &Bits) -> Result<SignalValues, Error> {
        let mut res = SignalValues::new();
        for inst in &self.instances {
            for o in &inst.outputs {
                res.insert(o.signal, self.value(o.signal, x, y)?);
            }
        }
        Ok(res)
    }
}

impl TileRealizer for Netlist {
    fn generate(
        &mut self,
        placement: &Placement,
        index: usize,
        problem: &TilingProblem,
    ) -> Result<TileInstance, Error> {
        match self.operand_widths {
            None => self.operand_widths = Some((problem.wx, problem.wy, problem.signed)),
            Some(widths) if widths == (problem.wx, problem.wy, problem.signed) => (),
            Some((wx, wy, _)) => {
                return Err(Error::ShapeMismatch(format!(
                    "the netlist holds a {wx}x{wy} product, cannot add a tile of a {}x{} one",
                    problem.wx, problem.wy
                )))
            }
        }
        let kind = placement.kind;
        let (ax, ay) = placement.anchor();
        let name = format!("tile{index}_{kind}");
        let mut outputs = vec![];
        for (j, o) in problem.outputs(&kind, ax, ay).into_iter().enumerate() {
            let x = OperandSlice {
                operand: Operand::X,
                lo: ax + i64::from(o.block.dx),
                width: o.block.width as usize,
                signed: o.signed_x,
            };
            // squarers read both factors from `X`
            let y = if problem.squarer {
                OperandSlice {
                    operand: Operand::X,
                    lo: ay + i64::from(o.block.dy),
                    width: o.block.height as usize,
                    signed: false,
                }
            } else {
                OperandSlice {
                    operand: Operand::Y,
                    lo: ay + i64::from(o.block.dy),
                    width: o.block.height as usize,
                    signed: o.signed_y,
                }
            };
            let signal = self.signals.insert(Signal {
                name: format!("{name}_out{j}"),
                x,
                y,
                width: o.width,
                signed: o.is_signed(),
            });
            outputs.push(TileOutput {
                signal,
                relative_weight: o.relative_weight,
                width: o.width,
                signed_x: o.signed_x,
                signed_y: o.signed_y,
                squarer: o.squarer,
            });
        }
        tracing::trace!(%name, x = ax, y = ay, outputs = outputs.len(), "realized tile");
        let inst = TileInstance {
            name,
            kind,
            outputs,
        };
        self.instances.push(inst.clone());
        Ok(inst)
    }
}
