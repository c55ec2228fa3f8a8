use std::{
    fmt,
    num::NonZeroUsize,
    ops::{Index, IndexMut},
};

// zero length sides are forbidden, a multiplier with a zero width operand has
// no partial products and is rejected long before a grid is built

/// A dense two dimensional array indexed by `(x, y)`, stored in `y` major
/// order. Used for coverage matrices and per cell bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T> {
    m: Box<[T]>,
    len: (NonZeroUsize, NonZeroUsize),
}

impl<T> Grid<T> {
    /// Returns `None` if any of the side lengths are zero
    pub fn new<F: FnMut((usize, usize)) -> T>(len: (usize, usize), mut fill: F) -> Option<Self> {
        let nzlen = (NonZeroUsize::new(len.0)?, NonZeroUsize::new(len.1)?);
        let elen = len.0.checked_mul(len.1)?;
        let mut v = Vec::with_capacity(elen);
        for y in 0..len.1 {
            for x in 0..len.0 {
                v.push(fill((x, y)));
            }
        }
        Some(Self {
            m: v.into_boxed_slice(),
            len: nzlen,
        })
    }

    #[inline]
    pub fn nzlen(&self) -> (NonZeroUsize, NonZeroUsize) {
        self.len
    }

    #[inline]
    pub fn len(&self) -> (usize, usize) {
        (self.len.0.get(), self.len.1.get())
    }

    #[inline]
    fn inx(&self, xy: (usize, usize)) -> Option<usize> {
        let len = self.len();
        if (xy.0 >= len.0) || (xy.1 >= len.1) {
            None
        } else {
            Some(xy.0.wrapping_add(xy.1.wrapping_mul(len.0)))
        }
    }

    #[must_use]
    pub fn get(&self, xy: (usize, usize)) -> Option<&T> {
        self.m.get(self.inx(xy)?)
    }

    #[must_use]
    pub fn get_mut(&mut self, xy: (usize, usize)) -> Option<&mut T> {
        let inx = self.inx(xy)?;
        self.m.get_mut(inx)
    }

    /// Signed lookup for anchors that can lie outside of the grid
    #[must_use]
    pub fn get_signed(&self, xy: (i64, i64)) -> Option<&T> {
        let x = usize::try_from(xy.0).ok()?;
        let y = usize::try_from(xy.1).ok()?;
        self.get((x, y))
    }

    /// Returns a reference to `self` as a flat one dimensional slice in
    /// `y` major order
    pub fn get_flat1(&self) -> &[T] {
        &self.m
    }

    pub fn for_each<F: FnMut(&T, (usize, usize))>(&self, mut f: F) {
        let len = self.len();
        for (i, t) in self.m.iter().enumerate() {
            f(t, (i % len.0, i / len.0));
        }
    }

    pub fn for_each_mut<F: FnMut(&mut T, (usize, usize))>(&mut self, mut f: F) {
        let len = self.len();
        for (i, t) in self.m.iter_mut().enumerate() {
            f(t, (i % len.0, i / len.0));
        }
    }

    /// Returns `true` if the grid is square and every `(x, y)` element
    /// equals the `(y, x)` element
    pub fn is_symmetric(&self) -> bool
    where
        T: PartialEq,
    {
        let len = self.len();
        if len.0 != len.1 {
            return false
        }
        for y in 0..len.1 {
            for x in (y + 1)..len.0 {
                if self[(x, y)] != self[(y, x)] {
                    return false
                }
            }
        }
        true
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    /// Panics if out of bounds
    fn index(&self, xy: (usize, usize)) -> &T {
        match self.inx(xy) {
            Some(inx) => &self.m[inx],
            None => panic!("grid index {xy:?} is out of bounds of {:?}", self.len()),
        }
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    /// Panics if out of bounds
    fn index_mut(&mut self, xy: (usize, usize)) -> &mut T {
        match self.inx(xy) {
            Some(inx) => &mut self.m[inx],
            None => panic!("grid index {xy:?} is out of bounds of {:?}", self.len()),
        }
    }
}

/// Prints one row per `y` with the highest `x` on the left, the way partial
/// product diagrams are usually drawn
impl<T: fmt::Display> fmt::Display for Grid<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.len();
        for y in 0..len.1 {
            for x in (0..len.0).rev() {
                if x + 1 != len.0 {
                    f.write_str(" ")?;
                }
                write!(f, "{}", self[(x, y)])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
