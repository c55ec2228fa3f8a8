mod cost;
mod family;
mod registry;

use std::{collections::HashSet, fmt};

pub use cost::{CostOracle, TargetModel, TileCost};
pub use family::{Block, TileFamily, TileKind, TileParams, KARATSUBA_BLOCK, KARATSUBA_STRIDE};
pub use registry::{CatalogFlags, Enumerator, FamilyEntry, FamilyRegistry, WeightRule};

use crate::Error;

/// The positional index of a kind in its catalog, which is what replay
/// records refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId(pub u32);

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The tile kinds available for one problem size
#[derive(Debug, Clone)]
pub struct TileCatalog {
    wx: usize,
    wy: usize,
    squarer: bool,
    kinds: Vec<TileKind>,
}

impl TileCatalog {
    /// Enumerates every enabled family of `registry`. Squarer catalogs carry
    /// each kind with the weights `1, -1, 2, -2` (subject to the family's
    /// `WeightRule`), other catalogs only with weight `1`. The result is
    /// empty if nothing is enabled, see `ensure_non_empty`.
    pub fn build(wx: usize, wy: usize, flags: &CatalogFlags, registry: &FamilyRegistry) -> Self {
        let weights: &[i8] = if flags.is_squarer {
            &[1, -1, 2, -2]
        } else {
            &[1]
        };
        let wx32 = u32::try_from(wx).unwrap_or(u32::MAX);
        let wy32 = u32::try_from(wy).unwrap_or(u32::MAX);
        let mut kinds = vec![];
        let mut seen = HashSet::new();
        for weight in weights.iter().copied() {
            for entry in registry.entries() {
                if !(entry.enabled)(flags) || !entry.weights.allows(weight) {
                    continue
                }
                for params in (entry.enumerate)(wx32, wy32, flags) {
                    if (params.width == 0) || (params.height == 0) {
                        continue
                    }
                    let kind = TileKind {
                        family: entry.family,
                        params,
                        weight,
                    };
                    if seen.insert(kind) {
                        kinds.push(kind);
                    }
                }
            }
        }
        tracing::debug!(
            wx,
            wy,
            squarer = flags.is_squarer,
            kinds = kinds.len(),
            "built tile catalog"
        );
        Self {
            wx,
            wy,
            squarer: flags.is_squarer,
            kinds,
        }
    }

    pub fn new_default(wx: usize, wy: usize, flags: &CatalogFlags) -> Self {
        Self::build(wx, wy, flags, &FamilyRegistry::with_defaults())
    }

    pub fn wx(&self) -> usize {
        self.wx
    }

    pub fn wy(&self) -> usize {
        self.wy
    }

    pub fn is_squarer(&self) -> bool {
        self.squarer
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn ensure_non_empty(&self) -> Result<(), Error> {
        if self.kinds.is_empty() {
            Err(Error::EmptyCatalog)
        } else {
            Ok(())
        }
    }

    pub fn get(&self, id: TileId) -> Option<&TileKind> {
        self.kinds.get(usize::try_from(id.0).ok()?)
    }

    pub fn kinds(&self) -> &[TileKind] {
        &self.kinds
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileId, &TileKind)> {
        self.kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| (TileId(i as u32), kind))
    }

    pub fn find(&self, kind: &TileKind) -> Option<TileId> {
        self.kinds
            .iter()
            .position(|k| k == kind)
            .map(|i| TileId(i as u32))
    }

    /// The AND row covering the whole grid of a `1 x w` or `w x 1` product
    pub fn and_row(&self) -> Option<(TileId, TileKind)> {
        self.iter()
            .find(|(_, kind)| kind.family == TileFamily::AndRow)
            .map(|(id, kind)| (id, *kind))
    }
}
