use crate::catalog::{TileFamily, TileKind, TileParams};

/// Which tile families a catalog may contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFlags {
    pub use_dsp: bool,
    pub use_lut: bool,
    pub use_karatsuba: bool,
    pub use_booth: bool,
    pub use_super_tiles: bool,
    pub use_2xk: bool,
    pub is_squarer: bool,
    /// Enumerate every DSP size that fits instead of only the native ones
    pub var_size_dsp: bool,
}

impl Default for CatalogFlags {
    fn default() -> Self {
        Self {
            use_dsp: true,
            use_lut: true,
            use_karatsuba: false,
            use_booth: false,
            use_super_tiles: false,
            use_2xk: false,
            is_squarer: false,
            var_size_dsp: false,
        }
    }
}

impl CatalogFlags {
    /// Only LUT based tiles, the usual choice for small multipliers
    pub fn lut_only() -> Self {
        Self {
            use_dsp: false,
            ..Self::default()
        }
    }

    /// Every family disabled
    pub fn none() -> Self {
        Self {
            use_dsp: false,
            use_lut: false,
            ..Self::default()
        }
    }

    pub fn with_dsp(mut self, use_dsp: bool) -> Self {
        self.use_dsp = use_dsp;
        self
    }

    pub fn with_lut(mut self, use_lut: bool) -> Self {
        self.use_lut = use_lut;
        self
    }

    pub fn with_karatsuba(mut self, use_karatsuba: bool) -> Self {
        self.use_karatsuba = use_karatsuba;
        self
    }

    pub fn with_booth(mut self, use_booth: bool) -> Self {
        self.use_booth = use_booth;
        self
    }

    pub fn with_super_tiles(mut self, use_super_tiles: bool) -> Self {
        self.use_super_tiles = use_super_tiles;
        self
    }

    pub fn with_2xk(mut self, use_2xk: bool) -> Self {
        self.use_2xk = use_2xk;
        self
    }

    pub fn with_squarer(mut self, is_squarer: bool) -> Self {
        self.is_squarer = is_squarer;
        self
    }

    pub fn with_var_size_dsp(mut self, var_size_dsp: bool) -> Self {
        self.var_size_dsp = var_size_dsp;
        self
    }
}

/// Which tiling weights a family is instantiated with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightRule {
    /// Every weight the catalog uses
    All,
    /// `±1` only
    Unit,
    /// `+1` only
    Positive,
}

impl WeightRule {
    pub fn allows(self, weight: i8) -> bool {
        match self {
            WeightRule::All => true,
            WeightRule::Unit => weight.abs() == 1,
            WeightRule::Positive => weight == 1,
        }
    }
}

/// Returns the parameter sets of a family for the given word sizes
pub type Enumerator = fn(wx: u32, wy: u32, flags: &CatalogFlags) -> Vec<TileParams>;

#[derive(Debug, Clone, Copy)]
pub struct FamilyEntry {
    pub family: TileFamily,
    pub enabled: fn(&CatalogFlags) -> bool,
    pub enumerate: Enumerator,
    pub weights: WeightRule,
}

/// An explicitly populated table of tile families. Families are enumerated
/// in registration order, which fixes the catalog order and therefore the
/// replay ids and heuristic tie breaks.
#[derive(Debug, Clone, Default)]
pub struct FamilyRegistry {
    entries: Vec<FamilyEntry>,
}

fn rect(width: u32, height: u32) -> TileParams {
    TileParams {
        width,
        height,
        variant: 0,
    }
}

fn and_rows(wx: u32, wy: u32, _: &CatalogFlags) -> Vec<TileParams> {
    if wx == 1 {
        vec![rect(1, wy)]
    } else if wy == 1 {
        vec![rect(wx, 1)]
    } else {
        vec![]
    }
}

fn dsps(wx: u32, wy: u32, flags: &CatalogFlags) -> Vec<TileParams> {
    if flags.var_size_dsp {
        let mut v = vec![];
        for h in 1..=wy.min(17) {
            v.push(rect(wx.min(24), h));
        }
        for w in 1..=wx.min(17) {
            v.push(rect(w, wy.min(24)));
        }
        v
    } else {
        vec![rect(24, 17), rect(17, 24)]
    }
}

fn luts(_: u32, _: u32, _: &CatalogFlags) -> Vec<TileParams> {
    vec![
        rect(3, 3),
        rect(2, 3),
        rect(3, 2),
        rect(1, 2),
        rect(2, 1),
        rect(1, 1),
    ]
}

fn booths(wx: u32, wy: u32, _: &CatalogFlags) -> Vec<TileParams> {
    let mut v = vec![];
    for x in 2..=wx {
        for y in 2..=wy.min(5) {
            v.push(rect(x, y));
        }
    }
    for x in 2..=wx.min(5) {
        for y in 2..=wy {
            v.push(rect(x, y));
        }
    }
    v
}

fn super_tiles(_: u32, _: u32, _: &CatalogFlags) -> Vec<TileParams> {
    (1..=12)
        .filter_map(|shape| TileKind::super_tile(shape, 1).map(|kind| kind.params))
        .collect()
}

fn two_by_ks(wx: u32, wy: u32, _: &CatalogFlags) -> Vec<TileParams> {
    let mut v = vec![];
    for x in 4..=wx {
        v.push(rect(x, 2));
    }
    for y in 4..=wy {
        v.push(rect(2, y));
    }
    v
}

fn karatsubas(wx: u32, wy: u32, _: &CatalogFlags) -> Vec<TileParams> {
    if (wx < 16) || (wy < 24) {
        return vec![]
    }
    let max_order = ((wx - 16) / 48).min((wy - 24) / 48);
    (0..=max_order)
        .map(|n| TileKind::karatsuba(n, 1).params)
        .collect()
}

fn squarer_luts(wx: u32, _: u32, _: &CatalogFlags) -> Vec<TileParams> {
    (1..=wx.min(6)).map(|n| rect(n, n)).collect()
}

impl FamilyRegistry {
    /// An empty registry, producing empty catalogs until families are
    /// registered
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut res = Self::new();
        res.register(FamilyEntry {
            family: TileFamily::AndRow,
            enabled: |flags| flags.use_lut,
            enumerate: and_rows,
            weights: WeightRule::Positive,
        });
        res.register(FamilyEntry {
            family: TileFamily::Dsp,
            enabled: |flags| flags.use_dsp,
            enumerate: dsps,
            weights: WeightRule::All,
        });
        res.register(FamilyEntry {
            family: TileFamily::Lut,
            enabled: |flags| flags.use_lut,
            enumerate: luts,
            weights: WeightRule::All,
        });
        res.register(FamilyEntry {
            family: TileFamily::Booth,
            enabled: |flags| flags.use_booth,
            enumerate: booths,
            weights: WeightRule::All,
        });
        res.register(FamilyEntry {
            family: TileFamily::SuperTile,
            enabled: |flags| flags.use_dsp && flags.use_super_tiles,
            enumerate: super_tiles,
            weights: WeightRule::All,
        });
        res.register(FamilyEntry {
            family: TileFamily::TwoByK,
            enabled: |flags| flags.use_2xk,
            enumerate: two_by_ks,
            weights: WeightRule::All,
        });
        res.register(FamilyEntry {
            family: TileFamily::Karatsuba,
            enabled: |flags| flags.use_dsp && flags.use_karatsuba,
            enumerate: karatsubas,
            weights: WeightRule::All,
        });
        res.register(FamilyEntry {
            family: TileFamily::SquarerLut,
            enabled: |flags| flags.use_lut && flags.is_squarer,
            enumerate: squarer_luts,
            weights: WeightRule::Unit,
        });
        res
    }

    pub fn register(&mut self, entry: FamilyEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[FamilyEntry] {
        &self.entries
    }
}
