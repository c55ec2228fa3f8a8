use std::time::Duration;

use awint::awi::*;

use crate::{
    analysis::prodsize,
    assemble::BitHeapAssembler,
    bitheap::{BitHeap, EvalBitHeap, HeapSum, Netlist, TileInstance, TileRealizer},
    catalog::{CatalogFlags, CostOracle, TargetModel, TileCatalog},
    tiling::{Solution, StrategyConfig, StrategyRegistry, TilingProblem},
    Error,
};

/// Everything that controls how a multiplier is generated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiplierConfig {
    /// Name of the strategy in the [StrategyRegistry]
    pub strategy: String,
    pub flags: CatalogFlags,
    pub max_dsp: Option<u32>,
    pub strategy_config: StrategyConfig,
}

impl Default for MultiplierConfig {
    fn default() -> Self {
        Self {
            strategy: "greedy".to_owned(),
            flags: CatalogFlags::default(),
            max_dsp: None,
            strategy_config: StrategyConfig::default(),
        }
    }
}

impl MultiplierConfig {
    pub fn with_strategy<S: Into<String>>(mut self, strategy: S) -> Self {
        self.strategy = strategy.into();
        self
    }

    pub fn with_flags(mut self, flags: CatalogFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_max_dsp(mut self, max_dsp: Option<u32>) -> Self {
        self.max_dsp = max_dsp;
        self
    }

    pub fn with_beam(mut self, beam_width: usize, beam_range: usize) -> Self {
        self.strategy_config = self.strategy_config.with_beam(beam_width, beam_range);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.strategy_config = self.strategy_config.with_timeout(timeout);
        self
    }

    pub fn with_node_limit(mut self, node_limit: Option<u64>) -> Self {
        self.strategy_config = self.strategy_config.with_node_limit(node_limit);
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.strategy_config = self.strategy_config.with_max_retries(max_retries);
        self
    }

    pub fn with_optimal_truncation(mut self, optimal_truncation: bool) -> Self {
        self.strategy_config = self
            .strategy_config
            .with_optimal_truncation(optimal_truncation);
        self
    }

    pub fn with_max_stages(mut self, max_stages: Option<usize>) -> Self {
        self.strategy_config = self.strategy_config.with_max_stages(max_stages);
        self
    }

    pub fn with_replay(mut self, replay: Option<String>) -> Self {
        self.strategy_config = self.strategy_config.with_replay(replay);
        self
    }
}

/// The result of generating a multiplier
#[derive(Debug, Clone)]
pub struct MultiplierReport {
    pub problem: TilingProblem,
    pub solution: Solution,
    pub instances: Vec<TileInstance>,
    pub sum: HeapSum,
    /// The output is bits `lsb_out..(lsb_out + w_out)` of the heap sum
    pub lsb_out: usize,
    pub w_out: usize,
}

/// A generated multiplier with its netlist and heap, ready for simulation
#[derive(Debug, Clone)]
pub struct EvalMultiplier {
    pub multiplier: IntMultiplier,
    pub report: MultiplierReport,
    pub netlist: Netlist,
    pub heap: EvalBitHeap,
}

impl EvalMultiplier {
    /// The `w_out` bit output for concrete operands. Squarers only read `x`.
    pub fn evaluate(&self, x: &Bits, y: &Bits) -> Result<Awi, Error> {
        let sum = self.heap.evaluate(&self.netlist, x, y)?;
        let w_out = self.report.w_out;
        let mut res = Awi::zero(bw(w_out));
        res.field(0, &sum, self.report.lsb_out, w_out)
            .ok_or(Error::OtherStr("output slice is outside of the heap"))?;
        Ok(res)
    }
}

/// A `wx x wy` integer multiplier or a squarer with a `w_out` bit output.
/// Dropping low output bits turns it into a faithfully rounded truncated
/// multiplier with an error budget of half an output ulp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntMultiplier {
    pub wx: usize,
    pub wy: usize,
    pub w_out: usize,
    pub signed: bool,
    pub squarer: bool,
}

impl IntMultiplier {
    /// `w_out == 0` or wider than the product means the full product
    pub fn new(wx: usize, wy: usize, w_out: usize, signed: bool) -> Result<Self, Error> {
        let mut res = Self {
            wx,
            wy,
            w_out,
            signed,
            squarer: false,
        };
        res.w_out = res.clamp_w_out(w_out);
        res.problem(None)?;
        Ok(res)
    }

    /// An unsigned squarer of a `w` bit operand
    pub fn squarer(w: usize, w_out: usize) -> Result<Self, Error> {
        let mut res = Self {
            wx: w,
            wy: w,
            w_out,
            signed: false,
            squarer: true,
        };
        res.w_out = res.clamp_w_out(w_out);
        res.problem(None)?;
        Ok(res)
    }

    fn clamp_w_out(&self, w_out: usize) -> usize {
        let p = self.prodsize();
        if (w_out == 0) || (w_out > p) {
            p
        } else {
            w_out
        }
    }

    pub fn prodsize(&self) -> usize {
        prodsize(self.wx, self.wy, self.signed, self.signed)
    }

    pub fn lsb_out(&self) -> usize {
        self.prodsize() - self.w_out
    }

    /// Half an ulp of the output, zero for a full width output
    pub fn error_budget(&self) -> u128 {
        match self.lsb_out() {
            0 => 0,
            l => 1u128 << (l - 1),
        }
    }

    /// Where the round bit goes when the output is truncated
    pub fn round_bit(&self) -> Option<usize> {
        self.lsb_out().checked_sub(1)
    }

    pub fn problem(&self, max_dsp: Option<u32>) -> Result<TilingProblem, Error> {
        let problem = if self.squarer {
            TilingProblem::squarer(self.wx, 0)?
        } else {
            TilingProblem::new(self.wx, self.wy, self.signed, 0)?
        };
        Ok(TilingProblem {
            error_budget: self.error_budget(),
            ..problem
        }
        .with_max_dsp(max_dsp))
    }

    /// Builds the catalog and runs the configured strategy
    pub fn solve(
        &self,
        config: &MultiplierConfig,
        oracle: &dyn CostOracle,
    ) -> Result<(TilingProblem, Solution), Error> {
        let problem = self.problem(config.max_dsp)?;
        let flags = config.flags.clone().with_squarer(self.squarer);
        let catalog = TileCatalog::new_default(self.wx, self.wy, &flags);
        catalog.ensure_non_empty()?;
        let mut strategy = StrategyRegistry::with_defaults()
            .create(&config.strategy, &config.strategy_config)?;
        let solution = strategy.solve(&problem, &catalog, oracle)?;
        tracing::info!(
            wx = self.wx,
            wy = self.wy,
            w_out = self.w_out,
            signed = self.signed,
            squarer = self.squarer,
            strategy = strategy.name(),
            placements = solution.placements.len(),
            area = solution.area,
            dsp = solution.dsp_count,
            achieved_error = %solution.achieved_error,
            "tiled multiplier"
        );
        Ok((problem, solution))
    }

    /// Emits a solved tiling into `heap` with product column `c` at heap
    /// column `offset + c`, without starting compression
    pub fn assemble_at<R: TileRealizer + ?Sized, H: BitHeap + ?Sized>(
        &self,
        problem: &TilingProblem,
        solution: &Solution,
        offset: usize,
        realizer: &mut R,
        heap: &mut H,
    ) -> Result<Vec<TileInstance>, Error> {
        BitHeapAssembler::new().with_offset(offset).assemble(
            solution,
            problem,
            self.round_bit(),
            realizer,
            heap,
        )
    }

    /// Emits a solved tiling into `heap` and starts compression
    pub fn realize<R: TileRealizer + ?Sized, H: BitHeap + ?Sized>(
        &self,
        problem: TilingProblem,
        solution: Solution,
        realizer: &mut R,
        heap: &mut H,
    ) -> Result<MultiplierReport, Error> {
        let instances = self.assemble_at(&problem, &solution, 0, realizer, heap)?;
        let sum = heap.start_compression(solution.compression.as_ref())?;
        Ok(MultiplierReport {
            problem,
            solution,
            instances,
            sum,
            lsb_out: self.lsb_out(),
            w_out: self.w_out,
        })
    }

    /// Solves, assembles into `heap` and starts compression
    pub fn generate<R: TileRealizer + ?Sized, H: BitHeap + ?Sized>(
        &self,
        config: &MultiplierConfig,
        oracle: &dyn CostOracle,
        realizer: &mut R,
        heap: &mut H,
    ) -> Result<MultiplierReport, Error> {
        let (problem, solution) = self.solve(config, oracle)?;
        self.realize(problem, solution, realizer, heap)
    }

    /// Solves and adds the product, shifted up by `offset` columns, to a heap
    /// that holds other terms as well. The owner of the heap starts the
    /// compression, so a compression plan of the solver is not used.
    pub fn add_to_heap<R: TileRealizer + ?Sized, H: BitHeap + ?Sized>(
        &self,
        config: &MultiplierConfig,
        oracle: &dyn CostOracle,
        offset: usize,
        realizer: &mut R,
        heap: &mut H,
    ) -> Result<(Solution, Vec<TileInstance>), Error> {
        let (problem, solution) = self.solve(config, oracle)?;
        let instances = self.assemble_at(&problem, &solution, offset, realizer, heap)?;
        Ok((solution, instances))
    }

    /// [IntMultiplier::generate] with the default [TargetModel] into an
    /// owned [Netlist] and [EvalBitHeap]
    pub fn generate_eval(&self, config: &MultiplierConfig) -> Result<EvalMultiplier, Error> {
        let (problem, solution) = self.solve(config, &TargetModel::default())?;
        let (lsb, msb) =
            BitHeapAssembler::new().required_range(&solution, &problem, self.round_bit());
        let mut netlist = Netlist::new();
        let mut heap = EvalBitHeap::new(lsb, msb)?;
        let report = self.realize(problem, solution, &mut netlist, &mut heap)?;
        Ok(EvalMultiplier {
            multiplier: self.clone(),
            report,
            netlist,
            heap,
        })
    }
}
