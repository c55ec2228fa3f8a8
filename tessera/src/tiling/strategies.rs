use std::{collections::BTreeMap, fmt, time::Duration};

use crate::{
    milp::SolveLimits,
    tiling::{BeamTiling, CsvReplay, GreedyTiling, IlpCompressionTiling, IlpTiling, TilingStrategy},
    Error,
};

/// Parameters of every registered strategy, each one reads what it needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyConfig {
    pub beam_width: usize,
    pub beam_range: usize,
    pub timeout: Option<Duration>,
    pub node_limit: Option<u64>,
    pub max_retries: usize,
    pub optimal_truncation: bool,
    pub max_stages: Option<usize>,
    /// The record the `csv` strategy replays
    pub replay: Option<String>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            beam_width: 4,
            beam_range: 0,
            timeout: Some(Duration::from_secs(30)),
            node_limit: None,
            max_retries: 3,
            optimal_truncation: false,
            max_stages: None,
            replay: None,
        }
    }
}

impl StrategyConfig {
    pub fn with_beam(mut self, beam_width: usize, beam_range: usize) -> Self {
        self.beam_width = beam_width;
        self.beam_range = beam_range;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_node_limit(mut self, node_limit: Option<u64>) -> Self {
        self.node_limit = node_limit;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_optimal_truncation(mut self, optimal_truncation: bool) -> Self {
        self.optimal_truncation = optimal_truncation;
        self
    }

    pub fn with_max_stages(mut self, max_stages: Option<usize>) -> Self {
        self.max_stages = max_stages;
        self
    }

    pub fn with_replay(mut self, replay: Option<String>) -> Self {
        self.replay = replay;
        self
    }

    pub fn limits(&self) -> SolveLimits {
        SolveLimits::default()
            .with_timeout(self.timeout)
            .with_node_limit(self.node_limit)
    }

    fn ilp(&self) -> IlpTiling {
        IlpTiling::new(self.limits())
            .with_max_retries(self.max_retries)
            .with_optimal_truncation(self.optimal_truncation)
    }
}

pub type StrategyConstructor =
    fn(&StrategyConfig) -> Result<Box<dyn TilingStrategy + Send>, Error>;

/// Named strategy constructors
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    constructors: BTreeMap<String, StrategyConstructor>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `greedy`, `beam`, `ilp`, `ilp-compression` and `csv`
    pub fn with_defaults() -> Self {
        let mut res = Self::new();
        res.register("greedy", |_| Ok(Box::new(GreedyTiling::new())));
        res.register("beam", |config| {
            Ok(Box::new(BeamTiling::new(config.beam_width, config.beam_range)))
        });
        res.register("ilp", |config| Ok(Box::new(config.ilp())));
        res.register("ilp-compression", |config| {
            Ok(Box::new(IlpCompressionTiling::new(
                config.ilp(),
                config.max_stages,
            )))
        });
        res.register("csv", |config| match config.replay.as_ref() {
            Some(record) => Ok(Box::new(CsvReplay::new(record.clone()))),
            None => Err(Error::Replay {
                line: 0,
                msg: "the csv strategy needs a replay record".to_owned(),
            }),
        });
        res
    }

    /// Registers `constructor` under `name`, replacing any previous entry
    pub fn register<S: Into<String>>(&mut self, name: S, constructor: StrategyConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn create(
        &self,
        name: &str,
        config: &StrategyConfig,
    ) -> Result<Box<dyn TilingStrategy + Send>, Error> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| Error::UnknownStrategy(name.to_owned()))?;
        constructor(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry() {
        let registry = StrategyRegistry::with_defaults();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, ["beam", "csv", "greedy", "ilp", "ilp-compression"]);
        let config = StrategyConfig::default();
        for name in ["beam", "greedy", "ilp", "ilp-compression"] {
            assert_eq!(registry.create(name, &config).unwrap().name(), name);
        }
        assert!(matches!(
            registry.create("csv", &config),
            Err(Error::Replay { .. })
        ));
        let config = config.with_replay(Some("0,0,0;".to_owned()));
        assert_eq!(registry.create("csv", &config).unwrap().name(), "csv");
        assert!(matches!(
            registry.create("annealing", &config),
            Err(Error::UnknownStrategy(_))
        ));
    }
}
