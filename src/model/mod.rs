//! # Models
//!
//! The simulation collaborator: given a resolved configuration, produce a
//! time vector and a trajectory matrix.
//!
//! Models are looked up by identifier in a [`ModelRegistry`] and driven by
//! [`run_model`], which runs them piecewise between intervention times. The
//! scheduling layer only sees the [`SampleEvaluator`] seam.

pub mod compartment;
pub mod definition;
pub mod reproduction;
pub mod seir;
pub mod seirct;

use std::sync::Arc;

use indexmap::IndexMap;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ResolvedConfig;
use crate::eval::Value;
use crate::sample::Sample;

pub use definition::{Observable, Rates};
use reproduction::{reproduction_series, ReproductionColumns};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("[{model}] no such column: {name}")]
    UnknownColumn { model: String, name: String },
    #[error("Missing initial condition: {0}")]
    MissingInitial(String),
    #[error("Invalid coupling {0}")]
    InvalidCoupling(String),
    #[error("Integration failed: {0}")]
    Integration(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Model state carried from one simulation segment to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub values: Vec<f64>,
    pub population: f64,
}

/// A time vector and one row of values per time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub time: Vec<f64>,
    pub rows: Vec<Vec<f64>>,
}

impl Trajectory {
    pub fn new(time: Vec<f64>, rows: Vec<Vec<f64>>) -> Self {
        Self { time, rows }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Number of value columns, not counting time.
    pub fn columns(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// True when there is one row per time and every row has the same width.
    pub fn is_rectangular(&self) -> bool {
        let width = self.columns();
        self.rows.len() == self.time.len() && self.rows.iter().all(|r| r.len() == width)
    }

    pub fn extend(&mut self, other: Trajectory) {
        self.time.extend(other.time);
        self.rows.extend(other.rows);
    }

    pub fn push_column(&mut self, values: &[f64]) {
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(*value);
        }
    }
}

pub trait Model: Send + Sync {
    fn name(&self) -> &str;

    /// Output columns, in trajectory order.
    fn observables(&self) -> &[Observable];

    fn rates(&self) -> &Rates;

    /// Applies known parameters. Unknown names are logged and ignored.
    fn set_parameters(&mut self, parameters: &IndexMap<String, Value>);

    /// Builds the starting state. `N` is the population; every other entry
    /// names a compartment, and `SU` receives whatever `N` leaves over.
    fn initial_conditions(&self, initial: &IndexMap<String, Value>) -> ModelResult<ModelState>;

    /// Simulates from `t0` to `tmax`, reporting `steps` evenly spaced times
    /// including both ends, and returns the state at the last reported time.
    fn run(
        &self,
        t0: f64,
        tmax: f64,
        steps: usize,
        state: &ModelState,
        rng: &mut StdRng,
    ) -> ModelResult<(Trajectory, ModelState)>;

    fn reproduction_columns(&self) -> ModelResult<ReproductionColumns>;

    fn column_index(&self, name: &str) -> ModelResult<usize> {
        self.observables()
            .iter()
            .position(|o| o.name == name)
            .ok_or_else(|| ModelError::UnknownColumn {
                model: self.name().to_string(),
                name: name.to_string(),
            })
    }
}

pub type ModelFactory = fn() -> Box<dyn Model>;

/// Name to factory lookup for models.
#[derive(Clone)]
pub struct ModelRegistry {
    factories: IndexMap<String, ModelFactory>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(seirct::SEIRCT_ODE_MEM, seirct::seirct_ode_mem);
        registry.register(seir::SEIR_ODE, seir::seir_ode);
        registry.register(seir::SEIR_SSA, seir::seir_ssa);
        registry
    }

    pub fn register(&mut self, id: impl Into<String>, factory: ModelFactory) {
        self.factories.insert(id.into(), factory);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create(&self, id: &str) -> ModelResult<Box<dyn Model>> {
        self.factories
            .get(id)
            .map(|factory| factory())
            .ok_or_else(|| ModelError::UnknownModel(id.to_string()))
    }
}

fn run_segment(
    model: &dyn Model,
    (from, to, steps): (f64, f64, usize),
    state: &mut ModelState,
    rng: &mut StdRng,
    trajectory: &mut Trajectory,
    series: &mut Option<(Vec<f64>, Vec<f64>)>,
) -> ModelResult<()> {
    info!("Running from {} to {} in {} steps", from, to, steps);
    let (segment, next) = model.run(from, to, steps, state, rng)?;
    if let Some((betas, cs)) = series {
        let rates = model.rates();
        betas.extend(std::iter::repeat(rates.beta).take(segment.len()));
        cs.extend(std::iter::repeat(rates.c).take(segment.len()));
    }
    trajectory.extend(segment);
    *state = next;
    Ok(())
}

/// Runs `model` for one resolved configuration.
///
/// The run is split at each intervention time. Every segment receives a
/// share of `meta.steps` proportional to its length, and the intervention's
/// parameters take effect once the segment before it has finished. When
/// `meta.rseries` is set, R(t) is appended as the last column.
pub fn run_model(model: &mut dyn Model, config: &ResolvedConfig) -> ModelResult<Trajectory> {
    let meta = &config.meta;
    let mut rng = StdRng::seed_from_u64(meta.seed);

    model.set_parameters(&config.parameters);
    let mut state = model.initial_conditions(&config.initial)?;

    info!("Running model: {}", model.name());
    info!("Random seed: {}", meta.seed);
    debug!("Parameters: {:?}", config.parameters);
    debug!("Initial conditions: {:?}", config.initial);
    info!("Interventions: {}", config.interventions.len());

    let span = meta.tmax - meta.t0;
    let steps = meta.steps as f64;
    let mut trajectory = Trajectory::default();
    let mut series = meta.rseries.then(|| (Vec::new(), Vec::new()));

    let mut start = meta.t0;
    for intervention in &config.interventions {
        let end = meta.tmax.min(intervention.time);
        let segment_steps = ((end - start) * steps / span).floor().max(0.0);
        // align the segment end to a whole number of steps
        let end = start + segment_steps * span / steps;

        run_segment(
            model,
            (start, end, segment_steps as usize),
            &mut state,
            &mut rng,
            &mut trajectory,
            &mut series,
        )?;

        info!("Intervention at {}: {:?}", intervention.time, intervention.parameters);
        model.set_parameters(&intervention.parameters);
        start = intervention.time;

        if end >= meta.tmax {
            break;
        }
    }

    if start < meta.tmax {
        let segment_steps = ((meta.tmax - start) * steps / span).max(0.0) as usize;
        run_segment(
            model,
            (start, meta.tmax, segment_steps),
            &mut state,
            &mut rng,
            &mut trajectory,
            &mut series,
        )?;
    }

    if let Some((betas, cs)) = series {
        let rs = reproduction_series(
            &trajectory.time,
            &trajectory.rows,
            &betas,
            &cs,
            model.rates().gamma,
            &model.reproduction_columns()?,
        );
        trajectory.push_column(&rs);
    }

    Ok(trajectory)
}

/// Turns one sample into its trajectory.
pub trait SampleEvaluator: Send + Sync {
    fn evaluate(&self, sample: &Sample) -> ModelResult<Trajectory>;
}

impl<F> SampleEvaluator for F
where
    F: Fn(&Sample) -> ModelResult<Trajectory> + Send + Sync,
{
    fn evaluate(&self, sample: &Sample) -> ModelResult<Trajectory> {
        self(sample)
    }
}

/// Evaluates samples with models from a registry.
#[derive(Clone)]
pub struct ModelRunner {
    registry: Arc<ModelRegistry>,
}

impl ModelRunner {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }
}

impl SampleEvaluator for ModelRunner {
    #[tracing::instrument(level = "debug", skip(self, sample), fields(index = sample.index))]
    fn evaluate(&self, sample: &Sample) -> ModelResult<Trajectory> {
        let mut model = self.registry.create(&sample.config.meta.model)?;
        run_model(model.as_mut(), &sample.config)
    }
}
