use indexmap::IndexMap;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::warn;

use super::{
    compartment::{linspace, CouplingTable},
    reproduction::ReproductionColumns,
    Model, ModelError, ModelResult, ModelState, Trajectory,
};
use crate::eval::Value;

/// A named model output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Observable {
    pub name: &'static str,
    pub descr: &'static str,
}

/// Rate parameters shared by the built-in models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rates {
    /// contact rate
    pub c: f64,
    /// transmission probability
    pub beta: f64,
    /// incubation rate
    pub alpha: f64,
    /// recovery rate
    pub gamma: f64,
    /// testing rate
    pub theta: f64,
    /// isolation exit rate
    pub kappa: f64,
    /// tracing success probability
    pub eta: f64,
    /// tracing rate
    pub chi: f64,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            c: 13.0,
            beta: 0.033,
            alpha: 0.2,
            gamma: 0.1429,
            theta: 0.0714,
            kappa: 0.0714,
            eta: 0.5,
            chi: 0.25,
        }
    }
}

impl Rates {
    fn slot(&mut self, name: &str) -> Option<&mut f64> {
        match name {
            "c" => Some(&mut self.c),
            "beta" => Some(&mut self.beta),
            "alpha" => Some(&mut self.alpha),
            "gamma" => Some(&mut self.gamma),
            "theta" => Some(&mut self.theta),
            "kappa" => Some(&mut self.kappa),
            "eta" => Some(&mut self.eta),
            "chi" => Some(&mut self.chi),
            _ => None,
        }
    }

    /// Sets a rate by name, returning false for names that are not rates.
    pub fn set(&mut self, name: &str, value: f64) -> bool {
        match self.slot(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrator {
    Ode,
    Stochastic,
}

pub type CouplingRates = fn(&Rates, f64) -> Vec<(&'static str, f64)>;

/// Static description of a compartmental model.
pub struct ModelDefinition {
    pub name: &'static str,
    pub observables: &'static [Observable],
    /// Coupling notation and rate for population size `N`.
    pub couplings: CouplingRates,
    pub integrator: Integrator,
    pub population: &'static [&'static str],
    pub susceptible: &'static [&'static str],
    pub active_infectious: &'static [&'static str],
    pub infectious: &'static [&'static str],
}

/// A [`Model`] driven by a [`ModelDefinition`].
#[derive(Clone)]
pub struct CompartmentalModel {
    definition: &'static ModelDefinition,
    rates: Rates,
}

impl CompartmentalModel {
    pub fn new(definition: &'static ModelDefinition) -> Self {
        Self {
            definition,
            rates: Rates::default(),
        }
    }

    fn state_names(&self) -> Vec<&'static str> {
        self.definition.observables.iter().map(|o| o.name).collect()
    }

    fn columns(&self, names: &[&str]) -> ModelResult<Vec<usize>> {
        names.iter().map(|name| self.column_index(name)).collect()
    }
}

impl Model for CompartmentalModel {
    fn name(&self) -> &str {
        self.definition.name
    }

    fn observables(&self) -> &[Observable] {
        self.definition.observables
    }

    fn rates(&self) -> &Rates {
        &self.rates
    }

    fn set_parameters(&mut self, parameters: &IndexMap<String, Value>) {
        for (name, value) in parameters {
            if !self.rates.set(name, value.as_f64()) {
                warn!(
                    "[{}] unknown parameter provided {} = {}",
                    self.definition.name, name, value
                );
            }
        }
    }

    fn initial_conditions(&self, initial: &IndexMap<String, Value>) -> ModelResult<ModelState> {
        let population = initial
            .get("N")
            .ok_or_else(|| ModelError::MissingInitial("N".to_string()))?
            .as_f64();

        let mut values = vec![0.0; self.definition.observables.len()];
        let mut assigned = 0.0;
        for (name, value) in initial.iter().filter(|(name, _)| name.as_str() != "N") {
            values[self.column_index(name)?] = value.as_f64();
            assigned += value.as_f64();
        }
        values[self.column_index("SU")?] = population - assigned;

        Ok(ModelState { values, population })
    }

    fn run(
        &self,
        t0: f64,
        tmax: f64,
        steps: usize,
        state: &ModelState,
        rng: &mut StdRng,
    ) -> ModelResult<(Trajectory, ModelState)> {
        let times = linspace(t0, tmax, steps);
        let table = CouplingTable::new(
            &self.state_names(),
            &(self.definition.couplings)(&self.rates, state.population),
        )?;

        let rows = match self.definition.integrator {
            Integrator::Ode => table.integrate(&times, &state.values),
            Integrator::Stochastic => table.simulate(&times, &state.values, rng)?,
        };

        let next = match rows.last() {
            Some(last) => ModelState {
                values: last.clone(),
                population: state.population,
            },
            None => state.clone(),
        };
        Ok((Trajectory::new(times, rows), next))
    }

    fn reproduction_columns(&self) -> ModelResult<ReproductionColumns> {
        Ok(ReproductionColumns {
            population: self.columns(self.definition.population)?,
            susceptible: self.columns(self.definition.susceptible)?,
            active_infectious: self.columns(self.definition.active_infectious)?,
            infectious: self.columns(self.definition.infectious)?,
        })
    }
}
