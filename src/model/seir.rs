//! Four-compartment SEIR models.

use super::definition::{CompartmentalModel, Integrator, ModelDefinition, Observable, Rates};
use super::Model;

pub const SEIR_ODE: &str = "SEIRODE";
pub const SEIR_SSA: &str = "SEIRSSA";

const OBSERVABLES: &[Observable] = &[
    Observable {
        name: "SU",
        descr: "susceptible and unconfined",
    },
    Observable {
        name: "EU",
        descr: "exposed and unconfined",
    },
    Observable {
        name: "IU",
        descr: "infectious and unconfined",
    },
    Observable {
        name: "RU",
        descr: "removed and unconfined",
    },
];

fn couplings(rates: &Rates, n: f64) -> Vec<(&'static str, f64)> {
    vec![
        ("SU*IU:SU=>EU", rates.beta * rates.c / n),
        ("EU:EU=>IU", rates.alpha),
        ("IU:IU=>RU", rates.gamma),
    ]
}

const ODE_DEFINITION: ModelDefinition = ModelDefinition {
    name: "SEIR ODE",
    observables: OBSERVABLES,
    couplings,
    integrator: Integrator::Ode,
    population: &["SU", "EU", "IU", "RU"],
    susceptible: &["SU"],
    active_infectious: &["IU"],
    infectious: &["IU"],
};

static ODE: ModelDefinition = ODE_DEFINITION;

static SSA: ModelDefinition = ModelDefinition {
    name: "SEIR SSA",
    integrator: Integrator::Stochastic,
    ..ODE_DEFINITION
};

pub fn seir_ode() -> Box<dyn Model> {
    Box::new(CompartmentalModel::new(&ODE))
}

/// Gillespie simulation of the SEIR couplings, drawing from the run seed.
pub fn seir_ssa() -> Box<dyn Model> {
    Box::new(CompartmentalModel::new(&SSA))
}
