//! SEIR with testing, contact tracing and isolation.
//!
//! The `CIS` and `CIR` compartments remember traceable contacts of the
//! unconfined infectious, split by whether the contact was susceptible or
//! already removed. Tracing moves individuals from the unconfined (`U`) to
//! the distanced (`D`) compartments.

use super::definition::{CompartmentalModel, Integrator, ModelDefinition, Observable, Rates};
use super::Model;

pub const SEIRCT_ODE_MEM: &str = "SEIRCTODEMem";

const OBSERVABLES: &[Observable] = &[
    Observable { name: "SU", descr: "susceptible and unconfined" },
    Observable { name: "SD", descr: "susceptible and distanced" },
    Observable { name: "EU", descr: "exposed and unconfined" },
    Observable { name: "ED", descr: "exposed and distanced" },
    Observable { name: "IU", descr: "infectious and unconfined" },
    Observable { name: "ID", descr: "infectious and distanced" },
    Observable { name: "RU", descr: "removed and unconfined" },
    Observable { name: "RD", descr: "removed and distanced" },
    Observable { name: "CIS", descr: "traceable and susceptible" },
    Observable { name: "CIR", descr: "traceable and removed" },
];

fn couplings(r: &Rates, n: f64) -> Vec<(&'static str, f64)> {
    let traced = r.theta * r.eta * r.chi;
    vec![
        ("SU*IU:SU=>EU", r.beta * r.c / n),
        ("SD:SD=>SU", r.kappa),
        ("EU:EU=>IU", r.alpha),
        ("ED:ED=>ID", r.alpha),
        ("IU:IU=>RU", r.gamma),
        ("ID:ID=>RD", r.gamma),
        ("RD:RD=>RU", r.kappa),
        ("EU:EU=>ED", traced),
        ("IU:IU=>ID", r.theta * (1.0 + r.eta * r.chi)),
        // contact memory
        ("IU*SU:=>CIS", r.c * (1.0 - r.beta) / n),
        ("IU*CIS:CIS=>", r.c * r.beta / n),
        ("CIS:CIS=>", r.gamma + traced),
        ("IU*RU:=>CIR", r.c / n),
        ("IU:=>CIR", r.gamma),
        ("CIR:CIR=>", r.gamma + traced),
        ("CIS:SU=>SD", traced),
        ("CIR:RU=>RD", traced),
    ]
}

static ODE_MEM: ModelDefinition = ModelDefinition {
    name: "SEIR-CT ODE",
    observables: OBSERVABLES,
    couplings,
    integrator: Integrator::Ode,
    population: &["SU", "SD", "EU", "ED", "IU", "ID", "RU", "RD"],
    susceptible: &["SU"],
    active_infectious: &["IU"],
    infectious: &["IU", "ID"],
};

pub fn seirct_ode_mem() -> Box<dyn Model> {
    Box::new(CompartmentalModel::new(&ODE_MEM))
}
