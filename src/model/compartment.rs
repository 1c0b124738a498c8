//! Mass-action compartmental dynamics.
//!
//! A model is a set of named compartments and a table of couplings written
//! in the notation `A*B:C=>D`:
//!
//! - `A*B` are the factors; the flux is `rate * A * B`.
//! - `C` is the compartment the flux is drawn from (may be empty).
//! - `D` is the compartment the flux flows into (may be empty).
//!
//! For example `SU*IU:SU=>EU` moves susceptibles to exposed at a rate
//! proportional to both, while `IU*SU:=>CIS` only accumulates into `CIS`.

use nom::{
    bytes::complete::tag,
    character::complete::{alphanumeric1, char, multispace0},
    combinator::{all_consuming, opt},
    multi::separated_list1,
    sequence::{delimited, tuple},
    IResult,
};
use rand::{rngs::StdRng, Rng};
use rand_distr::{Distribution, Exp};

use super::{ModelError, ModelResult};

/// Upper bound on the RK4 step between two reported times.
const MAX_STEP: f64 = 0.125;

#[derive(Debug, Clone, PartialEq)]
struct CouplingNotation<'a> {
    factors: Vec<&'a str>,
    source: Option<&'a str>,
    target: Option<&'a str>,
}

fn name(input: &str) -> IResult<&str, &str> {
    delimited(multispace0, alphanumeric1, multispace0)(input)
}

fn parse_notation(input: &str) -> IResult<&str, CouplingNotation<'_>> {
    let (rest, (factors, _, source, _, target)) = all_consuming(tuple((
        separated_list1(char('*'), name),
        char(':'),
        opt(name),
        delimited(multispace0, tag("=>"), multispace0),
        opt(name),
    )))(input)?;
    Ok((
        rest,
        CouplingNotation {
            factors,
            source,
            target,
        },
    ))
}

/// A single coupling with compartment names resolved to state indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Coupling {
    pub rate: f64,
    pub factors: Vec<usize>,
    pub source: Option<usize>,
    pub target: Option<usize>,
}

impl Coupling {
    pub fn parse(notation: &str, rate: f64, states: &[&str]) -> ModelResult<Self> {
        let (_, parsed) = parse_notation(notation)
            .map_err(|e| ModelError::InvalidCoupling(format!("{}: {}", notation, e)))?;

        let index = |name: &str| {
            states
                .iter()
                .position(|s| *s == name)
                .ok_or_else(|| ModelError::InvalidCoupling(format!("{}: unknown state {}", notation, name)))
        };

        Ok(Self {
            rate,
            factors: parsed
                .factors
                .into_iter()
                .map(index)
                .collect::<ModelResult<_>>()?,
            source: parsed.source.map(index).transpose()?,
            target: parsed.target.map(index).transpose()?,
        })
    }

    fn flux(&self, y: &[f64]) -> f64 {
        self.rate * self.factors.iter().map(|&i| y[i]).product::<f64>()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CouplingTable {
    states: usize,
    couplings: Vec<Coupling>,
}

impl CouplingTable {
    pub fn new(states: &[&str], entries: &[(&str, f64)]) -> ModelResult<Self> {
        let couplings = entries
            .iter()
            .map(|(notation, rate)| Coupling::parse(notation, *rate, states))
            .collect::<ModelResult<_>>()?;
        Ok(Self {
            states: states.len(),
            couplings,
        })
    }

    pub fn couplings(&self) -> &[Coupling] {
        &self.couplings
    }

    pub fn derivatives(&self, y: &[f64], dy: &mut [f64]) {
        dy.iter_mut().for_each(|d| *d = 0.0);
        for coupling in &self.couplings {
            let flux = coupling.flux(y);
            if let Some(source) = coupling.source {
                dy[source] -= flux;
            }
            if let Some(target) = coupling.target {
                dy[target] += flux;
            }
        }
    }

    fn rk4_step(&self, y: &mut [f64], h: f64) {
        let n = self.states;
        let mut k1 = vec![0.0; n];
        let mut k2 = vec![0.0; n];
        let mut k3 = vec![0.0; n];
        let mut k4 = vec![0.0; n];
        let mut tmp = vec![0.0; n];

        self.derivatives(y, &mut k1);
        for i in 0..n {
            tmp[i] = y[i] + 0.5 * h * k1[i];
        }
        self.derivatives(&tmp, &mut k2);
        for i in 0..n {
            tmp[i] = y[i] + 0.5 * h * k2[i];
        }
        self.derivatives(&tmp, &mut k3);
        for i in 0..n {
            tmp[i] = y[i] + h * k3[i];
        }
        self.derivatives(&tmp, &mut k4);
        for i in 0..n {
            y[i] += h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
    }

    /// Integrates the mean-field equations, reporting the state at each of
    /// `times`. The first row is `y0` itself.
    pub fn integrate(&self, times: &[f64], y0: &[f64]) -> Vec<Vec<f64>> {
        let mut rows = Vec::with_capacity(times.len());
        let mut y = y0.to_vec();
        let mut previous = match times.first() {
            Some(t) => *t,
            None => return rows,
        };
        for &t in times {
            let span = t - previous;
            if span > 0.0 {
                let substeps = (span / MAX_STEP).ceil().max(1.0) as usize;
                let h = span / substeps as f64;
                for _ in 0..substeps {
                    self.rk4_step(&mut y, h);
                }
            }
            rows.push(y.clone());
            previous = t;
        }
        rows
    }

    /// Gillespie stochastic simulation, one individual per event.
    ///
    /// A coupling whose source compartment is empty cannot fire.
    pub fn simulate(&self, times: &[f64], y0: &[f64], rng: &mut StdRng) -> ModelResult<Vec<Vec<f64>>> {
        let mut rows = Vec::with_capacity(times.len());
        let mut y = y0.to_vec();
        let mut t = match times.first() {
            Some(t) => *t,
            None => return Ok(rows),
        };
        let mut propensities = vec![0.0; self.couplings.len()];

        for &until in times {
            loop {
                for (a, coupling) in propensities.iter_mut().zip(&self.couplings) {
                    let depleted = coupling.source.map_or(false, |s| y[s] < 1.0);
                    *a = if depleted { 0.0 } else { coupling.flux(&y).max(0.0) };
                }
                let total: f64 = propensities.iter().sum();
                if total <= 0.0 {
                    break;
                }
                let wait = Exp::new(total)
                    .map_err(|e| ModelError::Integration(e.to_string()))?
                    .sample(rng);
                if t + wait > until {
                    break;
                }
                t += wait;

                let mut pick = rng.gen::<f64>() * total;
                let fired = propensities
                    .iter()
                    .position(|a| {
                        pick -= a;
                        pick < 0.0
                    })
                    .unwrap_or(propensities.len() - 1);
                let coupling = &self.couplings[fired];
                if let Some(source) = coupling.source {
                    y[source] -= 1.0;
                }
                if let Some(target) = coupling.target {
                    y[target] += 1.0;
                }
            }
            t = t.max(until);
            rows.push(y.clone());
        }
        Ok(rows)
    }
}

/// `count` evenly spaced points from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count)
                .map(|i| {
                    if i == count - 1 {
                        stop
                    } else {
                        start + step * i as f64
                    }
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const SIR: [&str; 3] = ["S", "I", "R"];

    #[test]
    fn test_parse_notation() {
        let coupling = Coupling::parse("S*I:S=>I", 0.5, &SIR).unwrap();
        assert_eq!(
            coupling,
            Coupling {
                rate: 0.5,
                factors: vec![0, 1],
                source: Some(0),
                target: Some(1),
            }
        );

        let produce = Coupling::parse("I*S:=>R", 1.0, &SIR).unwrap();
        assert_eq!(produce.source, None);
        assert_eq!(produce.target, Some(2));

        let consume = Coupling::parse("R:R=>", 1.0, &SIR).unwrap();
        assert_eq!(consume.source, Some(2));
        assert_eq!(consume.target, None);
    }

    #[test]
    fn test_parse_rejects_bad_notation() {
        assert!(matches!(
            Coupling::parse("S*X:S=>I", 1.0, &SIR),
            Err(ModelError::InvalidCoupling(_))
        ));
        assert!(Coupling::parse("S*I S=>I", 1.0, &SIR).is_err());
        assert!(Coupling::parse("S:S=>I extra", 1.0, &SIR).is_err());
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 9.0, 1), vec![3.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_integrate_exponential_decay() {
        let table = CouplingTable::new(&SIR, &[("I:I=>R", 0.5)]).unwrap();
        let times = linspace(0.0, 2.0, 3);
        let rows = table.integrate(&times, &[0.0, 100.0, 0.0]);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec![0.0, 100.0, 0.0]);
        let expected = 100.0 * (-1.0f64).exp();
        assert!((rows[2][1] - expected).abs() < 1e-6);
        // transfers conserve the total
        assert!((rows[2][1] + rows[2][2] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_simulate_conserves_population() {
        let table = CouplingTable::new(&SIR, &[("S*I:S=>I", 0.003), ("I:I=>R", 0.1)]).unwrap();
        let times = linspace(0.0, 50.0, 51);
        let mut rng = StdRng::seed_from_u64(1);
        let rows = table.simulate(&times, &[990.0, 10.0, 0.0], &mut rng).unwrap();

        assert_eq!(rows.len(), 51);
        for row in &rows {
            assert_eq!(row.iter().sum::<f64>(), 1000.0);
            assert!(row.iter().all(|v| *v >= 0.0 && v.fract() == 0.0));
        }
    }

    #[test]
    fn test_simulate_is_reproducible() {
        let table = CouplingTable::new(&SIR, &[("S*I:S=>I", 0.003), ("I:I=>R", 0.1)]).unwrap();
        let times = linspace(0.0, 20.0, 21);
        let run = |seed| {
            table
                .simulate(&times, &[990.0, 10.0, 0.0], &mut StdRng::seed_from_u64(seed))
                .unwrap()
        };
        assert_eq!(run(7), run(7));
    }
}
