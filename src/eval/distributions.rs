//! Random sampling functions callable from parameter expressions.
//!
//! Names and positional arguments follow numpy's `numpy.random` module so
//! existing configuration files keep working, e.g. `normal(loc, scale)`,
//! `gamma(shape, scale)`, `randint(low, high)`. Only scalar draws are
//! supported; the `size` argument and vector-valued distributions are not.

use std::collections::HashMap;

use lazy_static::lazy_static;
use rand::{rngs::StdRng, Rng};
use rand_distr::{
    Beta, Binomial, Cauchy, ChiSquared, Distribution, Exp, Exp1, Gamma, Geometric, Gumbel,
    Hypergeometric, InverseGaussian, LogNormal, Normal, Pareto, Poisson, StandardNormal,
    StudentT, Triangular, Weibull, Zeta,
};

use super::{expression::Value, EvalError, EvalResult};

pub type Sampler = fn(&Args, &mut StdRng) -> EvalResult<Value>;

/// Evaluated call arguments with numpy-style defaults.
pub struct Args<'a> {
    function: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(function: &'a str, values: &'a [Value]) -> Self {
        Self { function, values }
    }

    fn expect(&self, min: usize, max: usize) -> EvalResult<()> {
        let found = self.values.len();
        if found < min || found > max {
            return Err(EvalError::Arity {
                function: self.function.to_string(),
                expected: if min == max {
                    min.to_string()
                } else {
                    format!("{} to {}", min, max)
                },
                found,
            });
        }
        Ok(())
    }

    fn float(&self, index: usize, default: f64) -> f64 {
        self.values
            .get(index)
            .map(Value::as_f64)
            .unwrap_or(default)
    }

    fn required(&self, index: usize) -> EvalResult<f64> {
        self.values
            .get(index)
            .map(Value::as_f64)
            .ok_or_else(|| self.invalid(format!("missing argument {}", index + 1)))
    }

    fn count(&self, index: usize) -> EvalResult<u64> {
        match self.values.get(index) {
            Some(Value::Integer(i)) if *i >= 0 => Ok(*i as u64),
            Some(Value::Float(x)) if *x >= 0.0 && x.fract() == 0.0 && in_i64_range(*x) => {
                Ok(*x as u64)
            }
            Some(other) => Err(self.invalid(format!(
                "argument {} must be a non-negative integer, got {}",
                index + 1,
                other
            ))),
            None => Err(self.invalid(format!("missing argument {}", index + 1))),
        }
    }

    fn integer(&self, index: usize) -> EvalResult<i64> {
        match self.values.get(index) {
            Some(Value::Integer(i)) => Ok(*i),
            Some(Value::Float(x)) if x.fract() == 0.0 && in_i64_range(*x) => Ok(*x as i64),
            Some(other) => Err(self.invalid(format!(
                "argument {} must be an integer, got {}",
                index + 1,
                other
            ))),
            None => Err(self.invalid(format!("missing argument {}", index + 1))),
        }
    }

    /// Converts an integer-valued draw, rejecting draws past `i64::MAX`
    /// instead of saturating.
    fn count_value(&self, x: u64) -> EvalResult<Value> {
        i64::try_from(x)
            .map(Value::Integer)
            .map_err(|_| self.invalid("draw exceeds the integer range"))
    }

    fn whole_value(&self, x: f64) -> EvalResult<Value> {
        if in_i64_range(x) {
            Ok(Value::Integer(x as i64))
        } else {
            Err(self.invalid("draw exceeds the integer range"))
        }
    }

    fn invalid(&self, message: impl Into<String>) -> EvalError {
        EvalError::InvalidArgument {
            function: self.function.to_string(),
            message: message.into(),
        }
    }
}

fn draw<D, E>(args: &Args, rng: &mut StdRng, distribution: Result<D, E>) -> EvalResult<f64>
where
    D: Distribution<f64>,
    E: std::fmt::Display,
{
    distribution
        .map(|d| d.sample(rng))
        .map_err(|e| args.invalid(e.to_string()))
}

/// Uniform draw from the open interval (0, 1).
fn open_unit(rng: &mut StdRng) -> f64 {
    loop {
        let u: f64 = rng.gen();
        if u > 0.0 {
            return u;
        }
    }
}

fn beta(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(2, 2)?;
    let d = Beta::new(args.required(0)?, args.required(1)?);
    draw(args, rng, d).map(Value::Float)
}

fn binomial(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(2, 2)?;
    let d = Binomial::new(args.count(0)?, args.required(1)?)
        .map_err(|e| args.invalid(e.to_string()))?;
    args.count_value(d.sample(rng))
}

fn chisquare(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(1, 1)?;
    draw(args, rng, ChiSquared::new(args.required(0)?)).map(Value::Float)
}

fn exponential(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(0, 1)?;
    let scale = args.float(0, 1.0);
    if scale < 0.0 {
        return Err(args.invalid("scale < 0"));
    }
    if scale == 0.0 {
        return Ok(Value::Float(0.0));
    }
    draw(args, rng, Exp::new(1.0 / scale)).map(Value::Float)
}

fn gamma(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(1, 2)?;
    draw(args, rng, Gamma::new(args.required(0)?, args.float(1, 1.0))).map(Value::Float)
}

fn geometric(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(1, 1)?;
    // numpy counts trials up to and including the first success
    let d = Geometric::new(args.required(0)?).map_err(|e| args.invalid(e.to_string()))?;
    let trials = d
        .sample(rng)
        .checked_add(1)
        .ok_or_else(|| args.invalid("draw exceeds the integer range"))?;
    args.count_value(trials)
}

fn gumbel(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(0, 2)?;
    draw(args, rng, Gumbel::new(args.float(0, 0.0), args.float(1, 1.0))).map(Value::Float)
}

fn hypergeometric(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(3, 3)?;
    let (ngood, nbad, nsample) = (args.count(0)?, args.count(1)?, args.count(2)?);
    let d = Hypergeometric::new(ngood + nbad, ngood, nsample)
        .map_err(|e| args.invalid(e.to_string()))?;
    args.count_value(d.sample(rng))
}

fn laplace(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(0, 2)?;
    let (loc, scale) = (args.float(0, 0.0), args.float(1, 1.0));
    if scale < 0.0 {
        return Err(args.invalid("scale < 0"));
    }
    let u = open_unit(rng) - 0.5;
    Ok(Value::Float(
        loc - scale * u.signum() * (1.0 - 2.0 * u.abs()).ln(),
    ))
}

fn logistic(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(0, 2)?;
    let (loc, scale) = (args.float(0, 0.0), args.float(1, 1.0));
    if scale < 0.0 {
        return Err(args.invalid("scale < 0"));
    }
    let u = open_unit(rng);
    Ok(Value::Float(loc + scale * (u / (1.0 - u)).ln()))
}

fn lognormal(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(0, 2)?;
    draw(args, rng, LogNormal::new(args.float(0, 0.0), args.float(1, 1.0))).map(Value::Float)
}

fn negative_binomial(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(2, 2)?;
    let (n, p) = (args.required(0)?, args.required(1)?);
    if n <= 0.0 || p <= 0.0 || p > 1.0 {
        return Err(args.invalid("requires n > 0 and 0 < p <= 1"));
    }
    if p == 1.0 {
        return Ok(Value::Integer(0));
    }
    // gamma-poisson mixture
    let lambda = draw(args, rng, Gamma::new(n, (1.0 - p) / p))?;
    poisson_draw(args, rng, lambda)
}

fn normal(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(0, 2)?;
    draw(args, rng, Normal::new(args.float(0, 0.0), args.float(1, 1.0))).map(Value::Float)
}

fn pareto(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(1, 1)?;
    // numpy draws from the Lomax form, shifted to start at zero
    draw(args, rng, Pareto::new(1.0, args.required(0)?)).map(|x| Value::Float(x - 1.0))
}

fn poisson_draw(args: &Args, rng: &mut StdRng, lambda: f64) -> EvalResult<Value> {
    if lambda < 0.0 || lambda.is_nan() {
        return Err(args.invalid("lam < 0"));
    }
    if lambda == 0.0 {
        return Ok(Value::Integer(0));
    }
    draw(args, rng, Poisson::new(lambda)).and_then(|x| args.whole_value(x))
}

fn poisson(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(0, 1)?;
    poisson_draw(args, rng, args.float(0, 1.0))
}

fn power(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(1, 1)?;
    let a = args.required(0)?;
    if a <= 0.0 {
        return Err(args.invalid("a <= 0"));
    }
    let u: f64 = rng.gen();
    Ok(Value::Float(u.powf(1.0 / a)))
}

fn random_sample(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(0, 0)?;
    Ok(Value::Float(rng.gen()))
}

fn randint(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(1, 2)?;
    let (low, high) = match args.values.len() {
        1 => (0, args.integer(0)?),
        _ => (args.integer(0)?, args.integer(1)?),
    };
    if low >= high {
        return Err(args.invalid("low >= high"));
    }
    Ok(Value::Integer(rng.gen_range(low..high)))
}

fn standard_normal(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(0, 0)?;
    Ok(Value::Float(rng.sample(StandardNormal)))
}

fn rayleigh(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(0, 1)?;
    let scale = args.float(0, 1.0);
    if scale < 0.0 {
        return Err(args.invalid("scale < 0"));
    }
    let u = open_unit(rng);
    Ok(Value::Float(scale * (-2.0 * u.ln()).sqrt()))
}

fn standard_cauchy(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(0, 0)?;
    draw(args, rng, Cauchy::new(0.0, 1.0)).map(Value::Float)
}

fn standard_exponential(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(0, 0)?;
    Ok(Value::Float(rng.sample(Exp1)))
}

fn standard_gamma(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(1, 1)?;
    draw(args, rng, Gamma::new(args.required(0)?, 1.0)).map(Value::Float)
}

fn standard_t(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(1, 1)?;
    draw(args, rng, StudentT::new(args.required(0)?)).map(Value::Float)
}

fn triangular(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(3, 3)?;
    let (left, mode, right) = (args.required(0)?, args.required(1)?, args.required(2)?);
    draw(args, rng, Triangular::new(left, right, mode)).map(Value::Float)
}

fn uniform(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(0, 2)?;
    let (low, high) = (args.float(0, 0.0), args.float(1, 1.0));
    let u: f64 = rng.gen();
    Ok(Value::Float(low + (high - low) * u))
}

fn wald(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(2, 2)?;
    draw(
        args,
        rng,
        InverseGaussian::new(args.required(0)?, args.required(1)?),
    )
    .map(Value::Float)
}

fn weibull(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(1, 1)?;
    let a = args.required(0)?;
    if a < 0.0 {
        return Err(args.invalid("a < 0"));
    }
    if a == 0.0 {
        return Ok(Value::Float(0.0));
    }
    draw(args, rng, Weibull::new(1.0, a)).map(Value::Float)
}

fn zipf(args: &Args, rng: &mut StdRng) -> EvalResult<Value> {
    args.expect(1, 1)?;
    draw(args, rng, Zeta::new(args.required(0)?)).and_then(|x| args.whole_value(x))
}

/// True when `x` converts to `i64` without saturating. `i64::MAX as f64`
/// rounds up to 2^63, which is already out of range.
fn in_i64_range(x: f64) -> bool {
    x.is_finite() && x >= i64::MIN as f64 && x < i64::MAX as f64
}

lazy_static! {
    static ref CATALOGUE: HashMap<&'static str, Sampler> = {
        let entries: [(&'static str, Sampler); 31] = [
            ("beta", beta),
            ("binomial", binomial),
            ("chisquare", chisquare),
            ("exponential", exponential),
            ("gamma", gamma),
            ("geometric", geometric),
            ("gumbel", gumbel),
            ("hypergeometric", hypergeometric),
            ("laplace", laplace),
            ("logistic", logistic),
            ("lognormal", lognormal),
            ("negative_binomial", negative_binomial),
            ("normal", normal),
            ("pareto", pareto),
            ("poisson", poisson),
            ("power", power),
            ("rand", random_sample),
            ("randint", randint),
            ("randn", standard_normal),
            ("random_sample", random_sample),
            ("rayleigh", rayleigh),
            ("standard_cauchy", standard_cauchy),
            ("standard_exponential", standard_exponential),
            ("standard_gamma", standard_gamma),
            ("standard_normal", standard_normal),
            ("standard_t", standard_t),
            ("triangular", triangular),
            ("uniform", uniform),
            ("wald", wald),
            ("weibull", weibull),
            ("zipf", zipf),
        ];
        entries.into_iter().collect()
    };
}

pub fn lookup(name: &str) -> Option<Sampler> {
    CATALOGUE.get(name).copied()
}

/// Names of every sampling function, sorted.
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = CATALOGUE.keys().copied().collect();
    names.sort_unstable();
    names
}
