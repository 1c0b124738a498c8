use indexmap::IndexMap;
use rand::{rngs::StdRng, SeedableRng};
use tracing::debug;

use super::{expression::Value, EvalError, EvalResult};

/// Name bound to the sample index in every namespace.
pub const SAMPLE: &str = "sample";

/// Evaluation scope for one configuration resolution.
///
/// Holds the values resolved so far, in resolution order, and the random
/// source the sampling functions draw from. The random source is seeded from
/// the sample index, so resolving the same document for the same sample
/// always produces the same values.
#[derive(Debug, Clone)]
pub struct Namespace {
    bindings: IndexMap<String, Value>,
    rng: StdRng,
}

impl Namespace {
    pub fn new(sample: u64) -> Self {
        let mut bindings = IndexMap::new();
        bindings.insert(SAMPLE.to_string(), Value::Integer(sample as i64));
        Self {
            bindings,
            rng: StdRng::seed_from_u64(sample),
        }
    }

    /// Looks up a binding, falling back to the named constants.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.get(name) {
            return Some(*value);
        }
        match name {
            "pi" => Some(Value::Float(std::f64::consts::PI)),
            "e" => Some(Value::Float(std::f64::consts::E)),
            "inf" => Some(Value::Float(f64::INFINITY)),
            "nan" => Some(Value::Float(f64::NAN)),
            _ => None,
        }
    }

    pub fn lookup(&self, name: &str) -> EvalResult<Value> {
        self.get(name)
            .ok_or_else(|| EvalError::UndefinedName(name.to_string()))
    }

    /// Binds `name`, replacing an earlier binding in place.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        debug!("bind {} = {}", name, value);
        self.bindings.insert(name, value);
    }

    pub fn bindings(&self) -> &IndexMap<String, Value> {
        &self.bindings
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
