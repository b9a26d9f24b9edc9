//! Resource utilization models of cloudlets.

use dyn_clone::{clone_trait_object, DynClone};
use rand::prelude::*;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

/// A utilization model is a function returning the fraction of a resource used by a cloudlet at the given time.
///
/// The CPU model scales the processing demand of a cloudlet, while RAM and bandwidth models are only used for
/// reporting resource usage and cost.
pub trait UtilizationModel: DynClone {
    fn utilization(&self, time: f64) -> f64;
}

clone_trait_object!(UtilizationModel);

/// The cloudlet always uses the whole resource.
#[derive(Clone)]
pub struct UtilizationModelFull;

impl UtilizationModel for UtilizationModelFull {
    fn utilization(&self, _time: f64) -> f64 {
        1.
    }
}

/// The cloudlet does not use the resource.
#[derive(Clone)]
pub struct UtilizationModelNull;

impl UtilizationModel for UtilizationModelNull {
    fn utilization(&self, _time: f64) -> f64 {
        0.
    }
}

#[derive(Clone)]
pub struct UtilizationModelConstant {
    value: f64,
}

impl UtilizationModelConstant {
    pub fn new(value: f64) -> Self {
        Self {
            value: value.clamp(0., 1.),
        }
    }
}

impl UtilizationModel for UtilizationModelConstant {
    fn utilization(&self, _time: f64) -> f64 {
        self.value
    }
}

/// Pseudo-random utilization in _[0, 1)_.
///
/// The value is a function of the seed and the time, so repeated queries for the same time agree.
#[derive(Clone)]
pub struct UtilizationModelStochastic {
    seed: u64,
}

impl UtilizationModelStochastic {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl UtilizationModel for UtilizationModelStochastic {
    fn utilization(&self, time: f64) -> f64 {
        let mut rand = Pcg64::seed_from_u64(self.seed ^ time.to_bits());
        rand.gen_range(0.0..1.0)
    }
}

/// Utilization model description used in configuration files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UtilizationModelSpec {
    Full,
    Null,
    Constant { value: f64 },
    Stochastic {
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl Default for UtilizationModelSpec {
    fn default() -> Self {
        UtilizationModelSpec::Full
    }
}

impl UtilizationModelSpec {
    /// Builds the model, `default_seed` is used by the stochastic model if the seed is not set.
    pub fn build(&self, default_seed: u64) -> Box<dyn UtilizationModel> {
        match self {
            UtilizationModelSpec::Full => Box::new(UtilizationModelFull),
            UtilizationModelSpec::Null => Box::new(UtilizationModelNull),
            UtilizationModelSpec::Constant { value } => Box::new(UtilizationModelConstant::new(*value)),
            UtilizationModelSpec::Stochastic { seed } => {
                Box::new(UtilizationModelStochastic::new(seed.unwrap_or(default_seed)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stochastic_model_is_repeatable() {
        let model = UtilizationModelStochastic::new(42);
        let first = model.utilization(12.5);
        assert_eq!(first, model.utilization(12.5));
        assert_eq!(first, UtilizationModelStochastic::new(42).utilization(12.5));
        assert!((0.0..1.0).contains(&first));
    }

    #[test]
    fn test_constant_model_is_clamped() {
        assert_eq!(UtilizationModelConstant::new(1.5).utilization(0.), 1.);
        assert_eq!(UtilizationModelConstant::new(0.25).utilization(100.), 0.25);
    }

    #[test]
    fn test_spec_parsing() {
        let specs: Vec<UtilizationModelSpec> =
            serde_yaml::from_str("[{type: Full}, {type: Constant, value: 0.5}, {type: Stochastic}]").unwrap();
        assert_eq!(specs[0], UtilizationModelSpec::Full);
        assert_eq!(specs[1].build(0).utilization(1.), 0.5);
        assert_eq!(specs[2], UtilizationModelSpec::Stochastic { seed: None });
    }
}
