//! Metric records and the pure builders producing them.

use serde::Serialize;

use crate::quantity::Watts;

/// Namespace of the directional power gauges.
pub const DIRECTIONAL_PREFIX: &str = "solar";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Gauge,
}

#[must_use]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricRecord {
    pub name: String,
    pub value: f64,

    #[serde(rename = "type")]
    pub type_: MetricType,
}

pub fn gauge(name: impl Into<String>, value: impl Into<f64>) -> MetricRecord {
    MetricRecord { name: name.into(), value: value.into(), type_: MetricType::Gauge }
}

/// Split a signed power reading into the `to_` and `from_` gauges.
///
/// The magnitude goes to `from_<base_name>` only when the power is positive and the circuit
/// is not inverted, otherwise it goes to `to_<base_name>`. This means zero lands in `to_`,
/// and an inverted circuit always lands in `to_` regardless of the sign. Existing dashboards
/// depend on this routing.
pub fn directional_pair(base_name: &str, power: Watts, invert: bool) -> [MetricRecord; 2] {
    let mut pair = [
        gauge(format!("{DIRECTIONAL_PREFIX}.to_{base_name}"), 0.0),
        gauge(format!("{DIRECTIONAL_PREFIX}.from_{base_name}"), 0.0),
    ];
    let active_index = usize::from(power > Watts::ZERO && !invert);
    pair[active_index].value = power.abs().into();
    pair
}
