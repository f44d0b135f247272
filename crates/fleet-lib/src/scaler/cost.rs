//! Cost and benefit estimation for scale actions

use super::types::ScaleDirection;
use serde::{Deserialize, Serialize};

/// Prices a change in replica count
pub trait CostModel: Send + Sync {
    /// Cost of moving from `current` to `target` replicas
    fn estimate_cost(&self, current: u32, target: u32) -> f64;

    /// Value gained by moving from `current` to `target` replicas
    fn estimate_benefit(&self, current: u32, target: u32) -> f64;

    /// Monthly spend change; negative for savings
    fn cost_impact(&self, current: u32, target: u32) -> f64;
}

/// Flat per-replica pricing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatRateCostModel {
    /// Monthly cost of one replica
    pub monthly_cost_per_replica: f64,
    /// Performance value of one added replica
    pub value_per_replica: f64,
    /// Fraction of a replica's cost charged as disruption on scale-down
    pub scale_down_disruption: f64,
}

impl Default for FlatRateCostModel {
    fn default() -> Self {
        Self {
            monthly_cost_per_replica: 50.0,
            value_per_replica: 100.0,
            scale_down_disruption: 0.1,
        }
    }
}

fn direction(current: u32, target: u32) -> (ScaleDirection, f64) {
    let delta = target.abs_diff(current) as f64;
    let direction = match target.cmp(&current) {
        std::cmp::Ordering::Greater => ScaleDirection::ScaleUp,
        std::cmp::Ordering::Less => ScaleDirection::ScaleDown,
        std::cmp::Ordering::Equal => ScaleDirection::Maintain,
    };
    (direction, delta)
}

impl CostModel for FlatRateCostModel {
    fn estimate_cost(&self, current: u32, target: u32) -> f64 {
        match direction(current, target) {
            (ScaleDirection::ScaleUp, delta) => delta * self.monthly_cost_per_replica,
            (ScaleDirection::ScaleDown, delta) => {
                delta * self.monthly_cost_per_replica * self.scale_down_disruption
            }
            (ScaleDirection::Maintain, _) => 0.0,
        }
    }

    fn estimate_benefit(&self, current: u32, target: u32) -> f64 {
        match direction(current, target) {
            (ScaleDirection::ScaleUp, delta) => delta * self.value_per_replica,
            (ScaleDirection::ScaleDown, delta) => delta * self.monthly_cost_per_replica,
            (ScaleDirection::Maintain, _) => 0.0,
        }
    }

    fn cost_impact(&self, current: u32, target: u32) -> f64 {
        (target as f64 - current as f64) * self.monthly_cost_per_replica
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_rate_scale_up() {
        let model = FlatRateCostModel::default();
        assert_eq!(model.estimate_cost(2, 4), 100.0);
        assert_eq!(model.estimate_benefit(2, 4), 200.0);
        assert_eq!(model.cost_impact(2, 4), 100.0);
    }

    #[test]
    fn test_flat_rate_scale_down() {
        let model = FlatRateCostModel::default();
        assert_eq!(model.estimate_cost(4, 3), 5.0);
        assert_eq!(model.estimate_benefit(4, 3), 50.0);
        assert_eq!(model.cost_impact(4, 3), -50.0);
        assert_eq!(model.estimate_cost(3, 3), 0.0);
    }
}
