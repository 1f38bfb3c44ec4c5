//! Panel-normalized survey weights.

use log::warn;

/// Divides each weight by the panel total. Missing weights are left out of
/// the total and stay missing.
pub fn normalize(weights: &[Option<f64>]) -> Vec<Option<f64>> {
    let total: f64 = weights.iter().flatten().sum();
    if total <= 0.0 {
        if weights.iter().any(Option::is_some) {
            warn!("Weight total is {}, normalized weights left missing", total);
        }
        return vec![None; weights.len()];
    }
    weights.iter().map(|w| w.map(|w| w / total)).collect()
}
