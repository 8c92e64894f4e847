//! Energy functional and Hebbian reference weights.
//!
//! `E = -1/2 * sum_i sum_j w_ij * v_i * v_j + sum_i th_i * v_i`

use crate::unit::Unit;

/// Energy of `state` under the weights and thresholds held by `units`.
///
/// `state` is indexed by unit id. Weights towards ids outside `state` are
/// ignored.
pub fn energy(units: &[Unit], state: &[f32]) -> f32 {
    let mut pairwise = 0.0f32;
    let mut bias = 0.0f32;

    for unit in units {
        let Some(&vi) = state.get(unit.id()) else {
            continue;
        };
        for (peer, w) in unit.weights() {
            if let Some(&vj) = state.get(peer) {
                pairwise += w * vi * vj;
            }
        }
        bias += unit.threshold() * vi;
    }

    -0.5 * pairwise + bias
}

/// Dense `n x n` outer-product sum over `patterns`, zero diagonal.
///
/// This is what a trained network's weights must equal; patterns shorter
/// than `n` contribute nothing past their end.
pub fn hebbian_matrix<P: AsRef<[f32]>>(patterns: &[P], n: usize) -> Vec<Vec<f32>> {
    let mut w = vec![vec![0.0f32; n]; n];
    for pattern in patterns {
        let p = pattern.as_ref();
        for i in 0..n.min(p.len()) {
            for j in 0..n.min(p.len()) {
                if i != j {
                    w[i][j] += p[i] * p[j];
                }
            }
        }
    }
    w
}
