// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.

/// Convert a _cross-correlation_ baseline index into its constituent antenna
/// indices. Baseline 0 _is not_ between antenna 0 and antenna 0; it is between
/// antenna 0 and antenna 1.
#[inline]
pub fn cross_correlation_baseline_to_ants(total_num_ants: usize, baseline: usize) -> (usize, usize) {
    let n = (total_num_ants - 1) as f64;
    let bl = baseline as f64;
    let ant1 = (-0.5 * (4.0 * n * (n + 1.0) - 8.0 * bl + 1.0).sqrt() + n + 0.5).floor();
    let ant2 = bl - ant1 * (n - (ant1 + 1.0) / 2.0) + 1.0;
    (ant1 as usize, ant2 as usize)
}

/// Convert a baseline index into its constituent antenna indices (where the
/// baseline indices include auto-correlations as baselines). Baseline 0 is
/// between antenna 0 and antenna 0.
#[inline]
pub fn baseline_to_ants(total_num_ants: usize, baseline: usize) -> (usize, usize) {
    let n = total_num_ants as f64;
    let bl = baseline as f64;
    let ant1 = (-0.5 * (4.0 * n * (n + 1.0) - 8.0 * bl + 1.0).sqrt() + n + 0.5).floor();
    let ant2 = bl - ant1 * (n - (ant1 + 1.0) / 2.0);
    (ant1 as usize, ant2 as usize)
}

/// The number of baselines formed by `num_ants` antennas, optionally counting
/// auto-correlations as baselines.
#[inline]
pub fn num_baselines(num_ants: usize, include_autos: bool) -> usize {
    if include_autos {
        num_ants * (num_ants + 1) / 2
    } else {
        num_ants * num_ants.saturating_sub(1) / 2
    }
}

/// Split an RCU (receiver unit) index into its antenna and polarisation
/// indices. Even RCUs are X dipoles, odd RCUs are Y dipoles.
#[inline]
pub fn rcu_to_ant_pol(rcu: usize) -> (usize, usize) {
    (rcu / 2, rcu % 2)
}

/// The index of a lower-triangular baseline `(a1, a2)` with `a2 <= a1`, as
/// laid out by row (`(0,0), (1,0), (1,1), (2,0), ...`).
#[inline]
pub fn lower_triangle_index(a1: usize, a2: usize) -> usize {
    a1 * (a1 + 1) / 2 + a2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_correlation_baseline_to_ants() {
        for n in [2, 96, 126, 288] {
            let mut bl_index = 0;
            for ant1 in 0..n {
                for ant2 in ant1 + 1..n {
                    let (a1, a2) = cross_correlation_baseline_to_ants(n, bl_index);
                    assert_eq!(ant1, a1, "Expected ant1 = {ant1}, got {a1}. bl = {bl_index}");
                    assert_eq!(ant2, a2, "Expected ant2 = {ant2}, got {a2}. bl = {bl_index}");
                    bl_index += 1;
                }
            }
            assert_eq!(bl_index, num_baselines(n, false));
        }
    }

    #[test]
    fn test_baseline_to_ants() {
        for n in [1, 4, 96, 288] {
            let mut bl_index = 0;
            for ant1 in 0..n {
                for ant2 in ant1..n {
                    let (a1, a2) = baseline_to_ants(n, bl_index);
                    assert_eq!(ant1, a1, "Expected ant1 = {ant1}, got {a1}. bl = {bl_index}");
                    assert_eq!(ant2, a2, "Expected ant2 = {ant2}, got {a2}. bl = {bl_index}");
                    bl_index += 1;
                }
            }
            assert_eq!(bl_index, num_baselines(n, true));
        }
    }

    #[test]
    fn test_num_baselines() {
        assert_eq!(num_baselines(4, true), 10);
        assert_eq!(num_baselines(4, false), 6);
        assert_eq!(num_baselines(0, false), 0);
        assert_eq!(num_baselines(96, true), 4656);
    }

    #[test]
    fn test_rcu_to_ant_pol() {
        assert_eq!(rcu_to_ant_pol(0), (0, 0));
        assert_eq!(rcu_to_ant_pol(1), (0, 1));
        assert_eq!(rcu_to_ant_pol(191), (95, 1));
    }

    #[test]
    fn test_lower_triangle_index() {
        let mut i = 0;
        for a1 in 0..10 {
            for a2 in 0..=a1 {
                assert_eq!(lower_triangle_index(a1, a2), i);
                i += 1;
            }
        }
    }
}
