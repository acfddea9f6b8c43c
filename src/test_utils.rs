use std::collections::HashMap;
use std::fmt::Debug;

use approx::assert_abs_diff_eq;

use super::path::PathGroups;


/// Checks that the contents of two hashmaps are the same.
pub fn compare_hashmaps<KK, VV>(query_map: &HashMap<KK, VV>, true_map: &HashMap<KK, VV>)
    where KK: Debug + Eq + std::hash::Hash,
    VV: Debug + PartialEq,
{
    assert_eq!(query_map.len(), true_map.len());

    for (true_key, true_val) in true_map {
        match query_map.get(true_key) {
            Some(val) => assert_eq!(val, true_val),
            None => assert!(false, "Key {:?} missing!", true_key),
        }
    }
}

/// Checks that the mode shares of a split cell sum to one, and that the path shares of each
/// mode sum to the mode's share.
pub fn assert_shares_consistent(groups: &PathGroups, epsilon: f64) {
    let total: f64 = groups.values().map(|gg| gg.market_share).sum();
    assert_abs_diff_eq!(total, 1., epsilon = epsilon);
    for group in groups.values() {
        let mode_total: f64 = group.paths().iter().map(|pp| pp.market_share).sum();
        assert_abs_diff_eq!(mode_total, group.market_share, epsilon = epsilon);
    }
}
