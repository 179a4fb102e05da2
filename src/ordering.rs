//! Packing sequence for a dispatch.
//!
//! Sturdy freight goes in first so it forms the floor of the load; fragile
//! packages come last. Together with the packer's lowest-point-first scan this
//! puts fragile items on top of, or beside, what is already loaded.

use std::cmp::Ordering;

use crate::model::Package;
use crate::types::Dimensional;

/// Composite packing key, applied in order:
/// 1. non-fragile before fragile
/// 2. heavier first
/// 3. larger volume first
/// 4. id ascending, so equal packages always come out in the same order
pub fn compare_for_packing(a: &Package, b: &Package) -> Ordering {
    a.fragile
        .cmp(&b.fragile)
        .then_with(|| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal))
        .then_with(|| b.volume().cmp(&a.volume()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Returns the packages of a dispatch in the order the packer should try them.
///
/// The input order is irrelevant: any permutation of the same set yields the same
/// sequence.
pub fn packing_sequence(packages: &[Package]) -> Vec<&Package> {
    let mut sequence: Vec<&Package> = packages.iter().collect();
    sequence.sort_by(|a, b| compare_for_packing(a, b));
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(id: &str, weight: f64, dims: (u32, u32, u32), fragile: bool) -> Package {
        Package::new(id, weight, dims, fragile).unwrap()
    }

    fn ids(sequence: &[&Package]) -> Vec<String> {
        sequence.iter().map(|p| p.id.clone()).collect()
    }

    #[test]
    fn non_fragile_packages_come_first() {
        let packages = vec![
            pkg("F", 100.0, (10, 10, 10), true),
            pkg("N", 1.0, (10, 10, 10), false),
        ];
        assert_eq!(ids(&packing_sequence(&packages)), vec!["N", "F"]);
    }

    #[test]
    fn heavier_first_within_fragility_class() {
        let packages = vec![
            pkg("light", 5.0, (10, 10, 10), false),
            pkg("heavy", 50.0, (10, 10, 10), false),
            pkg("fragile-light", 1.0, (10, 10, 10), true),
            pkg("fragile-heavy", 9.0, (10, 10, 10), true),
        ];
        assert_eq!(
            ids(&packing_sequence(&packages)),
            vec!["heavy", "light", "fragile-heavy", "fragile-light"]
        );
    }

    #[test]
    fn volume_breaks_weight_ties() {
        let packages = vec![
            pkg("small", 10.0, (10, 10, 10), false),
            pkg("large", 10.0, (20, 20, 20), false),
        ];
        assert_eq!(ids(&packing_sequence(&packages)), vec!["large", "small"]);
    }

    #[test]
    fn id_breaks_remaining_ties() {
        let packages = vec![
            pkg("PKG3", 10.0, (10, 10, 10), false),
            pkg("PKG1", 10.0, (10, 10, 10), false),
            pkg("PKG2", 10.0, (10, 10, 10), false),
        ];
        assert_eq!(
            ids(&packing_sequence(&packages)),
            vec!["PKG1", "PKG2", "PKG3"]
        );
    }

    #[test]
    fn sequence_does_not_depend_on_input_order() {
        let mut packages = vec![
            pkg("A", 10.0, (10, 20, 30), false),
            pkg("B", 10.0, (30, 20, 10), true),
            pkg("C", 12.0, (5, 5, 5), false),
            pkg("D", 10.0, (10, 20, 30), false),
        ];
        let forward = ids(&packing_sequence(&packages));
        packages.reverse();
        let backward = ids(&packing_sequence(&packages));
        assert_eq!(forward, backward);
        assert_eq!(forward, vec!["C", "A", "D", "B"]);
    }
}
