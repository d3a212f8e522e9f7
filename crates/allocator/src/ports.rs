//! Port assignment
//!
//! Each identifier owns a block of [`PORTS_PER_ID`] consecutive ports starting
//! at `initial_port + id * PORTS_PER_ID`. Changing the multiplier moves every
//! previously assigned block and must be handled as a migration.

/// Number of consecutive ports reserved per identifier.
pub const PORTS_PER_ID: u64 = 3;

/// Ports derived from one identifier, in ascending order.
pub type PortTriple = [u64; 3];

/// Returns the three consecutive ports owned by `id`.
///
/// Computed in 64-bit arithmetic so every `u32` input pair has a result.
pub fn assign_ports(id: u32, initial_port: u32) -> PortTriple {
    let base = u64::from(initial_port) + u64::from(id) * PORTS_PER_ID;
    [base, base + 1, base + 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_ports_first_id() {
        assert_eq!(assign_ports(0, 8100), [8100, 8101, 8102]);
    }

    #[test]
    fn test_assign_ports_second_id() {
        assert_eq!(assign_ports(1, 8100), [8103, 8104, 8105]);
    }

    #[test]
    fn test_assign_ports_formula() {
        for id in [0u32, 1, 7, 999, 1000] {
            for initial in [0u32, 1024, 8100, 30000] {
                let base = u64::from(initial) + 3 * u64::from(id);
                assert_eq!(assign_ports(id, initial), [base, base + 1, base + 2]);
            }
        }
    }

    #[test]
    fn test_assign_ports_no_overlap_between_ids() {
        let mut seen = std::collections::BTreeSet::new();
        for id in 0..500 {
            for port in assign_ports(id, 8100) {
                assert!(seen.insert(port), "port {port} assigned twice (id {id})");
            }
        }
    }

    #[test]
    fn test_assign_ports_extremes_do_not_wrap() {
        let ports = assign_ports(u32::MAX, u32::MAX);
        let base = u64::from(u32::MAX) * 4;
        assert_eq!(ports, [base, base + 1, base + 2]);
    }
}
