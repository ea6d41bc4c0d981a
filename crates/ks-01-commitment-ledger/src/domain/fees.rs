//! Payment pricing.

/// `required = max(payload_len * fee_per_byte, min_fee)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    /// Price per payload byte in base units.
    pub fee_per_byte: u64,
    /// Anti-dust floor.
    pub min_fee: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            fee_per_byte: 2,
            min_fee: 100_000,
        }
    }
}

impl FeeSchedule {
    /// Amount demanded for a payload of `payload_len` bytes.
    #[must_use]
    pub fn required_amount(&self, payload_len: usize) -> u64 {
        (payload_len as u64)
            .saturating_mul(self.fee_per_byte)
            .max(self.min_fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_floor_applies_to_small_payloads() {
        let fees = FeeSchedule {
            fee_per_byte: 10,
            min_fee: 1000,
        };
        assert_eq!(fees.required_amount(0), 1000);
        assert_eq!(fees.required_amount(99), 1000);
        assert_eq!(fees.required_amount(101), 1010);
    }

    #[test]
    fn test_saturates_instead_of_overflowing() {
        let fees = FeeSchedule {
            fee_per_byte: u64::MAX,
            min_fee: 1,
        };
        assert_eq!(fees.required_amount(2), u64::MAX);
    }

    proptest! {
        #[test]
        fn prop_required_is_monotonic_and_floored(a in 0usize..1_000_000, b in 0usize..1_000_000,
                                                  rate in 0u64..1000, floor in 0u64..1_000_000) {
            let fees = FeeSchedule { fee_per_byte: rate, min_fee: floor };
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(fees.required_amount(small) <= fees.required_amount(large));
            prop_assert!(fees.required_amount(small) >= floor);
        }
    }
}
