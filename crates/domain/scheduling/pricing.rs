/// Per-person price split between the platform and the instructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingSnapshot {
    pub price_per_person_minor: i64,
    pub platform_fee_minor: i64,
    pub instructor_payout_minor: i64,
}

pub fn snapshot(price_per_person_minor: i64, platform_fee_bps: i64) -> PricingSnapshot {
    let fee = i128::from(price_per_person_minor) * i128::from(platform_fee_bps) / 10_000;
    let platform_fee_minor = i64::try_from(fee).unwrap_or(price_per_person_minor);
    PricingSnapshot {
        price_per_person_minor,
        platform_fee_minor,
        instructor_payout_minor: price_per_person_minor - platform_fee_minor,
    }
}

/// Offers below half of the base price are refused.
pub fn meets_price_floor(offered_minor: i64, base_minor: i64) -> bool {
    offered_minor >= 0 && offered_minor >= base_minor - base_minor / 2
}

pub fn total_revenue(price_per_person_minor: i64, participants: i32) -> i64 {
    price_per_person_minor.saturating_mul(i64::from(participants.max(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_rounds_down() {
        let pricing = snapshot(1999, 1000);
        assert_eq!(pricing.platform_fee_minor, 199);
        assert_eq!(pricing.instructor_payout_minor, 1800);
    }

    #[test]
    fn price_floor_is_half_the_base_price() {
        assert!(!meets_price_floor(40, 100));
        assert!(meets_price_floor(50, 100));
        assert!(!meets_price_floor(50, 101));
        assert!(meets_price_floor(0, 0));
    }

    #[test]
    fn huge_offers_clear_the_floor_without_overflow() {
        assert!(meets_price_floor(i64::MAX, 10_000));
        assert!(meets_price_floor(i64::MAX / 2 + 1, i64::MAX));
        assert!(!meets_price_floor(i64::MAX / 2, i64::MAX));
    }
}
