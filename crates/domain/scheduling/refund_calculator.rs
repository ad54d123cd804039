use crate::domain::value_objects::enums::cancellation_policies::CancellationPolicy;

/// `(minimum notice in hours, refunded percent)`, checked from the longest notice down.
fn tiers(policy: CancellationPolicy) -> &'static [(f64, i64)] {
    match policy {
        CancellationPolicy::Flexible => &[(24.0, 100), (12.0, 50)],
        CancellationPolicy::Moderate => &[(48.0, 100), (24.0, 50)],
        CancellationPolicy::Strict => &[(72.0, 100), (48.0, 25)],
        CancellationPolicy::Unrecognized => &[],
    }
}

const UNRECOGNIZED_POLICY_PERCENT: i64 = 50;

pub fn refund_percent(policy: CancellationPolicy, hours_until_start: f64) -> i64 {
    if policy == CancellationPolicy::Unrecognized {
        return UNRECOGNIZED_POLICY_PERCENT;
    }

    tiers(policy)
        .iter()
        .find(|(min_hours, _)| hours_until_start >= *min_hours)
        .map(|(_, percent)| *percent)
        .unwrap_or(0)
}

/// Refund in minor units, rounded down.
pub fn refund_amount(
    original_amount_minor: i64,
    policy: CancellationPolicy,
    hours_until_start: f64,
) -> i64 {
    original_amount_minor.max(0) * refund_percent(policy, hours_until_start) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flexible_tiers() {
        assert_eq!(refund_amount(100, CancellationPolicy::Flexible, 30.0), 100);
        assert_eq!(refund_amount(100, CancellationPolicy::Flexible, 13.0), 50);
        assert_eq!(refund_amount(100, CancellationPolicy::Flexible, 5.0), 0);
    }

    #[test]
    fn tier_boundaries_are_inclusive() {
        assert_eq!(refund_percent(CancellationPolicy::Moderate, 48.0), 100);
        assert_eq!(refund_percent(CancellationPolicy::Moderate, 47.9), 50);
        assert_eq!(refund_percent(CancellationPolicy::Moderate, 24.0), 50);
        assert_eq!(refund_percent(CancellationPolicy::Moderate, 23.9), 0);
        assert_eq!(refund_percent(CancellationPolicy::Strict, 72.0), 100);
        assert_eq!(refund_percent(CancellationPolicy::Strict, 50.0), 25);
        assert_eq!(refund_percent(CancellationPolicy::Strict, 47.0), 0);
    }

    #[test]
    fn unknown_policy_refunds_half_regardless_of_notice() {
        let policy = CancellationPolicy::from_str("SUPER_STRICT");
        assert_eq!(refund_amount(100, policy, 500.0), 50);
        assert_eq!(refund_amount(100, policy, 0.5), 50);
    }

    #[test]
    fn amounts_round_down() {
        assert_eq!(refund_amount(999, CancellationPolicy::Strict, 60.0), 249);
        assert_eq!(refund_amount(3, CancellationPolicy::Flexible, 12.0), 1);
    }

    #[test]
    fn refund_never_decreases_with_more_notice() {
        for policy in [
            CancellationPolicy::Flexible,
            CancellationPolicy::Moderate,
            CancellationPolicy::Strict,
            CancellationPolicy::Unrecognized,
        ] {
            let mut previous = 0;
            for tenth_hours in -20..=1000 {
                let amount = refund_amount(10_000, policy, f64::from(tenth_hours) / 10.0);
                assert!(amount >= previous, "{policy} decreased at {tenth_hours}");
                previous = amount;
            }
        }
    }
}
