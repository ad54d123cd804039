use std::fmt::Display;

use crate::domain::value_objects::enums::auto_accept::AutoAcceptOverride;

/// Inputs of the auto-approval decision for one candidate booking.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalContext {
    pub provider_auto_accept: bool,
    pub availability_override: AutoAcceptOverride,
    pub offering_override: AutoAcceptOverride,
    /// `None` when the booking targets no slot.
    pub hours_until_slot: Option<f64>,
    pub min_advance_hours: i32,
    pub max_advance_hours: i32,
    pub remaining_capacity: i64,
    pub accepting_students: bool,
    pub live_sessions_enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalBlocker {
    AutoAcceptOff,
    OfferingForbids,
    NoSlot,
    OutsideAdvanceWindow { hours_until_slot: f64 },
    NoCapacity,
    NotAcceptingStudents,
    LiveSessionsDisabled,
}

impl Display for ApprovalBlocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalBlocker::AutoAcceptOff => f.write_str("auto-accept is off"),
            ApprovalBlocker::OfferingForbids => f.write_str("offering requires manual review"),
            ApprovalBlocker::NoSlot => f.write_str("no slot selected"),
            ApprovalBlocker::OutsideAdvanceWindow { hours_until_slot } => {
                write!(f, "slot is {hours_until_slot:.1}h away, outside the advance window")
            }
            ApprovalBlocker::NoCapacity => f.write_str("no capacity left"),
            ApprovalBlocker::NotAcceptingStudents => f.write_str("not accepting students"),
            ApprovalBlocker::LiveSessionsDisabled => f.write_str("live sessions disabled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalDecision {
    pub blockers: Vec<ApprovalBlocker>,
}

impl ApprovalDecision {
    pub fn auto_approve(&self) -> bool {
        self.blockers.is_empty()
    }

    pub fn reasons(&self) -> String {
        self.blockers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Every condition is evaluated so the decision lists all failing reasons.
pub fn evaluate(context: &ApprovalContext) -> ApprovalDecision {
    let mut blockers = Vec::new();

    if !context
        .availability_override
        .resolve(context.provider_auto_accept)
    {
        blockers.push(ApprovalBlocker::AutoAcceptOff);
    }
    if context.offering_override == AutoAcceptOverride::Disabled {
        blockers.push(ApprovalBlocker::OfferingForbids);
    }
    match context.hours_until_slot {
        None => blockers.push(ApprovalBlocker::NoSlot),
        Some(hours)
            if hours < f64::from(context.min_advance_hours)
                || hours > f64::from(context.max_advance_hours) =>
        {
            blockers.push(ApprovalBlocker::OutsideAdvanceWindow {
                hours_until_slot: hours,
            });
        }
        Some(_) => {}
    }
    if context.remaining_capacity <= 0 {
        blockers.push(ApprovalBlocker::NoCapacity);
    }
    if !context.accepting_students {
        blockers.push(ApprovalBlocker::NotAcceptingStudents);
    }
    if !context.live_sessions_enabled {
        blockers.push(ApprovalBlocker::LiveSessionsDisabled);
    }

    ApprovalDecision { blockers }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approving() -> ApprovalContext {
        ApprovalContext {
            provider_auto_accept: true,
            availability_override: AutoAcceptOverride::Unset,
            offering_override: AutoAcceptOverride::Unset,
            hours_until_slot: Some(24.0),
            min_advance_hours: 2,
            max_advance_hours: 720,
            remaining_capacity: 1,
            accepting_students: true,
            live_sessions_enabled: true,
        }
    }

    #[test]
    fn approves_when_every_condition_holds() {
        let decision = evaluate(&approving());
        assert!(decision.auto_approve());
        assert_eq!(decision.reasons(), "");
    }

    #[test]
    fn availability_override_wins_over_provider_default() {
        let context = ApprovalContext {
            provider_auto_accept: false,
            availability_override: AutoAcceptOverride::Enabled,
            ..approving()
        };
        assert!(evaluate(&context).auto_approve());

        let context = ApprovalContext {
            provider_auto_accept: true,
            availability_override: AutoAcceptOverride::Disabled,
            ..approving()
        };
        assert_eq!(
            evaluate(&context).blockers,
            vec![ApprovalBlocker::AutoAcceptOff]
        );
    }

    #[test]
    fn unset_override_falls_back_to_provider_default() {
        let context = ApprovalContext {
            provider_auto_accept: false,
            ..approving()
        };
        assert!(!evaluate(&context).auto_approve());
    }

    #[test]
    fn offering_can_only_forbid() {
        let forbidden = ApprovalContext {
            offering_override: AutoAcceptOverride::Disabled,
            ..approving()
        };
        assert_eq!(
            evaluate(&forbidden).blockers,
            vec![ApprovalBlocker::OfferingForbids]
        );

        let enabled_without_provider = ApprovalContext {
            provider_auto_accept: false,
            offering_override: AutoAcceptOverride::Enabled,
            ..approving()
        };
        assert!(!evaluate(&enabled_without_provider).auto_approve());
    }

    #[test]
    fn advance_window_bounds_are_inclusive() {
        for hours in [2.0, 720.0] {
            let context = ApprovalContext {
                hours_until_slot: Some(hours),
                ..approving()
            };
            assert!(evaluate(&context).auto_approve(), "{hours}h should pass");
        }

        let too_soon = ApprovalContext {
            hours_until_slot: Some(1.5),
            ..approving()
        };
        assert!(matches!(
            evaluate(&too_soon).blockers.as_slice(),
            [ApprovalBlocker::OutsideAdvanceWindow { .. }]
        ));
    }

    #[test]
    fn collects_every_failing_reason() {
        let context = ApprovalContext {
            hours_until_slot: None,
            remaining_capacity: 0,
            accepting_students: false,
            live_sessions_enabled: false,
            ..approving()
        };
        let decision = evaluate(&context);

        assert_eq!(
            decision.blockers,
            vec![
                ApprovalBlocker::NoSlot,
                ApprovalBlocker::NoCapacity,
                ApprovalBlocker::NotAcceptingStudents,
                ApprovalBlocker::LiveSessionsDisabled,
            ]
        );
        assert!(decision.reasons().contains("no capacity left"));
    }
}
