//! Role-gated lifecycle guards.
//!
//! Capabilities live in one declarative table instead of branching inside
//! each handler. Evaluation order is fixed: the generic wrong-state rule for
//! edits, then the role's rules in declaration order (temporal before
//! status), then the state-machine checks that apply to every role.

use chrono::{DateTime, Utc};

use shared_models::auth::Role;

use crate::models::{AppointmentStatus, SchedulingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Edit,
    Cancel,
    NoShow,
    Complete,
}

#[derive(Debug, Clone, Copy)]
enum Check {
    /// start_time < now
    IsPast,
    /// start_time > now
    IsFuture,
    StatusIs(AppointmentStatus),
    StatusTerminal,
    Always,
}

impl Check {
    fn matches(&self, status: AppointmentStatus, start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Check::IsPast => start < now,
            Check::IsFuture => start > now,
            Check::StatusIs(s) => status == *s,
            Check::StatusTerminal => status.is_terminal(),
            Check::Always => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Deny {
    Forbidden(&'static str),
    Conflict(&'static str),
}

struct GuardRule {
    role: Role,
    action: LifecycleAction,
    check: Check,
    deny: Deny,
}

/// Per-role restrictions. Admins carry no rules. Within a role and action,
/// rules are evaluated top to bottom, so temporal checks come first.
const RULES: &[GuardRule] = &[
    // Assistants act on the practitioner's behalf and may only touch the
    // upcoming schedule.
    GuardRule {
        role: Role::Assistant,
        action: LifecycleAction::Edit,
        check: Check::IsPast,
        deny: Deny::Forbidden("assistants cannot modify past appointments"),
    },
    GuardRule {
        role: Role::Assistant,
        action: LifecycleAction::Cancel,
        check: Check::IsPast,
        deny: Deny::Forbidden("assistants cannot cancel past appointments"),
    },
    GuardRule {
        role: Role::Assistant,
        action: LifecycleAction::Cancel,
        check: Check::StatusIs(AppointmentStatus::Completed),
        deny: Deny::Forbidden("assistants cannot cancel completed appointments"),
    },
    GuardRule {
        role: Role::Assistant,
        action: LifecycleAction::Cancel,
        check: Check::StatusIs(AppointmentStatus::Cancelled),
        deny: Deny::Conflict("appointment is already cancelled"),
    },
    GuardRule {
        role: Role::Assistant,
        action: LifecycleAction::NoShow,
        check: Check::IsFuture,
        deny: Deny::Forbidden("assistants cannot mark future appointments as no-show"),
    },
    GuardRule {
        role: Role::Assistant,
        action: LifecycleAction::NoShow,
        check: Check::StatusTerminal,
        deny: Deny::Forbidden("assistants cannot change closed appointments"),
    },
    GuardRule {
        role: Role::Assistant,
        action: LifecycleAction::Complete,
        check: Check::Always,
        deny: Deny::Forbidden("assistants cannot complete appointments"),
    },
    // Practitioners may undo most of their own schedule, but a delivered
    // session stays delivered.
    GuardRule {
        role: Role::Psychologist,
        action: LifecycleAction::Cancel,
        check: Check::StatusIs(AppointmentStatus::Completed),
        deny: Deny::Forbidden("completed appointments cannot be cancelled"),
    },
    GuardRule {
        role: Role::Psychologist,
        action: LifecycleAction::Complete,
        check: Check::StatusTerminal,
        deny: Deny::Conflict("appointment is already closed"),
    },
];

/// Gate a lifecycle transition. Returns the first failing guard:
/// the generic wrong-state rule (edits only), the role's table rules,
/// then the role-independent state-machine checks.
pub fn authorize_transition(
    role: Role,
    action: LifecycleAction,
    status: AppointmentStatus,
    start_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), SchedulingError> {
    // Edits only ever touch open appointments. Terminal statuses have
    // dedicated operations.
    if action == LifecycleAction::Edit && status != AppointmentStatus::Scheduled {
        return Err(SchedulingError::StateConflict(format!(
            "cannot modify appointment in state {}",
            status
        )));
    }

    for rule in RULES {
        if rule.role == role
            && rule.action == action
            && rule.check.matches(status, start_time, now)
        {
            return Err(match rule.deny {
                Deny::Forbidden(msg) => SchedulingError::RoleForbidden(msg.to_string()),
                Deny::Conflict(msg) => SchedulingError::StateConflict(msg.to_string()),
            });
        }
    }

    match action {
        LifecycleAction::NoShow => {
            if start_time > now {
                return Err(SchedulingError::StateConflict(
                    "cannot mark a future appointment as no-show".to_string(),
                ));
            }
            if status != AppointmentStatus::Scheduled {
                return Err(SchedulingError::StateConflict(format!(
                    "cannot mark a {} appointment as no-show",
                    status
                )));
            }
        }
        LifecycleAction::Complete => {
            // Cancellation is sticky for everyone, admins included. Other
            // closed states may still be corrected to completed by an admin.
            if status == AppointmentStatus::Cancelled {
                return Err(SchedulingError::StateConflict(
                    "cannot complete a cancelled appointment".to_string(),
                ));
            }
        }
        LifecycleAction::Edit | LifecycleAction::Cancel => {}
    }

    Ok(())
}

/// Blocks may only be removed by the practitioner or an admin.
pub fn authorize_block_delete(role: Role) -> Result<(), SchedulingError> {
    if role == Role::Assistant {
        return Err(SchedulingError::RoleForbidden(
            "assistants cannot delete appointment blocks".to_string(),
        ));
    }
    Ok(())
}

/// Working-hours policy is owned by the practitioner and admins.
pub fn authorize_settings_update(role: Role) -> Result<(), SchedulingError> {
    if role == Role::Assistant {
        return Err(SchedulingError::RoleForbidden(
            "assistants cannot change clinic settings".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 7, 12, 0, 0).unwrap()
    }

    fn past() -> DateTime<Utc> {
        now() - Duration::hours(2)
    }

    fn future() -> DateTime<Utc> {
        now() + Duration::hours(2)
    }

    #[test]
    fn admin_is_unrestricted_on_open_appointments() {
        for action in [
            LifecycleAction::Edit,
            LifecycleAction::Cancel,
            LifecycleAction::NoShow,
            LifecycleAction::Complete,
        ] {
            let start = if action == LifecycleAction::NoShow {
                past()
            } else {
                future()
            };
            assert!(authorize_transition(
                Role::Admin,
                action,
                AppointmentStatus::Scheduled,
                start,
                now()
            )
            .is_ok());
        }
    }

    #[test]
    fn admin_may_cancel_completed_appointments() {
        assert!(authorize_transition(
            Role::Admin,
            LifecycleAction::Cancel,
            AppointmentStatus::Completed,
            past(),
            now()
        )
        .is_ok());
    }

    #[test]
    fn edit_of_terminal_appointment_is_a_state_conflict_for_everyone() {
        for role in [Role::Admin, Role::Psychologist, Role::Assistant] {
            let err = authorize_transition(
                role,
                LifecycleAction::Edit,
                AppointmentStatus::Cancelled,
                future(),
                now(),
            )
            .unwrap_err();
            assert_matches!(err, SchedulingError::StateConflict(_));
        }
    }

    #[test]
    fn psychologist_cannot_cancel_completed() {
        let err = authorize_transition(
            Role::Psychologist,
            LifecycleAction::Cancel,
            AppointmentStatus::Completed,
            past(),
            now(),
        )
        .unwrap_err();
        assert_matches!(err, SchedulingError::RoleForbidden(_));
    }

    #[test]
    fn assistant_cannot_touch_the_past() {
        for action in [LifecycleAction::Edit, LifecycleAction::Cancel] {
            let err = authorize_transition(
                Role::Assistant,
                action,
                AppointmentStatus::Scheduled,
                past(),
                now(),
            )
            .unwrap_err();
            assert_matches!(err, SchedulingError::RoleForbidden(_));
        }
    }

    #[test]
    fn assistant_cancel_of_cancelled_is_conflict_not_forbidden() {
        let err = authorize_transition(
            Role::Assistant,
            LifecycleAction::Cancel,
            AppointmentStatus::Cancelled,
            future(),
            now(),
        )
        .unwrap_err();
        assert_matches!(err, SchedulingError::StateConflict(_));
    }

    #[test]
    fn assistant_future_no_show_fails_on_the_temporal_guard() {
        // Even for a terminal appointment the temporal rule fires first.
        let err = authorize_transition(
            Role::Assistant,
            LifecycleAction::NoShow,
            AppointmentStatus::Completed,
            future(),
            now(),
        )
        .unwrap_err();
        assert_matches!(
            err,
            SchedulingError::RoleForbidden(msg) if msg.contains("future")
        );
    }

    #[test]
    fn assistant_may_mark_elapsed_scheduled_as_no_show() {
        assert!(authorize_transition(
            Role::Assistant,
            LifecycleAction::NoShow,
            AppointmentStatus::Scheduled,
            past(),
            now()
        )
        .is_ok());
    }

    #[test]
    fn assistant_can_never_complete() {
        let err = authorize_transition(
            Role::Assistant,
            LifecycleAction::Complete,
            AppointmentStatus::Scheduled,
            past(),
            now(),
        )
        .unwrap_err();
        assert_matches!(err, SchedulingError::RoleForbidden(_));
    }

    #[test]
    fn no_show_requires_an_elapsed_scheduled_appointment() {
        let err = authorize_transition(
            Role::Psychologist,
            LifecycleAction::NoShow,
            AppointmentStatus::Scheduled,
            future(),
            now(),
        )
        .unwrap_err();
        assert_matches!(err, SchedulingError::StateConflict(_));

        let err = authorize_transition(
            Role::Admin,
            LifecycleAction::NoShow,
            AppointmentStatus::Completed,
            past(),
            now(),
        )
        .unwrap_err();
        assert_matches!(err, SchedulingError::StateConflict(_));
    }

    #[test]
    fn cancellation_is_sticky_for_complete() {
        for role in [Role::Admin, Role::Psychologist] {
            let err = authorize_transition(
                role,
                LifecycleAction::Complete,
                AppointmentStatus::Cancelled,
                past(),
                now(),
            )
            .unwrap_err();
            assert_matches!(err, SchedulingError::StateConflict(_));
        }
    }

    #[test]
    fn admin_may_recomplete_closed_appointments() {
        // Only cancellation blocks an admin's complete.
        for status in [AppointmentStatus::Completed, AppointmentStatus::NoShow] {
            assert!(authorize_transition(
                Role::Admin,
                LifecycleAction::Complete,
                status,
                past(),
                now()
            )
            .is_ok());
        }
    }

    #[test]
    fn psychologist_cannot_complete_a_closed_appointment() {
        for status in [AppointmentStatus::Completed, AppointmentStatus::NoShow] {
            let err = authorize_transition(
                Role::Psychologist,
                LifecycleAction::Complete,
                status,
                past(),
                now(),
            )
            .unwrap_err();
            assert_matches!(err, SchedulingError::StateConflict(_));
        }
    }

    #[test]
    fn block_delete_gate() {
        assert!(authorize_block_delete(Role::Admin).is_ok());
        assert!(authorize_block_delete(Role::Psychologist).is_ok());
        assert_matches!(
            authorize_block_delete(Role::Assistant),
            Err(SchedulingError::RoleForbidden(_))
        );
    }

    #[test]
    fn settings_update_gate() {
        assert!(authorize_settings_update(Role::Admin).is_ok());
        assert!(authorize_settings_update(Role::Psychologist).is_ok());
        assert_matches!(
            authorize_settings_update(Role::Assistant),
            Err(SchedulingError::RoleForbidden(_))
        );
    }
}
