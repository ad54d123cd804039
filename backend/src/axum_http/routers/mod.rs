pub mod availability;
pub mod bookings;
pub mod payouts;
pub mod sessions;
pub mod webhooks;

use uuid::Uuid;

use crate::{
    auth::{AuthUser, Role},
    axum_http::error_responses::{AppError, AppResult},
};

pub(crate) fn require_instructor(auth: &AuthUser) -> AppResult<Uuid> {
    match auth.role {
        Role::Instructor => Ok(auth.user_id),
        _ => Err(AppError::Forbidden("instructor role required".to_string())),
    }
}

pub(crate) fn require_admin(auth: &AuthUser) -> AppResult<()> {
    if auth.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("admin role required".to_string()))
    }
}

/// Admins see every instructor, instructors only themselves.
pub(crate) fn instructor_scope(auth: &AuthUser) -> AppResult<Option<Uuid>> {
    match auth.role {
        Role::Admin => Ok(None),
        Role::Instructor => Ok(Some(auth.user_id)),
        Role::Consumer => Err(AppError::Forbidden(
            "instructor or admin role required".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn instructor_guard_rejects_other_roles() {
        let instructor = user(Role::Instructor);
        assert_eq!(require_instructor(&instructor).unwrap(), instructor.user_id);
        assert!(require_instructor(&user(Role::Consumer)).is_err());
        assert!(require_instructor(&user(Role::Admin)).is_err());
    }

    #[test]
    fn scope_is_open_for_admins_only() {
        let instructor = user(Role::Instructor);
        assert_eq!(instructor_scope(&user(Role::Admin)).unwrap(), None);
        assert_eq!(
            instructor_scope(&instructor).unwrap(),
            Some(instructor.user_id)
        );
        assert!(instructor_scope(&user(Role::Consumer)).is_err());
        assert!(require_admin(&instructor).is_err());
    }
}
