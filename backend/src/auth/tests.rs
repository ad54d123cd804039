use super::*;
use jsonwebtoken::{EncodingKey, Header, encode};

const SECRET: &str = "supersecretjwtsecretforunittesting123";

fn token_for(sub: &str, role: &str, exp: usize) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

#[test]
fn test_authenticate_instructor() {
    let user_id = "123e4567-e89b-12d3-a456-426614174000";
    let token = token_for(user_id, "instructor", 9999999999);

    let user = authenticate(&token, SECRET).expect("Valid token should pass");
    assert_eq!(user.user_id.to_string(), user_id);
    assert_eq!(user.role, Role::Instructor);
    assert!(!user.is_admin());
}

#[test]
fn test_authenticate_maps_service_role_to_admin() {
    let token = token_for("123e4567-e89b-12d3-a456-426614174000", "service_role", 9999999999);

    let user = authenticate(&token, SECRET).unwrap();
    assert!(user.is_admin());
}

#[test]
fn test_validate_jwt_expired() {
    let token = token_for("123e4567-e89b-12d3-a456-426614174000", "consumer", 1);

    assert!(validate_jwt(&token, SECRET).is_err());
}

#[test]
fn test_validate_jwt_wrong_secret() {
    let token = token_for("123e4567-e89b-12d3-a456-426614174000", "consumer", 9999999999);

    assert!(validate_jwt(&token, "another-secret-of-sufficient-length").is_err());
}

#[test]
fn test_authenticate_rejects_non_uuid_subject() {
    let token = token_for("not-a-uuid", "consumer", 9999999999);

    assert!(authenticate(&token, SECRET).is_err());
}

#[test]
fn test_authenticate_rejects_unknown_role() {
    let token = token_for("123e4567-e89b-12d3-a456-426614174000", "janitor", 9999999999);

    assert!(authenticate(&token, SECRET).is_err());
}
