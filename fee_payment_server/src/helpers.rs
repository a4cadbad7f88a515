use std::str::FromStr;

use actix_web::{HttpMessage, HttpRequest};
use fee_payment_engine::db_types::{Principal, Role};
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

use crate::errors::{AuthError, ServerError};

pub const USER_ID_HEADER: &str = "fps-user-id";
pub const ROLES_HEADER: &str = "fps-roles";
pub const SIGNATURE_HEADER: &str = "fps-signature";

type HmacSha256 = Hmac<Sha256>;

/// The signature the gateway attaches to a forwarded identity: hex-encoded HMAC-SHA256 of `"{user_id}:{roles}"`.
pub fn calculate_signature(secret: &str, user_id: &str, roles: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(e) => {
            // HMAC accepts keys of any length, so this cannot happen
            error!("💻️ Could not initialise HMAC. {e}");
            return String::default();
        },
    };
    mac.update(user_id.as_bytes());
    mac.update(b":");
    mac.update(roles.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Checks `signature` against the identity in constant time.
pub fn verify_signature(secret: &str, user_id: &str, roles: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(user_id.as_bytes());
    mac.update(b":");
    mac.update(roles.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Parses a comma-separated role list such as `user,admin`. Blank entries are ignored.
pub fn parse_roles(roles: &str) -> Result<Vec<Role>, AuthError> {
    roles
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Role::from_str(&s.to_ascii_lowercase()).map_err(|_| AuthError::UnknownRole(s.to_string())))
        .collect()
}

/// The caller that the gateway authentication middleware attached to this request.
pub fn caller(req: &HttpRequest) -> Result<Principal, ServerError> {
    req.extensions().get::<Principal>().cloned().ok_or_else(|| {
        warn!("💻️ No authenticated caller found for {}", req.path());
        ServerError::AuthenticationError(AuthError::MissingIdentity(USER_ID_HEADER))
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn signatures_round_trip() {
        let sig = calculate_signature("secret", "trucker_tom", "user");
        assert_eq!(sig.len(), 64);
        assert!(verify_signature("secret", "trucker_tom", "user", &sig));
        assert!(!verify_signature("secret", "trucker_tom", "user,admin", &sig));
        assert!(!verify_signature("other", "trucker_tom", "user", &sig));
        assert!(!verify_signature("secret", "trucker_tom", "user", "not hex"));
    }

    #[test]
    fn role_lists() {
        assert_eq!(parse_roles("user, Admin").unwrap(), vec![Role::User, Role::Admin]);
        assert!(parse_roles("").unwrap().is_empty());
        assert!(matches!(parse_roles("user,root"), Err(AuthError::UnknownRole(r)) if r == "root"));
    }
}
