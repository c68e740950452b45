use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tracing::instrument;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

pub struct PasswordService;

impl PasswordService {
    #[instrument(skip(password))]
    pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(password_hash.to_string())
    }

    /// `Ok(false)` for a wrong password; `Err` only when `hash` is not a PHC string.
    #[instrument(skip(password, hash))]
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
        let parsed_hash = PasswordHash::new(hash)?;
        let argon2 = Argon2::default();

        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn check_length(password: &str) -> Result<(), String> {
        let length = password.chars().count();
        if length < MIN_PASSWORD_LENGTH {
            return Err(format!(
                "password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            ));
        }
        if length > MAX_PASSWORD_LENGTH {
            return Err(format!(
                "password must be at most {} characters long",
                MAX_PASSWORD_LENGTH
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = PasswordService::hash_password("correct horse battery").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(PasswordService::verify_password("correct horse battery", &hash).unwrap());
        assert!(!PasswordService::verify_password("wrong horse battery", &hash).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(PasswordService::verify_password("whatever1", "not-a-phc-string").is_err());
    }

    #[test]
    fn length_bounds() {
        assert!(PasswordService::check_length("short").is_err());
        assert!(PasswordService::check_length("long enough").is_ok());
        assert!(PasswordService::check_length(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }
}
