//! Password hashing for the bootstrap admin.
//!
//! # Usage
//!
//! ```bash
//! ac-cli hash-password 'Vx9!kq2#Lm'
//! # then set AGENCIA_ADMIN_PASSWORD_HASH to the printed value
//! ```

use agencia_check_admin::services::{ServiceError, hash_password};

/// Hash `password` with argon2 and print the PHC string.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn hash(password: &str) -> Result<String, ServiceError> {
    let hash = hash_password(password)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{hash}");
    }
    tracing::info!("Set AGENCIA_ADMIN_PASSWORD_HASH to the value above");
    Ok(hash)
}
