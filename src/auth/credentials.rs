use crate::utils::config::AuthConfig;
use anyhow::anyhow;
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version};
use subtle::ConstantTimeEq;

/// Position of the first configured key equal to `candidate`.
///
/// Every configured key is compared in constant time and the scan never stops
/// early, so neither the matching prefix nor the matching position shows up in
/// the timing.
pub fn match_api_key(candidate: &str, keys: &[String]) -> Option<usize> {
    let mut found = None;
    for (index, key) in keys.iter().enumerate() {
        let equal: bool = candidate.as_bytes().ct_eq(key.as_bytes()).into();
        if equal && found.is_none() {
            found = Some(index);
        }
    }
    found
}

/// Argon2id hashing; work runs on the blocking pool
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let params = Params::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
            None,
        )
        .map_err(|err| anyhow!("Invalid argon2 parameters: {err}"))?;
        Ok(Self::new(params))
    }

    pub async fn hash(&self, password: &str) -> anyhow::Result<String> {
        let hasher = self.clone();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || hasher.hash_blocking(&password)).await?
    }

    /// Hash on the calling thread
    pub fn hash_blocking(&self, password: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| anyhow!("Failed to hash password: {err}"))
    }

    /// False for a wrong password and for an unparseable stored hash
    pub async fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let argon2 = self.argon2.clone();
        let password = password.to_owned();
        let stored_hash = stored_hash.to_owned();

        tokio::task::spawn_blocking(move || {
            PasswordHash::new(&stored_hash)
                .map(|parsed| argon2.verify_password(password.as_bytes(), &parsed).is_ok())
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(Params::default())
    }
}
