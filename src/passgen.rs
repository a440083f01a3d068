//! Random password generation
//!
//! Lowercase letters are always in the pool; capitals, digits and special
//! characters are opt-in. Characters are drawn uniformly from the pool with
//! a cryptographically secure RNG.

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::error::{CryptpadError, ErrorCategory, Result};

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const CAPITALS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NUMBERS: &str = "0123456789";
const SPECIAL: &str = "!\"§$%&/()[]{}+*#'-.,><|";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PasswordGenerator {
    pub capitals: bool,
    pub numbers: bool,
    pub special: bool,
}

impl PasswordGenerator {
    pub fn new(capitals: bool, numbers: bool, special: bool) -> Self {
        Self {
            capitals,
            numbers,
            special,
        }
    }

    fn pool(&self) -> Vec<char> {
        let mut pool: Vec<char> = LOWERCASE.chars().collect();
        if self.capitals {
            pool.extend(CAPITALS.chars());
        }
        if self.numbers {
            pool.extend(NUMBERS.chars());
        }
        if self.special {
            pool.extend(SPECIAL.chars());
        }
        pool
    }

    /// Generate a password of `length` characters (not bytes).
    pub fn generate(&self, length: usize) -> Result<Zeroizing<String>> {
        self.generate_with_rng(&mut OsRng, length)
    }

    pub fn generate_with_rng<R>(&self, rng: &mut R, length: usize) -> Result<Zeroizing<String>>
    where
        R: Rng + CryptoRng,
    {
        if length == 0 {
            return Err(CryptpadError::new(
                ErrorCategory::User,
                "password length must be greater than 0",
            ));
        }

        let pool = self.pool();
        let mut password = Zeroizing::new(String::with_capacity(length));
        for _ in 0..length {
            password.push(pool[rng.gen_range(0..pool.len())]);
        }
        Ok(password)
    }
}
