// PassGuard — Crypto Module
//
// Three distinct concerns: reversible protection of stored system secrets
// (cipher), one-way hashing of account passwords (password), and signed
// bearer tokens for the gateway (token).

mod cipher;
mod password;
mod token;

pub use cipher::CredentialCipher;
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenSigner};
