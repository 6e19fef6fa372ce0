//! The encryption seam for `Encrypted` fields.
//!
//! Key management is outside the core: callers inject a [`FieldCipher`] and the tracker
//! only ever writes its base64 output into events. String values are encrypted as their
//! raw bytes; any other JSON value is encrypted as its compact JSON encoding.

use error_stack::Report;

#[derive(Debug, thiserror::Error)]
#[error("could not encrypt tracked value")]
pub struct EncryptError;

#[derive(Debug, thiserror::Error)]
#[error("could not decrypt tracked value")]
pub struct DecryptError;

/// Encrypts tracked field values for audit events.
///
/// Implementations must be safe for concurrent use; one cipher is shared across all
/// requests of a repository.
pub trait FieldCipher: Send + Sync {
    /// Encrypts `plaintext` and returns the ciphertext in base64.
    fn encrypt(&self, plaintext: &[u8]) -> Result<String, Report<EncryptError>>;

    /// Decrypts base64 `ciphertext` produced by [`encrypt`].
    ///
    /// [`encrypt`]: Self::encrypt
    fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, Report<DecryptError>>;
}

/// Deterministic reversible cipher for tests. Not encryption; never use outside tests.
#[cfg(any(test, feature = "test-util"))]
pub mod testing {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use error_stack::{Report, ResultExt as _};

    use super::{DecryptError, EncryptError, FieldCipher};

    #[derive(Debug, Clone)]
    pub struct XorCipher {
        key: u8,
    }

    impl XorCipher {
        #[must_use]
        pub const fn new(key: u8) -> Self {
            Self { key }
        }
    }

    impl FieldCipher for XorCipher {
        fn encrypt(&self, plaintext: &[u8]) -> Result<String, Report<EncryptError>> {
            let masked: Vec<u8> = plaintext.iter().map(|byte| byte ^ self.key).collect();
            Ok(STANDARD.encode(masked))
        }

        fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, Report<DecryptError>> {
            let masked = STANDARD
                .decode(ciphertext)
                .change_context(DecryptError)
                .attach_printable("ciphertext is not valid base64")?;
            Ok(masked.into_iter().map(|byte| byte ^ self.key).collect())
        }
    }
}
