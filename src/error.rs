//! Errors raised by the OpenPGP pipeline.
//!
//! Functions in this crate return [`anyhow::Result`].  When a caller
//! needs to react to a particular failure, e.g. a cancelled key
//! selection, it downcasts to [`Error`].

use std::path::PathBuf;

/// Errors used in this crate.
///
/// Note: This enum cannot be exhaustively matched to allow future
/// extensions.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The backend could not be started.
    #[error("Failed to run {0}: {1}")]
    SpawnFailure(PathBuf, String),

    /// The backend rejected the passphrase.
    #[error("The passphrase was rejected")]
    PassphraseRejected,

    /// Armored data without an end marker, or no armor at all.
    #[error("Malformed armor: {0}")]
    MalformedArmor(String),

    /// The backend did not produce any plaintext.
    #[error("Decryption failed: the backend produced no output")]
    DecryptionEmptyOutput,

    /// The backend did not produce any ciphertext.
    #[error("Encryption failed: the backend produced no output")]
    EncryptionEmptyOutput,

    /// The backend did not produce a signature.
    #[error("Signing failed: the backend produced no output")]
    SigningEmptyOutput,

    /// No key matches the given address or key ID.
    #[error("No usable key found for {0}")]
    KeyNotFound(String),

    /// The user cancelled the key selection.
    #[error("Key selection cancelled")]
    SelectionCancelled,

    /// The user cancelled a prompt, e.g. for the passphrase.
    #[error("Operation cancelled")]
    Cancelled,

    /// Inline PGP only works on text/plain parts.
    #[error("Inline PGP can't be used on {0} parts")]
    NotTextPlain(String),

    /// A multipart/encrypted part does not have the expected shape.
    #[error("Malformed PGP/MIME message: {0}")]
    MalformedMultipart(String),
}

impl Error {
    /// Returns whether `err` is a user-initiated cancellation.
    ///
    /// Cancellations are reported differently from failures.
    pub fn is_cancellation(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<Error>(),
                 Some(Error::Cancelled) | Some(Error::SelectionCancelled))
    }
}
