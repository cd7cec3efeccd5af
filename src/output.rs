//! Human-readable output.
//!
//! All status output goes to stderr, wrapped to the terminal width.
//! Data, i.e. plaintext, signatures, MIME entities, and key lists,
//! goes to stdout or the file given to `--output`.

pub mod hint;
pub mod pluralize;
pub mod sanitize;
pub mod wrapping;
