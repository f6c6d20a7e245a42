//! Error types for ticket-seeds.
//!
//! Only configuration and primitive failures are errors. A missing key on
//! decrypt, or no active key on encrypt, is a normal outcome reported
//! through [`crate::ticket::TicketOutcome`] and never appears here.

use std::fmt;

use crate::seeds::SeedCategory;

/// The single error type for all ticket-seeds operations.
#[derive(Debug)]
pub enum TicketKeyError {
    /// A seed configuration was rejected because it lists no CURRENT seeds.
    NoCurrentSeeds,

    /// The system's random number generator failed to produce bytes.
    RandomnessFailure,

    /// Derived key material had an unexpected shape.
    KeyDerivationFailure,

    /// The caller's cipher or HMAC context refused the derived keys.
    ContextInitFailure,

    /// Sealing session state into a ticket failed.
    SealFailure,

    /// Opening a ticket failed: wrong key, tampered or truncated blob.
    OpenFailure,

    /// A configured seed was not valid hex.
    InvalidSeedEncoding {
        /// Which list the seed came from.
        category: SeedCategory,
        /// Position of the seed within that list.
        index: usize,
    },

    /// The seed configuration document could not be parsed.
    InvalidConfig(String),

    /// Reading or writing a configuration file failed.
    Io(std::io::Error),
}

impl fmt::Display for TicketKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCurrentSeeds => write!(f, "seed configuration has no current seeds"),
            Self::RandomnessFailure => write!(f, "randomness source failed"),
            Self::KeyDerivationFailure => write!(f, "key derivation failed"),
            Self::ContextInitFailure => write!(f, "ticket context initialisation failed"),
            Self::SealFailure => write!(f, "ticket seal failed"),
            Self::OpenFailure => write!(f, "ticket open failed"),
            Self::InvalidSeedEncoding { category, index } => {
                write!(f, "invalid hex in {} seed #{}", category, index)
            }
            Self::InvalidConfig(reason) => write!(f, "invalid seed configuration: {}", reason),
            Self::Io(err) => write!(f, "seed configuration i/o: {}", err),
        }
    }
}

impl std::error::Error for TicketKeyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TicketKeyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
