//! The TLS callback boundary.
//!
//! The TLS library calls into the manager once per session ticket, either to
//! issue one or to resume from one. Everything that crosses that boundary is
//! defined here: the 16-byte ticket name field, the outcome codes, and the
//! trait through which the caller's cipher and HMAC contexts are initialised.
//!
//! ## Name field layout
//!
//! ```text
//! [ key name (4 bytes) ][ salt (12 bytes) ]
//! ```
//!
//! The key name identifies the base key; the salt is what makes the
//! per-ticket key unique. The salt is generated at 12 bytes and stored whole.

use std::fmt;

use crate::crypto::{CIPHER_KEY_LEN, HMAC_KEY_LEN, IV_LEN};
use crate::error::TicketKeyError;
use crate::keys::{KeyName, KEY_NAME_LEN};

/// Width of the TLS ticket key name field.
pub const TICKET_NAME_LEN: usize = 16;

/// Width of the per-ticket salt embedded after the key name.
pub const SALT_LEN: usize = TICKET_NAME_LEN - KEY_NAME_LEN;

/// The contents of a ticket's key name field.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TicketName([u8; TICKET_NAME_LEN]);

impl TicketName {
    /// Build the name field from a base key name and a salt.
    pub fn compose(key_name: &KeyName, salt: &[u8; SALT_LEN]) -> Self {
        let mut bytes = [0u8; TICKET_NAME_LEN];
        bytes[..KEY_NAME_LEN].copy_from_slice(key_name.as_bytes());
        bytes[KEY_NAME_LEN..].copy_from_slice(salt);
        Self(bytes)
    }

    /// Wrap a raw name field as received from the TLS layer.
    pub fn from_bytes(bytes: [u8; TICKET_NAME_LEN]) -> Self {
        Self(bytes)
    }

    /// Wrap a slice, returning `None` unless it is exactly
    /// [`TICKET_NAME_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    /// The base key name in the leading bytes.
    pub fn key_name(&self) -> KeyName {
        let mut name = [0u8; KEY_NAME_LEN];
        name.copy_from_slice(&self.0[..KEY_NAME_LEN]);
        KeyName::from_bytes(name)
    }

    /// The salt in the trailing bytes.
    pub fn salt(&self) -> [u8; SALT_LEN] {
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&self.0[KEY_NAME_LEN..]);
        salt
    }

    pub fn as_bytes(&self) -> &[u8; TICKET_NAME_LEN] {
        &self.0
    }
}

impl fmt::Debug for TicketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TicketName({})", hex::encode(self.0))
    }
}

/// What the TLS layer should do after a ticket callback.
///
/// The numeric values are the callback return codes understood by TLS
/// libraries and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketOutcome {
    /// Keys are installed; proceed with the ticket.
    Handled,
    /// No key available (unknown name on decrypt, no active key on
    /// encrypt). Fall back to default behaviour for this session.
    NotHandled,
    /// Decrypted with a non-current key; issue a fresh ticket.
    Renew,
    /// Internal failure. Abandon ticket use for this session only.
    Fatal,
}

impl TicketOutcome {
    /// The raw callback return code.
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Handled => 1,
            Self::NotHandled => 0,
            Self::Renew => 2,
            Self::Fatal => -1,
        }
    }
}

/// Which way a cipher context is being initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherDirection {
    Encrypt,
    Decrypt,
}

/// The caller-owned cipher and HMAC contexts.
///
/// The manager only supplies key bytes and the IV. The MAC and cipher
/// computations themselves belong to the implementor.
pub trait TicketContext {
    /// Key the HMAC-SHA256 context that authenticates the ticket.
    fn init_hmac(&mut self, key: &[u8; HMAC_KEY_LEN]) -> Result<(), TicketKeyError>;

    /// Key the cipher context that protects the session state.
    fn init_cipher(
        &mut self,
        key: &[u8; CIPHER_KEY_LEN],
        iv: &[u8; IV_LEN],
        direction: CipherDirection,
    ) -> Result<(), TicketKeyError>;
}

/// Session ticket encryption and decryption, as seen by a TLS library.
pub trait TicketHandler {
    /// Pick an active key, fill in `name` and `iv`, and key `ctx` for a new
    /// ticket.
    fn encrypt_ticket(
        &mut self,
        name: &mut TicketName,
        iv: &mut [u8; IV_LEN],
        ctx: &mut dyn TicketContext,
    ) -> TicketOutcome;

    /// Resolve `name` to a known key and key `ctx` to open the ticket.
    fn decrypt_ticket(
        &mut self,
        name: &TicketName,
        iv: &[u8; IV_LEN],
        ctx: &mut dyn TicketContext,
    ) -> TicketOutcome;

    /// Single-entry dispatch in the shape TLS libraries call.
    ///
    /// `name` is written on encrypt and read on decrypt; likewise `iv`.
    /// Returns the raw outcome code (see [`TicketOutcome::as_raw`]).
    fn ticket_callback(
        &mut self,
        encrypt: bool,
        name: &mut [u8; TICKET_NAME_LEN],
        iv: &mut [u8; IV_LEN],
        ctx: &mut dyn TicketContext,
    ) -> i32 {
        let outcome = if encrypt {
            let mut ticket_name = TicketName::from_bytes(*name);
            let outcome = self.encrypt_ticket(&mut ticket_name, iv, ctx);
            *name = *ticket_name.as_bytes();
            outcome
        } else {
            self.decrypt_ticket(&TicketName::from_bytes(*name), iv, ctx)
        };
        outcome.as_raw()
    }
}
