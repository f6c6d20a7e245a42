//! Low-level cryptographic operations.
//!
//! This module is the only place in the crate that imports `ring`. Key
//! derivation in `keys` goes through the helpers exposed here.
//!
//! Primitive choices:
//! - **Hash**: SHA-256, used for seed identity, hash chaining and
//!   per-ticket key derivation
//! - **Randomness**: `SystemRandom`, for salts and IVs
//! - **Reference ticket sealing**: HMAC-SHA256 over the whole ticket plus
//!   AES-128-GCM for the session state

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM};
use ring::digest::{self, SHA256};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::error::TicketKeyError;
use crate::ticket::{CipherDirection, TicketContext, TicketName, TICKET_NAME_LEN};

/// Width of a SHA-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Width of the ticket IV in bytes (one AES block).
pub const IV_LEN: usize = 16;

/// Width of the HMAC half of a per-ticket key.
pub const HMAC_KEY_LEN: usize = 16;

/// Width of the cipher half of a per-ticket key.
pub const CIPHER_KEY_LEN: usize = 16;

/// Length of the HMAC-SHA256 tag appended by [`SealingContext::seal`].
pub const MAC_LEN: usize = 32;

/// GCM nonce width; the leading bytes of the ticket IV are used.
const GCM_NONCE_LEN: usize = 12;

/// SHA-256 of the concatenation of `parts`.
pub fn sha256(parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut ctx = digest::Context::new(&SHA256);
    for part in parts {
        ctx.update(part);
    }
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(ctx.finish().as_ref());
    out
}

/// Hash `input` forward `n` times, feeding each digest into the next round.
///
/// `n == 0` is treated as a single round; a zero-length chain has no
/// fixed-width output to return.
pub fn hash_nth(input: &[u8], n: u32) -> Zeroizing<[u8; DIGEST_LEN]> {
    let mut out = Zeroizing::new(sha256(&[input]));
    for _ in 1..n {
        *out = sha256(&[&out[..]]);
    }
    out
}

/// Fill `buf` from the system CSPRNG.
///
/// A fresh `SystemRandom` per call, matching the rest of the crate; there
/// is no cached generator state.
pub fn fill_random(buf: &mut [u8]) -> Result<(), TicketKeyError> {
    SystemRandom::new()
        .fill(buf)
        .map_err(|_| TicketKeyError::RandomnessFailure)
}

/// Split a sealed ticket into the name field and IV the decrypt path needs.
///
/// Returns `None` when the blob is too short to hold both.
pub fn split_ticket(ticket: &[u8]) -> Option<(TicketName, [u8; IV_LEN])> {
    if ticket.len() < TICKET_NAME_LEN + IV_LEN {
        return None;
    }
    let name = TicketName::from_slice(&ticket[..TICKET_NAME_LEN])?;
    let iv: [u8; IV_LEN] = ticket[TICKET_NAME_LEN..TICKET_NAME_LEN + IV_LEN]
        .try_into()
        .ok()?;
    Some((name, iv))
}

// ---------------------------------------------------------------------------
// Reference ticket context
// ---------------------------------------------------------------------------

/// A [`TicketContext`] backed by `ring`.
///
/// The TLS library normally owns the cipher and HMAC contexts. This type
/// stands in for them so session state can be carried through a ticket
/// without a TLS stack.
///
/// # Ticket layout
/// ```text
/// [ name (16) ][ iv (16) ][ AES-128-GCM(state) + tag ][ HMAC-SHA256 (32) ]
/// ```
/// The MAC covers everything before it.
#[derive(Default)]
pub struct SealingContext {
    mac_key: Option<hmac::Key>,
    cipher: Option<(LessSafeKey, [u8; IV_LEN], CipherDirection)>,
}

impl SealingContext {
    /// An uninitialised context. Both halves must be set through
    /// [`TicketContext`] before sealing or opening.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once both the HMAC and cipher halves are initialised.
    pub fn is_ready(&self) -> bool {
        self.mac_key.is_some() && self.cipher.is_some()
    }

    /// Seal `state` into a complete ticket under `name`.
    ///
    /// The context must have been initialised for encryption.
    pub fn seal(&self, name: &TicketName, state: &[u8]) -> Result<Vec<u8>, TicketKeyError> {
        let (mac_key, cipher, iv) = match (&self.mac_key, &self.cipher) {
            (Some(mac_key), Some((cipher, iv, CipherDirection::Encrypt))) => (mac_key, cipher, iv),
            _ => return Err(TicketKeyError::SealFailure),
        };

        let mut body = state.to_vec();
        cipher
            .seal_in_place_append_tag(nonce_from_iv(iv)?, Aad::from(name.as_bytes()), &mut body)
            .map_err(|_| TicketKeyError::SealFailure)?;

        let mut ticket = Vec::with_capacity(TICKET_NAME_LEN + IV_LEN + body.len() + MAC_LEN);
        ticket.extend_from_slice(name.as_bytes());
        ticket.extend_from_slice(iv);
        ticket.extend_from_slice(&body);

        let tag = hmac::sign(mac_key, &ticket);
        ticket.extend_from_slice(tag.as_ref());
        Ok(ticket)
    }

    /// Verify and decrypt a ticket produced by [`seal`](Self::seal).
    ///
    /// The context must have been initialised for decryption with the IV
    /// carried in `ticket`. The MAC is checked before any decryption.
    pub fn open(&self, ticket: &[u8]) -> Result<Vec<u8>, TicketKeyError> {
        let (mac_key, cipher, iv) = match (&self.mac_key, &self.cipher) {
            (Some(mac_key), Some((cipher, iv, CipherDirection::Decrypt))) => (mac_key, cipher, iv),
            _ => return Err(TicketKeyError::OpenFailure),
        };

        let header_len = TICKET_NAME_LEN + IV_LEN;
        if ticket.len() < header_len + aead::AES_128_GCM.tag_len() + MAC_LEN {
            return Err(TicketKeyError::OpenFailure);
        }

        let (signed, tag) = ticket.split_at(ticket.len() - MAC_LEN);
        hmac::verify(mac_key, signed, tag).map_err(|_| TicketKeyError::OpenFailure)?;

        if signed[TICKET_NAME_LEN..header_len] != iv[..] {
            return Err(TicketKeyError::OpenFailure);
        }

        let name = &signed[..TICKET_NAME_LEN];
        let mut body = signed[header_len..].to_vec();
        let plaintext = cipher
            .open_in_place(nonce_from_iv(iv)?, Aad::from(name), &mut body)
            .map_err(|_| TicketKeyError::OpenFailure)?;
        Ok(plaintext.to_vec())
    }
}

impl TicketContext for SealingContext {
    fn init_hmac(&mut self, key: &[u8; HMAC_KEY_LEN]) -> Result<(), TicketKeyError> {
        self.mac_key = Some(hmac::Key::new(hmac::HMAC_SHA256, key));
        Ok(())
    }

    fn init_cipher(
        &mut self,
        key: &[u8; CIPHER_KEY_LEN],
        iv: &[u8; IV_LEN],
        direction: CipherDirection,
    ) -> Result<(), TicketKeyError> {
        let unbound =
            UnboundKey::new(&AES_128_GCM, key).map_err(|_| TicketKeyError::ContextInitFailure)?;
        self.cipher = Some((LessSafeKey::new(unbound), *iv, direction));
        Ok(())
    }
}

fn nonce_from_iv(iv: &[u8; IV_LEN]) -> Result<Nonce, TicketKeyError> {
    let bytes: [u8; GCM_NONCE_LEN] = iv[..GCM_NONCE_LEN]
        .try_into()
        .map_err(|_| TicketKeyError::KeyDerivationFailure)?;
    Ok(Nonce::assume_unique_for_key(bytes))
}
