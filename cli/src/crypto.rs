//! Account primitives for the Algorand ledger.
//!
//! # Addresses
//! An account address is the base32 (RFC 4648, no padding) encoding of the
//! 32-byte ed25519 public key followed by a 4-byte checksum: the **last** four
//! bytes of `SHA-512/256(public_key)`.  The result is always 58 characters.
//!
//! # Mnemonics
//! A 25-word mnemonic encodes the 32-byte ed25519 seed as 24 words of 11 bits
//! each (little-endian bit order, taken from the BIP-39 English word list)
//! plus one checksum word derived from the first two bytes of
//! `SHA-512/256(seed)`.
//!
//! # Hashing
//! Every ledger hash (transaction ids, group ids, address checksums) is
//! SHA-512 truncated to 256 bits with the SHA-512/256 initial values, which
//! is **not** the same as taking the first half of a SHA-512 digest.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use bip39::Language;
use data_encoding::BASE32_NOPAD;
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha512_256};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Length of an encoded account address.
pub const ADDRESS_LEN: usize = 58;

const CHECKSUM_LEN: usize = 4;
const KEY_LEN: usize = 32;
const MNEMONIC_LEN: usize = 25;
const BITS_PER_WORD: u32 = 11;

// ── Hashing ───────────────────────────────────────────────────────────────────

/// SHA-512/256 digest of `data`.
pub fn sha512_256(data: &[u8]) -> [u8; 32] {
    let digest = Sha512_256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

// ── Address ───────────────────────────────────────────────────────────────────

/// A ledger account address (an ed25519 public key, or a program hash for
/// logic-signature escrows).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// The all-zero address, which the encoder treats as "unset".
    pub const ZERO: Address = Address([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// First `n` characters of the encoded address, used in file names and
    /// log lines.
    pub fn short(&self, n: usize) -> String {
        let s = self.to_string();
        s[..n.min(s.len())].to_owned()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hash = sha512_256(&self.0);
        let mut buf = [0u8; KEY_LEN + CHECKSUM_LEN];
        buf[..KEY_LEN].copy_from_slice(&self.0);
        buf[KEY_LEN..].copy_from_slice(&hash[32 - CHECKSUM_LEN..]);
        f.write_str(&BASE32_NOPAD.encode(&buf))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    /// Parse and checksum-verify a 58-character address.
    fn from_str(s: &str) -> Result<Self> {
        if s.len() != ADDRESS_LEN {
            bail!(
                "Invalid address '{}': expected {} characters, got {}",
                s,
                ADDRESS_LEN,
                s.len()
            );
        }

        let decoded = BASE32_NOPAD
            .decode(s.as_bytes())
            .with_context(|| format!("Invalid address '{}': not base32", s))?;
        if decoded.len() != KEY_LEN + CHECKSUM_LEN {
            bail!("Invalid address '{}': decodes to {} bytes", s, decoded.len());
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&decoded[..KEY_LEN]);

        let hash = sha512_256(&key);
        if decoded[KEY_LEN..] != hash[32 - CHECKSUM_LEN..] {
            bail!("Invalid address '{}': checksum mismatch", s);
        }

        Ok(Address(key))
    }
}

// ── Account ───────────────────────────────────────────────────────────────────

/// An ed25519 key pair able to sign transactions.
#[derive(Clone)]
pub struct Account {
    signing_key: SigningKey,
    address: Address,
}

impl Account {
    /// Generate a fresh account from 32 bytes of OS entropy.
    pub fn generate() -> Self {
        let mut seed = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let address = Address(signing_key.verifying_key().to_bytes());
        Account {
            signing_key,
            address,
        }
    }

    /// Recover the account encoded by a 25-word mnemonic.
    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        let seed = mnemonic_to_seed(phrase)?;
        Ok(Self::from_seed(&seed))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn mnemonic(&self) -> String {
        seed_to_mnemonic(&self.signing_key.to_bytes())
    }

    /// Sign `message` verbatim.  Callers are responsible for domain prefixes
    /// such as `"TX"`.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let sig: Signature = self.signing_key.sign(message);
        sig.to_bytes()
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

// ── Mnemonic encoding ─────────────────────────────────────────────────────────

/// Encode a 32-byte seed as a 25-word mnemonic.
pub fn seed_to_mnemonic(seed: &[u8; 32]) -> String {
    let words = Language::English.word_list();
    let checksum = checksum_word(seed);

    let mut out: Vec<&str> = to_11_bit(seed)
        .into_iter()
        .map(|idx| words[idx as usize])
        .collect();
    out.push(checksum);
    out.join(" ")
}

/// Decode a 25-word mnemonic to the 32-byte seed it encodes.
///
/// # Errors
/// Wrong word count, a word outside the English list, non-zero padding bits,
/// or a checksum word that does not match the seed.
pub fn mnemonic_to_seed(phrase: &str) -> Result<[u8; 32]> {
    let lowered = phrase.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    if words.len() != MNEMONIC_LEN {
        bail!(
            "Mnemonic must contain {} words, got {}",
            MNEMONIC_LEN,
            words.len()
        );
    }

    let mut indices = Vec::with_capacity(MNEMONIC_LEN - 1);
    for word in &words[..MNEMONIC_LEN - 1] {
        let idx = Language::English
            .find_word(word)
            .with_context(|| format!("Unknown mnemonic word '{}'", word))?;
        indices.push(idx);
    }

    // 24 words × 11 bits = 264 bits: 32 key bytes plus one byte of zero padding.
    let bytes = from_11_bit(&indices);
    if bytes.len() != KEY_LEN + 1 || bytes[KEY_LEN] != 0 {
        bail!("Mnemonic checksum failed: malformed key bits");
    }

    let mut seed = [0u8; KEY_LEN];
    seed.copy_from_slice(&bytes[..KEY_LEN]);

    if checksum_word(&seed) != words[MNEMONIC_LEN - 1] {
        bail!("Mnemonic checksum failed: last word does not match");
    }
    Ok(seed)
}

fn checksum_word(seed: &[u8; 32]) -> &'static str {
    let hash = sha512_256(seed);
    let first = to_11_bit(&hash[..2])[0];
    Language::English.word_list()[first as usize]
}

fn to_11_bit(data: &[u8]) -> Vec<u16> {
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(data.len() * 8 / BITS_PER_WORD as usize + 1);
    for &b in data {
        buffer |= (b as u32) << bits;
        bits += 8;
        if bits >= BITS_PER_WORD {
            out.push((buffer & 0x7ff) as u16);
            buffer >>= BITS_PER_WORD;
            bits -= BITS_PER_WORD;
        }
    }
    if bits != 0 {
        out.push((buffer & 0x7ff) as u16);
    }
    out
}

fn from_11_bit(words: &[u16]) -> Vec<u8> {
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(words.len() * BITS_PER_WORD as usize / 8 + 1);
    for &w in words {
        buffer |= (w as u32) << bits;
        bits += BITS_PER_WORD;
        while bits >= 8 {
            out.push((buffer & 0xff) as u8);
            buffer >>= 8;
            bits -= 8;
        }
    }
    if bits != 0 {
        out.push((buffer & 0xff) as u8);
    }
    out
}
