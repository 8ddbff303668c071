// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identities and their two derived forms: the branch token and the
//! canonical signing-key fingerprint.
//!
//! An identity is nothing but its raw public-key material. The branch token
//! is a reversible base32 encoding of that material, restricted to
//! characters which are legal inside a git ref name, with padding stripped.
//! The fingerprint is the `SHA256:`-tagged digest of the decoded key blob,
//! rendered exactly the way the signature-verification primitive reports
//! the key a commit was signed with. Both forms are pure derivations and
//! are never stored as truth on their own.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Algorithm tag of the signing keys this system manages.
pub const KEY_ALGORITHM: &str = "ssh-ed25519";

/// Raw public-key material of one identity.
///
/// Holds the base64 key body as it appears after the algorithm tag in an
/// SSH public-key line. Identities are compared by this material alone.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    pub fn new(material: impl Into<String>) -> Self {
        Self(material.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode the key material as a branch-name-safe token.
    ///
    /// Deterministic and reversible; the base32 alphabet contains no
    /// characters which are illegal in a ref name and padding is stripped.
    pub fn to_token(&self) -> String {
        BASE32_NOPAD.encode(self.0.as_bytes())
    }

    /// Decode a branch token back into key material.
    pub fn from_token(token: &str) -> Result<Self, EncodingError> {
        let bytes = BASE32_NOPAD.decode(token.as_bytes())?;
        let material = String::from_utf8(bytes)?;
        Ok(Self(material))
    }

    /// Canonical fingerprint of the key material.
    ///
    /// The digest is computed over the decoded key blob, not over its
    /// base64 text form, so any encoding of the same key bytes yields an
    /// identical fingerprint. Signature checks rely on this property.
    pub fn fingerprint(&self) -> Result<Fingerprint, EncodingError> {
        let blob = STANDARD.decode(self.0.as_bytes())?;
        let digest = Sha256::digest(&blob);
        Ok(Fingerprint(format!(
            "SHA256:{}",
            STANDARD_NO_PAD.encode(digest)
        )))
    }
}

impl fmt::Display for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyMaterial").field(&self.0).finish()
    }
}

/// `SHA256:`-tagged, padding-stripped digest of a public key blob.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Fingerprint {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<String> for Fingerprint {
    fn eq(&self, other: &String) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error types for identity token and key material codecs.
#[derive(Error, Debug)]
pub enum EncodingError {
    /// Token is not valid padding-free base32.
    #[error("invalid base32 encoding in identity token")]
    InvalidToken(#[from] data_encoding::DecodeError),

    /// Token decodes to bytes which are not a UTF-8 key body.
    #[error("identity token does not decode to valid key material")]
    InvalidTokenBytes(#[from] std::string::FromUtf8Error),

    /// Key material is not a valid base64 key blob.
    #[error("invalid base64 encoding in key material")]
    InvalidKeyMaterial(#[from] base64::DecodeError),
}
