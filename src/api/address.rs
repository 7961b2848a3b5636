//! Peer identities: BLE device addresses and identity resolving keys.

use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serde")]
use serde_cr as serde;

/// Length in bytes of a BLE device address.
pub const ADDRESS_LEN: usize = 6;

/// How a peer address was assigned. Two addresses with the same bytes but a
/// different type identify different peers.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub enum AddressType {
    #[default]
    Public,
    RandomStatic,
    RandomPrivateResolvable,
    RandomPrivateNonResolvable,
}

impl AddressType {
    /// Decodes the address type code used on the HCI and SoftDevice APIs.
    pub fn from_u8(v: u8) -> Option<AddressType> {
        match v {
            0 => Some(AddressType::Public),
            1 => Some(AddressType::RandomStatic),
            2 => Some(AddressType::RandomPrivateResolvable),
            3 => Some(AddressType::RandomPrivateNonResolvable),
            _ => None,
        }
    }

    pub fn num(&self) -> u8 {
        match *self {
            AddressType::Public => 0,
            AddressType::RandomStatic => 1,
            AddressType::RandomPrivateResolvable => 2,
            AddressType::RandomPrivateNonResolvable => 3,
        }
    }
}

/// A peer's identity on air: six address bytes plus their [`AddressType`].
///
/// `bytes[0]` is the most significant byte, matching the textual form
/// `AA:BB:CC:DD:EE:FF`.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Copy, Clone, Hash, Eq, PartialEq, Default)]
pub struct PeerAddress {
    kind: AddressType,
    bytes: [u8; ADDRESS_LEN],
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ParseAddressError {
    #[error("BLE address has to be 6 bytes long")]
    IncorrectByteCount,
    #[error("Invalid digit in address: {0}")]
    InvalidDigit(#[from] std::num::ParseIntError),
}

impl PeerAddress {
    pub const fn new(kind: AddressType, bytes: [u8; ADDRESS_LEN]) -> Self {
        Self { kind, bytes }
    }

    pub const fn public(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self::new(AddressType::Public, bytes)
    }

    pub const fn random_static(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self::new(AddressType::RandomStatic, bytes)
    }

    pub fn address_type(&self) -> AddressType {
        self.kind
    }

    pub fn bytes(&self) -> [u8; ADDRESS_LEN] {
        self.bytes
    }

    /// Same bytes, different assignment type.
    pub fn with_type(self, kind: AddressType) -> Self {
        Self { kind, ..self }
    }

    /// Only resolvable private addresses can be matched through an identity
    /// resolving key.
    pub fn is_resolvable(&self) -> bool {
        self.kind == AddressType::RandomPrivateResolvable
    }
}

impl Display for PeerAddress {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let a = &self.bytes;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

impl Debug for PeerAddress {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} ({:?})", self, self.kind)
    }
}

impl From<[u8; ADDRESS_LEN]> for PeerAddress {
    /// Treats the bytes as a public address.
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self::public(bytes)
    }
}

impl AsRef<[u8]> for PeerAddress {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl FromStr for PeerAddress {
    type Err = ParseAddressError;

    /// Parses a public address of the form `aa:bb:cc:dd:ee:ff`. Use
    /// [`PeerAddress::with_type`] for other address types.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(':')
            .map(|part| u8::from_str_radix(part, 16))
            .collect::<Result<Vec<u8>, _>>()?;

        let bytes: [u8; ADDRESS_LEN] = parts
            .try_into()
            .map_err(|_| ParseAddressError::IncorrectByteCount)?;
        Ok(Self::public(bytes))
    }
}

/// A 128-bit identity resolving key, used by the radio to recognise peers
/// that advertise with resolvable private addresses.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Copy, Clone, Hash, Eq, PartialEq, Default)]
pub struct IdentityResolvingKey(pub [u8; 16]);

impl Debug for IdentityResolvingKey {
    // Key material stays out of logs.
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("IdentityResolvingKey(..)")
    }
}
