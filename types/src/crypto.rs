//! Keys, addresses and signatures.
//!
//! Public keys are a closed set of schemes ([PublicKey]); verification, address derivation
//! and (in the execution crate) gas pricing are exhaustive matches over it.

use bytes::{Buf, BufMut};
use commonware_codec::{
    DecodeExt, Encode, EncodeSize, Error, FixedSize, RangeCfg, Read, ReadExt, ReadRangeExt,
    Write,
};
use commonware_cryptography::{
    ed25519,
    sha256::{Digest, Sha256},
    Hasher, Signer, Verifier,
};
use commonware_utils::hex;
use k256::ecdsa::{
    signature::{Signer as EcdsaSigner, Verifier as EcdsaVerifier},
    Signature as EcdsaSignature, SigningKey, VerifyingKey,
};
use std::fmt;

pub const ADDRESS_LENGTH: usize = 20;
pub const SECP256K1_PUBLIC_KEY_LENGTH: usize = 33;
pub const MAX_MULTISIG_MEMBERS: usize = 64;
pub const MAX_SIGNATURE_LENGTH: usize = 4096;

/// Domain separator used when deriving development keys from a seed.
const KEY_SEED_DOMAIN: &[u8] = b"_TURNSTILE_KEY";

/// Account address: the first 20 bytes of a SHA-256 over the key material.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    fn from_digest(digest: &Digest) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest.as_ref()[..ADDRESS_LENGTH]);
        Self(bytes)
    }

    pub fn hash_of(data: &[u8]) -> Self {
        Self::from_digest(&Sha256::hash(data))
    }

    /// Parse a 40-character hex string (an optional `0x` prefix is accepted).
    pub fn from_hex(value: &str) -> Option<Self> {
        let bytes = commonware_utils::from_hex_formatted(value)?;
        let bytes: [u8; ADDRESS_LENGTH] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Write for Address {
    fn write(&self, writer: &mut impl BufMut) {
        self.0.write(writer);
    }
}

impl Read for Address {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self(<[u8; ADDRESS_LENGTH]>::read(reader)?))
    }
}

impl FixedSize for Address {
    const SIZE: usize = ADDRESS_LENGTH;
}

/// Compressed SEC1 encoding of a secp256k1 point.
///
/// Stored as raw bytes; the point is only parsed when a signature is verified, so a key that
/// is not on the curve simply never verifies.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Secp256k1PublicKey([u8; SECP256K1_PUBLIC_KEY_LENGTH]);

impl Secp256k1PublicKey {
    pub const fn from_bytes(bytes: [u8; SECP256K1_PUBLIC_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_sec1_bytes(&self.0) else {
            return false;
        };
        let Ok(signature) = EcdsaSignature::from_slice(signature) else {
            return false;
        };
        key.verify(message, &signature).is_ok()
    }
}

impl AsRef<[u8]> for Secp256k1PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Secp256k1PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secp256k1PublicKey({})", hex(&self.0))
    }
}

impl Write for Secp256k1PublicKey {
    fn write(&self, writer: &mut impl BufMut) {
        self.0.write(writer);
    }
}

impl Read for Secp256k1PublicKey {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self(<[u8; SECP256K1_PUBLIC_KEY_LENGTH]>::read(reader)?))
    }
}

impl FixedSize for Secp256k1PublicKey {
    const SIZE: usize = SECP256K1_PUBLIC_KEY_LENGTH;
}

/// A k-of-n threshold key. Members are single-scheme keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ThresholdPublicKey {
    threshold: u32,
    members: Vec<PublicKey>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ThresholdKeyError {
    #[error("threshold must be in 1..={members} (got {threshold})")]
    InvalidThreshold { threshold: u32, members: usize },
    #[error("too many members: {0}")]
    TooManyMembers(usize),
    #[error("nested threshold keys are not supported")]
    Nested,
}

impl ThresholdPublicKey {
    pub fn new(threshold: u32, members: Vec<PublicKey>) -> Result<Self, ThresholdKeyError> {
        if members.len() > MAX_MULTISIG_MEMBERS {
            return Err(ThresholdKeyError::TooManyMembers(members.len()));
        }
        if threshold == 0 || threshold as usize > members.len() {
            return Err(ThresholdKeyError::InvalidThreshold {
                threshold,
                members: members.len(),
            });
        }
        if members
            .iter()
            .any(|member| matches!(member, PublicKey::Threshold(_)))
        {
            return Err(ThresholdKeyError::Nested);
        }
        Ok(Self { threshold, members })
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn members(&self) -> &[PublicKey] {
        &self.members
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(multisig) = Multisignature::decode(signature) else {
            return false;
        };
        let size = multisig.bitmap.size();
        if size != self.members.len() {
            return false;
        }
        let included = multisig.bitmap.count_ones();
        if included < self.threshold as usize || multisig.sigs.len() != included {
            return false;
        }
        let mut partials = multisig.sigs.iter();
        for (index, member) in self.members.iter().enumerate() {
            if !multisig.bitmap.get_index(index) {
                continue;
            }
            let Some(partial) = partials.next() else {
                return false;
            };
            if !member.verify_bytes(message, partial) {
                return false;
            }
        }
        true
    }
}

impl Write for ThresholdPublicKey {
    fn write(&self, writer: &mut impl BufMut) {
        self.threshold.write(writer);
        (self.members.len() as u32).write(writer);
        for member in &self.members {
            member.write(writer);
        }
    }
}

impl Read for ThresholdPublicKey {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let threshold = u32::read(reader)?;
        let count = u32::read(reader)? as usize;
        if count > MAX_MULTISIG_MEMBERS {
            return Err(Error::Invalid("ThresholdPublicKey", "too many members"));
        }
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            members.push(PublicKey::read_single(reader)?);
        }
        Self::new(threshold, members)
            .map_err(|_| Error::Invalid("ThresholdPublicKey", "invalid threshold"))
    }
}

impl EncodeSize for ThresholdPublicKey {
    fn encode_size(&self) -> usize {
        u32::SIZE
            + u32::SIZE
            + self
                .members
                .iter()
                .map(EncodeSize::encode_size)
                .sum::<usize>()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PublicKey {
    Ed25519(ed25519::PublicKey),
    Secp256k1(Secp256k1PublicKey),
    Threshold(ThresholdPublicKey),
}

impl PublicKey {
    pub fn address(&self) -> Address {
        match self {
            Self::Ed25519(key) => Address::hash_of(key.as_ref()),
            Self::Secp256k1(key) => Address::hash_of(key.as_ref()),
            Self::Threshold(key) => Address::hash_of(&key.encode()),
        }
    }

    /// Verify `signature` over `message`. Threshold keys expect an encoded [Multisignature].
    pub fn verify_bytes(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            Self::Ed25519(key) => {
                let Ok(signature) = ed25519::Signature::decode(signature) else {
                    return false;
                };
                key.verify(None, message, &signature)
            }
            Self::Secp256k1(key) => key.verify(message, signature),
            Self::Threshold(key) => key.verify(message, signature),
        }
    }

    fn read_single(reader: &mut impl Buf) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Ed25519(ed25519::PublicKey::read(reader)?)),
            1 => Ok(Self::Secp256k1(Secp256k1PublicKey::read(reader)?)),
            2 => Err(Error::Invalid("PublicKey", "nested threshold key")),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex(&self.encode()))
    }
}

impl Write for PublicKey {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Ed25519(key) => {
                0u8.write(writer);
                key.write(writer);
            }
            Self::Secp256k1(key) => {
                1u8.write(writer);
                key.write(writer);
            }
            Self::Threshold(key) => {
                2u8.write(writer);
                key.write(writer);
            }
        }
    }
}

impl Read for PublicKey {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        if !reader.has_remaining() {
            return Err(Error::EndOfBuffer);
        }
        if reader.chunk()[0] == 2 {
            reader.advance(1);
            return Ok(Self::Threshold(ThresholdPublicKey::read(reader)?));
        }
        Self::read_single(reader)
    }
}

impl EncodeSize for PublicKey {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Ed25519(_) => ed25519::PublicKey::SIZE,
                Self::Secp256k1(_) => Secp256k1PublicKey::SIZE,
                Self::Threshold(key) => key.encode_size(),
            }
    }
}

/// Bit array selecting which threshold members signed (MSB-first within each byte).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompactBitArray {
    bits: u32,
    elems: Vec<u8>,
}

impl CompactBitArray {
    pub fn new(bits: usize) -> Self {
        Self {
            bits: bits as u32,
            elems: vec![0u8; bits.div_ceil(8)],
        }
    }

    pub fn from_bools(values: &[bool]) -> Self {
        let mut array = Self::new(values.len());
        for (index, value) in values.iter().enumerate() {
            array.set_index(index, *value);
        }
        array
    }

    pub fn size(&self) -> usize {
        self.bits as usize
    }

    pub fn get_index(&self, index: usize) -> bool {
        if index >= self.size() {
            return false;
        }
        self.elems[index / 8] & (1 << (7 - index % 8)) != 0
    }

    /// Returns false if `index` is out of range.
    pub fn set_index(&mut self, index: usize, value: bool) -> bool {
        if index >= self.size() {
            return false;
        }
        let mask = 1 << (7 - index % 8);
        if value {
            self.elems[index / 8] |= mask;
        } else {
            self.elems[index / 8] &= !mask;
        }
        true
    }

    pub fn count_ones(&self) -> usize {
        (0..self.size()).filter(|index| self.get_index(*index)).count()
    }

    /// Number of set bits strictly before `index`.
    pub fn ones_before(&self, index: usize) -> usize {
        (0..index.min(self.size()))
            .filter(|i| self.get_index(*i))
            .count()
    }
}

impl Write for CompactBitArray {
    fn write(&self, writer: &mut impl BufMut) {
        self.bits.write(writer);
        writer.put_slice(&self.elems);
    }
}

impl Read for CompactBitArray {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let bits = u32::read(reader)?;
        if bits as usize > MAX_MULTISIG_MEMBERS {
            return Err(Error::Invalid("CompactBitArray", "too many bits"));
        }
        let len = (bits as usize).div_ceil(8);
        if reader.remaining() < len {
            return Err(Error::EndOfBuffer);
        }
        let mut elems = vec![0u8; len];
        reader.copy_to_slice(&mut elems);
        Ok(Self { bits, elems })
    }
}

impl EncodeSize for CompactBitArray {
    fn encode_size(&self) -> usize {
        u32::SIZE + self.elems.len()
    }
}

/// Signature payload for a [ThresholdPublicKey]: one partial signature per set bit, in
/// bitmap order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Multisignature {
    pub bitmap: CompactBitArray,
    pub sigs: Vec<Vec<u8>>,
}

impl Multisignature {
    pub fn new(members: usize) -> Self {
        Self {
            bitmap: CompactBitArray::new(members),
            sigs: Vec::new(),
        }
    }

    /// Record `signature` for member `index`, keeping partials in bitmap order.
    pub fn add_signature(&mut self, index: usize, signature: Vec<u8>) {
        let position = self.bitmap.ones_before(index);
        if self.bitmap.get_index(index) {
            self.sigs[position] = signature;
            return;
        }
        if self.bitmap.set_index(index, true) {
            self.sigs.insert(position, signature);
        }
    }
}

impl Write for Multisignature {
    fn write(&self, writer: &mut impl BufMut) {
        self.bitmap.write(writer);
        self.sigs.write(writer);
    }
}

impl Read for Multisignature {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let bitmap = CompactBitArray::read(reader)?;
        let sigs = Vec::<Vec<u8>>::read_cfg(
            reader,
            &(
                RangeCfg::from(0..=MAX_MULTISIG_MEMBERS),
                (RangeCfg::from(0..=MAX_SIGNATURE_LENGTH), ()),
            ),
        )?;
        Ok(Self { bitmap, sigs })
    }
}

impl EncodeSize for Multisignature {
    fn encode_size(&self) -> usize {
        self.bitmap.encode_size() + self.sigs.encode_size()
    }
}

/// Signing half of a single-scheme key.
#[derive(Clone)]
pub enum PrivateKey {
    Ed25519(ed25519::PrivateKey),
    Secp256k1(SigningKey),
}

fn seeded_bytes(seed: u64, attempt: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(KEY_SEED_DOMAIN);
    hasher.update(&seed.to_be_bytes());
    hasher.update(&attempt.to_be_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(digest.as_ref());
    bytes
}

impl PrivateKey {
    /// Deterministic Ed25519 key for tests and local tooling.
    pub fn ed25519_from_seed(seed: u64) -> Self {
        let mut attempt = 0;
        loop {
            let bytes = seeded_bytes(seed, attempt);
            if let Ok(key) = ed25519::PrivateKey::decode(bytes.as_ref()) {
                return Self::Ed25519(key);
            }
            attempt += 1;
        }
    }

    /// Deterministic secp256k1 key for tests and local tooling.
    pub fn secp256k1_from_seed(seed: u64) -> Self {
        let mut attempt = 0;
        loop {
            // Retries only if the digest is not a valid scalar.
            if let Ok(key) = SigningKey::from_slice(&seeded_bytes(seed, attempt)) {
                return Self::Secp256k1(key);
            }
            attempt += 1;
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Ed25519(key) => PublicKey::Ed25519(key.public_key()),
            Self::Secp256k1(key) => {
                let point = key.verifying_key().to_encoded_point(true);
                let mut bytes = [0u8; SECP256K1_PUBLIC_KEY_LENGTH];
                bytes.copy_from_slice(point.as_bytes());
                PublicKey::Secp256k1(Secp256k1PublicKey(bytes))
            }
        }
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Self::Ed25519(key) => key.sign(None, message).encode().to_vec(),
            Self::Secp256k1(key) => {
                let signature: EcdsaSignature = key.sign(message);
                signature.to_bytes().to_vec()
            }
        }
    }
}
