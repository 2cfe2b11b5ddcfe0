use crate::{
    codec::{read_string, string_encode_size, write_string},
    coins::Coins,
    crypto::{Address, PrivateKey, PublicKey, MAX_SIGNATURE_LENGTH},
};
use bytes::{Buf, BufMut};
use commonware_codec::{
    Encode, EncodeSize, Error, FixedSize, RangeCfg, Read, ReadExt, ReadRangeExt, Write,
};
use commonware_cryptography::{
    sha256::{Digest, Sha256},
    Hasher,
};
use commonware_utils::union;
use thiserror::Error as ThisError;

/// Domain tag prepended to every sign document.
pub const SIGN_NAMESPACE: &[u8] = b"_TURNSTILE_SIGN";
pub const MAX_BLOCK_TRANSACTIONS: usize = 500;
pub const MAX_MESSAGES: usize = 64;
pub const MAX_SIGNATURES: usize = 64;
pub const MAX_MSG_SIGNERS: usize = 16;
pub const MAX_ROUTE_LENGTH: usize = 32;
pub const MAX_MSG_DATA: usize = 16 * 1024;
pub const MAX_CHAIN_ID_LENGTH: usize = 64;
/// Wire bound only; the admitted memo length is a runtime parameter.
pub const MAX_MEMO_BYTES: usize = 1024;
pub const MAX_UNSUPPORTED_PAYLOAD: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TxError {
    #[error("Tx.GetMsgs() must return at least one message in list")]
    NoMessages,
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("invalid fee amount: {0}")]
    InvalidFee(String),
    #[error("no signers")]
    NoSignatures,
    #[error("wrong number of signers; expected {expected}, got {got}")]
    WrongSignerCount { expected: usize, got: usize },
    #[error("maximum number of characters is {max} but received {got} characters")]
    MemoTooLarge { max: usize, got: usize },
}

/// A business message. The pipeline only needs each message's signers and its stateless checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Msg {
    Send {
        from: Address,
        to: Address,
        amount: Coins,
    },
    Generic {
        route: String,
        signers: Vec<Address>,
        data: Vec<u8>,
    },
}

impl Msg {
    /// Addresses that must sign this message, in order.
    pub fn signers(&self) -> Vec<Address> {
        match self {
            Self::Send { from, .. } => vec![*from],
            Self::Generic { signers, .. } => signers.clone(),
        }
    }

    pub fn validate_basic(&self) -> Result<(), TxError> {
        match self {
            Self::Send { amount, .. } => {
                if amount.is_empty() || !amount.is_valid() {
                    return Err(TxError::InvalidMessage(format!(
                        "send amount must be positive: {amount}"
                    )));
                }
            }
            Self::Generic { route, signers, .. } => {
                let valid_route = !route.is_empty()
                    && route
                        .bytes()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
                if !valid_route {
                    return Err(TxError::InvalidMessage(format!("invalid route: {route:?}")));
                }
                if signers.is_empty() {
                    return Err(TxError::InvalidMessage(format!(
                        "route {route} has no signers"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Write for Msg {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Send { from, to, amount } => {
                0u8.write(writer);
                from.write(writer);
                to.write(writer);
                amount.write(writer);
            }
            Self::Generic {
                route,
                signers,
                data,
            } => {
                1u8.write(writer);
                write_string(route, writer);
                signers.write(writer);
                data.write(writer);
            }
        }
    }
}

impl Read for Msg {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let msg = match u8::read(reader)? {
            0 => Self::Send {
                from: Address::read(reader)?,
                to: Address::read(reader)?,
                amount: Coins::read(reader)?,
            },
            1 => Self::Generic {
                route: read_string(reader, MAX_ROUTE_LENGTH)?,
                signers: Vec::<Address>::read_range(reader, 0..=MAX_MSG_SIGNERS)?,
                data: Vec::<u8>::read_range(reader, 0..=MAX_MSG_DATA)?,
            },
            i => return Err(Error::InvalidEnum(i)),
        };
        Ok(msg)
    }
}

impl EncodeSize for Msg {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Send { amount, .. } => Address::SIZE * 2 + amount.encode_size(),
                Self::Generic {
                    route,
                    signers,
                    data,
                } => string_encode_size(route) + signers.encode_size() + data.encode_size(),
            }
    }
}

/// Declared gas limit and the fee offered for it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fee {
    pub gas: u64,
    pub amount: Coins,
}

impl Fee {
    pub fn new(gas: u64, amount: Coins) -> Self {
        Self { gas, amount }
    }
}

impl Write for Fee {
    fn write(&self, writer: &mut impl BufMut) {
        self.gas.write(writer);
        self.amount.write(writer);
    }
}

impl Read for Fee {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            gas: u64::read(reader)?,
            amount: Coins::read(reader)?,
        })
    }
}

impl EncodeSize for Fee {
    fn encode_size(&self) -> usize {
        u64::SIZE + self.amount.encode_size()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StdSignature {
    /// Only required until the account has a key on record.
    pub pub_key: Option<PublicKey>,
    pub signature: Vec<u8>,
    pub account_number: u64,
    pub sequence: u64,
}

impl Write for StdSignature {
    fn write(&self, writer: &mut impl BufMut) {
        match &self.pub_key {
            Some(key) => {
                true.write(writer);
                key.write(writer);
            }
            None => false.write(writer),
        }
        self.signature.write(writer);
        self.account_number.write(writer);
        self.sequence.write(writer);
    }
}

impl Read for StdSignature {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let pub_key = if bool::read(reader)? {
            Some(PublicKey::read(reader)?)
        } else {
            None
        };
        let signature = Vec::<u8>::read_range(reader, 0..=MAX_SIGNATURE_LENGTH)?;
        let account_number = u64::read(reader)?;
        let sequence = u64::read(reader)?;
        Ok(Self {
            pub_key,
            signature,
            account_number,
            sequence,
        })
    }
}

impl EncodeSize for StdSignature {
    fn encode_size(&self) -> usize {
        bool::SIZE
            + self.pub_key.as_ref().map_or(0, EncodeSize::encode_size)
            + self.signature.encode_size()
            + u64::SIZE * 2
    }
}

/// The canonical document a signer commits to.
pub struct StdSignDoc<'a> {
    pub chain_id: &'a str,
    pub account_number: u64,
    pub sequence: u64,
    pub fee: &'a Fee,
    pub msgs: &'a [Msg],
    pub memo: &'a str,
}

impl StdSignDoc<'_> {
    pub fn bytes(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.encode_size());
        self.write(&mut payload);
        union(SIGN_NAMESPACE, &payload)
    }

    pub fn sign_bytes(
        chain_id: &str,
        account_number: u64,
        sequence: u64,
        fee: &Fee,
        msgs: &[Msg],
        memo: &str,
    ) -> Vec<u8> {
        StdSignDoc {
            chain_id,
            account_number,
            sequence,
            fee,
            msgs,
            memo,
        }
        .bytes()
    }
}

impl Write for StdSignDoc<'_> {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(self.chain_id, writer);
        self.account_number.write(writer);
        self.sequence.write(writer);
        self.fee.write(writer);
        (self.msgs.len() as u32).write(writer);
        for msg in self.msgs {
            msg.write(writer);
        }
        write_string(self.memo, writer);
    }
}

impl EncodeSize for StdSignDoc<'_> {
    fn encode_size(&self) -> usize {
        string_encode_size(self.chain_id)
            + u64::SIZE * 2
            + self.fee.encode_size()
            + u32::SIZE
            + self.msgs.iter().map(EncodeSize::encode_size).sum::<usize>()
            + string_encode_size(self.memo)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StdTx {
    pub msgs: Vec<Msg>,
    pub fee: Fee,
    pub memo: String,
    pub signatures: Vec<StdSignature>,
}

impl StdTx {
    /// Build a transaction signed by `signers` (key, account number, sequence), in signer order.
    pub fn sign(
        chain_id: &str,
        msgs: Vec<Msg>,
        fee: Fee,
        memo: impl Into<String>,
        signers: &[(&PrivateKey, u64, u64)],
    ) -> Self {
        let memo = memo.into();
        let signatures = signers
            .iter()
            .map(|(key, account_number, sequence)| {
                let bytes = StdSignDoc::sign_bytes(
                    chain_id,
                    *account_number,
                    *sequence,
                    &fee,
                    &msgs,
                    &memo,
                );
                StdSignature {
                    pub_key: Some(key.public_key()),
                    signature: key.sign(&bytes),
                    account_number: *account_number,
                    sequence: *sequence,
                }
            })
            .collect();
        Self {
            msgs,
            fee,
            memo,
            signatures,
        }
    }

    /// Signers in message order, each message's own order, first occurrence kept.
    pub fn signers(&self) -> Vec<Address> {
        let mut signers = Vec::new();
        for msg in &self.msgs {
            for signer in msg.signers() {
                if !signers.contains(&signer) {
                    signers.push(signer);
                }
            }
        }
        signers
    }

    pub fn fee_payer(&self) -> Option<Address> {
        self.msgs
            .iter()
            .flat_map(Msg::signers)
            .next()
    }

    /// Sign bytes for signature entry `index`, using the entry's claimed account number and
    /// sequence.
    pub fn sign_bytes(&self, chain_id: &str, index: usize) -> Option<Vec<u8>> {
        let signature = self.signatures.get(index)?;
        Some(StdSignDoc::sign_bytes(
            chain_id,
            signature.account_number,
            signature.sequence,
            &self.fee,
            &self.msgs,
            &self.memo,
        ))
    }

    pub fn validate_basic(&self, max_memo_characters: usize) -> Result<(), TxError> {
        if self.msgs.is_empty() {
            return Err(TxError::NoMessages);
        }
        for msg in &self.msgs {
            msg.validate_basic()?;
        }
        if !self.fee.amount.is_valid() {
            return Err(TxError::InvalidFee(self.fee.amount.to_string()));
        }
        if self.signatures.is_empty() {
            return Err(TxError::NoSignatures);
        }
        let expected = self.signers().len();
        if self.signatures.len() != expected {
            return Err(TxError::WrongSignerCount {
                expected,
                got: self.signatures.len(),
            });
        }
        let characters = self.memo.chars().count();
        if characters > max_memo_characters {
            return Err(TxError::MemoTooLarge {
                max: max_memo_characters,
                got: characters,
            });
        }
        Ok(())
    }
}

impl Write for StdTx {
    fn write(&self, writer: &mut impl BufMut) {
        self.msgs.write(writer);
        self.fee.write(writer);
        write_string(&self.memo, writer);
        self.signatures.write(writer);
    }
}

impl Read for StdTx {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let msgs = Vec::<Msg>::read_range(reader, 0..=MAX_MESSAGES)?;
        let fee = Fee::read(reader)?;
        let memo = read_string(reader, MAX_MEMO_BYTES)?;
        let signatures = Vec::<StdSignature>::read_range(reader, 0..=MAX_SIGNATURES)?;
        Ok(Self {
            msgs,
            fee,
            memo,
            signatures,
        })
    }
}

impl EncodeSize for StdTx {
    fn encode_size(&self) -> usize {
        self.msgs.encode_size()
            + self.fee.encode_size()
            + string_encode_size(&self.memo)
            + self.signatures.encode_size()
    }
}

/// Envelope tag of [Transaction::Std].
pub const STD_TRANSACTION_TAG: u8 = 0;

/// Wire envelope. Only [Transaction::Std] carries signatures the admission pipeline understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    Std(StdTx),
    /// Decoded but never executed. `kind` is never [STD_TRANSACTION_TAG] and `payload` holds at
    /// most [MAX_UNSUPPORTED_PAYLOAD] bytes; [Transaction::unsupported] enforces both so the
    /// encoding decodes back to the same value.
    Unsupported { kind: u8, payload: Vec<u8> },
}

impl Transaction {
    pub fn unsupported(kind: u8, payload: Vec<u8>) -> Option<Self> {
        if kind == STD_TRANSACTION_TAG || payload.len() > MAX_UNSUPPORTED_PAYLOAD {
            return None;
        }
        Some(Self::Unsupported { kind, payload })
    }

    pub fn digest(&self) -> Digest {
        Sha256::hash(&self.encode())
    }

    pub fn as_std(&self) -> Option<&StdTx> {
        match self {
            Self::Std(tx) => Some(tx),
            Self::Unsupported { .. } => None,
        }
    }
}

impl Write for Transaction {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Std(tx) => {
                STD_TRANSACTION_TAG.write(writer);
                tx.write(writer);
            }
            Self::Unsupported { kind, payload } => {
                kind.write(writer);
                payload.write(writer);
            }
        }
    }
}

impl Read for Transaction {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let tx = match u8::read(reader)? {
            STD_TRANSACTION_TAG => Self::Std(StdTx::read(reader)?),
            kind => Self::Unsupported {
                kind,
                payload: Vec::<u8>::read_range(reader, 0..=MAX_UNSUPPORTED_PAYLOAD)?,
            },
        };
        Ok(tx)
    }
}

impl EncodeSize for Transaction {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Std(tx) => tx.encode_size(),
                Self::Unsupported { payload, .. } => payload.encode_size(),
            }
    }
}

/// Read a block of transactions.
pub fn read_transactions(reader: &mut impl Buf) -> Result<Vec<Transaction>, Error> {
    Vec::<Transaction>::read_cfg(reader, &(RangeCfg::from(0..=MAX_BLOCK_TRANSACTIONS), ()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    /// Unset until the account's first verified signature.
    pub pub_key: Option<PublicKey>,
    pub coins: Coins,
    pub sequence: u64,
    pub account_number: u64,
}

impl Account {
    pub fn new(address: Address, account_number: u64, coins: Coins) -> Self {
        Self {
            address,
            pub_key: None,
            coins,
            sequence: 0,
            account_number,
        }
    }
}

impl Write for Account {
    fn write(&self, writer: &mut impl BufMut) {
        self.address.write(writer);
        match &self.pub_key {
            Some(key) => {
                true.write(writer);
                key.write(writer);
            }
            None => false.write(writer),
        }
        self.coins.write(writer);
        self.sequence.write(writer);
        self.account_number.write(writer);
    }
}

impl Read for Account {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let address = Address::read(reader)?;
        let pub_key = if bool::read(reader)? {
            Some(PublicKey::read(reader)?)
        } else {
            None
        };
        Ok(Self {
            address,
            pub_key,
            coins: Coins::read(reader)?,
            sequence: u64::read(reader)?,
            account_number: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Account {
    fn encode_size(&self) -> usize {
        Address::SIZE
            + bool::SIZE
            + self.pub_key.as_ref().map_or(0, EncodeSize::encode_size)
            + self.coins.encode_size()
            + u64::SIZE * 2
    }
}

#[derive(Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Debug)]
pub enum Key {
    /// Account by address (tag 0)
    Account(Address),
    /// Fees collected since genesis (tag 1)
    CollectedFees,
    /// Last committed height (tag 2)
    Commit,
}

impl Write for Key {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Account(address) => {
                0u8.write(writer);
                address.write(writer);
            }
            Self::CollectedFees => 1u8.write(writer),
            Self::Commit => 2u8.write(writer),
        }
    }
}

impl Read for Key {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let key = match u8::read(reader)? {
            0 => Self::Account(Address::read(reader)?),
            1 => Self::CollectedFees,
            2 => Self::Commit,
            i => return Err(Error::InvalidEnum(i)),
        };
        Ok(key)
    }
}

impl EncodeSize for Key {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Account(_) => Address::SIZE,
                Self::CollectedFees | Self::Commit => 0,
            }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Value {
    Account(Account),
    CollectedFees(Coins),
    Commit { height: u64 },
}

impl Write for Value {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Account(account) => {
                0u8.write(writer);
                account.write(writer);
            }
            Self::CollectedFees(coins) => {
                1u8.write(writer);
                coins.write(writer);
            }
            Self::Commit { height } => {
                2u8.write(writer);
                height.write(writer);
            }
        }
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = match u8::read(reader)? {
            0 => Self::Account(Account::read(reader)?),
            1 => Self::CollectedFees(Coins::read(reader)?),
            2 => Self::Commit {
                height: u64::read(reader)?,
            },
            i => return Err(Error::InvalidEnum(i)),
        };
        Ok(value)
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Account(account) => account.encode_size(),
                Self::CollectedFees(coins) => coins.encode_size(),
                Self::Commit { .. } => u64::SIZE,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::DecodeExt;

    const CHAIN_ID: &str = "turnstile-test";

    fn address(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn send(from: Address, to: Address) -> Msg {
        Msg::Send {
            from,
            to,
            amount: Coins::single("uiris", 5),
        }
    }

    fn unsigned(msgs: Vec<Msg>, signatures: usize) -> StdTx {
        StdTx {
            msgs,
            fee: Fee::new(50_000, Coins::single("uiris", 10)),
            memo: String::new(),
            signatures: (0..signatures)
                .map(|_| StdSignature {
                    pub_key: None,
                    signature: vec![],
                    account_number: 0,
                    sequence: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn signers_are_deduplicated_in_order() {
        let (a, b, c) = (address(1), address(2), address(3));
        let tx = unsigned(
            vec![
                send(b, a),
                Msg::Generic {
                    route: "bank".into(),
                    signers: vec![c, b, a],
                    data: vec![],
                },
            ],
            3,
        );
        assert_eq!(tx.signers(), vec![b, c, a]);
        assert_eq!(tx.fee_payer(), Some(b));
    }

    #[test]
    fn validate_basic_checks_in_order() {
        let (a, b) = (address(1), address(2));
        assert_eq!(
            unsigned(vec![], 1).validate_basic(100),
            Err(TxError::NoMessages)
        );

        let bad = Msg::Generic {
            route: "Bad Route".into(),
            signers: vec![a],
            data: vec![],
        };
        assert!(matches!(
            unsigned(vec![bad], 1).validate_basic(100),
            Err(TxError::InvalidMessage(_))
        ));

        let mut tx = unsigned(vec![send(a, b)], 1);
        tx.fee.amount = "1stake".parse().unwrap();
        assert!(tx.validate_basic(100).is_ok());

        assert_eq!(
            unsigned(vec![send(a, b)], 0).validate_basic(100),
            Err(TxError::NoSignatures)
        );
        assert_eq!(
            unsigned(vec![send(a, b)], 2).validate_basic(100),
            Err(TxError::WrongSignerCount {
                expected: 1,
                got: 2
            })
        );

        let mut tx = unsigned(vec![send(a, b)], 1);
        tx.memo = "x".repeat(101);
        assert_eq!(
            tx.validate_basic(100),
            Err(TxError::MemoTooLarge { max: 100, got: 101 })
        );
        tx.memo.pop();
        assert!(tx.validate_basic(100).is_ok());
    }

    #[test]
    fn decoded_invalid_fee_is_rejected() {
        let generic = Msg::Generic {
            route: "bank".into(),
            signers: vec![address(1)],
            data: vec![],
        };
        let mut encoded = Transaction::Std(unsigned(vec![generic], 1)).encode().to_vec();
        // Corrupt the fee denomination so it no longer passes denomination rules.
        let position = encoded
            .windows(5)
            .position(|window| window == b"uiris")
            .unwrap();
        encoded[position] = b'U';
        let Transaction::Std(decoded) = Transaction::decode(encoded.as_slice()).unwrap() else {
            panic!("expected std transaction");
        };
        assert!(matches!(
            decoded.validate_basic(100),
            Err(TxError::InvalidFee(_))
        ));
    }

    #[test]
    fn sign_bytes_bind_account_number_and_sequence() {
        let key = PrivateKey::ed25519_from_seed(7);
        let from = key.public_key().address();
        let tx = StdTx::sign(
            CHAIN_ID,
            vec![send(from, address(9))],
            Fee::new(1, Coins::empty()),
            "memo",
            &[(&key, 3, 4)],
        );
        let bytes = tx.sign_bytes(CHAIN_ID, 0).unwrap();
        assert!(bytes.starts_with(SIGN_NAMESPACE));
        assert_ne!(
            bytes,
            StdSignDoc::sign_bytes(CHAIN_ID, 3, 5, &tx.fee, &tx.msgs, &tx.memo)
        );
        assert_ne!(bytes, tx.sign_bytes("other-chain", 0).unwrap());
        assert!(key
            .public_key()
            .verify_bytes(&bytes, &tx.signatures[0].signature));
        assert_eq!(tx.sign_bytes(CHAIN_ID, 1), None);
    }

    #[test]
    fn transaction_codec() {
        let key = PrivateKey::secp256k1_from_seed(3);
        let from = key.public_key().address();
        let tx = Transaction::Std(StdTx::sign(
            CHAIN_ID,
            vec![send(from, address(9))],
            Fee::new(10, Coins::single("uiris", 1)),
            "",
            &[(&key, 0, 0)],
        ));
        let unsupported = Transaction::unsupported(7, vec![1, 2, 3]).unwrap();
        let mut block = Vec::new();
        vec![tx.clone(), unsupported.clone()].write(&mut block);
        let decoded = read_transactions(&mut block.as_slice()).unwrap();
        assert_eq!(decoded, vec![tx.clone(), unsupported]);
        assert_eq!(tx.encode().len(), tx.encode_size());
        assert_ne!(tx.digest(), decoded[1].digest());
    }

    #[test]
    fn unsupported_envelopes_stay_decodable() {
        assert_eq!(Transaction::unsupported(STD_TRANSACTION_TAG, vec![1]), None);
        assert_eq!(
            Transaction::unsupported(1, vec![0; MAX_UNSUPPORTED_PAYLOAD + 1]),
            None
        );

        let largest = Transaction::unsupported(u8::MAX, vec![7; MAX_UNSUPPORTED_PAYLOAD]).unwrap();
        assert_eq!(Transaction::decode(largest.encode()).unwrap(), largest);

        // Tag 0 always selects the signed variant.
        let mut forged = Vec::new();
        Transaction::Unsupported {
            kind: STD_TRANSACTION_TAG,
            payload: vec![],
        }
        .write(&mut forged);
        assert!(Transaction::decode(forged.as_slice()).is_err());
    }

    #[test]
    fn storage_codec() {
        let mut account = Account::new(address(4), 12, Coins::single("uiris", 100));
        account.pub_key = Some(PrivateKey::ed25519_from_seed(1).public_key());
        account.sequence = 3;
        for value in [
            Value::Account(account),
            Value::CollectedFees(Coins::single("uiris", 10)),
            Value::Commit { height: 9 },
        ] {
            assert_eq!(Value::decode(value.encode()).unwrap(), value);
        }
        for key in [Key::Account(address(1)), Key::CollectedFees, Key::Commit] {
            assert_eq!(Key::decode(key.encode()).unwrap(), key);
        }
        assert!(matches!(
            Key::decode([5u8].as_ref()),
            Err(Error::InvalidEnum(5))
        ));
    }
}
