//! The ante handler: everything a transaction must pass before its messages may run.
//!
//! Stages run in a fixed order and the first failure is terminal:
//!
//! 1. only [Transaction::Std] is accepted
//! 2. mempool fee floor (check mode, not simulating)
//! 3. gas meter installation
//! 4. stateless validation
//! 5. signer account resolution
//! 6. account number and sequence validation
//! 7. fee deduction from the first signer
//! 8. per-signer key resolution, verification gas, signature check and sequence bump
//!
//! Stages 4 through 8 run inside `catch_unwind` so that an [OutOfGas] unwind from the meter
//! becomes an ordinary rejection. Any other panic is resumed untouched.

use crate::{
    context::Context,
    error::{AnteError, Outcome},
    gas::{
        BasicGasMeter, Gas, GasConfig, GasMeter, InfiniteGasMeter, LogCurve, OutOfGas,
        ParamsError,
    },
    keeper::{AccountKeeper, FeeCollector},
};
use commonware_codec::DecodeExt;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;
use turnstile_types::{
    crypto::{Multisignature, Secp256k1PublicKey, ThresholdPublicKey},
    execution::{Account, Fee, StdSignature, StdTx, Transaction},
    Address, PublicKey,
};

/// Stand-in key used when simulating for an account with no key on record. Secp256k1 is the
/// most expensive scheme to verify, so estimates err high.
pub const SIMULATION_SECP256K1_KEY: [u8; 33] = [
    0x03, 0x5A, 0xD6, 0x81, 0x0A, 0x47, 0xF0, 0x73, 0x55, 0x3F, 0xF3, 0x0D, 0x2F, 0xCC, 0x7E,
    0x0D, 0x3B, 0x1C, 0x0B, 0x74, 0xB6, 0x1A, 0x1A, 0xAA, 0x25, 0x82, 0x34, 0x40, 0x37, 0x15,
    0x1E, 0x14, 0x3A,
];

pub const DEFAULT_MAX_MEMO_CHARACTERS: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnteParams {
    pub gas: GasConfig,
    pub max_memo_characters: usize,
}

impl Default for AnteParams {
    fn default() -> Self {
        Self {
            gas: GasConfig::default(),
            max_memo_characters: DEFAULT_MAX_MEMO_CHARACTERS,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AnteHandler {
    params: AnteParams,
    curve: LogCurve,
}

impl AnteHandler {
    pub fn new(params: AnteParams) -> Result<Self, ParamsError> {
        let curve = params.gas.curve()?;
        Ok(Self { params, curve })
    }

    pub fn params(&self) -> &AnteParams {
        &self.params
    }

    /// Run the pipeline over `tx`.
    ///
    /// Writes go through `accounts` and `fees`; the caller must discard both when the
    /// returned outcome aborts.
    pub fn handle<K: AccountKeeper, F: FeeCollector>(
        &self,
        ctx: Context,
        accounts: &mut K,
        fees: &mut F,
        tx: &Transaction,
        simulate: bool,
    ) -> (Context, Outcome) {
        let Transaction::Std(std_tx) = tx else {
            // Zero limit so an unsupported envelope can never run on an unbounded meter.
            let ctx = set_gas_meter(self.curve, simulate, ctx, 0);
            let err = AnteError::Internal("tx must be StdTx".to_string());
            return (ctx, Outcome::rejected(err, 0, 0));
        };

        if ctx.is_check_tx() && !simulate {
            if let Err(err) = ensure_sufficient_mempool_fees(&ctx, std_tx) {
                debug!(error = %err, "rejected by mempool fee check");
                return (ctx, Outcome::rejected(err, 0, 0));
            }
        }

        let mut ctx = set_gas_meter(self.curve, simulate, ctx, std_tx.fee.gas);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run(&mut ctx, accounts, fees, std_tx, simulate)
        }));
        let gas_used = ctx.gas_meter().gas_consumed();
        match result {
            Ok(Ok(signers)) => (
                ctx.with_signers(signers),
                Outcome::accepted(std_tx.fee.gas, gas_used),
            ),
            Ok(Err(err)) => {
                debug!(
                    kind = ?err.kind(),
                    error = %err,
                    gas_used,
                    "transaction rejected"
                );
                (ctx, Outcome::rejected(err, 0, gas_used))
            }
            Err(payload) => match payload.downcast::<OutOfGas>() {
                Ok(out_of_gas) => {
                    debug!(
                        descriptor = %out_of_gas.descriptor,
                        limit = out_of_gas.limit,
                        gas_used,
                        "transaction ran out of gas"
                    );
                    let err = AnteError::OutOfGas(format!(
                        "out of gas in location: {}",
                        out_of_gas.descriptor
                    ));
                    (ctx, Outcome::rejected(err, std_tx.fee.gas, gas_used))
                }
                Err(payload) => panic::resume_unwind(payload),
            },
        }
    }

    fn run<K: AccountKeeper, F: FeeCollector>(
        &self,
        ctx: &mut Context,
        accounts: &mut K,
        fees: &mut F,
        tx: &StdTx,
        simulate: bool,
    ) -> Result<Vec<Account>, AnteError> {
        tx.validate_basic(self.params.max_memo_characters)?;

        let sign_bytes = sign_bytes_list(ctx.chain_id(), tx);
        let mut signer_accs = get_signer_accs(accounts, &tx.signers())?;
        validate_acc_num_and_sequence(ctx.height(), &signer_accs, &tx.signatures)?;

        // The first signer pays.
        if !tx.fee.amount.is_zero() {
            signer_accs[0] = deduct_fees(&signer_accs[0], &tx.fee)?;
            fees.add_collected_fees(&tx.fee.amount);
        }

        for (i, signature) in tx.signatures.iter().enumerate() {
            signer_accs[i] = self.process_sig(
                ctx.gas_meter_mut(),
                &signer_accs[i],
                signature,
                &sign_bytes[i],
                simulate,
            )?;
            accounts.set_account(signer_accs[i].clone());
        }

        Ok(signer_accs)
    }

    /// Resolve the key, charge verification gas, verify and bump the sequence.
    pub fn process_sig(
        &self,
        meter: &mut dyn GasMeter,
        account: &Account,
        signature: &StdSignature,
        sign_bytes: &[u8],
        simulate: bool,
    ) -> Result<Account, AnteError> {
        let mut account = account.clone();
        let pub_key = process_pub_key(&account, signature, simulate)?;
        account.pub_key = Some(pub_key.clone());

        consume_signature_verification_gas(
            meter,
            &self.params.gas,
            &signature.signature,
            &pub_key,
            simulate,
        )?;

        if !simulate && !pub_key.verify_bytes(sign_bytes, &signature.signature) {
            return Err(AnteError::Unauthorized(
                "signature verification failed".to_string(),
            ));
        }

        account.sequence = account
            .sequence
            .checked_add(1)
            .ok_or_else(|| AnteError::Internal("sequence overflow".to_string()))?;
        Ok(account)
    }
}

/// Unbounded meter when simulating or at genesis, otherwise bounded by `gas_limit`.
pub fn set_gas_meter(curve: LogCurve, simulate: bool, ctx: Context, gas_limit: Gas) -> Context {
    if simulate || ctx.height() == 0 {
        return ctx.with_gas_meter(Box::new(InfiniteGasMeter::new()));
    }
    ctx.with_gas_meter(Box::new(BasicGasMeter::new(gas_limit, curve)))
}

/// Local mempool policy. Never touches state.
pub fn ensure_sufficient_mempool_fees(ctx: &Context, tx: &StdTx) -> Result<(), AnteError> {
    if tx.fee.gas == 0 {
        return Err(AnteError::Internal(format!(
            "invalid gas supplied: {}",
            tx.fee.gas
        )));
    }
    let minimum = ctx.minimum_fees();
    if !minimum.is_zero() && !tx.fee.amount.is_all_gte(minimum) {
        return Err(AnteError::InsufficientFee(format!(
            "insufficient fee, got: {:?} required: {:?}",
            tx.fee.amount.to_string(),
            minimum.to_string()
        )));
    }
    Ok(())
}

pub fn sign_bytes_list(chain_id: &str, tx: &StdTx) -> Vec<Vec<u8>> {
    (0..tx.signatures.len())
        .filter_map(|index| tx.sign_bytes(chain_id, index))
        .collect()
}

pub fn get_signer_accs<K: AccountKeeper>(
    accounts: &K,
    addresses: &[Address],
) -> Result<Vec<Account>, AnteError> {
    addresses
        .iter()
        .map(|address| {
            accounts
                .get_account(address)
                .ok_or_else(|| AnteError::UnknownAddress(format!("account {address} does not exist")))
        })
        .collect()
}

pub fn validate_acc_num_and_sequence(
    height: u64,
    accounts: &[Account],
    signatures: &[StdSignature],
) -> Result<(), AnteError> {
    for (account, signature) in accounts.iter().zip(signatures) {
        if height == 0 && signature.account_number != 0 {
            return Err(AnteError::InvalidSequence(format!(
                "Invalid account number for BlockHeight == 0. Got {}, expected 0",
                signature.account_number
            )));
        }
        if height != 0 && account.account_number != signature.account_number {
            return Err(AnteError::InvalidSequence(format!(
                "Invalid account number. Got {}, expected {}",
                signature.account_number, account.account_number
            )));
        }
        if account.sequence != signature.sequence {
            return Err(AnteError::InvalidSequence(format!(
                "Invalid sequence. Got {}, expected {}",
                signature.sequence, account.sequence
            )));
        }
    }
    Ok(())
}

/// Debit `fee` from a copy of `account`. The input is never modified.
pub fn deduct_fees(account: &Account, fee: &Fee) -> Result<Account, AnteError> {
    let Some(coins) = account.coins.safe_sub(&fee.amount) else {
        return Err(AnteError::InsufficientFunds(format!(
            "account balance [{}] is not enough to cover fee [{}]",
            account.coins, fee.amount
        )));
    };
    let mut account = account.clone();
    account.coins = coins;
    Ok(account)
}

pub fn process_pub_key(
    account: &Account,
    signature: &StdSignature,
    simulate: bool,
) -> Result<PublicKey, AnteError> {
    if simulate {
        return Ok(account.pub_key.clone().unwrap_or_else(|| {
            PublicKey::Secp256k1(Secp256k1PublicKey::from_bytes(SIMULATION_SECP256K1_KEY))
        }));
    }
    if let Some(key) = &account.pub_key {
        return Ok(key.clone());
    }
    let Some(key) = &signature.pub_key else {
        return Err(AnteError::InvalidPubKey("PubKey not found".to_string()));
    };
    if key.address() != account.address {
        return Err(AnteError::InvalidPubKey(format!(
            "PubKey does not match Signer address {}",
            account.address
        )));
    }
    Ok(key.clone())
}

pub fn consume_signature_verification_gas(
    meter: &mut dyn GasMeter,
    config: &GasConfig,
    signature: &[u8],
    pub_key: &PublicKey,
    simulate: bool,
) -> Result<(), AnteError> {
    match pub_key {
        PublicKey::Ed25519(_) => {
            meter.consume_gas(config.ed25519_verify_cost, "ante verify: ed25519");
            Ok(())
        }
        PublicKey::Secp256k1(_) => {
            meter.consume_gas(config.secp256k1_verify_cost, "ante verify: secp256k1");
            Ok(())
        }
        PublicKey::Threshold(key) => match Multisignature::decode(signature) {
            Ok(multisig) => consume_multisignature_verification_gas(meter, config, &multisig, key),
            // Without partials to inspect, assume every member signs.
            Err(_) if simulate => {
                for member in key.members() {
                    consume_signature_verification_gas(meter, config, &[], member, simulate)?;
                }
                Ok(())
            }
            Err(_) => Err(AnteError::Unauthorized(
                "malformed multisignature".to_string(),
            )),
        },
    }
}

/// Charge each member whose bit is set, in bitmap order.
pub fn consume_multisignature_verification_gas(
    meter: &mut dyn GasMeter,
    config: &GasConfig,
    multisig: &Multisignature,
    key: &ThresholdPublicKey,
) -> Result<(), AnteError> {
    let size = multisig.bitmap.size();
    if size != key.members().len() {
        return Err(AnteError::Unauthorized(format!(
            "multisignature bitmap has {size} bits for {} keys",
            key.members().len()
        )));
    }
    let included = multisig.bitmap.count_ones();
    if multisig.sigs.len() != included {
        return Err(AnteError::Unauthorized(format!(
            "multisignature has {} partial signatures for {included} set bits",
            multisig.sigs.len()
        )));
    }
    let mut partials = multisig.sigs.iter();
    for (index, member) in key.members().iter().enumerate() {
        if !multisig.bitmap.get_index(index) {
            continue;
        }
        let partial = partials.next().map(Vec::as_slice).unwrap_or_default();
        consume_signature_verification_gas(meter, config, partial, member, false)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::Mode,
        error::ErrorKind,
        gas::silence_out_of_gas_panics,
        keeper::{FeePool, WorkingSet},
        mocks::{account, ed25519_key, secp256k1_key, send_tx, CHAIN_ID},
    };
    use commonware_codec::Encode;
    use turnstile_types::{
        crypto::{CompactBitArray, PrivateKey},
        execution::Msg,
        Coins,
    };

    fn handler() -> AnteHandler {
        AnteHandler::new(AnteParams::default()).unwrap()
    }

    fn deliver(height: u64) -> Context {
        Context::new(CHAIN_ID, height, Mode::Deliver)
    }

    fn run(
        ctx: Context,
        accounts: &mut WorkingSet,
        tx: &Transaction,
        simulate: bool,
    ) -> (Context, Outcome, FeePool) {
        silence_out_of_gas_panics();
        let mut fees = FeePool::default();
        let (ctx, outcome) = handler().handle(ctx, accounts, &mut fees, tx, simulate);
        (ctx, outcome, fees)
    }

    fn single(key: &PrivateKey, account_number: u64, sequence: u64, coins: &str) -> WorkingSet {
        let mut set = WorkingSet::new();
        set.insert(account(key, account_number, sequence, coins));
        set
    }

    #[test]
    fn scenario_accepts_and_debits_fee() {
        let key = ed25519_key(1);
        let mut accounts = single(&key, 7, 3, "100uiris");
        let tx = send_tx(&key, 7, 3, "10uiris", 50_000);

        let (ctx, outcome, fees) = run(deliver(5), &mut accounts, &tx, false);
        assert!(outcome.is_ok(), "{outcome:?}");
        assert!(!outcome.abort);
        assert_eq!(outcome.gas_wanted, 50_000);
        assert_eq!(outcome.gas_used, 59);
        assert_eq!(fees.collected(), &Coins::single("uiris", 10));

        let stored = accounts.get_account(&key.public_key().address()).unwrap();
        assert_eq!(stored.sequence, 4);
        assert_eq!(stored.coins, Coins::single("uiris", 90));
        assert_eq!(stored.pub_key, Some(key.public_key()));
        assert_eq!(ctx.signers(), &[stored]);
    }

    #[test]
    fn sequence_mismatch_rejects_without_mutation() {
        let key = ed25519_key(1);
        let mut accounts = single(&key, 7, 4, "100uiris");
        let before = accounts.clone();
        let tx = send_tx(&key, 7, 5, "10uiris", 50_000);

        let (_, outcome, fees) = run(deliver(5), &mut accounts, &tx, false);
        assert_eq!(outcome.kind(), Some(ErrorKind::InvalidSequence));
        assert_eq!(outcome.log, "Invalid sequence. Got 5, expected 4");
        assert!(outcome.abort);
        assert_eq!(outcome.gas_wanted, 0);
        assert!(fees.collected().is_empty());
        let address = key.public_key().address();
        assert!(!accounts.is_touched(&address));
        assert_eq!(accounts.get_account(&address), before.get_account(&address));
    }

    #[test]
    fn sequence_checked_before_signature() {
        let key = ed25519_key(1);
        let mut accounts = single(&key, 7, 4, "100uiris");
        let Transaction::Std(mut tx) = send_tx(&key, 7, 2, "10uiris", 50_000) else {
            unreachable!()
        };
        tx.signatures[0].signature = vec![0; 64];

        let (_, outcome, _) = run(deliver(5), &mut accounts, &Transaction::Std(tx), false);
        assert_eq!(outcome.kind(), Some(ErrorKind::InvalidSequence));
    }

    #[test]
    fn replay_is_rejected() {
        let key = secp256k1_key(2);
        let mut accounts = single(&key, 1, 0, "100uiris");
        let tx = send_tx(&key, 1, 0, "1uiris", 50_000);

        let (_, first, _) = run(deliver(5), &mut accounts, &tx, false);
        assert!(first.is_ok());
        let (_, second, _) = run(deliver(5), &mut accounts, &tx, false);
        assert_eq!(second.log, "Invalid sequence. Got 0, expected 1");
    }

    #[test]
    fn account_number_rules() {
        let key = ed25519_key(1);

        let mut accounts = single(&key, 7, 0, "100uiris");
        let tx = send_tx(&key, 3, 0, "1uiris", 50_000);
        let (_, outcome, _) = run(deliver(5), &mut accounts, &tx, false);
        assert_eq!(outcome.log, "Invalid account number. Got 3, expected 7");

        let (_, outcome, _) = run(deliver(0), &mut accounts, &tx, false);
        assert_eq!(
            outcome.log,
            "Invalid account number for BlockHeight == 0. Got 3, expected 0"
        );

        // At genesis the stored number is not compared.
        let tx = send_tx(&key, 0, 0, "1uiris", 50_000);
        let (ctx, outcome, _) = run(deliver(0), &mut accounts, &tx, false);
        assert!(outcome.is_ok(), "{outcome:?}");
        assert!(ctx.gas_meter().is_infinite());
    }

    #[test]
    fn insufficient_funds_leaves_account_untouched() {
        let key = ed25519_key(1);
        let mut accounts = single(&key, 7, 0, "5uiris");
        let tx = send_tx(&key, 7, 0, "10uiris", 50_000);

        let (_, outcome, fees) = run(deliver(5), &mut accounts, &tx, false);
        assert_eq!(outcome.kind(), Some(ErrorKind::InsufficientFunds));
        assert_eq!(
            outcome.log,
            "account balance [5uiris] is not enough to cover fee [10uiris]"
        );
        assert!(fees.collected().is_empty());
        assert!(!accounts.is_touched(&key.public_key().address()));
        let stored = accounts.get_account(&key.public_key().address()).unwrap();
        assert_eq!(stored.coins, Coins::single("uiris", 5));
    }

    #[test]
    fn zero_fee_skips_deduction() {
        let key = ed25519_key(1);
        let mut accounts = single(&key, 7, 0, "");
        let tx = send_tx(&key, 7, 0, "", 50_000);
        let (_, outcome, fees) = run(deliver(5), &mut accounts, &tx, false);
        assert!(outcome.is_ok(), "{outcome:?}");
        assert!(fees.collected().is_empty());
    }

    #[test]
    fn unsupported_transaction_is_internal() {
        let mut accounts = WorkingSet::new();
        let tx = Transaction::Unsupported {
            kind: 9,
            payload: vec![],
        };
        let (ctx, outcome, _) = run(deliver(5), &mut accounts, &tx, false);
        assert_eq!(outcome.kind(), Some(ErrorKind::Internal));
        assert_eq!(outcome.log, "tx must be StdTx");
        assert_eq!(ctx.gas_meter().limit(), 0);
        assert!(!ctx.gas_meter().is_infinite());

        let (ctx, _, _) = run(deliver(5), &mut accounts, &tx, true);
        assert!(ctx.gas_meter().is_infinite());
        assert_eq!(ctx.gas_meter().limit(), Gas::MAX);
    }

    #[test]
    fn mempool_floor_applies_only_to_check() {
        let key = ed25519_key(1);
        let tx = send_tx(&key, 7, 0, "5uiris", 50_000);
        let floor = Coins::single("uiris", 10);

        let mut accounts = single(&key, 7, 0, "100uiris");
        let check = Context::new(CHAIN_ID, 5, Mode::Check).with_minimum_fees(floor.clone());
        let (_, outcome, _) = run(check, &mut accounts, &tx, false);
        assert_eq!(outcome.kind(), Some(ErrorKind::InsufficientFee));
        assert_eq!(
            outcome.log,
            "insufficient fee, got: \"5uiris\" required: \"10uiris\""
        );
        assert_eq!((outcome.gas_wanted, outcome.gas_used), (0, 0));

        let check = Context::new(CHAIN_ID, 5, Mode::Check).with_minimum_fees(floor.clone());
        let (_, outcome, _) = run(check, &mut accounts, &tx, true);
        assert!(outcome.is_ok(), "{outcome:?}");

        let ctx = deliver(5).with_minimum_fees(floor);
        let (_, outcome, _) = run(ctx, &mut single(&key, 7, 0, "100uiris"), &tx, false);
        assert!(outcome.is_ok(), "{outcome:?}");
    }

    #[test]
    fn check_rejects_zero_gas() {
        let key = ed25519_key(1);
        let mut accounts = single(&key, 7, 0, "100uiris");
        let tx = send_tx(&key, 7, 0, "5uiris", 0);
        let check = Context::new(CHAIN_ID, 5, Mode::Check);
        let (_, outcome, _) = run(check, &mut accounts, &tx, false);
        assert_eq!(outcome.kind(), Some(ErrorKind::Internal));
        assert_eq!(outcome.log, "invalid gas supplied: 0");
    }

    #[test]
    fn out_of_gas_is_recovered() {
        let key = secp256k1_key(1);
        let mut accounts = single(&key, 7, 0, "100uiris");
        let tx = send_tx(&key, 7, 0, "5uiris", 99);

        let (ctx, outcome, _) = run(deliver(5), &mut accounts, &tx, false);
        assert_eq!(outcome.kind(), Some(ErrorKind::OutOfGas));
        assert_eq!(outcome.log, "out of gas in location: ante verify: secp256k1");
        assert_eq!(outcome.gas_wanted, 99);
        assert_eq!(outcome.gas_used, 100);
        assert!(outcome.abort);
        assert!(ctx.gas_meter().is_past_limit());
        assert!(!accounts.is_touched(&key.public_key().address()));
    }

    #[test]
    fn other_panics_propagate() {
        struct Exploding;

        impl AccountKeeper for Exploding {
            fn get_account(&self, _: &Address) -> Option<Account> {
                panic!("store unavailable");
            }

            fn set_account(&mut self, _: Account) {}
        }

        let key = ed25519_key(1);
        let tx = send_tx(&key, 7, 0, "5uiris", 50_000);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            handler().handle(
                deliver(5),
                &mut Exploding,
                &mut FeePool::default(),
                &tx,
                false,
            )
        }));
        let payload = result.err().expect("panic propagates");
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"store unavailable"));
    }

    #[test]
    fn unknown_signer_is_rejected() {
        let key = ed25519_key(1);
        let tx = send_tx(&key, 7, 0, "5uiris", 50_000);
        let (_, outcome, _) = run(deliver(5), &mut WorkingSet::new(), &tx, false);
        assert_eq!(outcome.kind(), Some(ErrorKind::UnknownAddress));
    }

    #[test]
    fn pub_key_must_exist_and_match() {
        let key = ed25519_key(1);
        let Transaction::Std(mut tx) = send_tx(&key, 7, 0, "5uiris", 50_000) else {
            unreachable!()
        };

        tx.signatures[0].pub_key = None;
        let mut accounts = single(&key, 7, 0, "100uiris");
        let (_, outcome, _) = run(deliver(5), &mut accounts, &Transaction::Std(tx.clone()), false);
        assert_eq!(outcome.kind(), Some(ErrorKind::InvalidPubKey));
        assert_eq!(outcome.log, "PubKey not found");

        tx.signatures[0].pub_key = Some(ed25519_key(2).public_key());
        let (_, outcome, _) = run(deliver(5), &mut accounts, &Transaction::Std(tx.clone()), false);
        assert_eq!(outcome.kind(), Some(ErrorKind::InvalidPubKey));
        assert!(outcome.log.starts_with("PubKey does not match Signer address"));

        // A key on record makes the signature's key irrelevant.
        let mut known = account(&key, 7, 0, "100uiris");
        known.pub_key = Some(key.public_key());
        let mut accounts = WorkingSet::new();
        accounts.insert(known);
        let (_, outcome, _) = run(deliver(5), &mut accounts, &Transaction::Std(tx), false);
        assert!(outcome.is_ok(), "{outcome:?}");
    }

    #[test]
    fn bad_signature_is_unauthorized() {
        let key = ed25519_key(1);
        let Transaction::Std(mut tx) = send_tx(&key, 7, 0, "5uiris", 50_000) else {
            unreachable!()
        };
        tx.memo = "changed after signing".into();
        let mut accounts = single(&key, 7, 0, "100uiris");
        let (_, outcome, fees) = run(deliver(5), &mut accounts, &Transaction::Std(tx), false);
        assert_eq!(outcome.kind(), Some(ErrorKind::Unauthorized));
        assert_eq!(outcome.log, "signature verification failed");
        assert_eq!(outcome.gas_used, 59);
        // Fees were forwarded before the failure; the caller discards them on abort.
        assert_eq!(fees.collected(), &Coins::single("uiris", 5));
    }

    #[test]
    fn simulation_skips_verification_and_charges_worst_case() {
        let key = ed25519_key(1);
        let Transaction::Std(mut tx) = send_tx(&key, 7, 0, "5uiris", 50_000) else {
            unreachable!()
        };
        tx.signatures[0].signature = vec![];
        tx.signatures[0].pub_key = None;
        let mut accounts = single(&key, 7, 0, "100uiris");

        let (ctx, outcome, _) = run(deliver(5), &mut accounts, &Transaction::Std(tx), true);
        assert!(outcome.is_ok(), "{outcome:?}");
        assert_eq!(outcome.gas_used, 100);
        assert!(ctx.gas_meter().is_infinite());
        let stored = &ctx.signers()[0];
        assert_eq!(
            stored.pub_key,
            Some(PublicKey::Secp256k1(Secp256k1PublicKey::from_bytes(
                SIMULATION_SECP256K1_KEY
            )))
        );
    }

    #[test]
    fn validate_basic_kinds() {
        let key = ed25519_key(1);
        let Transaction::Std(mut tx) = send_tx(&key, 7, 0, "5uiris", 50_000) else {
            unreachable!()
        };
        let mut accounts = single(&key, 7, 0, "100uiris");

        tx.memo = "m".repeat(101);
        let (_, outcome, _) = run(deliver(5), &mut accounts, &Transaction::Std(tx.clone()), false);
        assert_eq!(outcome.kind(), Some(ErrorKind::MemoTooLarge));
        assert_eq!(outcome.gas_wanted, 0);

        tx.memo.clear();
        tx.signatures.clear();
        let (_, outcome, _) = run(deliver(5), &mut accounts, &Transaction::Std(tx.clone()), false);
        assert_eq!(outcome.kind(), Some(ErrorKind::Unauthorized));

        tx.msgs.clear();
        let (_, outcome, _) = run(deliver(5), &mut accounts, &Transaction::Std(tx), false);
        assert_eq!(outcome.kind(), Some(ErrorKind::UnknownRequest));
    }

    #[test]
    fn multiple_signers_in_order() {
        let (payer, cosigner) = (ed25519_key(1), secp256k1_key(2));
        let (a, b) = (payer.public_key().address(), cosigner.public_key().address());
        let msgs = vec![Msg::Generic {
            route: "bank".into(),
            signers: vec![a, b],
            data: vec![],
        }];
        let tx = StdTx::sign(
            CHAIN_ID,
            msgs,
            Fee::new(50_000, Coins::single("uiris", 10)),
            "",
            &[(&payer, 1, 0), (&cosigner, 2, 5)],
        );
        let mut accounts = WorkingSet::new();
        accounts.insert(account(&payer, 1, 0, "10uiris"));
        accounts.insert(account(&cosigner, 2, 5, ""));

        let (ctx, outcome, _) = run(deliver(5), &mut accounts, &Transaction::Std(tx), false);
        assert!(outcome.is_ok(), "{outcome:?}");
        assert_eq!(outcome.gas_used, 159);
        assert_eq!(ctx.signers()[0].coins, Coins::empty());
        assert_eq!(ctx.signers()[1].sequence, 6);
    }

    fn threshold_account(members: &[PrivateKey]) -> (ThresholdPublicKey, Account) {
        let key = ThresholdPublicKey::new(2, members.iter().map(PrivateKey::public_key).collect())
            .unwrap();
        let address = PublicKey::Threshold(key.clone()).address();
        let mut account = Account::new(address, 3, Coins::single("uiris", 100));
        account.pub_key = Some(PublicKey::Threshold(key.clone()));
        (key, account)
    }

    fn multisig_tx(
        address: Address,
        build: impl FnOnce(&[u8]) -> Vec<u8>,
    ) -> Transaction {
        let msgs = vec![Msg::Send {
            from: address,
            to: Address::new([9; 20]),
            amount: Coins::single("uiris", 1),
        }];
        let fee = Fee::new(50_000, Coins::single("uiris", 1));
        let sign_bytes =
            turnstile_types::StdSignDoc::sign_bytes(CHAIN_ID, 3, 0, &fee, &msgs, "");
        Transaction::Std(StdTx {
            msgs,
            fee,
            memo: String::new(),
            signatures: vec![StdSignature {
                pub_key: None,
                signature: build(&sign_bytes),
                account_number: 3,
                sequence: 0,
            }],
        })
    }

    #[test]
    fn multisig_charges_included_members() {
        let members = [ed25519_key(1), secp256k1_key(2), secp256k1_key(3)];
        let (_, account) = threshold_account(&members);
        let tx = multisig_tx(account.address, |bytes| {
            let mut multisig = Multisignature::new(3);
            multisig.add_signature(0, members[0].sign(bytes));
            multisig.add_signature(2, members[2].sign(bytes));
            multisig.encode().to_vec()
        });
        let mut accounts = WorkingSet::new();
        accounts.insert(account);

        let (_, outcome, _) = run(deliver(5), &mut accounts, &tx, false);
        assert!(outcome.is_ok(), "{outcome:?}");
        assert_eq!(outcome.gas_used, 59 + 100);
    }

    #[test]
    fn multisig_key_learned_from_signature() {
        let members = [ed25519_key(1), secp256k1_key(2), secp256k1_key(3)];
        let (key, mut account) = threshold_account(&members);
        account.pub_key = None;
        let address = account.address;
        let Transaction::Std(mut tx) = multisig_tx(address, |bytes| {
            let mut multisig = Multisignature::new(3);
            multisig.add_signature(1, members[1].sign(bytes));
            multisig.add_signature(2, members[2].sign(bytes));
            multisig.encode().to_vec()
        }) else {
            unreachable!()
        };
        tx.signatures[0].pub_key = Some(PublicKey::Threshold(key.clone()));
        let mut accounts = WorkingSet::new();
        accounts.insert(account);

        let (ctx, outcome, _) = run(deliver(5), &mut accounts, &Transaction::Std(tx), false);
        assert!(outcome.is_ok(), "{outcome:?}");
        assert_eq!(outcome.gas_used, 100 + 100);
        let stored = accounts.get_account(&address).unwrap();
        assert_eq!(stored.pub_key, Some(PublicKey::Threshold(key)));
        assert_eq!(stored.sequence, 1);
        assert_eq!(ctx.signers(), &[stored]);
    }

    #[test]
    fn multisig_partial_count_must_match_bitmap() {
        let members = [ed25519_key(1), secp256k1_key(2), secp256k1_key(3)];
        let (_, account) = threshold_account(&members);
        let tx = multisig_tx(account.address, |bytes| {
            Multisignature {
                bitmap: CompactBitArray::from_bools(&[true, false, true]),
                sigs: vec![members[0].sign(bytes)],
            }
            .encode()
            .to_vec()
        });
        let mut accounts = WorkingSet::new();
        accounts.insert(account);

        let (_, outcome, _) = run(deliver(5), &mut accounts, &tx, false);
        assert_eq!(outcome.kind(), Some(ErrorKind::Unauthorized));
        assert_eq!(outcome.gas_used, 0);
    }

    #[test]
    fn multisig_below_threshold_fails_verification() {
        let members = [ed25519_key(1), secp256k1_key(2), secp256k1_key(3)];
        let (_, account) = threshold_account(&members);
        let tx = multisig_tx(account.address, |bytes| {
            let mut multisig = Multisignature::new(3);
            multisig.add_signature(1, members[1].sign(bytes));
            multisig.encode().to_vec()
        });
        let mut accounts = WorkingSet::new();
        accounts.insert(account);

        let (_, outcome, _) = run(deliver(5), &mut accounts, &tx, false);
        assert_eq!(outcome.log, "signature verification failed");
        assert_eq!(outcome.gas_used, 100);
    }

    #[test]
    fn simulated_multisig_without_partials_charges_all_members() {
        let members = [ed25519_key(1), secp256k1_key(2), secp256k1_key(3)];
        let (key, _) = threshold_account(&members);
        let mut meter = InfiniteGasMeter::new();
        consume_signature_verification_gas(
            &mut meter,
            &GasConfig::default(),
            &[],
            &PublicKey::Threshold(key.clone()),
            true,
        )
        .unwrap();
        assert_eq!(meter.gas_consumed(), 259);

        let err = consume_signature_verification_gas(
            &mut InfiniteGasMeter::new(),
            &GasConfig::default(),
            &[],
            &PublicKey::Threshold(key),
            false,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
