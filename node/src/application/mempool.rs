use commonware_runtime::Metrics;
use prometheus_client::metrics::gauge::Gauge;
use std::collections::{BTreeMap, HashMap, VecDeque};
use turnstile_types::{execution::Transaction, Address};

/// The maximum number of transactions a single account can have in the mempool.
#[cfg(test)]
const DEFAULT_MAX_BACKLOG: usize = 16;

/// The maximum number of transactions in the mempool.
#[cfg(test)]
const DEFAULT_MAX_TRANSACTIONS: usize = 1_024;

/// Fee payer and the sequence its signature claims.
fn slot(tx: &Transaction) -> Option<(Address, u64)> {
    let std_tx = tx.as_std()?;
    let payer = std_tx.fee_payer()?;
    let sequence = std_tx.signatures.first()?.sequence;
    Some((payer, sequence))
}

/// Admitted transactions waiting for a block, indexed by fee payer and claimed sequence.
pub struct Mempool {
    max_backlog: usize,
    max_transactions: usize,
    total_transactions: usize,
    tracked: HashMap<Address, BTreeMap<u64, Transaction>>,
    /// Fee payers with pending transactions, served round-robin so one busy sender cannot
    /// starve the rest. Each payer appears at most once.
    queue: VecDeque<Address>,

    unique: Gauge,
    accounts: Gauge,
}

impl Mempool {
    #[cfg(test)]
    pub fn new(context: impl Metrics) -> Self {
        Self::new_with_limits(context, DEFAULT_MAX_BACKLOG, DEFAULT_MAX_TRANSACTIONS)
    }

    pub fn new_with_limits(
        context: impl Metrics,
        max_backlog: usize,
        max_transactions: usize,
    ) -> Self {
        // Initialize metrics
        let unique = Gauge::default();
        let accounts = Gauge::default();
        context.register(
            "transactions",
            "Number of transactions in the mempool",
            unique.clone(),
        );
        context.register(
            "accounts",
            "Number of accounts in the mempool",
            accounts.clone(),
        );

        Self {
            max_backlog,
            max_transactions,
            total_transactions: 0,
            tracked: HashMap::new(),
            queue: VecDeque::new(),

            unique,
            accounts,
        }
    }

    pub fn len(&self) -> usize {
        self.total_transactions
    }

    pub fn is_empty(&self) -> bool {
        self.total_transactions == 0
    }

    fn update_metrics(&self) {
        self.unique.set(self.total_transactions as i64);
        self.accounts.set(self.tracked.len() as i64);
    }

    fn forget(&mut self, payer: &Address) {
        self.tracked.remove(payer);
        self.queue.retain(|queued| queued != payer);
    }

    /// Add a transaction to the mempool. Returns whether it is now tracked.
    ///
    /// Transactions without a fee payer, duplicates of an already tracked (payer, sequence)
    /// and anything beyond the global limit are ignored. When a payer's backlog overflows, the
    /// highest sequence is evicted.
    pub fn add(&mut self, tx: Transaction) -> bool {
        if self.total_transactions >= self.max_transactions {
            return false;
        }
        let Some((payer, sequence)) = slot(&tx) else {
            return false;
        };

        let entry = self.tracked.entry(payer).or_default();
        let was_empty = entry.is_empty();
        if entry.contains_key(&sequence) {
            return false;
        }
        entry.insert(sequence, tx);
        self.total_transactions += 1;

        let mut kept = true;
        if entry.len() > self.max_backlog {
            if let Some((evicted, _)) = entry.pop_last() {
                kept = evicted != sequence;
            }
            self.total_transactions = self.total_transactions.saturating_sub(1);
        }

        if entry.is_empty() {
            self.forget(&payer);
        } else if was_empty {
            self.queue.push_back(payer);
        }

        self.update_metrics();
        kept
    }

    /// Drop transactions of `payer` with a sequence below `min`.
    pub fn retain(&mut self, payer: &Address, min: u64) {
        let Some(tracked) = self.tracked.get_mut(payer) else {
            return;
        };
        let stale = tracked.len();
        *tracked = tracked.split_off(&min);
        self.total_transactions = self
            .total_transactions
            .saturating_sub(stale - tracked.len());

        if tracked.is_empty() {
            self.forget(payer);
        }
        self.update_metrics();
    }

    /// Remove every pending transaction: payers in rotation order, each payer's transactions by
    /// ascending sequence.
    pub fn drain(&mut self) -> Vec<Transaction> {
        let mut drained = Vec::with_capacity(self.total_transactions);
        for payer in std::mem::take(&mut self.queue) {
            if let Some(tracked) = self.tracked.remove(&payer) {
                drained.extend(tracked.into_values());
            }
        }
        self.tracked.clear();
        self.total_transactions = 0;
        self.update_metrics();
        drained
    }

    /// Next transaction to include: the lowest sequence of the next payer in rotation.
    pub fn next(&mut self) -> Option<Transaction> {
        while let Some(payer) = self.queue.pop_front() {
            let Some(tracked) = self.tracked.get_mut(&payer) else {
                continue;
            };
            let Some((_, tx)) = tracked.pop_first() else {
                self.tracked.remove(&payer);
                continue;
            };

            self.total_transactions = self.total_transactions.saturating_sub(1);
            if tracked.is_empty() {
                self.tracked.remove(&payer);
            } else {
                self.queue.push_back(payer);
            }
            self.update_metrics();
            return Some(tx);
        }
        self.update_metrics();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_runtime::{deterministic, Runner};
    use turnstile_execution::mocks::{ed25519_key, secp256k1_key, send_tx};
    use turnstile_types::PrivateKey;

    fn tx(key: &PrivateKey, sequence: u64) -> Transaction {
        send_tx(key, 1, sequence, "1uiris", 50_000)
    }

    fn sequence_of(tx: &Transaction) -> u64 {
        slot(tx).unwrap().1
    }

    #[test]
    fn test_add_single_transaction() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut mempool = Mempool::new(ctx);
            let key = ed25519_key(1);
            let payer = key.public_key().address();

            assert!(mempool.add(tx(&key, 0)));

            assert_eq!(mempool.len(), 1);
            assert_eq!(mempool.queue.len(), 1);
            assert!(mempool.tracked.get(&payer).unwrap().contains_key(&0));
        });
    }

    #[test]
    fn test_add_same_sequence_dropped() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut mempool = Mempool::new(ctx);
            let key = ed25519_key(1);
            let first = tx(&key, 0);
            let second = send_tx(&key, 1, 0, "2uiris", 50_000);

            assert!(mempool.add(first.clone()));
            assert!(!mempool.add(second));
            assert!(!mempool.add(first.clone()));

            assert_eq!(mempool.len(), 1);
            assert_eq!(mempool.next(), Some(first));
        });
    }

    #[test]
    fn test_unsupported_transaction_ignored() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut mempool = Mempool::new(ctx);
            assert!(!mempool.add(Transaction::Unsupported {
                kind: 7,
                payload: vec![],
            }));
            assert!(mempool.is_empty());
            assert!(mempool.queue.is_empty());
        });
    }

    #[test]
    fn test_add_exceeds_max_backlog() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut mempool = Mempool::new(ctx);
            let key = ed25519_key(1);

            for sequence in (0..=DEFAULT_MAX_BACKLOG as u64).rev() {
                mempool.add(tx(&key, sequence));
            }

            assert_eq!(mempool.len(), DEFAULT_MAX_BACKLOG);
            let tracked = mempool.tracked.get(&key.public_key().address()).unwrap();
            assert!(tracked.contains_key(&0));
            assert!(!tracked.contains_key(&(DEFAULT_MAX_BACKLOG as u64)));

            // A full backlog rejects anything further in the future.
            assert!(!mempool.add(tx(&key, DEFAULT_MAX_BACKLOG as u64 + 1)));
        });
    }

    #[test]
    fn test_retain_removes_processed_sequences() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut mempool = Mempool::new(ctx);
            let key = ed25519_key(1);
            let payer = key.public_key().address();
            for sequence in 0..5 {
                mempool.add(tx(&key, sequence));
            }

            mempool.retain(&payer, 3);
            assert_eq!(mempool.len(), 2);
            let tracked = mempool.tracked.get(&payer).unwrap();
            assert_eq!(tracked.keys().copied().collect::<Vec<_>>(), vec![3, 4]);

            mempool.retain(&payer, 10);
            assert!(mempool.is_empty());
            assert!(!mempool.tracked.contains_key(&payer));
            assert!(mempool.queue.is_empty());

            // Unknown payers are a no-op.
            mempool.retain(&ed25519_key(2).public_key().address(), 0);
            assert!(mempool.is_empty());
        });
    }

    #[test]
    fn test_next_in_sequence_order() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut mempool = Mempool::new(ctx);
            let key = secp256k1_key(1);
            for sequence in [2, 0, 1] {
                mempool.add(tx(&key, sequence));
            }

            for expected in 0..3 {
                assert_eq!(sequence_of(&mempool.next().unwrap()), expected);
            }
            assert!(mempool.next().is_none());
            assert!(mempool.tracked.is_empty());
            assert!(mempool.queue.is_empty());
        });
    }

    #[test]
    fn test_next_round_robin_between_accounts() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut mempool = Mempool::new(ctx);
            let keys: Vec<_> = (0..3).map(ed25519_key).collect();
            for key in &keys {
                for sequence in 0..2 {
                    mempool.add(tx(key, sequence));
                }
            }

            let payers: Vec<_> = (0..6)
                .map(|_| slot(&mempool.next().unwrap()).unwrap().0)
                .collect();
            let expected: Vec<_> = keys.iter().map(|key| key.public_key().address()).collect();
            assert_eq!(&payers[..3], &expected[..]);
            assert_eq!(&payers[3..], &expected[..]);
        });
    }

    #[test]
    fn test_next_skips_retained_accounts() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut mempool = Mempool::new(ctx);
            let (first, second) = (ed25519_key(1), ed25519_key(2));
            mempool.add(tx(&first, 0));
            mempool.add(tx(&second, 0));

            mempool.retain(&first.public_key().address(), 1);

            let next = mempool.next().unwrap();
            assert_eq!(slot(&next).unwrap().0, second.public_key().address());
            assert!(mempool.next().is_none());
        });
    }

    #[test]
    fn test_drain_orders_by_payer_then_sequence() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut mempool = Mempool::new(ctx);
            let (alice, bob) = (ed25519_key(1), secp256k1_key(2));

            assert!(mempool.add(tx(&alice, 2)));
            assert!(mempool.add(tx(&bob, 7)));
            assert!(mempool.add(tx(&alice, 1)));

            let drained: Vec<_> = mempool
                .drain()
                .iter()
                .map(|tx| (slot(tx).unwrap().0, sequence_of(tx)))
                .collect();
            assert_eq!(
                drained,
                vec![
                    (alice.public_key().address(), 1),
                    (alice.public_key().address(), 2),
                    (bob.public_key().address(), 7),
                ]
            );
            assert!(mempool.is_empty());
            assert!(mempool.queue.is_empty());
            assert_eq!(mempool.next(), None);
        });
    }

    #[test]
    fn test_max_transactions_limit() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut mempool = Mempool::new_with_limits(ctx, 4, 3);
            for seed in 0..5 {
                mempool.add(tx(&ed25519_key(seed), 0));
            }
            assert_eq!(mempool.len(), 3);
            assert_eq!(mempool.queue.len(), 3);
        });
    }

    #[test]
    fn test_metrics_updates() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut mempool = Mempool::new(ctx);
            assert_eq!(mempool.unique.get(), 0);
            assert_eq!(mempool.accounts.get(), 0);

            mempool.add(tx(&ed25519_key(1), 0));
            mempool.add(tx(&ed25519_key(1), 1));
            assert_eq!(mempool.unique.get(), 2);
            assert_eq!(mempool.accounts.get(), 1);

            mempool.next();
            mempool.next();
            assert_eq!(mempool.unique.get(), 0);
            assert_eq!(mempool.accounts.get(), 0);
        });
    }
}
