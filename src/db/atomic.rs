// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Atomic batches: optimistic checks plus ordered mutations.

use std::time::Duration;

use tracing::debug;

use crate::key::{encode_key, key_hash, Key, KeyLimit};
use crate::store::{now_millis, OrderedStore, StoreError, StoreOps};
use crate::value::{KvU64, Value};
use crate::version::Versionstamp;

use super::error::KvError;
use super::{CommitResult, Database};

/// Maximum checks per batch.
pub const MAX_CHECKS: usize = 100;

/// Maximum mutations per batch.
pub const MAX_MUTATIONS: usize = 1000;

/// Maximum sum of encoded key sizes per batch.
pub const MAX_TOTAL_KEY_SIZE: usize = 81920;

/// Maximum sum of encoded key plus payload sizes per batch.
pub const MAX_TOTAL_MUTATION_SIZE: usize = 819200;

#[derive(Debug)]
struct Check {
    key_hash: String,
    expected: Option<Versionstamp>,
}

#[derive(Debug)]
enum MutationOp {
    Set {
        value: Vec<u8>,
        expire_in: Option<Duration>,
    },
    Delete,
    Sum(KvU64),
    Min(KvU64),
    Max(KvU64),
}

impl MutationOp {
    fn counter_op_name(&self) -> Option<&'static str> {
        match self {
            MutationOp::Sum(_) => Some("sum"),
            MutationOp::Min(_) => Some("min"),
            MutationOp::Max(_) => Some("max"),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Mutation {
    key_hash: String,
    op: MutationOp,
}

/// Outcome classification inside the transaction body. Conflicts and
/// transient failures roll back to [`CommitResult::Conflict`]; counter type
/// errors roll back and then escape `commit` as real errors.
enum TxnAbort {
    Conflict,
    Fatal(KvError),
}

impl From<StoreError> for TxnAbort {
    fn from(err: StoreError) -> Self {
        TxnAbort::Fatal(KvError::Store(err))
    }
}

/// A check-then-mutate batch executed as one transaction.
///
/// Builder methods take and return the batch by value, so fluent chains
/// compose with `?` and end in [`AtomicBatch::commit`]. They validate and
/// account eagerly: quota and codec errors surface at the call site, and
/// `commit` only performs I/O. All mutations in a committed batch carry a
/// single versionstamp and apply in insertion order.
pub struct AtomicBatch<'a, S: OrderedStore> {
    db: &'a Database<S>,
    checks: Vec<Check>,
    mutations: Vec<Mutation>,
    total_key_size: usize,
    total_mutation_size: usize,
}

impl<'a, S: OrderedStore> std::fmt::Debug for AtomicBatch<'a, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicBatch")
            .field("checks", &self.checks)
            .field("mutations", &self.mutations)
            .field("total_key_size", &self.total_key_size)
            .field("total_mutation_size", &self.total_mutation_size)
            .finish()
    }
}

impl<'a, S: OrderedStore> AtomicBatch<'a, S> {
    pub(crate) fn new(db: &'a Database<S>) -> Self {
        Self {
            db,
            checks: Vec::new(),
            mutations: Vec::new(),
            total_key_size: 0,
            total_mutation_size: 0,
        }
    }

    fn encode_nonempty(&self, key: &Key, limit: KeyLimit) -> Result<Vec<u8>, KvError> {
        if key.is_empty() {
            return Err(KvError::EmptyKey);
        }
        Ok(encode_key(key, limit)?)
    }

    /// Requires `key`'s current versionstamp to equal `expected` at commit
    /// time; `None` matches an absent or expired entry.
    pub fn check(
        mut self,
        key: &Key,
        expected: Option<Versionstamp>,
    ) -> Result<Self, KvError> {
        if self.checks.len() >= MAX_CHECKS {
            return Err(KvError::TooManyChecks {
                count: self.checks.len() + 1,
            });
        }
        let encoded = self.encode_nonempty(key, KeyLimit::Read)?;
        self.checks.push(Check {
            key_hash: key_hash(&encoded),
            expected,
        });
        Ok(self)
    }

    fn push_mutation(
        mut self,
        key: &Key,
        op: MutationOp,
        payload_size: usize,
    ) -> Result<Self, KvError> {
        if self.mutations.len() >= MAX_MUTATIONS {
            return Err(KvError::TooManyMutations {
                count: self.mutations.len() + 1,
            });
        }
        let encoded = self.encode_nonempty(key, KeyLimit::Write)?;
        self.total_key_size += encoded.len();
        self.total_mutation_size += encoded.len() + payload_size;
        self.mutations.push(Mutation {
            key_hash: key_hash(&encoded),
            op,
        });
        Ok(self)
    }

    /// Queues a write of `value` at `key`, with optional expiry.
    pub fn set(
        self,
        key: &Key,
        value: &Value,
        expire_in: Option<Duration>,
    ) -> Result<Self, KvError> {
        if expire_in.is_some_and(|d| d.as_millis() == 0) {
            return Err(KvError::InvalidExpiry);
        }
        let bytes = self.db.codec.encode(value)?;
        let size = bytes.len();
        self.push_mutation(
            key,
            MutationOp::Set {
                value: bytes,
                expire_in,
            },
            size,
        )
    }

    /// Queues an unconditional removal of `key`.
    pub fn delete(self, key: &Key) -> Result<Self, KvError> {
        self.push_mutation(key, MutationOp::Delete, 0)
    }

    /// Queues a wrapping add of `operand` into the counter at `key`.
    pub fn sum(self, key: &Key, operand: KvU64) -> Result<Self, KvError> {
        self.push_mutation(key, MutationOp::Sum(operand), 8)
    }

    /// Queues `min(current, operand)` on the counter at `key`.
    pub fn min(self, key: &Key, operand: KvU64) -> Result<Self, KvError> {
        self.push_mutation(key, MutationOp::Min(operand), 8)
    }

    /// Queues `max(current, operand)` on the counter at `key`.
    pub fn max(self, key: &Key, operand: KvU64) -> Result<Self, KvError> {
        self.push_mutation(key, MutationOp::Max(operand), 8)
    }

    /// Executes the batch in one transaction.
    ///
    /// Returns [`CommitResult::Conflict`] when a check fails (or a
    /// transient storage failure rolls the batch back); returns an error
    /// for [`KvError::NotACounter`], which indicates bad data rather than
    /// contention.
    pub fn commit(self) -> Result<CommitResult, KvError> {
        self.db.ensure_open()?;

        if self.total_key_size > MAX_TOTAL_KEY_SIZE {
            return Err(KvError::TotalKeySizeExceeded {
                size: self.total_key_size,
            });
        }
        if self.total_mutation_size > MAX_TOTAL_MUTATION_SIZE {
            return Err(KvError::TotalMutationSizeExceeded {
                size: self.total_mutation_size,
            });
        }

        let versionstamp = self.db.clock.next();
        let now = now_millis();

        let outcome: Result<(), TxnAbort> = self.db.store.with_transaction(|txn| {
            for check in &self.checks {
                let actual = txn.get(&check.key_hash, now)?.map(|e| e.versionstamp);
                if actual != check.expected {
                    return Err(TxnAbort::Conflict);
                }
            }
            for mutation in &self.mutations {
                self.apply(txn, mutation, versionstamp, now)?;
            }
            Ok(())
        });

        match outcome {
            Ok(()) => {
                debug!(%versionstamp, mutations = self.mutations.len(), "batch committed");
                Ok(CommitResult::Committed { versionstamp })
            }
            Err(TxnAbort::Conflict) => Ok(CommitResult::Conflict),
            Err(TxnAbort::Fatal(err)) => match err {
                err @ KvError::NotACounter { .. } => Err(err),
                _ => Ok(CommitResult::Conflict),
            },
        }
    }

    fn apply(
        &self,
        txn: &dyn StoreOps,
        mutation: &Mutation,
        versionstamp: Versionstamp,
        now: i64,
    ) -> Result<(), TxnAbort> {
        match &mutation.op {
            MutationOp::Set { value, expire_in } => {
                let expires_at = expire_in.map(|d| now + d.as_millis() as i64);
                txn.put(&mutation.key_hash, value, versionstamp, expires_at)?;
            }
            MutationOp::Delete => {
                txn.delete(&mutation.key_hash)?;
            }
            MutationOp::Sum(operand) | MutationOp::Min(operand) | MutationOp::Max(operand) => {
                let op = mutation.op.counter_op_name().unwrap_or("sum");
                let current = match txn.get(&mutation.key_hash, now)? {
                    Some(entry) => {
                        let value = self
                            .db
                            .codec
                            .decode(&entry.value)
                            .map_err(|e| TxnAbort::Fatal(e.into()))?;
                        match value.as_u64() {
                            Some(counter) => Some(counter),
                            None => return Err(TxnAbort::Fatal(KvError::NotACounter { op })),
                        }
                    }
                    None => None,
                };

                let next = match (&mutation.op, current) {
                    (_, None) => *operand,
                    (MutationOp::Sum(_), Some(current)) => current.wrapping_sum(*operand),
                    (MutationOp::Min(_), Some(current)) => current.min(*operand),
                    (MutationOp::Max(_), Some(current)) => current.max(*operand),
                    _ => unreachable!("non-counter op in counter arm"),
                };

                let bytes = self
                    .db
                    .codec
                    .encode(&Value::U64(next))
                    .map_err(|e| TxnAbort::Fatal(e.into()))?;
                txn.put(&mutation.key_hash, &bytes, versionstamp, None)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Config, ListOptions, Selector};
    use crate::store::SqliteStore;

    fn open() -> Database<SqliteStore> {
        Database::open(None, Config::default()).unwrap()
    }

    fn key(name: &str) -> Key {
        Key::from(crate::key::KeyPart::from(name))
    }

    fn committed(result: CommitResult) -> Versionstamp {
        match result {
            CommitResult::Committed { versionstamp } => versionstamp,
            CommitResult::Conflict => panic!("expected commit, got conflict"),
        }
    }

    #[test]
    fn test_counter_wrap_at_2_64() {
        let db = open();
        let k = key("a");

        db.set(&k, &Value::U64(KvU64::new(u64::MAX)), None).unwrap();
        let result = db
            .atomic()
            .sum(&k, KvU64::new(10))
            .unwrap()
            .commit()
            .unwrap();
        assert!(result.is_committed());

        assert_eq!(db.get(&k).unwrap().value, Some(Value::U64(KvU64::new(9))));
    }

    #[test]
    fn test_sum_on_absent_key_initializes() {
        let db = open();
        let k = key("fresh");

        db.atomic().sum(&k, KvU64::new(41)).unwrap().commit().unwrap();
        assert_eq!(db.get(&k).unwrap().value, Some(Value::U64(KvU64::new(41))));
    }

    #[test]
    fn test_min_max_mutations() {
        let db = open();
        let k = key("m");

        db.set(&k, &Value::U64(KvU64::new(50)), None).unwrap();

        db.atomic().min(&k, KvU64::new(10)).unwrap().commit().unwrap();
        assert_eq!(db.get(&k).unwrap().value, Some(Value::U64(KvU64::new(10))));

        db.atomic().min(&k, KvU64::new(90)).unwrap().commit().unwrap();
        assert_eq!(db.get(&k).unwrap().value, Some(Value::U64(KvU64::new(10))));

        db.atomic().max(&k, KvU64::new(70)).unwrap().commit().unwrap();
        assert_eq!(db.get(&k).unwrap().value, Some(Value::U64(KvU64::new(70))));

        db.atomic().max(&k, KvU64::new(3)).unwrap().commit().unwrap();
        assert_eq!(db.get(&k).unwrap().value, Some(Value::U64(KvU64::new(70))));
    }

    #[test]
    fn test_optimistic_check_failure() {
        let db = open();
        let k = key("t");

        let vs_a = db.set(&k, &Value::from("1"), None).unwrap();
        let vs_b = db.set(&k, &Value::from("2"), None).unwrap();
        assert!(vs_b > vs_a);

        let result = db
            .atomic()
            .check(&k, Some(vs_a))
            .unwrap()
            .set(&k, &Value::from("3"), None)
            .unwrap()
            .commit()
            .unwrap();
        assert_eq!(result, CommitResult::Conflict);
        assert_eq!(db.get(&k).unwrap().value, Some(Value::from("2")));

        // The current stamp passes.
        let result = db
            .atomic()
            .check(&k, Some(vs_b))
            .unwrap()
            .set(&k, &Value::from("3"), None)
            .unwrap()
            .commit()
            .unwrap();
        assert!(result.is_committed());
        assert_eq!(db.get(&k).unwrap().value, Some(Value::from("3")));
    }

    #[test]
    fn test_check_none_matches_absent() {
        let db = open();
        let absent = key("absent");
        let present = key("present");
        db.set(&present, &Value::Int(1), None).unwrap();

        let result = db
            .atomic()
            .check(&absent, None)
            .unwrap()
            .set(&absent, &Value::Int(1), None)
            .unwrap()
            .commit()
            .unwrap();
        assert!(result.is_committed());

        let result = db
            .atomic()
            .check(&present, None)
            .unwrap()
            .set(&present, &Value::Int(2), None)
            .unwrap()
            .commit()
            .unwrap();
        assert_eq!(result, CommitResult::Conflict);
        assert_eq!(db.get(&present).unwrap().value, Some(Value::Int(1)));
    }

    #[test]
    fn test_failed_check_applies_nothing() {
        let db = open();
        let guard = key("guard");
        let a = key("a");
        let b = key("b");
        let vs = db.set(&guard, &Value::Int(0), None).unwrap();
        db.set(&a, &Value::from("before"), None).unwrap();

        // Bump guard so the recorded stamp is stale.
        db.set(&guard, &Value::Int(1), None).unwrap();

        let result = db
            .atomic()
            .check(&guard, Some(vs))
            .unwrap()
            .set(&a, &Value::from("after"), None)
            .unwrap()
            .set(&b, &Value::from("new"), None)
            .unwrap()
            .commit()
            .unwrap();
        assert_eq!(result, CommitResult::Conflict);

        assert_eq!(db.get(&a).unwrap().value, Some(Value::from("before")));
        assert_eq!(db.get(&b).unwrap().value, None);
    }

    #[test]
    fn test_counter_type_guard() {
        let db = open();
        let k = key("a");

        db.set(&k, &Value::Int(1), None).unwrap();
        let err = db
            .atomic()
            .sum(&k, KvU64::new(1))
            .unwrap()
            .commit()
            .unwrap_err();
        assert!(matches!(err, KvError::NotACounter { op: "sum" }));

        // The failed batch left the value untouched.
        assert_eq!(db.get(&k).unwrap().value, Some(Value::Int(1)));

        let err = db
            .atomic()
            .min(&k, KvU64::new(1))
            .unwrap()
            .commit()
            .unwrap_err();
        assert!(matches!(err, KvError::NotACounter { op: "min" }));
    }

    #[test]
    fn test_type_guard_rolls_back_earlier_mutations() {
        let db = open();
        let plain = key("plain");
        let other = key("other");
        db.set(&plain, &Value::from("text"), None).unwrap();

        let err = db
            .atomic()
            .set(&other, &Value::Int(1), None)
            .unwrap()
            .sum(&plain, KvU64::new(1))
            .unwrap()
            .commit()
            .unwrap_err();
        assert!(matches!(err, KvError::NotACounter { .. }));
        assert_eq!(db.get(&other).unwrap().value, None);
    }

    #[test]
    fn test_mutations_apply_in_insertion_order() {
        let db = open();
        let k = key("ord");

        let result = db
            .atomic()
            .set(&k, &Value::Int(1), None)
            .unwrap()
            .delete(&k)
            .unwrap()
            .commit()
            .unwrap();
        assert!(result.is_committed());
        assert_eq!(db.get(&k).unwrap().value, None);

        let result = db
            .atomic()
            .delete(&k)
            .unwrap()
            .set(&k, &Value::Int(2), None)
            .unwrap()
            .commit()
            .unwrap();
        assert!(result.is_committed());
        assert_eq!(db.get(&k).unwrap().value, Some(Value::Int(2)));
    }

    #[test]
    fn test_batch_shares_one_versionstamp() {
        let db = open();
        let a = key("a");
        let b = key("b");

        let result = db
            .atomic()
            .set(&a, &Value::Int(1), None)
            .unwrap()
            .set(&b, &Value::Int(2), None)
            .unwrap()
            .commit()
            .unwrap();
        let vs = committed(result);

        assert_eq!(db.get(&a).unwrap().versionstamp, Some(vs));
        assert_eq!(db.get(&b).unwrap().versionstamp, Some(vs));
    }

    #[test]
    fn test_later_batches_get_larger_stamps() {
        let db = open();
        let k = key("a");

        let vs1 = committed(
            db.atomic()
                .set(&k, &Value::Int(1), None)
                .unwrap()
                .commit()
                .unwrap(),
        );
        let vs2 = committed(
            db.atomic()
                .set(&k, &Value::Int(2), None)
                .unwrap()
                .commit()
                .unwrap(),
        );
        assert!(vs2 > vs1);
    }

    #[test]
    fn test_check_quota() {
        let db = open();
        let mut batch = db.atomic();
        for i in 0..MAX_CHECKS {
            batch = batch.check(&key(&format!("k{i}")), None).unwrap();
        }
        let err = batch.check(&key("one-too-many"), None).unwrap_err();
        assert!(matches!(err, KvError::TooManyChecks { count: 101 }));
    }

    #[test]
    fn test_mutation_quota() {
        let db = open();
        let mut batch = db.atomic();
        for i in 0..MAX_MUTATIONS {
            batch = batch
                .set(&key(&format!("k{i}")), &Value::Int(0), None)
                .unwrap();
        }
        let err = batch
            .set(&key("one-too-many"), &Value::Int(0), None)
            .unwrap_err();
        assert!(matches!(err, KvError::TooManyMutations { count: 1001 }));
    }

    #[test]
    fn test_total_key_size_preflight() {
        let db = open();
        let mut batch = db.atomic();
        // 41 keys of 2048 encoded bytes exceed the 81920-byte budget.
        for i in 0..41u8 {
            let bytes = vec![i; 2046];
            batch = batch
                .delete(&Key::from(crate::key::KeyPart::from(bytes)))
                .unwrap();
        }
        let err = batch.commit().unwrap_err();
        assert!(matches!(err, KvError::TotalKeySizeExceeded { .. }));
    }

    #[test]
    fn test_total_mutation_size_preflight() {
        let db = open();
        let mut batch = db.atomic();
        // 13 values of ~64KiB exceed the 819200-byte budget.
        for i in 0..13u8 {
            batch = batch
                .set(
                    &key(&format!("k{i}")),
                    &Value::Bytes(vec![0u8; 65_000]),
                    None,
                )
                .unwrap();
        }
        let err = batch.commit().unwrap_err();
        assert!(matches!(err, KvError::TotalMutationSizeExceeded { .. }));
    }

    #[test]
    fn test_empty_batch_commits() {
        let db = open();
        let result = db.atomic().commit().unwrap();
        assert!(result.is_committed());
    }

    #[test]
    fn test_set_mutation_with_expiry() {
        let db = open();
        let k = key("ttl");

        db.atomic()
            .set(&k, &Value::Int(1), Some(Duration::from_millis(20)))
            .unwrap()
            .commit()
            .unwrap();
        assert_eq!(db.get(&k).unwrap().value, Some(Value::Int(1)));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(db.get(&k).unwrap().value, None);
    }

    #[test]
    fn test_sum_visible_to_listing() {
        let db = open();
        let prefix = Key::from(crate::key::KeyPart::from("counters"));
        let k = prefix.with_part(crate::key::KeyPart::from("hits"));

        db.atomic().sum(&k, KvU64::new(2)).unwrap().commit().unwrap();
        db.atomic().sum(&k, KvU64::new(3)).unwrap().commit().unwrap();

        let entries: Vec<_> = db
            .list(&Selector::Prefix(prefix), ListOptions::default())
            .unwrap()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, Some(Value::U64(KvU64::new(5))));
    }
}
