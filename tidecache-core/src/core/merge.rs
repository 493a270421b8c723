//! Merge rules shared by the in-memory stores
//!
//! Entities are classified by shape (sequence, record, primitive) and each
//! shape has its own combination rule. The default `MergeShallow` strategy
//! is the flat rule: sequences concatenate, records take the incoming
//! top-level fields, anything else is replaced by the incoming value.

use super::types::MergeStrategy;
use serde_json::{Map, Value};

/// Shape of an entity as seen by the merge rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Absent,
    Sequence,
    Record,
    Primitive,
}

/// Entity types that can participate in partial updates
pub trait Mergeable: Sized {
    /// Classify this value
    fn shape(&self) -> Shape;

    /// Sentinel returned by sequence stores for an out-of-range index
    fn empty_sequence() -> Self;

    /// Combine two values of the same non-absent shape
    ///
    /// Only called once absence and primitives have been ruled out by
    /// [`merge`].
    fn combine(self, incoming: Self, strategy: MergeStrategy) -> Self;

    fn is_primitive(&self) -> bool {
        matches!(self.shape(), Shape::Primitive)
    }
}

/// Merge `incoming` into `existing` under `strategy`
pub fn merge<T: Mergeable>(existing: Option<T>, incoming: Option<T>, strategy: MergeStrategy) -> Option<T> {
    match (existing, incoming) {
        (None, incoming) => incoming,
        (existing, None) => existing,
        (Some(a), Some(b)) => Some(merge_present(a, b, strategy)),
    }
}

fn merge_present<T: Mergeable>(a: T, b: T, strategy: MergeStrategy) -> T {
    if strategy == MergeStrategy::Overwrite {
        return b;
    }

    match (a.shape(), b.shape()) {
        (Shape::Absent, _) => b,
        (_, Shape::Absent) => a,
        (Shape::Sequence, Shape::Sequence) | (Shape::Record, Shape::Record) => {
            a.combine(b, strategy)
        }
        _ => b,
    }
}

impl Mergeable for Value {
    fn shape(&self) -> Shape {
        match self {
            Value::Null => Shape::Absent,
            Value::Array(_) => Shape::Sequence,
            Value::Object(_) => Shape::Record,
            _ => Shape::Primitive,
        }
    }

    fn empty_sequence() -> Self {
        Value::Array(Vec::new())
    }

    fn combine(self, incoming: Self, strategy: MergeStrategy) -> Self {
        match (self, incoming) {
            (Value::Array(mut a), Value::Array(b)) => {
                a.extend(b);
                Value::Array(a)
            }
            (Value::Object(a), Value::Object(b)) => Value::Object(merge_records(a, b, strategy)),
            (_, b) => b,
        }
    }
}

fn merge_records(mut a: Map<String, Value>, b: Map<String, Value>, strategy: MergeStrategy) -> Map<String, Value> {
    for (field, value) in b {
        let value = match (strategy, a.get_mut(&field), value) {
            (MergeStrategy::MergeDeep, Some(Value::Object(existing)), Value::Object(incoming)) => {
                let current = std::mem::take(existing);
                *existing = merge_records(current, incoming, strategy);
                continue;
            }
            (_, _, value) => value,
        };
        a.insert(field, value);
    }
    a
}
