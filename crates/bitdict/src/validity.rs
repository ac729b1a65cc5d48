//! Value validity constraints declared with a field's `valid` key.
//!
//! A value is valid when no constraint is declared, when it belongs to the
//! value set, or when it falls in any of the ranges. Ranges follow half-open
//! arithmetic progression semantics: `[stop]`, `[start, stop]` or
//! `[start, stop, step]`, with negative steps counting down.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use crate::value::Scalar;

/// One `range(start, stop, step)` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ValidRange {
    pub start: i128,
    pub stop: i128,
    pub step: i128,
}

impl ValidRange {
    /// Builds a range from a 1 to 3 element tuple. Fails on other lengths and
    /// on a zero step.
    pub fn from_tuple(tuple: &[i128]) -> Option<Self> {
        let range = match *tuple {
            [stop] => ValidRange {
                start: 0,
                stop,
                step: 1,
            },
            [start, stop] => ValidRange {
                start,
                stop,
                step: 1,
            },
            [start, stop, step] => ValidRange { start, stop, step },
            _ => return None,
        };

        (range.step != 0).then_some(range)
    }

    /// Number of values the range expands to.
    pub fn len(&self) -> u128 {
        let (lo, hi) = if self.step > 0 {
            (self.start, self.stop)
        } else {
            (self.stop, self.start)
        };

        if hi <= lo {
            0
        } else {
            distance(lo, hi).div_ceil(self.step.unsigned_abs())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest and largest values of the expansion, if any.
    pub fn bounds(&self) -> Option<(i128, i128)> {
        let n = self.len();
        if n == 0 {
            return None;
        }

        // The last element lies between start and stop, so the wrapping
        // arithmetic lands back inside i128.
        let offset = (n - 1) * self.step.unsigned_abs();
        let last = if self.step > 0 {
            (self.start as u128).wrapping_add(offset) as i128
        } else {
            (self.start as u128).wrapping_sub(offset) as i128
        };
        Some((self.start.min(last), self.start.max(last)))
    }

    pub fn contains(&self, value: i128) -> bool {
        let step = self.step.unsigned_abs();
        if self.step > 0 {
            self.start <= value && value < self.stop && distance(self.start, value) % step == 0
        } else {
            self.stop < value && value <= self.start && distance(value, self.start) % step == 0
        }
    }
}

/// `hi - lo` for `lo <= hi`, exact over the whole i128 range.
fn distance(lo: i128, hi: i128) -> u128 {
    (hi as u128).wrapping_sub(lo as u128)
}

impl fmt::Display for ValidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.step == 1 {
            write!(f, "({}, {})", self.start, self.stop)
        } else {
            write!(f, "({}, {}, {})", self.start, self.stop, self.step)
        }
    }
}

/// A validated `valid` constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Valid {
    pub value: Option<BTreeSet<i128>>,
    pub range: Option<Vec<ValidRange>>,
}

impl Valid {
    pub fn contains(&self, value: i128) -> bool {
        self.value.as_ref().is_some_and(|set| set.contains(&value))
            || self
                .range
                .as_ref()
                .is_some_and(|ranges| ranges.iter().any(|r| r.contains(value)))
    }
}

/// Checks `value` against an optional constraint.
pub fn is_valid(valid: Option<&Valid>, value: i128) -> bool {
    valid.is_none_or(|v| v.contains(value))
}

/// A field flagged by [crate::record::RecordRef::inspect].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The offending scalar value.
    Value(Scalar),
    /// Violations found inside the selected variant of a bitdict field.
    Nested(Inspection),
}

/// Field name to violation mapping.
pub type Inspection = BTreeMap<String, Violation>;

impl Violation {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Violation::Value(scalar) => scalar.to_json(),
            Violation::Nested(inner) => serde_json::Value::Object(
                inner
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}
