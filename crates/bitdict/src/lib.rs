//! # bitdict
//!
//! Schema-driven bit-packed records.
//!
//! A schema declares named fields as bit ranges of one integer, typed `bool`,
//! `uint`, `int`, `reserved` (padding) or `bitdict` (a nested record whose
//! layout is picked at runtime by a selector field). A compiled
//! [RecordType] creates [Record]s that read and write fields by name while
//! keeping the packed integer, and every nested variant, in sync.
//!
//! ## Example
//!
//! ```
//! use bitdict::{Field, RecordType};
//!
//! let ty = RecordType::compile(&[
//!     Field::bool("Constant", 7),
//!     Field::bool("Mode", 6),
//!     Field::reserved("Reserved", 4, 2),
//!     Field::bitdict(
//!         "SubValue",
//!         0,
//!         4,
//!         "Mode",
//!         vec![
//!             Some(vec![Field::uint("PropA", 0, 2), Field::int("PropB", 2, 2).with_default(-1)]),
//!             Some(vec![
//!                 Field::uint("PropC", 0, 3).with_default(1),
//!                 Field::bool("PropD", 3).with_default(true),
//!             ]),
//!         ],
//!     ),
//! ])
//! .unwrap();
//!
//! let mut rec = ty.from_int(0x8C).unwrap();
//! assert_eq!(rec.get("Constant").unwrap(), true);
//! assert_eq!(rec.sub("SubValue").unwrap().get("PropB").unwrap(), -1i64);
//!
//! rec.set("Mode", true).unwrap();
//! assert_eq!(rec.sub("SubValue").unwrap().to_int(), 9);
//! assert_eq!(rec.to_bytes(), vec![0xC9]);
//! ```

pub mod bits;
pub mod compiled;
pub mod errors;
pub mod field;
pub mod json;
pub mod markdown;
pub mod record;
pub mod schema;
pub mod validity;
pub mod value;

pub use compiled::{CompiledField, CompiledKind, RecordType};
pub use errors::{AccessError, SchemaError};
pub use field::{Field, FieldType};
pub use record::{FieldValue, Record, RecordMut, RecordRef};
pub use validity::{Inspection, Violation};
pub use value::{Scalar, Value};
