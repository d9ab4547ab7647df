//! Read-only parser for Microsoft Access (Jet/MDB/ACCDB) database files

/// Byte cursor primitives
mod bytes;
/// Fixed on-disk structure readers
pub mod codec;
/// Database façade
pub mod db;
/// Version-variant layout definitions
pub mod format;
/// Page classification
pub mod pages;
/// Long-value property blobs
pub mod props;
/// Table schema and record decoding
pub mod table;
/// Usage-map bitmaps
pub mod usemap;
/// Typed field values
pub mod value;

pub use self::db::{Database, Error};
pub use self::format::{JetVersion, TypeCode};
pub use self::table::{Table, TableData};
pub use self::value::Value;
