//! Version-parameterized readers for the fixed on-disk structures.
//!
//! Every reader takes a [`Cursor`] (or [`BackCursor`] for the record
//! trailer, which grows backwards from the record's end) and the
//! [`JetVersion`] that selects field widths. All integers are
//! little-endian.

use std::{error, fmt};

use crate::bytes::{self, BackCursor, Cursor};
use crate::format::{
    ColumnFlags, JetVersion, TypeCode, DATA_PAGE_MAGIC, FILE_HEADER_MAGIC, TDEF_PAGE_MAGIC,
};
use crate::props::PropertyMap;
use crate::value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Truncated(bytes::Error),
    BadPageMagic { expected: [u8; 2], found: [u8; 2] },
    BadFileMagic,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated(err) => write!(f, "structure extends past buffer: {err}"),
            Self::BadPageMagic { expected, found } => write!(
                f,
                "bad page magic: expected {expected:02x?}, found {found:02x?}"
            ),
            Self::BadFileMagic => f.write_str("bad file header magic"),
        }
    }
}

impl error::Error for Error {}

impl From<bytes::Error> for Error {
    fn from(err: bytes::Error) -> Self {
        Self::Truncated(err)
    }
}

fn expect_magic(cur: &mut Cursor<'_>, expected: [u8; 2]) -> Result<(), Error> {
    let found = cur.read_array::<2>()?;
    if found != expected {
        return Err(Error::BadPageMagic { expected, found });
    }
    Ok(())
}

/// File header on page 0.
///
/// Only the magic, the tool string and the version word matter; the 126
/// bytes that follow are RC4-encrypted database metadata and are skipped.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub jet_string: String,
    pub jet_version: u32,
}

impl FileHeader {
    pub fn read(cur: &mut Cursor<'_>) -> Result<Self, Error> {
        let magic = cur.read_array::<4>()?;
        if magic != FILE_HEADER_MAGIC {
            return Err(Error::BadFileMagic);
        }
        let jet_string = String::from_utf8_lossy(cur.read_cstring()?).into_owned();
        let jet_version = cur.read_u32()?;
        cur.skip(126)?;
        Ok(Self {
            jet_string,
            jet_version,
        })
    }
}

/// Leading header shared by every TDEF page. `next_page_ptr` chains
/// additional pages when a schema does not fit in one; 0 ends the chain.
#[derive(Debug, Clone, Copy)]
pub struct TdefHeader {
    pub version_tag: u16,
    pub next_page_ptr: u32,
}

impl TdefHeader {
    /// Bytes consumed by the header on every chained page.
    pub const LEN: usize = 8;

    pub fn read(cur: &mut Cursor<'_>) -> Result<Self, Error> {
        expect_magic(cur, TDEF_PAGE_MAGIC)?;
        let version_tag = cur.read_u16()?;
        let next_page_ptr = cur.read_u32()?;
        Ok(Self {
            version_tag,
            next_page_ptr,
        })
    }
}

/// (row, page) pointer to the data-page slot holding a usage map.
/// Packed on disk as one 32-bit word: a row byte followed by a 24-bit
/// page number.
#[derive(Debug, Clone, Copy)]
pub struct MapPointer {
    pub row: u8,
    pub page: u32,
}

impl MapPointer {
    fn read(cur: &mut Cursor<'_>) -> Result<Self, Error> {
        let row = cur.read_u8()?;
        let page = cur.read_u24()?;
        Ok(Self { row, page })
    }
}

/// Fixed-size prefix of a table definition.
#[derive(Debug, Clone)]
pub struct TableHeader {
    pub tdef: TdefHeader,
    pub definition_length: u32,
    pub row_count: u32,
    pub autonumber: u32,
    pub autonumber_increment: Option<u32>,
    pub complex_autonumber: Option<u32>,
    /// 0x53 system table, 0x4E user table
    pub table_type: u8,
    pub next_column_id: u16,
    pub variable_columns: u16,
    pub column_count: u16,
    pub index_count: u32,
    pub real_index_count: u32,
    pub row_page_map: MapPointer,
    pub free_space_map: MapPointer,
    /// Offset of the column/index arrays within the first TDEF page.
    pub header_end: usize,
}

impl TableHeader {
    pub fn read(cur: &mut Cursor<'_>, version: JetVersion) -> Result<Self, Error> {
        let tdef = TdefHeader::read(cur)?;
        let definition_length = cur.read_u32()?;
        if version.is_v4_plus() {
            cur.skip(4)?;
        }
        let row_count = cur.read_u32()?;
        let autonumber = cur.read_u32()?;
        let mut autonumber_increment = None;
        let mut complex_autonumber = None;
        if version.is_v4_plus() {
            autonumber_increment = Some(cur.read_u32()?);
            complex_autonumber = Some(cur.read_u32()?);
            cur.skip(8)?;
        }
        let table_type = cur.read_u8()?;
        let next_column_id = cur.read_u16()?;
        let variable_columns = cur.read_u16()?;
        let column_count = cur.read_u16()?;
        let index_count = cur.read_u32()?;
        let real_index_count = cur.read_u32()?;
        let row_page_map = MapPointer::read(cur)?;
        let free_space_map = MapPointer::read(cur)?;
        Ok(Self {
            tdef,
            definition_length,
            row_count,
            autonumber,
            autonumber_increment,
            complex_autonumber,
            table_type,
            next_column_id,
            variable_columns,
            column_count,
            index_count,
            real_index_count,
            row_page_map,
            free_space_map,
            header_end: cur.pos(),
        })
    }
}

/// Type-specific region of a column descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnAux {
    /// Jet 3 text collation info
    TextV3 { lcid: u16, code_page: u16 },
    /// Jet 4+ text collation info
    TextV4 { collation: u16, collation_version: u8 },
    /// Digit counts for the scalar types (codes 1-8)
    Digits { max_digits: u8, decimal_places: u8 },
    /// Precision and scale for 17-byte decimals (code 16)
    Numeric { precision: u8, scale: u8 },
    /// Opaque bytes for everything else
    Opaque,
}

impl ColumnAux {
    fn read(cur: &mut Cursor<'_>, type_code: u8, version: JetVersion) -> Result<Self, Error> {
        let kind = TypeCode::try_from(type_code).ok();
        match kind {
            Some(k) if k.has_text_info() => {
                if version.is_v4_plus() {
                    let collation = cur.read_u16()?;
                    cur.skip(1)?;
                    let collation_version = cur.read_u8()?;
                    Ok(Self::TextV4 {
                        collation,
                        collation_version,
                    })
                } else {
                    let lcid = cur.read_u16()?;
                    let code_page = cur.read_u16()?;
                    cur.skip(2)?;
                    Ok(Self::TextV3 { lcid, code_page })
                }
            }
            Some(TypeCode::Decimal) => {
                let precision = cur.read_u8()?;
                let scale = cur.read_u8()?;
                cur.skip(if version.is_v4_plus() { 2 } else { 4 })?;
                Ok(Self::Numeric { precision, scale })
            }
            Some(k) if k.has_decimal_info() => {
                if version.is_v4_plus() {
                    let max_digits = cur.read_u8()?;
                    let decimal_places = cur.read_u8()?;
                    cur.skip(2)?;
                    Ok(Self::Digits {
                        max_digits,
                        decimal_places,
                    })
                } else {
                    cur.skip(2)?;
                    let max_digits = cur.read_u8()?;
                    let decimal_places = cur.read_u8()?;
                    cur.skip(2)?;
                    Ok(Self::Digits {
                        max_digits,
                        decimal_places,
                    })
                }
            }
            _ => {
                cur.skip(if version.is_v4_plus() { 4 } else { 6 })?;
                Ok(Self::Opaque)
            }
        }
    }

    /// Decimal scale, when the column declares one.
    #[must_use]
    pub fn scale(&self) -> Option<u8> {
        match self {
            Self::Numeric { scale, .. } => Some(*scale),
            _ => None,
        }
    }
}

/// One column descriptor from the TDEF column array, plus the display
/// name and property map attached by the table reader.
#[derive(Debug, Clone)]
pub struct Column {
    pub type_code: u8,
    /// Monotonic id, stable across column deletions
    pub column_id: u16,
    /// Ordinal within the variable-length columns
    pub variable_column_number: u16,
    /// Compacted position, governs row-layout ordering
    pub column_index: u16,
    pub aux: ColumnAux,
    pub flags: ColumnFlags,
    /// Byte offset into the record's fixed region
    pub fixed_offset: u16,
    pub length: u16,
    pub name: String,
    pub props: Option<PropertyMap>,
}

impl Column {
    pub fn read(cur: &mut Cursor<'_>, version: JetVersion) -> Result<Self, Error> {
        let type_code = cur.read_u8()?;
        if version.is_v4_plus() {
            cur.skip(4)?;
        }
        let column_id = cur.read_u16()?;
        let variable_column_number = cur.read_u16()?;
        let column_index = cur.read_u16()?;
        let aux = ColumnAux::read(cur, type_code, version)?;
        let flags = if version.is_v4_plus() {
            // Big-endian flag word
            let b = cur.read_array::<2>()?;
            ColumnFlags::from_v4(u16::from_be_bytes(b))
        } else {
            ColumnFlags::from_v3(cur.read_u8()?)
        };
        if version.is_v4_plus() {
            cur.skip(4)?;
        }
        let fixed_offset = cur.read_u16()?;
        let length = cur.read_u16()?;
        Ok(Self {
            type_code,
            column_id,
            variable_column_number,
            column_index,
            aux,
            flags,
            fixed_offset,
            length,
            name: String::new(),
            props: None,
        })
    }

    #[must_use]
    pub fn kind(&self) -> Option<TypeCode> {
        TypeCode::try_from(self.type_code).ok()
    }

    #[must_use]
    pub fn is_fixed_length(&self) -> bool {
        self.flags.fixed_length()
    }
}

/// Length-prefixed display name; single-byte text in Jet 3, UTF-16LE in
/// Jet 4+ (the prefix counts bytes in both).
pub fn read_name(cur: &mut Cursor<'_>, version: JetVersion) -> Result<String, Error> {
    let len = if version.is_v4_plus() {
        cur.read_u16()? as usize
    } else {
        cur.read_u8()? as usize
    };
    let bytes = cur.read_bytes(len)?;
    Ok(if version.is_v4_plus() {
        value::decode_utf16le(bytes)
    } else {
        value::decode_single_byte(bytes)
    })
}

/// Schema-index bookkeeping entry (first index array).
#[derive(Debug, Clone, Copy)]
pub struct RealIndex {
    pub unknown: u32,
    pub index_row_count: u32,
}

impl RealIndex {
    fn read(cur: &mut Cursor<'_>, version: JetVersion) -> Result<Self, Error> {
        let unknown = cur.read_u32()?;
        let index_row_count = cur.read_u32()?;
        if version.is_v4_plus() {
            cur.skip(4)?;
        }
        Ok(Self {
            unknown,
            index_row_count,
        })
    }
}

/// One of the ten column slots of an index column list. `col_id` 0xFFFF
/// marks an unused slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexColumnSlot {
    pub col_id: u16,
    pub idx_flags: u8,
}

/// Second index array entry: the columns an index covers.
#[derive(Debug, Clone)]
pub struct IndexColumns {
    pub slots: Vec<IndexColumnSlot>,
    pub first_index_page: u32,
    pub flags: u8,
}

impl IndexColumns {
    fn read(cur: &mut Cursor<'_>, version: JetVersion) -> Result<Self, Error> {
        if version.is_v4_plus() {
            cur.skip(4)?;
        }
        let mut slots = Vec::with_capacity(10);
        for _ in 0..10 {
            let col_id = cur.read_u16()?;
            let idx_flags = cur.read_u8()?;
            slots.push(IndexColumnSlot { col_id, idx_flags });
        }
        cur.skip(4)?;
        let first_index_page = cur.read_u32()?;
        let flags = cur.read_u8()?;
        if version.is_v4_plus() {
            cur.skip(9)?;
        }
        Ok(Self {
            slots,
            first_index_page,
            flags,
        })
    }
}

/// Entry of the all-indexes array; `idx_type == 1` marks a primary key.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub idx_num: u32,
    pub idx_col_num: u32,
    pub relationship_table_type: u8,
    pub related_index_num: i32,
    pub related_table_page: u32,
    pub cascade_updates: u8,
    pub cascade_deletes: u8,
    pub idx_type: u8,
    pub name: String,
}

impl IndexInfo {
    fn read(cur: &mut Cursor<'_>, version: JetVersion) -> Result<Self, Error> {
        if version.is_v4_plus() {
            cur.skip(4)?;
        }
        let idx_num = cur.read_u32()?;
        let idx_col_num = cur.read_u32()?;
        let relationship_table_type = cur.read_u8()?;
        let related_index_num = cur.read_i32()?;
        let related_table_page = cur.read_u32()?;
        let cascade_updates = cur.read_u8()?;
        let cascade_deletes = cur.read_u8()?;
        let idx_type = cur.read_u8()?;
        if version.is_v4_plus() {
            cur.skip(4)?;
        }
        Ok(Self {
            idx_num,
            idx_col_num,
            relationship_table_type,
            related_index_num,
            related_table_page,
            cascade_updates,
            cascade_deletes,
            idx_type,
            name: String::new(),
        })
    }
}

/// The column/name/index arrays that follow the table header, possibly
/// reassembled from a chain of TDEF pages.
#[derive(Debug, Clone)]
pub struct TableArrays {
    pub real_indexes: Vec<RealIndex>,
    pub columns: Vec<Column>,
    pub index_columns: Vec<IndexColumns>,
    pub all_indexes: Vec<IndexInfo>,
}

pub fn read_table_arrays(
    data: &[u8],
    version: JetVersion,
    index_count: u32,
    real_index_count: u32,
    column_count: u16,
) -> Result<TableArrays, Error> {
    let mut cur = Cursor::new(data);
    let mut real_indexes = Vec::with_capacity(real_index_count as usize);
    for _ in 0..real_index_count {
        real_indexes.push(RealIndex::read(&mut cur, version)?);
    }
    let mut columns = Vec::with_capacity(column_count as usize);
    for _ in 0..column_count {
        columns.push(Column::read(&mut cur, version)?);
    }
    for column in &mut columns {
        column.name = read_name(&mut cur, version)?;
    }
    let mut index_columns = Vec::with_capacity(real_index_count as usize);
    for _ in 0..real_index_count {
        index_columns.push(IndexColumns::read(&mut cur, version)?);
    }
    let mut all_indexes = Vec::with_capacity(index_count as usize);
    for _ in 0..index_count {
        all_indexes.push(IndexInfo::read(&mut cur, version)?);
    }
    for index in &mut all_indexes {
        index.name = read_name(&mut cur, version)?;
    }
    Ok(TableArrays {
        real_indexes,
        columns,
        index_columns,
        all_indexes,
    })
}

/// Data-page header plus the slot-offset table.
#[derive(Debug, Clone)]
pub struct DataPageHeader {
    pub free_space: u16,
    /// Page number of the owning TDEF
    pub owner: u32,
    pub record_offsets: Vec<u16>,
}

impl DataPageHeader {
    pub fn read(cur: &mut Cursor<'_>, version: JetVersion) -> Result<Self, Error> {
        expect_magic(cur, DATA_PAGE_MAGIC)?;
        let free_space = cur.read_u16()?;
        let owner = cur.read_u32()?;
        if version.is_v4_plus() {
            cur.skip(4)?;
        }
        let record_count = cur.read_u16()?;
        let mut record_offsets = Vec::with_capacity(record_count as usize);
        for _ in 0..record_count {
            record_offsets.push(cur.read_u16()?);
        }
        Ok(Self {
            free_space,
            owner,
            record_offsets,
        })
    }
}

/// Variable-length metadata trailer, read backwards from the record end
/// (after the null bitmap has been skipped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTrailer {
    pub var_field_count: u16,
    /// Jet 3 only: high-byte adjustments for records longer than 256 bytes
    pub jump_table: Vec<u8>,
    /// Start offset of each variable column's segment, indexed by
    /// variable column number
    pub offsets: Vec<u16>,
    /// End of the variable-length region
    pub end_offset: u16,
}

impl RecordTrailer {
    /// `jump_entries` is `(record_len - 1) / 256` and only consulted for
    /// Jet 3; Jet 4+ masks the offset count with 0xFF.
    pub fn read(
        back: &mut BackCursor<'_>,
        version: JetVersion,
        jump_entries: usize,
    ) -> Result<Self, Error> {
        if version.is_v4_plus() {
            let var_field_count = back.read_u16()?;
            let offset_count = (var_field_count & 0xff) as usize;
            let mut offsets = Vec::with_capacity(offset_count);
            for _ in 0..offset_count {
                offsets.push(back.read_u16()?);
            }
            let end_offset = back.read_u16()?;
            Ok(Self {
                var_field_count,
                jump_table: Vec::new(),
                offsets,
                end_offset,
            })
        } else {
            let var_field_count = u16::from(back.read_u8()?);
            let mut jump_table = Vec::with_capacity(jump_entries);
            for _ in 0..jump_entries {
                jump_table.push(back.read_u8()?);
            }
            let mut offsets = Vec::with_capacity(var_field_count as usize);
            for _ in 0..var_field_count {
                offsets.push(u16::from(back.read_u8()?));
            }
            let end_offset = u16::from(back.read_u8()?);
            Ok(Self {
                var_field_count,
                jump_table,
                offsets,
                end_offset,
            })
        }
    }
}

/// 12-byte descriptor in front of memo/OLE long values.
#[derive(Debug, Clone, Copy)]
pub struct MemoDescriptor {
    pub length: u32,
    pub record_pointer: u32,
    pub unknown: u32,
}

impl MemoDescriptor {
    pub const LEN: usize = 12;

    const INLINE: u32 = 0x8000_0000;
    const SINGLE_PAGE: u32 = 0x4000_0000;

    pub fn read(cur: &mut Cursor<'_>) -> Result<Self, Error> {
        let length = cur.read_u32()?;
        let record_pointer = cur.read_u32()?;
        let unknown = cur.read_u32()?;
        Ok(Self {
            length,
            record_pointer,
            unknown,
        })
    }

    /// Payload follows the descriptor in the record itself.
    #[must_use]
    pub fn is_inline(self) -> bool {
        self.length & Self::INLINE != 0
    }

    /// Payload is a single overflow record (LVAL type 1).
    #[must_use]
    pub fn is_single_page(self) -> bool {
        self.length & Self::SINGLE_PAGE != 0
    }

    /// Payload byte count for the inline case.
    #[must_use]
    pub fn inline_len(self) -> usize {
        (self.length & 0x3FFF_FFFF) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_header_roundtrip() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&FILE_HEADER_MAGIC);
        raw.extend_from_slice(b"Standard Jet DB\0");
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&[0u8; 126]);
        let head = FileHeader::read(&mut Cursor::new(&raw)).unwrap();
        assert_eq!("Standard Jet DB", head.jet_string);
        assert_eq!(1, head.jet_version);

        let mut bad = raw.clone();
        bad[0] = 0xff;
        assert_eq!(
            Err(Error::BadFileMagic),
            FileHeader::read(&mut Cursor::new(&bad)).map(drop)
        );

        // Truncated padding is rejected too.
        assert!(FileHeader::read(&mut Cursor::new(&raw[..40])).is_err());
    }

    #[test]
    fn table_header_v3_end_offset() {
        let mut raw = vec![0x02, 0x01];
        raw.extend_from_slice(&0u16.to_le_bytes()); // version tag
        raw.extend_from_slice(&0u32.to_le_bytes()); // next page
        raw.extend_from_slice(&0u32.to_le_bytes()); // definition length
        raw.extend_from_slice(&7u32.to_le_bytes()); // row count
        raw.extend_from_slice(&0u32.to_le_bytes()); // autonumber
        raw.push(0x4e); // user table
        raw.extend_from_slice(&3u16.to_le_bytes()); // next column id
        raw.extend_from_slice(&1u16.to_le_bytes()); // variable columns
        raw.extend_from_slice(&3u16.to_le_bytes()); // column count
        raw.extend_from_slice(&0u32.to_le_bytes()); // index count
        raw.extend_from_slice(&0u32.to_le_bytes()); // real index count
        raw.push(2); // row page map row
        raw.extend_from_slice(&[9, 0, 0]); // row page map page (u24)
        raw.push(3); // free space map row
        raw.extend_from_slice(&[10, 0, 0]);
        let head = TableHeader::read(&mut Cursor::new(&raw), JetVersion::V3).unwrap();
        assert_eq!(43, head.header_end);
        assert_eq!(7, head.row_count);
        assert_eq!(0x4e, head.table_type);
        assert_eq!((2, 9), (head.row_page_map.row, head.row_page_map.page));
        assert_eq!(
            (3, 10),
            (head.free_space_map.row, head.free_space_map.page)
        );
    }

    #[test]
    fn column_v3() {
        // Text column, id 1, var number 0, index 1, flags variable-length
        let mut raw = vec![10u8];
        raw.extend_from_slice(&1u16.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(&1u16.to_le_bytes());
        raw.extend_from_slice(&0x0409u16.to_le_bytes()); // LCID
        raw.extend_from_slice(&1252u16.to_le_bytes()); // code page
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.push(0x02); // can_be_null, not fixed
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());
        let col = Column::read(&mut Cursor::new(&raw), JetVersion::V3).unwrap();
        assert_eq!(Some(TypeCode::Text), col.kind());
        assert!(!col.is_fixed_length());
        assert_eq!(
            ColumnAux::TextV3 {
                lcid: 0x0409,
                code_page: 1252
            },
            col.aux
        );
        assert_eq!(18, raw.len());
    }

    #[test]
    fn column_v4_width() {
        // Int32 column in v4 layout: 25 bytes total.
        let mut raw = vec![4u8];
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(&[8, 0, 0, 0]); // digits aux (v4: 4 bytes)
        raw.extend_from_slice(&[0x01, 0x00]); // flags, big-endian: fixed
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(&4u16.to_le_bytes());
        assert_eq!(25, raw.len());
        let col = Column::read(&mut Cursor::new(&raw), JetVersion::V4).unwrap();
        assert!(col.is_fixed_length());
        assert_eq!(
            ColumnAux::Digits {
                max_digits: 8,
                decimal_places: 0
            },
            col.aux
        );
        assert_eq!(4, col.length);
    }

    #[test]
    fn data_page_header() {
        let mut raw = vec![0x01, 0x01];
        raw.extend_from_slice(&100u16.to_le_bytes());
        raw.extend_from_slice(&2u32.to_le_bytes());
        raw.extend_from_slice(&2u16.to_le_bytes());
        raw.extend_from_slice(&0x7c0u16.to_le_bytes());
        raw.extend_from_slice(&0x780u16.to_le_bytes());
        let head = DataPageHeader::read(&mut Cursor::new(&raw), JetVersion::V3).unwrap();
        assert_eq!(2, head.owner);
        assert_eq!(vec![0x7c0, 0x780], head.record_offsets);

        let err = DataPageHeader::read(&mut Cursor::new(&[0x02, 0x01, 0, 0]), JetVersion::V3);
        assert!(matches!(err, Err(Error::BadPageMagic { .. })));
    }

    #[test]
    fn record_trailer_v3() {
        // Forward layout at the record end:
        // [end_offset][offsets in reverse][jump table][count][null bitmap]
        let record = [
            0xaa, 0xaa, // payload
            22,   // end offset
            15,   // offsets[1]
            11,   // offsets[0]
            2,    // var field count
            0x0f, // null bitmap
        ];
        let mut back = BackCursor::new(&record);
        back.skip(1).unwrap(); // null bitmap
        let trailer = RecordTrailer::read(&mut back, JetVersion::V3, 0).unwrap();
        assert_eq!(2, trailer.var_field_count);
        assert_eq!(vec![11, 15], trailer.offsets);
        assert_eq!(22, trailer.end_offset);
    }

    #[test]
    fn record_trailer_v4() {
        let mut record = vec![0xaa];
        record.extend_from_slice(&300u16.to_le_bytes()); // end offset
        record.extend_from_slice(&40u16.to_le_bytes()); // offsets[1]
        record.extend_from_slice(&12u16.to_le_bytes()); // offsets[0]
        record.extend_from_slice(&2u16.to_le_bytes()); // count
        record.push(0x03); // null bitmap
        let mut back = BackCursor::new(&record);
        back.skip(1).unwrap();
        let trailer = RecordTrailer::read(&mut back, JetVersion::V4, 0).unwrap();
        assert_eq!(2, trailer.var_field_count);
        assert_eq!(vec![12, 40], trailer.offsets);
        assert_eq!(300, trailer.end_offset);
    }

    #[test]
    fn memo_descriptor_flags() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&0x8000_0005u32.to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());
        let memo = MemoDescriptor::read(&mut Cursor::new(&raw)).unwrap();
        assert!(memo.is_inline());
        assert!(!memo.is_single_page());
        assert_eq!(5, memo.inline_len());
    }
}
