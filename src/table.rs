//! Table schema assembly and row decoding.
//!
//! A [`Table`] borrows the database image, carries the parsed schema
//! (columns in layout order, indexes, primary keys) and the set of pages
//! the table owns, and decodes rows page by page. All row-level failures
//! are contained: a bad record yields nulls, a bad page is skipped, and
//! the surrounding enumeration continues.

use std::collections::BTreeMap;

use log::{debug, error, info, warn};

use crate::bytes::{BackCursor, Cursor};
use crate::codec::{
    self, Column, DataPageHeader, IndexInfo, MemoDescriptor, RecordTrailer, TableHeader,
    TdefHeader,
};
use crate::db::{Database, Error};
use crate::format::TypeCode;
use crate::value::{self, Value};

const DELETED_FLAG: u16 = 0x8000;
const OVERFLOW_FLAG: u16 = 0x4000;
const SLOT_MASK: u16 = 0x0fff;

/// Sentinel col-id in index column slots.
const UNUSED_INDEX_SLOT: u16 = 0xffff;

/// Column-major parse result. Column order matches the schema; the value
/// sequences are parallel (row `i` of each column belongs to one record).
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    columns: Vec<(String, Vec<Value>)>,
}

impl TableData {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns
            .iter()
            .map(|(n, values)| (n.as_str(), values.as_slice()))
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |(_, values)| values.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

/// Schema handle for one table, bound to the database image.
pub struct Table<'db> {
    db: &'db Database,
    name: String,
    header: TableHeader,
    /// Columns in layout order (compacted column index, or column id when
    /// the index aliases)
    columns: Vec<Column>,
    indexes: Vec<IndexInfo>,
    primary_keys: Vec<String>,
    owned_pages: Vec<u32>,
    free_space_pages: Vec<u32>,
}

impl<'db> Table<'db> {
    /// Assemble the schema rooted at TDEF page `tdef_page`.
    pub(crate) fn load(
        db: &'db Database,
        name: &str,
        tdef_page: u32,
    ) -> Result<Self, Error> {
        let version = db.version();
        let page = db
            .tdef_page_bytes(tdef_page)
            .ok_or(Error::MissingPage(tdef_page))?;
        let mut cur = Cursor::new(page);
        let header = TableHeader::read(&mut cur, version)?;

        // Schemas too large for one page continue on chained TDEF pages;
        // the arrays are parsed over the concatenation.
        let mut merged = page[header.header_end..].to_vec();
        let mut next = header.tdef.next_page_ptr;
        let mut remaining_links = db.pages().tdef_pages().count();
        while next != 0 {
            if remaining_links == 0 {
                warn!("TDEF chain of table {name} loops; truncating");
                break;
            }
            remaining_links -= 1;
            let chained = db
                .tdef_page_bytes(next)
                .ok_or(Error::MissingPage(next))?;
            let tdef = TdefHeader::read(&mut Cursor::new(chained))?;
            merged.extend_from_slice(&chained[TdefHeader::LEN..]);
            next = tdef.next_page_ptr;
        }

        let arrays = codec::read_table_arrays(
            &merged,
            version,
            header.index_count,
            header.real_index_count,
            header.column_count,
        )?;

        // Layout order: compacted column index, zero-based. The index is
        // the accurate key (column ids keep counting across deletions);
        // fall back to ids when deleted-column aliasing collapses it.
        let min_index = arrays
            .columns
            .iter()
            .map(|c| c.column_index)
            .min()
            .unwrap_or(0);
        let mut by_key: BTreeMap<u16, Column> = arrays
            .columns
            .iter()
            .map(|c| (c.column_index - min_index, c.clone()))
            .collect();
        if by_key.len() != arrays.columns.len() {
            by_key = arrays
                .columns
                .iter()
                .map(|c| (c.column_id, c.clone()))
                .collect();
        }
        if by_key.len() != header.column_count as usize {
            debug!(
                "expected {} columns, got {}",
                header.column_count,
                by_key.len()
            );
        }

        let primary_keys = collect_primary_keys(&arrays.all_indexes, &arrays.index_columns, &by_key);

        let mut columns: Vec<Column> = by_key.into_values().collect();
        if let Some(table_props) = db.table_properties(name) {
            for column in &mut columns {
                if let Some(props) = table_props.get(&column.name) {
                    column.props = Some(props.clone());
                }
            }
        }

        let owned_pages = match db.read_usage_map(header.row_page_map) {
            Ok(pages) => pages,
            Err(err) => {
                warn!(
                    "usage map of table {name} unusable ({err}); \
                     falling back to data-page owners"
                );
                db.pages_owned_by(tdef_page)
            }
        };
        let free_space_pages = match db.read_usage_map(header.free_space_map) {
            Ok(pages) => pages,
            Err(err) => {
                debug!("free-space map of table {name} unusable: {err}");
                Vec::new()
            }
        };
        if owned_pages.is_empty() {
            info!("table {name} has no data");
        }

        Ok(Self {
            db,
            name: name.to_string(),
            header,
            columns,
            indexes: arrays.all_indexes,
            primary_keys,
            owned_pages,
            free_space_pages,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in layout order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    #[must_use]
    pub fn indexes(&self) -> &[IndexInfo] {
        &self.indexes
    }

    /// Row count recorded in the table header. A hint: the actual count
    /// comes from parsing.
    #[must_use]
    pub fn row_count_hint(&self) -> u32 {
        self.header.row_count
    }

    #[must_use]
    pub fn autonumber_seed(&self) -> u32 {
        self.header.autonumber
    }

    /// 0x53 system table, 0x4E user table.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.header.table_type == 0x53
    }

    /// Pages enumerated by the owned-pages usage map.
    #[must_use]
    pub fn owned_pages(&self) -> &[u32] {
        &self.owned_pages
    }

    /// Pages enumerated by the free-space usage map.
    #[must_use]
    pub fn free_space_pages(&self) -> &[u32] {
        &self.free_space_pages
    }

    /// Decode every owned data page into column-major rows.
    #[must_use]
    pub fn parse(&self) -> TableData {
        let version = self.db.version();
        let mut out: Vec<Vec<Value>> = vec![Vec::new(); self.columns.len()];
        for &page_number in &self.owned_pages {
            let Some(page) = self.db.page_bytes(page_number) else {
                warn!("owned page {page_number} outside the image");
                continue;
            };
            let header = match DataPageHeader::read(&mut Cursor::new(page), version) {
                Ok(header) => header,
                Err(err) => {
                    error!("failed to parse data page {page_number}: {err}");
                    continue;
                }
            };
            self.parse_data_page(page, &header, &mut out);
        }
        TableData {
            columns: self
                .columns
                .iter()
                .zip(out)
                .map(|(column, values)| (column.name.clone(), values))
                .collect(),
        }
    }

    /// Walk the slot-offset table in reading order. Slots are laid out
    /// top-down but records grow from the page end, so each slot's record
    /// is bounded by the previous slot's offset (page end for the first).
    fn parse_data_page(&self, page: &[u8], header: &DataPageHeader, out: &mut [Vec<Value>]) {
        let mut previous: Option<usize> = None;
        for &slot in &header.record_offsets {
            if slot & DELETED_FLAG != 0 {
                previous = Some((slot & SLOT_MASK) as usize);
                continue;
            }
            if slot & OVERFLOW_FLAG != 0 {
                let ptr_at = (slot & SLOT_MASK) as usize;
                previous = Some(ptr_at);
                let Some(ptr) = page
                    .get(ptr_at..ptr_at + 4)
                    .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                else {
                    warn!("overflow slot {ptr_at:#x} outside its page");
                    continue;
                };
                match self.overflow_record(ptr) {
                    Some(record) => self.parse_row(record, out),
                    None => warn!("unresolvable overflow pointer {ptr:#x}"),
                }
                continue;
            }
            let end = previous.unwrap_or(page.len());
            previous = Some(slot as usize);
            let Some(record) = page.get(slot as usize..end) else {
                warn!("record slot {slot:#x}..{end:#x} outside its page");
                continue;
            };
            if !record.is_empty() {
                self.parse_row(record, out);
            }
        }
    }

    /// Decode one record. Exactly one value is appended per column; field
    /// failures degrade to nulls so the column sequences stay parallel.
    fn parse_row(&self, record: &[u8], out: &mut [Vec<Value>]) {
        let version = self.db.version();
        let mut cur = Cursor::new(record);
        let field_count = if version.is_v4_plus() {
            cur.read_u16()
        } else {
            cur.read_u8().map(u16::from)
        };
        let Ok(field_count) = field_count else {
            error!("record too short for a field count");
            return;
        };
        let null_len = (field_count as usize + 7) / 8;
        if null_len == 0 || null_len >= record.len() {
            error!("failed to parse null table, column count {field_count}");
            return;
        }
        let null_bytes = &record[record.len() - null_len..];
        // Bit set: value present. Clear: null. For booleans the bit is the
        // value itself. Out of range: the column postdates this row.
        let null_bit = |id: usize| -> Option<bool> {
            null_bytes
                .get(id / 8)
                .map(|byte| byte & (1 << (id % 8)) != 0)
        };
        let body = &record[cur.pos()..];

        let mut row = vec![Value::Null; self.columns.len()];
        let mut has_variable = false;
        for (i, column) in self.columns.iter().enumerate() {
            if !column.is_fixed_length() {
                has_variable = true;
                continue;
            }
            row[i] = self.fixed_value(column, body, &null_bit);
        }
        if has_variable {
            if let Some(trailer) = self.read_trailer(record, null_len) {
                self.fill_variable(record, &trailer, &null_bit, &mut row);
            }
        }
        for (values, value) in out.iter_mut().zip(row) {
            values.push(value);
        }
    }

    fn fixed_value(
        &self,
        column: &Column,
        body: &[u8],
        null_bit: &dyn Fn(usize) -> Option<bool>,
    ) -> Value {
        let present = null_bit(column.column_id as usize);
        if column.kind() == Some(TypeCode::Boolean) {
            // Booleans are stored in the null bitmap; a column added after
            // the row was written has no bit and stays unknown-null.
            return match present {
                Some(bit) => Value::Bool(bit),
                None => Value::Null,
            };
        }
        if present != Some(true) {
            return Value::Null;
        }
        let start = column.fixed_offset as usize;
        if start > body.len() {
            error!(
                "column offset {start} is bigger than the length of the record"
            );
            return Value::Null;
        }
        let end = if column.length > 0 {
            (start + column.length as usize).min(body.len())
        } else {
            body.len()
        };
        self.decode_column(column, &body[start..end])
    }

    /// Read the variable-length metadata trailer, validating the field
    /// count against the schema. On mismatch the first ten trailer bytes
    /// are scanned for the expected count and the parse retried from
    /// there (some writers pad an extra word in front of the metadata).
    fn read_trailer(&self, record: &[u8], null_len: usize) -> Option<RecordTrailer> {
        let version = self.db.version();
        let jump_entries = if version.is_v4_plus() {
            0
        } else {
            (record.len().saturating_sub(1)) / 256
        };
        let mut back = BackCursor::new(record);
        if back.skip(null_len).is_err() {
            error!("record shorter than its null bitmap");
            return None;
        }
        let expected = self.header.variable_columns;
        match RecordTrailer::read(&mut back.clone(), version, jump_entries) {
            Ok(trailer) if trailer.var_field_count == expected => Some(trailer),
            Ok(trailer) => {
                let marker = u8::try_from(expected).ok()?;
                for skip in 0..10 {
                    if back.peek_back(skip) != Some(marker) {
                        continue;
                    }
                    let mut retry = back.clone();
                    if retry.skip(skip).is_err() {
                        break;
                    }
                    match RecordTrailer::read(&mut retry, version, jump_entries) {
                        Ok(trailer) => return Some(trailer),
                        Err(err) => {
                            error!("failed to parse record metadata: {err}");
                            return None;
                        }
                    }
                }
                warn!(
                    "record did not parse correctly; expected {expected} variable \
                     columns, found {}",
                    trailer.var_field_count
                );
                None
            }
            Err(err) => {
                error!("failed parsing record trailer: {err}");
                None
            }
        }
    }

    fn fill_variable(
        &self,
        record: &[u8],
        trailer: &RecordTrailer,
        null_bit: &dyn Fn(usize) -> Option<bool>,
        row: &mut [Value],
    ) {
        let version = self.db.version();
        let mut jump_addition = 0usize;
        for (i, column) in self.columns.iter().enumerate() {
            if column.is_fixed_length() {
                continue;
            }
            if null_bit(column.column_id as usize) != Some(true) {
                row[i] = Value::Null;
                continue;
            }
            let var_number = column.variable_column_number as usize;
            if !version.is_v4_plus() {
                let in_jump_table = u8::try_from(column.variable_column_number)
                    .map_or(false, |v| trailer.jump_table.contains(&v));
                if in_jump_table {
                    jump_addition += 0x100;
                }
            }
            let Some(&start) = trailer.offsets.get(var_number) else {
                warn!(
                    "variable column {} has no trailer offset",
                    column.name
                );
                continue;
            };
            let end = match trailer.offsets.get(var_number + 1) {
                Some(&next) => next,
                None => trailer.end_offset,
            };
            if start == end {
                row[i] = Value::Text(String::new());
                continue;
            }
            let seg_start = start as usize + jump_addition;
            let seg_end = (end as usize + jump_addition).min(record.len());
            let Some(raw) = record.get(seg_start..seg_end).filter(|r| !r.is_empty()) else {
                warn!(
                    "variable segment {seg_start:#x}..{seg_end:#x} outside the record"
                );
                continue;
            };
            row[i] = match column.kind() {
                Some(TypeCode::Memo) => self.resolve_long_value(raw, false),
                Some(TypeCode::Ole) => self.resolve_long_value(raw, true),
                _ => self.decode_column(column, raw),
            };
        }
    }

    fn decode_column(&self, column: &Column, raw: &[u8]) -> Value {
        if column.kind() == Some(TypeCode::Decimal) {
            let Ok(bytes) = <[u8; 17]>::try_from(raw) else {
                warn!(
                    "numeric field has invalid length {}, expected 17",
                    raw.len()
                );
                return Value::Binary(raw.to_vec());
            };
            let scale = column.aux.scale().unwrap_or(6);
            return Value::Decimal(value::render_decimal(&bytes, scale));
        }
        value::decode(
            column.type_code,
            raw,
            self.db.version(),
            column.props.as_ref(),
        )
    }

    /// Resolve a memo/OLE field: a 12-byte descriptor whose length word
    /// selects inline payload, a single overflow record (LVAL 1), or a
    /// page chain linked by leading next-page words (LVAL 2).
    fn resolve_long_value(&self, raw: &[u8], keep_raw: bool) -> Value {
        debug!("parsing long value field ({} bytes)", raw.len());
        let Ok(memo) = MemoDescriptor::read(&mut Cursor::new(raw)) else {
            warn!("failed to parse long value descriptor, using data as bytes");
            return Value::Binary(raw.to_vec());
        };
        let data = if memo.is_inline() {
            let payload = &raw[MemoDescriptor::LEN..];
            let len = memo.inline_len();
            if payload.len() < len {
                warn!("inline long value has invalid length, using full data");
                payload.to_vec()
            } else {
                payload[..len].to_vec()
            }
        } else if memo.is_single_page() {
            match self.overflow_record(memo.record_pointer) {
                Some(record) => record.to_vec(),
                None => {
                    warn!("failed to resolve single-page long value, using data as bytes");
                    return Value::Binary(raw.to_vec());
                }
            }
        } else {
            match self.chained_long_value(memo.record_pointer) {
                Some(data) => data,
                None => {
                    warn!("failed to resolve chained long value, using data as bytes");
                    return Value::Binary(raw.to_vec());
                }
            }
        };
        if data.is_empty() {
            return Value::Null;
        }
        if keep_raw {
            Value::Ole(data)
        } else {
            Value::Memo(value::decode_text(&data, self.db.version()))
        }
    }

    /// LVAL type 2: each overflow record starts with the next record
    /// pointer, then payload; a zero pointer ends the chain. The walk is
    /// bounded by the data-page count to survive corrupt links.
    fn chained_long_value(&self, pointer: u32) -> Option<Vec<u8>> {
        let mut record = self.overflow_record(pointer)?;
        let mut data = Vec::new();
        let mut remaining = self.db.pages().data_page_count() + 1;
        loop {
            let next = record
                .get(..4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))?;
            data.extend_from_slice(record.get(4..).unwrap_or_default());
            if next == 0 {
                return Some(data);
            }
            if remaining == 0 {
                warn!("long value chain exceeds the page count; truncating");
                return Some(data);
            }
            remaining -= 1;
            record = self.overflow_record(next)?;
        }
    }

    /// Fetch the record a 32-bit overflow pointer names: page number in
    /// the high bits, slot index in the low byte.
    fn overflow_record(&self, pointer: u32) -> Option<&'db [u8]> {
        let page_number = pointer >> 8;
        let slot = (pointer & 0xff) as usize;
        let Some(page) = self.db.data_page_bytes(page_number) else {
            warn!("could not find overflow record data page, pointer {pointer:#x}");
            return None;
        };
        let header = match DataPageHeader::read(&mut Cursor::new(page), self.db.version()) {
            Ok(header) => header,
            Err(err) => {
                error!("failed to parse overflow page {page_number}: {err}");
                return None;
            }
        };
        let Some(&start) = header.record_offsets.get(slot) else {
            warn!("failed parsing overflow record offset");
            return None;
        };
        let start = if start & DELETED_FLAG != 0 {
            start & SLOT_MASK
        } else {
            debug!("overflow record flag is not present {start:#x}");
            start
        };
        let end = if slot == 0 {
            page.len() as u16
        } else {
            let prev = header.record_offsets[slot - 1];
            if prev & DELETED_FLAG != 0 {
                prev & SLOT_MASK
            } else {
                prev
            }
        };
        page.get(start as usize..end as usize)
    }
}

fn collect_primary_keys(
    all_indexes: &[IndexInfo],
    index_columns: &[codec::IndexColumns],
    by_key: &BTreeMap<u16, Column>,
) -> Vec<String> {
    let mut keys = Vec::new();
    for index in all_indexes {
        if index.idx_type != 1 {
            continue;
        }
        let Some(columns) = index_columns.get(index.idx_col_num as usize) else {
            continue;
        };
        for slot in &columns.slots {
            if slot.col_id == UNUSED_INDEX_SLOT {
                continue;
            }
            if let Some(column) = by_key.get(&slot.col_id) {
                keys.push(column.name.clone());
            }
        }
    }
    keys
}
