//! Long-value property blobs (LVPROP).
//!
//! MSysObjects stores per-table metadata — display formats, captions and
//! the like — as a chunked blob in its `LvProp` column. The blob carries a
//! name pool chunk (type 128) and value chunks; only type-1 value chunks
//! name the column they describe, so only those contribute to the
//! per-column property maps.

use std::collections::HashMap;

use log::{debug, error};

use crate::bytes::Cursor;
use crate::format::{JetVersion, LVPROP_MAGIC_V3, LVPROP_MAGIC_V4};
use crate::value::{self, Value};

/// Property name to decoded value, for one column.
pub type PropertyMap = HashMap<String, Value>;

/// Column name to its property map, for one table.
pub type TableProperties = HashMap<String, PropertyMap>;

const CHUNK_NAME_POOL: u16 = 128;
const CHUNK_COLUMN_VALUES: u16 = 1;

/// Decode an LVPROP blob into per-column property maps. Returns `None`
/// when the blob is too short to carry any chunk.
#[must_use]
pub fn parse_lvprop(raw: &[u8], version: JetVersion) -> Option<TableProperties> {
    let mut cur = Cursor::new(raw);
    let magic = cur.read_array::<4>().ok()?;
    if magic != LVPROP_MAGIC_V3 && magic != LVPROP_MAGIC_V4 {
        debug!("unexpected LVPROP magic {magic:02x?}");
    }

    let mut chunks: Vec<(u16, &[u8])> = Vec::new();
    loop {
        let Ok(length) = cur.read_u32() else { break };
        let Ok(chunk_type) = cur.read_u16() else {
            break;
        };
        let Some(data_len) = (length as usize).checked_sub(6) else {
            break;
        };
        let Ok(data) = cur.read_bytes(data_len) else {
            break;
        };
        chunks.push((chunk_type, data));
    }
    if chunks.is_empty() {
        return None;
    }

    let names = chunks
        .first()
        .filter(|(ty, _)| *ty == CHUNK_NAME_POOL)
        .map(|(_, data)| parse_name_pool(data))
        .unwrap_or_default();

    let mut table_props = TableProperties::new();
    for (_, data) in chunks
        .iter()
        .filter(|(ty, _)| *ty == CHUNK_COLUMN_VALUES)
    {
        let Some((column_name, values)) = parse_value_chunk(data, &names, version) else {
            error!("error while parsing MSysObjects property chunk");
            continue;
        };
        table_props.insert(column_name, values);
    }
    Some(table_props)
}

/// Type-128 chunk: length-prefixed UTF-16 strings back to back.
fn parse_name_pool(data: &[u8]) -> Vec<String> {
    let mut cur = Cursor::new(data);
    let mut names = Vec::new();
    loop {
        let Ok(len) = cur.read_u16() else { break };
        let Ok(bytes) = cur.read_bytes(len as usize) else {
            break;
        };
        names.push(value::decode_utf16le(bytes));
    }
    names
}

/// Type-0/1 chunk: column name plus (flag, type, name index, data)
/// entries resolved against the name pool.
fn parse_value_chunk(
    data: &[u8],
    names: &[String],
    version: JetVersion,
) -> Option<(String, PropertyMap)> {
    let mut cur = Cursor::new(data);
    let _val_length = cur.read_u32().ok()?;
    let name_length = cur.read_u16().ok()?;
    let column_name = value::decode_utf16le(cur.read_bytes(name_length as usize).ok()?);
    if column_name.is_empty() {
        return None;
    }

    let mut values = PropertyMap::new();
    loop {
        let Ok(_entry_length) = cur.read_u16() else {
            break;
        };
        let Ok(_ddl_flag) = cur.read_u8() else { break };
        let Ok(type_code) = cur.read_u8() else { break };
        let Ok(name_index) = cur.read_u16() else {
            break;
        };
        let Ok(data_length) = cur.read_u16() else {
            break;
        };
        let Ok(actual) = cur.read_bytes(data_length as usize) else {
            break;
        };
        let Some(name) = names.get(name_index as usize) else {
            error!("property name index {name_index} outside the name pool");
            continue;
        };
        values.insert(name.clone(), value::decode(type_code, actual, version, None));
    }
    Some((column_name, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn chunk(chunk_type: u16, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(data.len() as u32 + 6).to_le_bytes());
        out.extend_from_slice(&chunk_type.to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    fn sample_blob() -> Vec<u8> {
        // Name pool: ["Format", "Caption"]
        let mut pool = Vec::new();
        for name in ["Format", "Caption"] {
            let enc = utf16(name);
            pool.extend_from_slice(&(enc.len() as u16).to_le_bytes());
            pool.extend_from_slice(&enc);
        }

        // Value chunk for column "Price": Format = "$#,##0.00" (text).
        let mut values = Vec::new();
        let col = utf16("Price");
        values.extend_from_slice(&0u32.to_le_bytes());
        values.extend_from_slice(&(col.len() as u16).to_le_bytes());
        values.extend_from_slice(&col);
        let prop = utf16("$#,##0.00");
        values.extend_from_slice(&((prop.len() + 8) as u16).to_le_bytes());
        values.push(0); // ddl flag
        values.push(10); // text
        values.extend_from_slice(&0u16.to_le_bytes()); // name index
        values.extend_from_slice(&(prop.len() as u16).to_le_bytes());
        values.extend_from_slice(&prop);

        let mut blob = Vec::new();
        blob.extend_from_slice(b"MR2\0");
        blob.extend_from_slice(&chunk(CHUNK_NAME_POOL, &pool));
        blob.extend_from_slice(&chunk(CHUNK_COLUMN_VALUES, &values));
        blob
    }

    #[test]
    fn parses_column_properties() {
        let blob = sample_blob();
        let props = parse_lvprop(&blob, JetVersion::V4).unwrap();
        let price = props.get("Price").unwrap();
        assert_eq!(
            Some("$#,##0.00"),
            price.get("Format").and_then(Value::as_str)
        );
    }

    #[test]
    fn type_zero_chunks_are_ignored() {
        let mut blob = Vec::new();
        blob.extend_from_slice(b"KKD\0");
        blob.extend_from_slice(&chunk(0, &[0, 0, 0, 0, 0, 0]));
        let props = parse_lvprop(&blob, JetVersion::V3).unwrap();
        assert!(props.is_empty());
    }

    #[test]
    fn empty_blob_is_none() {
        assert!(parse_lvprop(b"MR2\0", JetVersion::V4).is_none());
        assert!(parse_lvprop(b"", JetVersion::V4).is_none());
    }
}
