use num_enum::TryFromPrimitive;

/// Leading magic of a table-definition (TDEF) page.
pub const TDEF_PAGE_MAGIC: [u8; 2] = [0x02, 0x01];
/// Leading magic of a data page.
pub const DATA_PAGE_MAGIC: [u8; 2] = [0x01, 0x01];
/// First four bytes of the file header page.
pub const FILE_HEADER_MAGIC: [u8; 4] = [0x00, 0x01, 0x00, 0x00];

/// LVPROP blob magic, Jet 3.
pub const LVPROP_MAGIC_V3: [u8; 4] = *b"KKD\0";
/// LVPROP blob magic, Jet 4+.
pub const LVPROP_MAGIC_V4: [u8; 4] = *b"MR2\0";

/// On-disk format generation, from the file header's `jet_version` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum JetVersion {
    /// Access 97
    V3 = 0,
    /// Access 2000
    V4 = 1,
    /// Access 2002/2003
    V5 = 2,
    /// Access 2007/2010+
    V2010 = 3,
}

impl JetVersion {
    #[must_use]
    pub fn page_size(self) -> usize {
        match self {
            Self::V3 => 0x800,
            Self::V4 | Self::V5 | Self::V2010 => 0x1000,
        }
    }

    /// Jet 4 and later share one set of widened layouts.
    #[must_use]
    pub fn is_v4_plus(self) -> bool {
        !matches!(self, Self::V3)
    }

    /// Offset of the record slot-offset table in a data page header.
    #[must_use]
    pub fn row_offset_table_start(self) -> usize {
        // magic(2) + free space(2) + owner(4) [+ unknown(4) on v4+] + count(2)
        if self.is_v4_plus() {
            14
        } else {
            10
        }
    }

    /// Human-readable generation number (3, 4, 5, 2010).
    #[must_use]
    pub fn generation(self) -> u32 {
        match self {
            Self::V3 => 3,
            Self::V4 => 4,
            Self::V5 => 5,
            Self::V2010 => 2010,
        }
    }
}

/// Column type codes as stored in column descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum TypeCode {
    /// Stored in the null bitmap, not in the record body
    Boolean = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    /// 64-bit integer scaled by 10^4
    Currency = 5,
    Float32 = 6,
    Float64 = 7,
    /// f64 days since 1899-12-30
    DateTime = 8,
    Binary = 9,
    Text = 10,
    Ole = 11,
    Memo = 12,
    Guid = 15,
    /// 17-byte scaled decimal: sign byte + 128-bit integer
    Decimal = 16,
    /// Reference into a complex-column table, stored as i32
    Complex = 18,
}

impl TypeCode {
    /// Types whose `various` descriptor region carries text collation info.
    #[must_use]
    pub fn has_text_info(self) -> bool {
        matches!(self, Self::Binary | Self::Text | Self::Ole | Self::Memo)
    }

    /// Types whose `various` region carries digit-count info.
    #[must_use]
    pub fn has_decimal_info(self) -> bool {
        (self as u8) >= 1 && (self as u8) <= 8
    }
}

bitflags::bitflags! {
    /// Column flag word.
    ///
    /// On disk this is a big-endian bit field: one byte in Jet 3, two in
    /// Jet 4+. The Jet 3 byte maps onto the high byte so the same named
    /// bits apply to both generations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ColumnFlags: u16 {
        const HYPERLINK = 0x8000;
        const AUTO_GUID = 0x4000;
        const REPLICATION = 0x1000;
        const AUTONUMBER = 0x0400;
        const CAN_BE_NULL = 0x0200;
        const FIXED_LENGTH = 0x0100;
        const MODERN_PACKAGE = 0x0010;
        const COMPRESSED_UNICODE = 0x0001;
    }
}

impl ColumnFlags {
    #[must_use]
    pub fn from_v3(byte: u8) -> Self {
        Self::from_bits_retain(u16::from(byte) << 8)
    }

    #[must_use]
    pub fn from_v4(word: u16) -> Self {
        Self::from_bits_retain(word)
    }

    #[must_use]
    pub fn fixed_length(self) -> bool {
        self.contains(Self::FIXED_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_layout() {
        assert_eq!(0x800, JetVersion::V3.page_size());
        assert_eq!(0x1000, JetVersion::V4.page_size());
        assert_eq!(0x1000, JetVersion::V2010.page_size());
        assert_eq!(10, JetVersion::V3.row_offset_table_start());
        assert_eq!(14, JetVersion::V5.row_offset_table_start());
        assert!(!JetVersion::V3.is_v4_plus());
        assert!(JetVersion::V2010.is_v4_plus());
        assert!(JetVersion::try_from(7u32).is_err());
    }

    #[test]
    fn flag_bits() {
        // Jet 3 stores fixed_length as bit 0 of its single flag byte.
        assert!(ColumnFlags::from_v3(0x01).fixed_length());
        assert!(!ColumnFlags::from_v3(0x02).fixed_length());
        assert!(ColumnFlags::from_v3(0x02).contains(ColumnFlags::CAN_BE_NULL));
        // Jet 4 widens the word; the low byte carries the unicode bit.
        let f = ColumnFlags::from_v4(0x0101);
        assert!(f.fixed_length());
        assert!(f.contains(ColumnFlags::COMPRESSED_UNICODE));
    }

    #[test]
    fn type_codes() {
        assert_eq!(Ok(TypeCode::Text), TypeCode::try_from(10).map_err(drop));
        assert!(TypeCode::try_from(13).is_err());
        assert!(TypeCode::Currency.has_decimal_info());
        assert!(TypeCode::Memo.has_text_info());
        assert!(!TypeCode::Decimal.has_decimal_info());
    }
}
