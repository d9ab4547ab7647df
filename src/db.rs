//! Database façade: version detection, catalog bootstrap, table lookup.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::{error, fmt, fs, io};

use log::{debug, error, info};

use crate::bytes::Cursor;
use crate::codec::{self, DataPageHeader, FileHeader, MapPointer};
use crate::format::JetVersion;
use crate::pages::PageStore;
use crate::props::{self, TableProperties};
use crate::table::{Table, TableData};
use crate::usemap;
use crate::value::Value;

/// The system catalog lives on this page in every database.
const CATALOG_PAGE: u32 = 2;

const CATALOG_TABLE: &str = "MSysObjects";

/// Catalog `Type` value of a table object.
const TABLE_TYPE: i64 = 1;

/// Catalog `Flags` values marking system tables.
const SYSTEM_TABLE_FLAGS: [i64; 4] = [-0x8000_0000, -0x0000_0002, 0x8000_0000, 0x0000_0002];

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// The file header does not parse; the input is not a Jet database
    NotADatabase,
    /// Page 2 is not a table definition or the catalog does not parse
    MissingCatalog,
    /// A table definition references a page outside the image
    MissingPage(u32),
    Codec(codec::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::NotADatabase => {
                f.write_str("failed to parse file header; check it is a valid access database")
            }
            Self::MissingCatalog => f.write_str("system catalog page missing or unreadable"),
            Self::MissingPage(page) => write!(f, "referenced page {page} is missing"),
            Self::Codec(err) => err.fmt(f),
        }
    }
}

impl error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<codec::Error> for Error {
    fn from(err: codec::Error) -> Self {
        Self::Codec(err)
    }
}

/// An open database: the immutable byte image plus everything derived
/// from it at construction time. Purely computational and internally
/// immutable; share freely between readers of different tables.
pub struct Database {
    data: Vec<u8>,
    version: JetVersion,
    pages: PageStore,
    /// Data pages grouped by the TDEF page their `owner` field names.
    /// Fallback only: stale after deletions, the usage maps are
    /// authoritative.
    owned_by: HashMap<u32, Vec<u32>>,
    catalog: BTreeMap<String, u32>,
    properties: HashMap<String, TableProperties>,
}

impl Database {
    /// Read and parse a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let data = fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Parse a database from an in-memory image (e.g. downloaded bytes).
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, Error> {
        let header =
            FileHeader::read(&mut Cursor::new(&data)).map_err(|_| Error::NotADatabase)?;
        let version = JetVersion::try_from(header.jet_version).unwrap_or_else(|_| {
            error!(
                "unknown database version {}, trying to parse database as version 3",
                header.jet_version
            );
            JetVersion::V3
        });
        info!("database version {}", version.generation());

        let pages = PageStore::classify(&data, version.page_size());
        let mut owned_by: HashMap<u32, Vec<u32>> = HashMap::new();
        for number in pages.data_pages() {
            let Some(page) = pages.page(&data, number) else {
                continue;
            };
            match DataPageHeader::read(&mut Cursor::new(page), version) {
                Ok(head) if pages.is_tdef(head.owner) => {
                    owned_by.entry(head.owner).or_default().push(number);
                }
                Ok(_) => {}
                Err(err) => error!("failed to parse data page {number}: {err}"),
            }
        }

        let mut db = Self {
            data,
            version,
            pages,
            owned_by,
            catalog: BTreeMap::new(),
            properties: HashMap::new(),
        };
        db.catalog = db.parse_catalog()?;
        db.properties = db.parse_catalog_properties();
        Ok(db)
    }

    #[must_use]
    pub fn version(&self) -> JetVersion {
        self.version
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.pages.page_size()
    }

    #[must_use]
    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    /// Table name to catalog page index: the user tables plus the catalog
    /// itself (kept for property lookups).
    #[must_use]
    pub fn catalog(&self) -> &BTreeMap<String, u32> {
        &self.catalog
    }

    /// Names of the tables in the catalog.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.catalog.keys().map(String::as_str)
    }

    /// Schema handle for `name`, or `None` (with a log entry) when the
    /// catalog does not know the table or its definition will not parse.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<Table<'_>> {
        let Some(&page) = self.catalog.get(name) else {
            error!("could not find table {name} in database");
            return None;
        };
        if !self.pages.is_tdef(page) {
            error!("could not find table {name} definition at page {page}");
            return None;
        }
        match Table::load(self, name, page) {
            Ok(table) => Some(table),
            Err(err) => {
                error!("failed to parse table {name}: {err}");
                None
            }
        }
    }

    /// Materialize `name` into column-keyed value sequences in schema
    /// order. An empty table maps every column to an empty sequence.
    #[must_use]
    pub fn parse_table(&self, name: &str) -> Option<TableData> {
        Some(self.get_table(name)?.parse())
    }

    /// Dump every catalog table to stdout.
    pub fn print_database(&self) {
        for name in self.catalog.keys() {
            let Some(rows) = self.parse_table(name) else {
                continue;
            };
            println!("TABLE NAME: {name}\r\n");
            println!(
                "{}",
                rows.column_names().collect::<Vec<_>>().join(" | ")
            );
            for row in 0..rows.row_count() {
                let line = rows
                    .iter()
                    .map(|(_, values)| {
                        values.get(row).map(Value::to_string).unwrap_or_default()
                    })
                    .collect::<Vec<_>>()
                    .join(" | ");
                println!("{line}");
            }
            println!("\r\n\r\n\r\n");
        }
    }

    /// Decode the catalog table on page 2 into the name-to-page mapping,
    /// keeping user tables and the catalog itself.
    fn parse_catalog(&self) -> Result<BTreeMap<String, u32>, Error> {
        if !self.pages.is_tdef(CATALOG_PAGE) {
            return Err(Error::MissingCatalog);
        }
        let rows = Table::load(self, CATALOG_TABLE, CATALOG_PAGE)?.parse();
        let (names, types, flags, ids) = match (
            rows.get("Name"),
            rows.get("Type"),
            rows.get("Flags"),
            rows.get("Id"),
        ) {
            (Some(n), Some(t), Some(f), Some(i)) => (n, t, f, i),
            _ => return Err(Error::MissingCatalog),
        };

        let mut catalog = BTreeMap::new();
        for (((name, ty), flag), id) in names.iter().zip(types).zip(flags).zip(ids) {
            let Some(name) = name.as_str() else { continue };
            let Some(id) = id.as_i64() else { continue };
            // The catalog is needed for property lookups, so it bypasses
            // the system-table filter.
            if name == CATALOG_TABLE {
                catalog.insert(name.to_string(), id as u32);
            }
            if ty.as_i64() == Some(TABLE_TYPE) {
                let flag = flag.as_i64().unwrap_or(0);
                if SYSTEM_TABLE_FLAGS.contains(&flag) {
                    debug!("not parsing system table - {name}");
                } else {
                    catalog.insert(name.to_string(), id as u32);
                }
            }
        }
        Ok(catalog)
    }

    /// Extra metadata about tables and columns (such as currency format
    /// strings) lives in the catalog's `LvProp` blobs.
    fn parse_catalog_properties(&self) -> HashMap<String, TableProperties> {
        let Some(rows) = self.parse_table(CATALOG_TABLE) else {
            return HashMap::new();
        };
        let (Some(names), Some(lvprops)) = (rows.get("Name"), rows.get("LvProp")) else {
            return HashMap::new();
        };
        let mut properties = HashMap::new();
        for (name, lvprop) in names.iter().zip(lvprops) {
            let Some(name) = name.as_str() else { continue };
            let Some(raw) = lvprop.as_bytes().filter(|b| !b.is_empty()) else {
                continue;
            };
            if let Some(parsed) = props::parse_lvprop(raw, self.version) {
                properties.insert(name.to_string(), parsed);
            }
        }
        properties
    }

    /// Per-column properties for `name`, if the catalog carries any.
    pub(crate) fn table_properties(&self, name: &str) -> Option<&TableProperties> {
        if name == CATALOG_TABLE {
            return None;
        }
        self.properties.get(name)
    }

    pub(crate) fn page_bytes(&self, number: u32) -> Option<&[u8]> {
        self.pages.page(&self.data, number)
    }

    pub(crate) fn data_page_bytes(&self, number: u32) -> Option<&[u8]> {
        if !self.pages.is_data(number) {
            return None;
        }
        self.pages.page(&self.data, number)
    }

    pub(crate) fn tdef_page_bytes(&self, number: u32) -> Option<&[u8]> {
        if !self.pages.is_tdef(number) {
            return None;
        }
        self.pages.page(&self.data, number)
    }

    /// Pages whose data-page header names `tdef_page` as owner. Fallback
    /// when a usage map is unreadable.
    pub(crate) fn pages_owned_by(&self, tdef_page: u32) -> Vec<u32> {
        self.owned_by.get(&tdef_page).cloned().unwrap_or_default()
    }

    /// Resolve a table header's (row, page) pointer into the owned page
    /// list via the inline usage map it addresses.
    pub(crate) fn read_usage_map(&self, pointer: MapPointer) -> Result<Vec<u32>, UsageMapError> {
        let page = self
            .data_page_bytes(pointer.page)
            .ok_or(UsageMapError::MissingPage(pointer.page))?;
        usemap::read_inline_map(page, pointer.row, self.version).map_err(UsageMapError::Map)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("version", &self.version)
            .field("page_size", &self.pages.page_size())
            .field("pages", &self.pages.page_count())
            .field("tables", &self.catalog.len())
            .finish()
    }
}

/// Why a usage map could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UsageMapError {
    MissingPage(u32),
    Map(usemap::Error),
}

impl fmt::Display for UsageMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPage(page) => write!(f, "usage map page {page} is not a data page"),
            Self::Map(err) => err.fmt(f),
        }
    }
}
