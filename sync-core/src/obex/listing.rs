//! Folder-listing documents returned by a listing GET.
//!
//! ```xml
//! <?xml version="1.0"?>
//! <folder-listing version="1.0">
//!   <folder name="saved" modified="20141021T134531"/>
//!   <file name="page_001.pdf" size="1234" created="20141021T134531"/>
//! </folder-listing>
//! ```

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;

use crate::error::SyncError;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// One entry of a folder listing. A size of zero marks a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderListingItem {
    pub name: String,
    pub timestamp: Option<NaiveDateTime>,
    pub size: u64,
    /// File contents; empty until fetched.
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl FolderListingItem {
    pub fn new(name: impl Into<String>, timestamp: Option<NaiveDateTime>, size: u64) -> Self {
        Self {
            name: name.into(),
            timestamp,
            size,
            data: Vec::new(),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.size == 0
    }

    /// Folders before files, then newest first. A missing timestamp sorts
    /// after any real one.
    pub fn listing_order(&self, other: &Self) -> Ordering {
        other
            .is_folder()
            .cmp(&self.is_folder())
            .then_with(|| other.timestamp.cmp(&self.timestamp))
    }
}

/// Parse a listing document and return its entries in listing order.
///
/// Anything before `<?xml` is skipped; some firmware prefixes the document
/// with stray bytes.
pub fn parse_folder_listing(raw: &[u8]) -> Result<Vec<FolderListingItem>, SyncError> {
    let text = String::from_utf8_lossy(raw);
    let start = text
        .find("<?xml")
        .ok_or_else(|| SyncError::Listing("no xml declaration".into()))?;

    let mut reader = Reader::from_str(&text[start..]);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"folder" => items.push(parse_entry(&e, false)?),
                b"file" => items.push(parse_entry(&e, true)?),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    items.sort_by(FolderListingItem::listing_order);
    Ok(items)
}

fn parse_entry(e: &BytesStart<'_>, is_file: bool) -> Result<FolderListingItem, SyncError> {
    let name = attribute(e, "name")?.unwrap_or_default();

    let stamp = match attribute(e, "modified")? {
        Some(m) if !m.is_empty() => Some(m),
        _ => attribute(e, "created")?.filter(|c| !c.is_empty()),
    };
    let timestamp = stamp
        .map(|s| NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT))
        .transpose()?;

    let size = if is_file {
        match attribute(e, "size")? {
            Some(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|err| SyncError::Listing(format!("bad size '{s}': {err}")))?,
            None => 0,
        }
    } else {
        0
    };

    Ok(FolderListingItem::new(name, timestamp, size))
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Result<Option<String>, SyncError> {
    match e.try_get_attribute(key)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn folder_sorts_before_newer_file() {
        let xml = br#"<?xml version="1.0"?>
<folder-listing version="1.0">
  <file name="B" size="10" modified="20141022T100000"/>
  <folder name="A" modified="20141021T100000"/>
</folder-listing>"#;
        let items = parse_folder_listing(xml).unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        assert!(items[0].is_folder());
        assert_eq!(items[1].size, 10);
    }

    #[test]
    fn files_sorted_newest_first() {
        let xml = br#"<?xml version="1.0"?>
<folder-listing>
  <file name="old.pdf" size="1" created="20140101T000000"/>
  <file name="new.pdf" size="2" created="20150101T000000"/>
  <file name="mid.pdf" size="3" modified="20140601T120000" created="20130101T000000"/>
</folder-listing>"#;
        let items = parse_folder_listing(xml).unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["new.pdf", "mid.pdf", "old.pdf"]);
        assert_eq!(items[1].timestamp, Some(at(2014, 6, 1, 12, 0, 0)));
    }

    #[test]
    fn empty_modified_falls_back_to_created() {
        let xml = br#"<?xml version="1.0"?><folder-listing><file name="f" size="5" modified="" created="20141021T134531"/></folder-listing>"#;
        let items = parse_folder_listing(xml).unwrap();
        assert_eq!(items[0].timestamp, Some(at(2014, 10, 21, 13, 45, 31)));
    }

    #[test]
    fn leading_garbage_is_skipped() {
        let mut raw = vec![0x00, 0x12, b'x'];
        raw.extend_from_slice(br#"<?xml version="1.0"?><folder-listing><folder name="saved"/></folder-listing>"#);
        let items = parse_folder_listing(&raw).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "saved");
        assert_eq!(items[0].timestamp, None);
    }

    #[test]
    fn parent_folder_element_is_ignored() {
        let xml = br#"<?xml version="1.0"?><folder-listing><parent-folder/><folder name="a"/></folder-listing>"#;
        let items = parse_folder_listing(xml).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn missing_declaration_is_an_error() {
        assert!(matches!(
            parse_folder_listing(b"<folder-listing/>"),
            Err(SyncError::Listing(_))
        ));
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let xml = br#"<?xml version="1.0"?><folder-listing><file name="f" size="1" created="yesterday"/></folder-listing>"#;
        assert!(matches!(
            parse_folder_listing(xml),
            Err(SyncError::Listing(_))
        ));
    }

    #[test]
    fn bad_size_is_an_error() {
        let xml = br#"<?xml version="1.0"?><folder-listing><file name="f" size="big"/></folder-listing>"#;
        assert!(matches!(
            parse_folder_listing(xml),
            Err(SyncError::Listing(_))
        ));
    }

    #[test]
    fn serialized_item_omits_contents() {
        let mut item = FolderListingItem::new("a.pdf", None, 3);
        item.data = vec![1, 2, 3];
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["name"], "a.pdf");
        assert_eq!(value["size"], 3);
        assert!(value.get("data").is_none());
    }
}
