use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One scraped listing, as extracted from its detail page.
///
/// Every field except `images` is kept as the display string found on the
/// page; source formatting varies too much to parse numbers reliably.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyRecord {
    /// Canonical detail-page URL, the only identity of a listing
    pub href: String,
    pub price: String,
    pub expenses: String,
    pub location: String,
    pub title_type_sup_property: String,
    pub days_published: String,
    pub views: String,
    /// Asset URLs in DOM order
    pub images: Vec<String>,
    /// No site element maps to this yet; always empty
    pub discount: String,
}

/// Identifier the remote backend assigns to a record when it is stored.
///
/// Backends hand these out as strings, integers or Mongo-style
/// `{"$oid": "..."}` objects; all of them are normalised to a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RemoteId(pub String);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRemoteId {
    Text(String),
    Integer(i64),
    ObjectId {
        #[serde(rename = "$oid")]
        oid: String,
    },
}

impl<'de> Deserialize<'de> for RemoteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawRemoteId::deserialize(deserializer)? {
            RawRemoteId::Text(text) => RemoteId(text),
            RawRemoteId::Integer(n) => RemoteId(n.to_string()),
            RawRemoteId::ObjectId { oid } => RemoteId(oid),
        })
    }
}

/// A record as the remote store returns it: the listing plus its remote id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<RemoteId>,
    #[serde(flatten)]
    pub record: PropertyRecord,
}

impl StoredRecord {
    pub fn href(&self) -> &str {
        &self.record.href
    }
}

/// Anything keyed by a listing href.
pub trait Listing {
    fn href(&self) -> &str;
}

impl Listing for PropertyRecord {
    fn href(&self) -> &str {
        &self.href
    }
}

impl Listing for StoredRecord {
    fn href(&self) -> &str {
        &self.record.href
    }
}
