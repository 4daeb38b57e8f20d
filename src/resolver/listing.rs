//! Wire types for the upstream file listing API.

use serde::{Deserialize, Deserializer};

/// Body returned by the listing endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct FileListResponse {
    #[serde(default)]
    pub errno: i64,
    #[serde(default)]
    pub list: Vec<FileEntry>,
}

/// One entry of a share listing.
#[derive(Debug, Deserialize)]
pub(crate) struct FileEntry {
    #[serde(default)]
    pub server_filename: String,
    #[serde(default, deserialize_with = "string_or_u64")]
    pub size: u64,
    #[serde(default)]
    pub dlink: String,
    #[serde(default)]
    pub thumbs: Option<Thumbnails>,
}

impl FileEntry {
    /// Largest available preview image, if any.
    pub fn thumbnail(&self) -> Option<String> {
        let thumbs = self.thumbs.as_ref()?;
        [&thumbs.url3, &thumbs.url2, &thumbs.url1, &thumbs.icon]
            .into_iter()
            .flatten()
            .find(|url| !url.is_empty())
            .cloned()
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Thumbnails {
    #[serde(default)]
    pub url3: Option<String>,
    #[serde(default)]
    pub url2: Option<String>,
    #[serde(default)]
    pub url1: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Sizes arrive as numbers on some regional hosts and as strings on others.
fn string_or_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrU64 {
        Str(String),
        Num(u64),
    }

    match StringOrU64::deserialize(deserializer)? {
        StringOrU64::Str(s) if s.trim().is_empty() => Ok(0),
        StringOrU64::Str(s) => s.trim().parse().map_err(Error::custom),
        StringOrU64::Num(n) => Ok(n),
    }
}
