//! Product records and catalog response parsing.

use std::fmt;
use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::Deserialize;

use crate::error::{CatalogError, CatalogResult};

/// Raw archive bytes as they arrive from the network.
pub type ByteStream = BoxStream<'static, CatalogResult<Bytes>>;

/// One published scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Opaque identifier, stable per scene
    pub identifier: String,
    /// Acquisition start, truncated to the minute
    pub date: DateTime<Utc>,
}

/// An opened product download.
pub struct ProductDownload {
    /// File name announced by the server for the archive
    pub filename: String,
    /// Size in bytes, when the server reports it
    pub content_length: Option<u64>,
    pub stream: ByteStream,
}

impl fmt::Debug for ProductDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductDownload")
            .field("filename", &self.filename)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Drop seconds and sub-second precision.
pub fn truncate_to_minute(dt: DateTime<Utc>) -> DateTime<Utc> {
    let secs = dt.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(60), 0).unwrap_or(dt)
}

// GeoJSON-ish body of the OpenSearch endpoint. Only the fields we use.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: FeatureProperties,
}

#[derive(Debug, Deserialize)]
struct FeatureProperties {
    identifier: String,
    date: String,
}

impl SearchResponse {
    pub(crate) fn into_products(self) -> CatalogResult<Vec<Product>> {
        self.features
            .into_iter()
            .map(|feature| {
                let props = feature.properties;
                let date = parse_acquisition_date(&props.date)?;
                Ok(Product {
                    identifier: props.identifier,
                    date,
                })
            })
            .collect()
    }
}

/// Parse the `date` property, an ISO-8601 interval `start/end`.
///
/// Only the start instant is kept.
pub fn parse_acquisition_date(raw: &str) -> CatalogResult<DateTime<Utc>> {
    let start = raw.split('/').next().unwrap_or(raw).trim();
    let parsed = DateTime::parse_from_rfc3339(start)
        .map_err(|e| CatalogError::InvalidResponse(format!("bad date '{}': {}", raw, e)))?;
    Ok(truncate_to_minute(parsed.with_timezone(&Utc)))
}

/// Extract the file name from a `Content-Disposition` header value.
///
/// Only the final path component is returned so a hostile header cannot
/// escape the download directory.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let name = disposition_params(header)
        .into_iter()
        .find(|(key, _)| key == "filename")
        .map(|(_, value)| value)?;

    Path::new(&name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// `key=value` parameters after the disposition type, keys lowercased.
/// Quoted values may contain `;` and backslash escapes.
fn disposition_params(header: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = header.chars().peekable();

    // Disposition type
    while chars.next_if(|&c| c != ';').is_some() {}

    while chars.next() == Some(';') {
        let mut key = String::new();
        while let Some(c) = chars.next_if(|&c| c != '=' && c != ';') {
            key.push(c);
        }

        let mut value = String::new();
        if chars.next_if_eq(&'=').is_some() {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            if chars.next_if_eq(&'"').is_some() {
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => value.extend(chars.next()),
                        _ => value.push(c),
                    }
                }
                while chars.next_if(|&c| c != ';').is_some() {}
            } else {
                while let Some(c) = chars.next_if(|&c| c != ';') {
                    value.push(c);
                }
                value.truncate(value.trim_end().len());
            }
        }

        params.push((key.trim().to_ascii_lowercase(), value));
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_search_response() {
        let body = r#"{
            "type": "FeatureCollection",
            "totalResults": 2,
            "features": [
                {"properties": {
                    "identifier": "MSG4-SEVI-MSG15-0100-NA-20240115131242.811000000Z-NA",
                    "date": "2024-01-15T13:00:09.811Z/2024-01-15T13:12:42.811Z"
                }},
                {"properties": {
                    "identifier": "MSG4-SEVI-MSG15-0100-NA-20240115132742.594000000Z-NA",
                    "date": "2024-01-15T13:15:09.594Z/2024-01-15T13:27:42.594Z"
                }}
            ]
        }"#;

        let response: SearchResponse = serde_json::from_str(body).unwrap();
        let products = response.into_products().unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(
            products[0].identifier,
            "MSG4-SEVI-MSG15-0100-NA-20240115131242.811000000Z-NA"
        );
        assert_eq!(
            products[0].date,
            Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap()
        );
        assert_eq!(
            products[1].date,
            Utc.with_ymd_and_hms(2024, 1, 15, 13, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_empty_search_response() {
        let response: SearchResponse = serde_json::from_str(r#"{"totalResults": 0}"#).unwrap();
        assert!(response.into_products().unwrap().is_empty());
    }

    #[test]
    fn test_bad_date_is_invalid_response() {
        let err = parse_acquisition_date("yesterday").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidResponse(_)));
    }

    #[test]
    fn test_truncate_to_minute() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 13, 14, 59).unwrap()
            + chrono::Duration::milliseconds(999);
        assert_eq!(
            truncate_to_minute(dt),
            Utc.with_ymd_and_hms(2024, 1, 15, 13, 14, 0).unwrap()
        );
    }

    #[test]
    fn test_filename_from_disposition() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="MSG4-SEVI.zip""#),
            Some("MSG4-SEVI.zip".to_string())
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=plain.zip"),
            Some("plain.zip".to_string())
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="../../etc/passwd""#),
            Some("passwd".to_string())
        );
        assert_eq!(filename_from_disposition("inline"), None);
        assert_eq!(filename_from_disposition(r#"attachment; filename="""#), None);
    }

    #[test]
    fn test_disposition_semicolon_inside_quotes() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="a;b.zip""#),
            Some("a;b.zip".to_string())
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; name="x;filename=y"; filename=z.zip"#),
            Some("z.zip".to_string())
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; FileName="say \"hi\".zip"; size=10"#),
            Some(r#"say "hi".zip"#.to_string())
        );
    }
}
