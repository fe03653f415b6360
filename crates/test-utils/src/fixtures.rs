//! Catalog fixtures: timestamps, products, search responses and archives.

use std::io::{Cursor, Write};

use chrono::{DateTime, TimeZone, Utc};
use eumdac_client::Product;
use zip::write::SimpleFileOptions;

/// Collection used throughout the tests.
pub const COLLECTION: &str = "EO:EUM:DAT:MSG:HRSEVIRI";

/// UTC instant at minute precision.
pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid fixture timestamp")
}

/// Identifier in the shape the archive uses for SEVIRI level 1.5 scenes.
pub fn product_id_for(date: DateTime<Utc>) -> String {
    format!(
        "MSG4-SEVI-MSG15-0100-NA-{}42.811000000Z-NA",
        date.format("%Y%m%d%H%M")
    )
}

/// A product acquired at `date`.
pub fn product_at(date: DateTime<Utc>) -> Product {
    Product {
        identifier: product_id_for(date),
        date,
    }
}

/// Products acquired at each of `dates`.
pub fn products_at(dates: &[DateTime<Utc>]) -> Vec<Product> {
    dates.iter().copied().map(product_at).collect()
}

/// JSON body of the search endpoint listing `products`.
///
/// Dates are rendered as `start/end` intervals with non-zero seconds, the
/// way the archive reports them.
pub fn search_response_json(products: &[Product]) -> String {
    let features: Vec<serde_json::Value> = products
        .iter()
        .map(|p| {
            let start = p.date + chrono::Duration::seconds(9);
            let end = p.date + chrono::Duration::seconds(753);
            serde_json::json!({
                "type": "Feature",
                "id": p.identifier,
                "properties": {
                    "identifier": p.identifier,
                    "date": format!(
                        "{}/{}",
                        start.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                        end.format("%Y-%m-%dT%H:%M:%S%.3fZ")
                    ),
                }
            })
        })
        .collect();

    serde_json::json!({
        "type": "FeatureCollection",
        "totalResults": products.len(),
        "features": features,
    })
    .to_string()
}

/// Zip archive holding `{identifier}.nat` with `payload` plus a manifest,
/// like the ones the download endpoint serves.
pub fn native_archive(identifier: &str, payload: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    writer
        .start_file("manifest.xml", options)
        .expect("start manifest entry");
    writer
        .write_all(format!("<manifest product=\"{}\"/>", identifier).as_bytes())
        .expect("write manifest");

    writer
        .start_file(format!("{}.nat", identifier), options)
        .expect("start native entry");
    writer.write_all(payload).expect("write native payload");

    writer.finish().expect("finish archive").into_inner()
}

/// Zip archive with no native file in it.
pub fn archive_without_native(identifier: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("manifest.xml", SimpleFileOptions::default())
        .expect("start manifest entry");
    writer
        .write_all(format!("<manifest product=\"{}\"/>", identifier).as_bytes())
        .expect("write manifest");
    writer.finish().expect("finish archive").into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_embeds_timestamp() {
        let id = product_id_for(utc(2024, 1, 15, 13, 15));
        assert_eq!(id, "MSG4-SEVI-MSG15-0100-NA-20240115131542.811000000Z-NA");
    }

    #[test]
    fn test_search_response_shape() {
        let body = search_response_json(&products_at(&[utc(2024, 1, 15, 14, 0)]));
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["totalResults"], 1);
        assert_eq!(
            value["features"][0]["properties"]["date"],
            "2024-01-15T14:00:09.000Z/2024-01-15T14:12:33.000Z"
        );
    }

    #[test]
    fn test_native_archive_entries() {
        let bytes = native_archive("scene", b"payload");
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(names, vec!["manifest.xml", "scene.nat"]);
    }
}
