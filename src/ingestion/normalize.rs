//! Normalizing raw listing objects into canonical document text.

use serde::{Deserialize, Serialize};

/// One listing object exactly as it arrived from the feed.
pub type RawListing = serde_json::Map<String, serde_json::Value>;

/// The four text fields of a travel-service listing.
///
/// Extraction is deliberately lenient: a field that is missing or not a JSON
/// string becomes the empty string. This mirrors the feed, which omits
/// fields freely, and means normalization can never fail.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceRecord {
    pub city: String,
    pub provider_name: String,
    pub service_type: String,
    pub contact_info: String,
}

impl ServiceRecord {
    /// Extracts the record fields from one raw listing object.
    pub fn from_listing(listing: &RawListing) -> Self {
        Self {
            city: text_field(listing, "city"),
            provider_name: text_field(listing, "providerName"),
            service_type: text_field(listing, "serviceType"),
            contact_info: text_field(listing, "contactInfo"),
        }
    }

    /// Renders the canonical document text for this record.
    pub fn to_document(&self) -> Document {
        let text = format!(
            "{} offers {} services in {}. Visit: {}",
            self.provider_name, self.service_type, self.city, self.contact_info
        );
        Document {
            text,
            record: self.clone(),
        }
    }
}

/// Canonical text derived from one [`ServiceRecord`].
///
/// The record rides along so the index can store typed columns (city,
/// provider, service type) next to each chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub record: ServiceRecord,
}

/// Maps raw listings to documents, one per listing, order preserved.
pub fn normalize_listings(listings: &[RawListing]) -> Vec<Document> {
    listings
        .iter()
        .map(|listing| ServiceRecord::from_listing(listing).to_document())
        .collect()
}

fn text_field(listing: &RawListing, key: &str) -> String {
    listing
        .get(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(value: serde_json::Value) -> RawListing {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn kochi_record_renders_the_canonical_text() {
        let record = ServiceRecord::from_listing(&listing(json!({
            "city": "Kochi",
            "providerName": "Kochi Adventure Co.",
            "serviceType": "rafting",
            "contactInfo": "http://example.com",
        })));

        assert_eq!(
            record.to_document().text,
            "Kochi Adventure Co. offers rafting services in Kochi. Visit: http://example.com"
        );
    }

    #[test]
    fn missing_fields_become_empty_strings() {
        let record = ServiceRecord::from_listing(&listing(json!({
            "providerName": "Hill Cabs",
        })));

        assert_eq!(record.city, "");
        assert_eq!(record.service_type, "");
        assert_eq!(record.contact_info, "");
        assert_eq!(
            record.to_document().text,
            "Hill Cabs offers  services in . Visit: "
        );
    }

    #[test]
    fn non_string_fields_are_treated_as_missing() {
        let record = ServiceRecord::from_listing(&listing(json!({
            "city": 42,
            "providerName": ["not", "a", "string"],
            "serviceType": "hotel",
            "contactInfo": null,
        })));

        assert_eq!(record.city, "");
        assert_eq!(record.provider_name, "");
        assert_eq!(record.service_type, "hotel");
        assert_eq!(record.contact_info, "");
    }

    #[test]
    fn document_text_contains_every_non_empty_field() {
        let record = ServiceRecord::from_listing(&listing(json!({
            "city": "Munnar",
            "providerName": "Tea Trails",
            "serviceType": "trekking",
            "contactInfo": "https://teatrails.example",
        })));

        let text = record.to_document().text;
        for field in [
            &record.city,
            &record.provider_name,
            &record.service_type,
            &record.contact_info,
        ] {
            assert!(text.contains(field.as_str()));
        }
    }

    #[test]
    fn one_document_per_listing_in_order() {
        let listings = vec![
            listing(json!({"providerName": "First"})),
            listing(json!({"providerName": "Second"})),
            listing(json!({"providerName": "Third"})),
        ];

        let documents = normalize_listings(&listings);
        assert_eq!(documents.len(), 3);
        assert!(documents[0].text.starts_with("First"));
        assert!(documents[1].text.starts_with("Second"));
        assert!(documents[2].text.starts_with("Third"));
    }
}
