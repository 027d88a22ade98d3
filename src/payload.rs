//! Creation-request assembly: one CSV row merged with its media entry.
//!
//! Absent source values are omitted from the payload entirely, never sent as
//! empty strings, so server-side defaults survive.
use serde_json::{json, Map, Value};

use crate::csv_load::ProjectRow;
use crate::media::sync::MediaMapEntry;

fn insert_if_present(meta: &mut Map<String, Value>, key: &str, value: &str) {
    if !value.trim().is_empty() {
        meta.insert(key.to_string(), json!(value));
    }
}

/// Assemble the creation request. `tags` are the pre-resolved numeric
/// identifiers; name-mode tags are resolved before this point.
pub fn assemble(row: &ProjectRow, media: &MediaMapEntry, tags: &[u64]) -> Value {
    let mut payload = Map::new();
    payload.insert(
        "title".into(),
        json!(format!("{} at {}", row.title, row.company)),
    );
    payload.insert("content".into(), json!(row.content));
    payload.insert("status".into(), json!("publish"));
    if !row.categories.is_empty() {
        payload.insert("categories".into(), json!(row.categories));
    }
    if !tags.is_empty() {
        payload.insert("tags".into(), json!(tags));
    }
    if let Some(featured) = media.featured {
        payload.insert("featured_media".into(), json!(featured));
    }

    let mut meta = Map::new();
    insert_if_present(&mut meta, "_project_subtext", &row.subtext);
    insert_if_present(&mut meta, "_project_role", &row.role);
    insert_if_present(&mut meta, "_project_company", &row.company);
    if let Some(url) = &row.company_url {
        meta.insert("_project_company_url".into(), json!(url));
    }
    if !media.gallery.is_empty() {
        let joined = media
            .gallery
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        meta.insert("_project_gallery".into(), json!(joined));
    }
    if !media.captions.is_empty() {
        // Identifier-to-text mapping travels as a JSON-encoded string.
        let serialized = serde_json::to_string(&media.captions).unwrap_or_else(|_| "{}".into());
        meta.insert("_project_gallery_captions".into(), json!(serialized));
    }
    if let Some(thumbnail) = media.thumbnail {
        meta.insert("_project_thumbnail".into(), json!(thumbnail.to_string()));
    }
    meta.insert("_project_date_type".into(), json!(row.date_type.as_str()));
    meta.insert(
        "_project_date_format".into(),
        json!(row.date_format.as_str()),
    );
    insert_if_present(&mut meta, "_project_date_start", &row.date_start);
    if let Some(end) = &row.date_end {
        meta.insert("_project_date_end".into(), json!(end));
    }

    payload.insert("meta".into(), Value::Object(meta));
    Value::Object(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_load::{DateFormat, DateType};
    use std::collections::BTreeMap;

    fn row() -> ProjectRow {
        ProjectRow {
            title: "Redesign".into(),
            company: "Acme".into(),
            role: "Lead".into(),
            subtext: "Brand refresh".into(),
            content: "Body".into(),
            date_start: "01/2020".into(),
            date_end: None,
            date_type: DateType::Single,
            date_format: DateFormat::MmYyyy,
            company_url: None,
            categories: vec![],
            tags: vec![],
        }
    }

    fn media() -> MediaMapEntry {
        MediaMapEntry {
            gallery: vec![1, 2, 3],
            captions: BTreeMap::from([(2, "A view".to_string())]),
            featured: Some(9),
            thumbnail: Some(9),
        }
    }

    #[test]
    fn title_is_synthesized_from_title_and_company() {
        let payload = assemble(&row(), &media(), &[]);
        assert_eq!(payload["title"], "Redesign at Acme");
        assert_eq!(payload["status"], "publish");
    }

    #[test]
    fn absent_date_end_is_omitted_entirely() {
        let payload = assemble(&row(), &media(), &[]);
        assert!(payload["meta"].get("_project_date_end").is_none());

        let mut with_end = row();
        with_end.date_end = Some("12/2021".into());
        with_end.date_type = DateType::Range;
        let payload = assemble(&with_end, &media(), &[]);
        assert_eq!(payload["meta"]["_project_date_end"], "12/2021");
        assert_eq!(payload["meta"]["_project_date_type"], "range");
    }

    #[test]
    fn gallery_is_comma_joined_and_captions_are_encoded() {
        let payload = assemble(&row(), &media(), &[]);
        assert_eq!(payload["meta"]["_project_gallery"], "1,2,3");
        assert_eq!(
            payload["meta"]["_project_gallery_captions"],
            "{\"2\":\"A view\"}"
        );
        assert_eq!(payload["meta"]["_project_thumbnail"], "9");
        assert_eq!(payload["featured_media"], 9);
    }

    #[test]
    fn empty_media_entry_omits_all_media_fields() {
        let payload = assemble(&row(), &MediaMapEntry::default(), &[]);
        assert!(payload.get("featured_media").is_none());
        assert!(payload["meta"].get("_project_gallery").is_none());
        assert!(payload["meta"].get("_project_gallery_captions").is_none());
        assert!(payload["meta"].get("_project_thumbnail").is_none());
    }

    #[test]
    fn categories_and_tags_are_omitted_when_empty() {
        let payload = assemble(&row(), &media(), &[]);
        assert!(payload.get("categories").is_none());
        assert!(payload.get("tags").is_none());

        let mut with_terms = row();
        with_terms.categories = vec![4, 5];
        let payload = assemble(&with_terms, &media(), &[7]);
        assert_eq!(payload["categories"], serde_json::json!([4, 5]));
        assert_eq!(payload["tags"], serde_json::json!([7]));
    }

    #[test]
    fn blank_optional_strings_are_not_sent() {
        let mut blank = row();
        blank.subtext = String::new();
        blank.role = "  ".into();
        let payload = assemble(&blank, &media(), &[]);
        assert!(payload["meta"].get("_project_subtext").is_none());
        assert!(payload["meta"].get("_project_role").is_none());
        assert_eq!(payload["meta"]["_project_company"], "Acme");
    }
}
