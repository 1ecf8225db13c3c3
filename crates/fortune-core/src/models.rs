//! Data model for readings and share records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::defaults::{DEEP_FAILURE_MARKER, DEEP_FALLBACK_MESSAGE, SHORT_PROVIDER};

/// A stored document: a flat map of top-level fields.
///
/// Both storage backends persist and merge at this granularity.
pub type Document = serde_json::Map<String, JsonValue>;

/// Top-level field names of a persisted share record.
pub mod fields {
    pub const PIXELATED_IMAGE: &str = "pixelated_image";
    pub const VISUALIZATION_DATA: &str = "visualization_data";
    pub const FORTUNES: &str = "fortunes";
    /// Single-provider payload written by older clients.
    pub const LEGACY_FORTUNE: &str = "fortune";
    pub const ANALYSIS_L2: &str = "analysis_l2";
    pub const CREATED_AT: &str = "created_at";
}

/// Fast structured first-pass reading from one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShortReading {
    /// Headline: what the face says.
    #[serde(default)]
    pub face: String,
    /// Advice: career and direction.
    #[serde(default)]
    pub career: String,
    /// Closing blessing.
    #[serde(default)]
    pub blessing: String,
    /// Attribution ("ai"); ignored by the cache signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Model id that produced the reading; ignored by the cache signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ShortReading {
    pub fn new(
        face: impl Into<String>,
        career: impl Into<String>,
        blessing: impl Into<String>,
    ) -> Self {
        Self {
            face: face.into(),
            career: career.into(),
            blessing: blessing.into(),
            source: None,
            model: None,
        }
    }

    /// True when none of the content fields carry text.
    pub fn is_blank(&self) -> bool {
        self.face.trim().is_empty() && self.career.trim().is_empty() && self.blessing.trim().is_empty()
    }
}

/// Provider name → short reading. A provider that failed maps to `None`.
pub type Fortunes = BTreeMap<String, Option<ShortReading>>;

/// The reading that drives deep analysis and cache identity.
pub fn primary_reading(fortunes: &Fortunes) -> Option<&ShortReading> {
    fortunes
        .get(SHORT_PROVIDER)
        .and_then(|r| r.as_ref())
        .filter(|r| !r.is_blank())
}

/// Build a `Fortunes` map holding only the primary provider's reading.
pub fn fortunes_from_primary(reading: ShortReading) -> Fortunes {
    let mut fortunes = Fortunes::new();
    fortunes.insert(SHORT_PROVIDER.to_string(), Some(reading));
    fortunes
}

/// Resolve the fortunes payload of a request or record.
///
/// Older clients send a single `fortune`; it is upgraded to
/// `{"gemini": fortune, "grok": null}`.
pub fn normalize_fortunes(fortunes: Option<Fortunes>, legacy: Option<ShortReading>) -> Fortunes {
    match (fortunes, legacy) {
        (Some(f), _) if !f.is_empty() => f,
        (_, Some(legacy)) => {
            let mut upgraded = Fortunes::new();
            upgraded.insert("gemini".to_string(), Some(legacy));
            upgraded.insert(SHORT_PROVIDER.to_string(), None);
            upgraded
        }
        _ => Fortunes::new(),
    }
}

/// Long-form analysis composed from whichever providers succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepAnalysis {
    pub text: String,
    /// Providers that contributed; empty means `text` is the fallback message.
    pub providers: Vec<String>,
}

impl DeepAnalysis {
    pub fn fallback() -> Self {
        Self {
            text: DEEP_FALLBACK_MESSAGE.to_string(),
            providers: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.providers.is_empty()
    }

    /// Whether this result may be stored for later reuse.
    pub fn is_cacheable(&self) -> bool {
        !self.is_fallback() && looks_cacheable(&self.text)
    }
}

/// Non-empty text that does not carry the failure marker.
pub fn looks_cacheable(text: &str) -> bool {
    !text.trim().is_empty() && !text.contains(DEEP_FAILURE_MARKER)
}

/// Typed view over a persisted share document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShareRecord {
    pub pixelated_image: Option<String>,
    /// Visualization payload in storage form (see `visualization`).
    pub visualization_data: Option<JsonValue>,
    pub fortunes: Fortunes,
    pub analysis_l2: Option<String>,
}

impl ShareRecord {
    /// Read a record from a stored document, tolerating legacy layouts.
    pub fn from_document(doc: &Document) -> Self {
        let fortunes = doc
            .get(fields::FORTUNES)
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value::<Fortunes>(v.clone()).ok());
        let legacy = doc
            .get(fields::LEGACY_FORTUNE)
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value::<ShortReading>(v.clone()).ok());

        Self {
            pixelated_image: doc
                .get(fields::PIXELATED_IMAGE)
                .and_then(|v| v.as_str())
                .map(str::to_string),
            visualization_data: doc
                .get(fields::VISUALIZATION_DATA)
                .filter(|v| !v.is_null())
                .cloned(),
            fortunes: normalize_fortunes(fortunes, legacy),
            analysis_l2: doc
                .get(fields::ANALYSIS_L2)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    /// Convert into a document for `ShareStore::create`.
    ///
    /// `analysis_l2` is omitted when absent so a later merge can fill it.
    pub fn into_document(self) -> crate::Result<Document> {
        let mut doc = Document::new();
        doc.insert(
            fields::PIXELATED_IMAGE.to_string(),
            self.pixelated_image.map(JsonValue::String).unwrap_or(JsonValue::Null),
        );
        doc.insert(
            fields::VISUALIZATION_DATA.to_string(),
            self.visualization_data.unwrap_or(JsonValue::Null),
        );
        doc.insert(
            fields::FORTUNES.to_string(),
            serde_json::to_value(&self.fortunes)?,
        );
        if let Some(analysis) = self.analysis_l2 {
            doc.insert(fields::ANALYSIS_L2.to_string(), JsonValue::String(analysis));
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primary_reading_requires_content() {
        let mut fortunes = Fortunes::new();
        assert!(primary_reading(&fortunes).is_none());

        fortunes.insert("grok".into(), Some(ShortReading::default()));
        assert!(primary_reading(&fortunes).is_none());

        fortunes.insert("grok".into(), Some(ShortReading::new("A", "B", "C")));
        assert_eq!(primary_reading(&fortunes).unwrap().face, "A");
    }

    #[test]
    fn test_primary_reading_ignores_other_providers() {
        let mut fortunes = Fortunes::new();
        fortunes.insert("gemini".into(), Some(ShortReading::new("A", "B", "C")));
        fortunes.insert("grok".into(), None);
        assert!(primary_reading(&fortunes).is_none());
    }

    #[test]
    fn test_normalize_fortunes_upgrades_legacy() {
        let upgraded = normalize_fortunes(None, Some(ShortReading::new("a", "b", "c")));
        assert_eq!(upgraded.len(), 2);
        assert_eq!(upgraded["gemini"].as_ref().unwrap().face, "a");
        assert!(upgraded["grok"].is_none());
    }

    #[test]
    fn test_normalize_fortunes_prefers_new_format() {
        let fortunes = fortunes_from_primary(ShortReading::new("x", "y", "z"));
        let resolved = normalize_fortunes(Some(fortunes.clone()), Some(ShortReading::default()));
        assert_eq!(resolved, fortunes);
    }

    #[test]
    fn test_deep_analysis_cacheability() {
        assert!(!DeepAnalysis::fallback().is_cacheable());

        let ok = DeepAnalysis {
            text: "long form text".into(),
            providers: vec!["Gemini".into()],
        };
        assert!(ok.is_cacheable());

        let marked = DeepAnalysis {
            text: format!("partial {}", DEEP_FAILURE_MARKER),
            providers: vec!["Gemini".into()],
        };
        assert!(!marked.is_cacheable());
    }

    #[test]
    fn test_record_document_roundtrip_keeps_absent_analysis_absent() {
        let record = ShareRecord {
            pixelated_image: Some("data:image/png;base64,AAA".into()),
            visualization_data: Some(json!({"landmarks": [{"x": 1, "y": 2}]})),
            fortunes: fortunes_from_primary(ShortReading::new("A", "B", "C")),
            analysis_l2: None,
        };

        let doc = record.clone().into_document().unwrap();
        assert!(!doc.contains_key(fields::ANALYSIS_L2));
        assert_eq!(ShareRecord::from_document(&doc), record);
    }

    #[test]
    fn test_record_from_legacy_document() {
        let doc = json!({
            "pixelated_image": null,
            "fortune": {"face": "f", "career": "c", "blessing": "b"},
            "analysis_l2": "deep"
        });
        let record = ShareRecord::from_document(doc.as_object().unwrap());
        assert_eq!(record.fortunes["gemini"].as_ref().unwrap().career, "c");
        assert_eq!(record.analysis_l2.as_deref(), Some("deep"));
        assert!(record.pixelated_image.is_none());
    }

    #[test]
    fn test_short_reading_skips_absent_attribution() {
        let value = serde_json::to_value(ShortReading::new("a", "b", "c")).unwrap();
        assert_eq!(value, json!({"face": "a", "career": "b", "blessing": "c"}));
    }
}
