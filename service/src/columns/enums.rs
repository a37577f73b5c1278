//! Enumeration codec: `label [code]` cells

use indexmap::IndexMap;
use sheetsync_core::error::Result;
use sheetsync_core::traits::EnumerationSource;
use std::collections::HashMap;

use super::value::ValueError;

/// Run-scoped cache of enumeration labels
#[derive(Debug, Clone, Default)]
pub struct EnumCodec {
    codes: IndexMap<String, Vec<String>>,
    labels: HashMap<(String, String), String>,
}

impl EnumCodec {
    /// Load every code and label of the named enumerations
    ///
    /// # Errors
    ///
    /// Returns `SheetError::Enumeration` if an enumeration is unknown to the source
    pub async fn load<'a, I>(source: &dyn EnumerationSource, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut codec = Self::default();
        for name in names {
            if codec.codes.contains_key(name) {
                continue;
            }
            let codes = source.all_values(name).await?;
            for code in &codes {
                let label = source.label_for(name, code).await;
                codec.labels.insert((name.to_string(), code.clone()), label);
            }
            tracing::debug!("Loaded {} value(s) for enumeration {name}", codes.len());
            codec.codes.insert(name.to_string(), codes);
        }
        Ok(codec)
    }

    /// Cell text for a stored code; unknown codes are shown with the code as label
    #[must_use]
    pub fn encode(&self, enum_name: &str, code: &str) -> String {
        if code.is_empty() {
            return String::new();
        }
        let label = self
            .labels
            .get(&(enum_name.to_string(), code.to_string()))
            .map_or(code, String::as_str);
        format!("{label} [{code}]")
    }

    /// Stored code for a cell; blank cells decode to `None`
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidEnumeration` when the text carries no
    /// trailing bracketed code
    pub fn decode(text: &str) -> std::result::Result<Option<String>, ValueError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let invalid = || ValueError::InvalidEnumeration(text.to_string());
        let inner = text.strip_suffix(']').ok_or_else(invalid)?;
        let start = inner.rfind('[').ok_or_else(invalid)?;
        let code = inner[start + 1..].trim();
        if code.is_empty() {
            return Err(invalid());
        }
        Ok(Some(code.to_string()))
    }

    /// Codes of an enumeration, in source order
    #[must_use]
    pub fn codes(&self, enum_name: &str) -> &[String] {
        self.codes
            .get(enum_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Encoded values offered for an enumeration, minus skipped codes
    #[must_use]
    pub fn offered_values(&self, enum_name: &str, skip: &[&str]) -> Vec<String> {
        self.codes(enum_name)
            .iter()
            .filter(|code| !skip.contains(&code.as_str()))
            .map(|code| self.encode(enum_name, code))
            .collect()
    }

    /// Names of the loaded enumerations, in load order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticEnumerations;
    use pretty_assertions::assert_eq;

    fn source() -> StaticEnumerations {
        StaticEnumerations::new()
            .with_enumeration("date_certainty", [("approximate", "Approximate"), ("inferred", "Inferred")])
            .with_enumeration(
                "instance_instance_type",
                [("mixed_materials", "Mixed Materials"), ("digital_object", "Digital Object")],
            )
    }

    #[tokio::test]
    async fn test_encode_with_labels() {
        let codec = EnumCodec::load(&source(), ["date_certainty"]).await.unwrap();
        assert_eq!(codec.encode("date_certainty", "approximate"), "Approximate [approximate]");
        assert_eq!(codec.encode("date_certainty", "questionable"), "questionable [questionable]");
        assert_eq!(codec.encode("date_certainty", ""), "");
    }

    #[tokio::test]
    async fn test_unknown_enumeration_fails() {
        let err = EnumCodec::load(&source(), ["no_such_enum"]).await.unwrap_err();
        assert!(err.to_string().contains("no_such_enum"));
    }

    #[tokio::test]
    async fn test_offered_values_skip() {
        let codec = EnumCodec::load(&source(), ["instance_instance_type"]).await.unwrap();
        assert_eq!(
            codec.offered_values("instance_instance_type", &["digital_object"]),
            ["Mixed Materials [mixed_materials]"]
        );
    }

    #[test]
    fn test_decode() {
        assert_eq!(EnumCodec::decode("Box [box]").unwrap().as_deref(), Some("box"));
        assert_eq!(EnumCodec::decode("  ").unwrap(), None);
        assert_eq!(EnumCodec::decode("[folder]").unwrap().as_deref(), Some("folder"));
        // label containing brackets: the trailing pair wins
        assert_eq!(EnumCodec::decode("Box [large] [box_l]").unwrap().as_deref(), Some("box_l"));

        let err = EnumCodec::decode("Box").unwrap_err();
        assert_eq!(err.to_string(), "Could not parse enumeration value from: Box");
        assert!(EnumCodec::decode("Box []").is_err());
    }
}
