//! Supported document media types.
//!
//! Upload processing only accepts a fixed, closed set of MIME types. Anything
//! else is rejected before a permit is taken or any extraction is attempted.

/// The closed set of media types the upload pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedMimeType {
    Pdf,
    Text,
    Xml,
    Json,
    FhirXml,
    FhirJson,
    Hl7V3,
}

impl SupportedMimeType {
    /// All variants with their canonical MIME strings.
    const TABLE: [(SupportedMimeType, &'static str); 7] = [
        (SupportedMimeType::Pdf, "application/pdf"),
        (SupportedMimeType::Text, "text/plain"),
        (SupportedMimeType::Xml, "application/xml"),
        (SupportedMimeType::Json, "application/json"),
        (SupportedMimeType::FhirXml, "application/fhir+xml"),
        (SupportedMimeType::FhirJson, "application/fhir+json"),
        (SupportedMimeType::Hl7V3, "application/hl7-v3"),
    ];

    /// Parse a MIME string, case-insensitively. Returns `None` for anything
    /// outside the supported set.
    pub fn parse(mime_type: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, s)| s.eq_ignore_ascii_case(mime_type))
            .map(|(v, _)| *v)
    }

    /// Whether a MIME string names a supported type.
    pub fn is_supported(mime_type: &str) -> bool {
        Self::parse(mime_type).is_some()
    }

    /// The canonical MIME string for this type.
    pub fn as_str(&self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(v, _)| v == self)
            .map(|(_, s)| *s)
            .expect("variant present in table")
    }
}

impl std::fmt::Display for SupportedMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_types_parse() {
        assert!(SupportedMimeType::is_supported("application/pdf"));
        assert!(SupportedMimeType::is_supported("text/plain"));
        assert!(SupportedMimeType::is_supported("application/xml"));
        assert!(SupportedMimeType::is_supported("application/json"));
        assert!(SupportedMimeType::is_supported("application/fhir+xml"));
        assert!(SupportedMimeType::is_supported("application/fhir+json"));
        assert!(SupportedMimeType::is_supported("application/hl7-v3"));
    }

    #[test]
    fn unsupported_types_rejected() {
        assert!(!SupportedMimeType::is_supported("text/html"));
        assert!(!SupportedMimeType::is_supported("application/unsupported"));
        assert!(!SupportedMimeType::is_supported(""));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            SupportedMimeType::parse("APPLICATION/PDF"),
            Some(SupportedMimeType::Pdf)
        );
        assert_eq!(
            SupportedMimeType::parse("Text/Plain"),
            Some(SupportedMimeType::Text)
        );
        assert_eq!(
            SupportedMimeType::parse("APPLICATION/JSON"),
            Some(SupportedMimeType::Json)
        );
    }

    #[test]
    fn canonical_string_round_trips() {
        for (variant, s) in SupportedMimeType::TABLE {
            assert_eq!(SupportedMimeType::parse(s), Some(variant));
            assert_eq!(variant.as_str(), s);
        }
    }
}
