/// A tagged field located in a document body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedLine {
    pub index: Option<usize>,
    pub value: Option<String>,
}

impl ExtractedLine {
    /// The field value, or an empty string when the field is absent.
    pub fn value_or_empty(&self) -> String {
        self.value.clone().unwrap_or_default()
    }
}

/// Find the first line starting with any of `prefixes` and return it with the
/// prefix stripped. A missing field is not an error.
pub fn extract_line<S: AsRef<str>>(lines: &[S], prefixes: &[&str]) -> ExtractedLine {
    for (index, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if let Some(rest) = prefixes
            .iter()
            .find_map(|prefix| line.strip_prefix(prefix))
        {
            return ExtractedLine {
                index: Some(index),
                value: Some(rest.trim().to_string()),
            };
        }
    }
    ExtractedLine::default()
}
