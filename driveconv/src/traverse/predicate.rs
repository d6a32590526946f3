pub const DEFAULT_EXTENSIONS: [&str; 6] = ["doc", "docx", "xls", "xlsx", "ppt", "pptx"];

/// Decides which file names are sent for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionPredicate {
    extensions: Vec<String>,
}

impl ConversionPredicate {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn matches(&self, name: &str) -> bool {
        let extension = extension_of(name).to_lowercase();
        !extension.is_empty() && self.extensions.contains(&extension)
    }
}

impl Default for ConversionPredicate {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

/// Text after the final period, or `""` when the name has none.
pub fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) => &name[dot + 1..],
        None => "",
    }
}
