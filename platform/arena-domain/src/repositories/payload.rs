use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadLocation {
    Inline(String),
    Stdin,
    Http(String),
    File(PathBuf),
}

impl PayloadLocation {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') || trimmed.is_empty() {
            return Self::Inline(trimmed.to_string());
        }
        if trimmed == "-" {
            return Self::Stdin;
        }
        let lower = trimmed.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Self::Http(trimmed.to_string());
        }
        Self::File(PathBuf::from(trimmed))
    }

    pub fn is_csv_file(&self) -> bool {
        match self {
            Self::File(path) => path
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Inline(_) => "inline".to_string(),
            Self::Stdin => "stdin".to_string(),
            Self::Http(url) => url.clone(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Fetches the raw text of a payload.
pub trait PayloadSource {
    fn fetch(&self, location: &PayloadLocation) -> Result<String, String>;
}
