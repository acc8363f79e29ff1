use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmbeddedFileKind {
    Font,
    Image,
    Model,
    Worksheet,
    #[default]
    Other,
}

impl EmbeddedFileKind {
    pub fn from_token(tok: &str) -> Self {
        match tok {
            "font" => EmbeddedFileKind::Font,
            "image" => EmbeddedFileKind::Image,
            "model" => EmbeddedFileKind::Model,
            "worksheet" => EmbeddedFileKind::Worksheet,
            _ => EmbeddedFileKind::Other,
        }
    }
}

/// One file carried inside the document, already base64-decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedFile {
    pub name: String,
    pub kind: EmbeddedFileKind,
    pub data: Vec<u8>,
    pub checksum: Option<String>,
}

/// The embedded-files bundle of a document or library symbol.
///
/// Text items may appear in the file before this block does, so font
/// resolution is a second pass: parse everything, then walk every text item
/// and resolve its unresolved font name against [`EmbeddedFiles::font_files`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedFiles {
    pub files: Vec<EmbeddedFile>,
}

impl EmbeddedFiles {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Names of all embedded font files.
    pub fn font_files(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|f| f.kind == EmbeddedFileKind::Font)
            .map(|f| font_family_from_file_name(&f.name))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&EmbeddedFile> {
        self.files.iter().find(|f| f.name == name)
    }
}

/// Font files resolve by family name, which for embedded files is the file
/// stem (the bundle writer names files after the family).
fn font_family_from_file_name(name: &str) -> String {
    let stem = name.rsplit('/').next().unwrap_or(name);
    match stem.rsplit_once('.') {
        Some((family, ext))
            if matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf" | "woff" | "woff2") =>
        {
            family.to_owned()
        }
        _ => stem.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_files_use_family_names() {
        let bundle = EmbeddedFiles {
            files: vec![
                EmbeddedFile {
                    name: "Inter.ttf".into(),
                    kind: EmbeddedFileKind::Font,
                    data: vec![0],
                    checksum: None,
                },
                EmbeddedFile {
                    name: "logo.png".into(),
                    kind: EmbeddedFileKind::Image,
                    data: vec![0],
                    checksum: None,
                },
            ],
        };

        assert_eq!(bundle.font_files(), vec!["Inter".to_owned()]);
    }
}
