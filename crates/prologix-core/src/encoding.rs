use encoding_rs::{UTF_8, WINDOWS_1252};

/// How instrument responses are turned into text for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Auto,
    Utf8,
    Ascii,
    Latin1,
}

impl std::str::FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "auto" => Self::Auto,
            "utf-8" | "utf8" => Self::Utf8,
            "ascii" => Self::Ascii,
            "latin1" | "latin-1" | "windows-1252" => Self::Latin1,
            other => return Err(format!("unknown encoding {other:?}")),
        })
    }
}

impl TextEncoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Auto => detect_and_decode(bytes),
            Self::Utf8 => UTF_8.decode(bytes).0.into_owned(),
            Self::Ascii => bytes.iter().map(|&b| if b < 128 { b as char } else { '?' }).collect(),
            Self::Latin1 => WINDOWS_1252.decode(bytes).0.into_owned(),
        }
    }
}

/// UTF-8 when the bytes are valid UTF-8, otherwise whatever `chardetng`
/// guesses.
fn detect_and_decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => {
            let mut detector = chardetng::EncodingDetector::new();
            detector.feed(bytes, true);
            let (text, _, _) = detector.guess(None, true).decode(bytes);
            text.into_owned()
        }
    }
}
