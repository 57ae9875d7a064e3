//! User-facing strings by locale

use chatflow_api::Language;

/// Locale the widget talks to the user in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    English,
    Korean,
}

impl Locale {
    /// Generic notice shown when a submission fails
    pub fn generic_error(&self) -> &'static str {
        match self {
            Locale::English => "Oops! There seems to be an error. Please try again.",
            Locale::Korean => "잠시 후 다시 시도 해주시기 바랍니다.",
        }
    }

    /// Recorded when the translation endpoint returned nothing usable
    pub fn translation_unavailable(&self) -> &'static str {
        match self {
            Locale::English => "Translation not available",
            Locale::Korean => "번역을 사용할 수 없습니다.",
        }
    }

    /// Recorded when the translation call failed
    pub fn translation_failed(&self) -> &'static str {
        match self {
            Locale::English => "Error during translation",
            Locale::Korean => "번역 중 오류가 발생했습니다.",
        }
    }
}

impl From<Language> for Locale {
    fn from(language: Language) -> Self {
        match language {
            Language::English => Locale::English,
            Language::Korean => Locale::Korean,
        }
    }
}
