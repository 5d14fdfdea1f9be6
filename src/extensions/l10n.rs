//! Localization hooks used while loading a manifest.
//!
//! Message lookup is delegated to a [`Localizer`]; this module only knows how
//! to substitute `__MSG_name__` placeholders and how to wrap a display
//! string so it renders correctly inside right-to-left UI.

use std::collections::HashMap;

/// Resolves `__MSG_*__` placeholders and reports the UI locale.
pub trait Localizer: Send + Sync {
    /// UI locale, e.g. `en-US` or `he`.
    fn ui_locale(&self) -> &str;

    /// Localized text for a message name, if one exists.
    fn message(&self, name: &str) -> Option<String>;
}

/// A fixed message table.
#[derive(Debug, Clone, Default)]
pub struct StaticLocalizer {
    locale: String,
    messages: HashMap<String, String>,
}

impl StaticLocalizer {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            messages: HashMap::new(),
        }
    }

    pub fn with_message(mut self, name: &str, text: &str) -> Self {
        self.messages.insert(name.to_ascii_lowercase(), text.to_string());
        self
    }
}

impl Localizer for StaticLocalizer {
    fn ui_locale(&self) -> &str {
        &self.locale
    }

    fn message(&self, name: &str) -> Option<String> {
        self.messages.get(&name.to_ascii_lowercase()).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDirection {
    LeftToRight,
    RightToLeft,
}

const RTL_LANGUAGES: &[&str] = &["ar", "fa", "he", "iw", "ps", "sd", "ug", "ur", "yi"];

const LEFT_TO_RIGHT_EMBEDDING: char = '\u{202A}';
const RIGHT_TO_LEFT_EMBEDDING: char = '\u{202B}';
const POP_DIRECTIONAL_FORMATTING: char = '\u{202C}';

/// Text direction of a locale, judged by its language subtag.
pub fn locale_direction(locale: &str) -> TextDirection {
    let language = locale
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if RTL_LANGUAGES.contains(&language.as_str()) {
        TextDirection::RightToLeft
    } else {
        TextDirection::LeftToRight
    }
}

fn is_strong_rtl(c: char) -> bool {
    matches!(
        c,
        '\u{0590}'..='\u{08FF}' | '\u{FB1D}'..='\u{FDFF}' | '\u{FE70}'..='\u{FEFF}'
    )
}

/// Wrap `text` in directional embedding marks when the UI is right-to-left.
/// Text with no strong right-to-left characters is embedded left-to-right
/// so punctuation stays where the author put it.
pub fn adjust_string_for_locale_direction(text: &str, locale: &str) -> String {
    if locale_direction(locale) == TextDirection::LeftToRight {
        return text.to_string();
    }
    let mark = if text.chars().any(is_strong_rtl) {
        RIGHT_TO_LEFT_EMBEDDING
    } else {
        LEFT_TO_RIGHT_EMBEDDING
    };
    format!("{}{}{}", mark, text, POP_DIRECTIONAL_FORMATTING)
}

/// Replace every `__MSG_name__` placeholder that the localizer knows.
/// Unknown placeholders are left in place.
pub fn localize_message(text: &str, localizer: &dyn Localizer) -> String {
    const PREFIX: &str = "__MSG_";
    const SUFFIX: &str = "__";

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(PREFIX) {
        out.push_str(&rest[..start]);
        let after = &rest[start + PREFIX.len()..];
        match after.find(SUFFIX) {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match localizer.message(name) {
                    Some(message) => out.push_str(&message),
                    None => out.push_str(&rest[start..start + PREFIX.len() + end + SUFFIX.len()]),
                }
                rest = &after[end + SUFFIX.len()..];
            }
            _ => {
                out.push_str(PREFIX);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
