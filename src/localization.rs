//! Localized flavor messages shown to players during long holds.

use rand::seq::IndexedRandom;

use crate::dto::protocol::UserLocale;

/// Source of localized flavor text attached to predefined rooms.
///
/// Custom rooms carry no source and therefore never emit flavor.
pub trait FlavorSource: Send + Sync {
    /// A random message for the locale, or `None` when the locale has no
    /// entries.
    fn random_message(&self, locale: UserLocale) -> Option<String>;
}

/// Flavor bundle embedded into the binary at compile time.
pub struct EmbeddedMessages {
    en: Vec<&'static str>,
    ru: Vec<&'static str>,
}

impl EmbeddedMessages {
    /// The default bundle shipped with the binary, shared by all predefined
    /// rooms.
    pub fn bundled() -> Self {
        Self {
            en: parse_lines(include_str!("../locales/en.txt")),
            ru: parse_lines(include_str!("../locales/ru.txt")),
        }
    }

    fn messages(&self, locale: UserLocale) -> &[&'static str] {
        match locale {
            UserLocale::En => &self.en,
            UserLocale::Ru => &self.ru,
        }
    }
}

impl FlavorSource for EmbeddedMessages {
    fn random_message(&self, locale: UserLocale) -> Option<String> {
        self.messages(locale)
            .choose(&mut rand::rng())
            .map(|line| (*line).to_owned())
    }
}

fn parse_lines(raw: &'static str) -> Vec<&'static str> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_messages_exist_for_every_locale() {
        let bundle = EmbeddedMessages::bundled();
        assert!(bundle.random_message(UserLocale::En).is_some());
        assert!(bundle.random_message(UserLocale::Ru).is_some());
    }

    #[test]
    fn random_message_comes_from_the_bundle() {
        let bundle = EmbeddedMessages::bundled();
        let message = bundle.random_message(UserLocale::En).unwrap();
        assert!(bundle.en.contains(&message.as_str()));
    }

    #[test]
    fn empty_bundle_yields_no_message() {
        let bundle = EmbeddedMessages {
            en: Vec::new(),
            ru: Vec::new(),
        };
        assert!(bundle.random_message(UserLocale::En).is_none());
    }
}
