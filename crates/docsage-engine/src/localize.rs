//! Localization lookups.
//!
//! Every user-visible string is resolved through the localized-reply store
//! on every turn: exact canonical-text match for the user's language, with
//! graceful fallback to the canonical English text (and to the configured
//! bot name for headers). Body text, header, and button label are each
//! looked up independently; nothing is cached across turns.

use std::sync::Arc;

use docsage_store::Store;

pub struct Localizer {
    store: Arc<Store>,
    language_id: Option<String>,
}

impl Localizer {
    pub fn new(store: Arc<Store>, language_id: Option<String>) -> Self {
        Self { store, language_id }
    }

    /// Localized body text for a canonical phrase, or the phrase itself.
    pub fn text(&self, canonical: &str) -> String {
        self.lookup(canonical)
            .filter(|r| !r.text.is_empty())
            .map(|r| r.text)
            .unwrap_or_else(|| canonical.to_string())
    }

    /// Localized header/bot name attached to a canonical phrase, or the
    /// configured default.
    pub fn bot_name(&self, canonical: &str, default_name: &str) -> String {
        self.lookup(canonical)
            .filter(|r| !r.bot_name.is_empty())
            .map(|r| r.bot_name)
            .unwrap_or_else(|| default_name.to_string())
    }

    /// Localized button label attached to a canonical phrase, or the
    /// canonical label itself.
    pub fn button_label(&self, canonical: &str, canonical_button: &str) -> String {
        self.lookup(canonical)
            .filter(|r| !r.button_label.is_empty())
            .map(|r| r.button_label)
            .unwrap_or_else(|| canonical_button.to_string())
    }

    /// Reverse lookup: which canonical phrase does this localized reply
    /// text belong to?
    pub fn canonical_for(&self, localized_text: &str) -> Option<String> {
        self.store.canonical_for_text(localized_text).ok().flatten()
    }

    fn lookup(&self, canonical: &str) -> Option<docsage_store::LocalizedReply> {
        let language_id = self.language_id.as_deref()?;
        self.store.localized_reply(language_id, canonical).ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phrases;

    fn setup() -> (Arc<Store>, String) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let hindi = store.add_language("Hindi").unwrap();
        store
            .add_localized_reply(
                &hindi.id,
                phrases::CHOOSE_DOCUMENT_BODY,
                "कृपया बताएं कि आपका प्रश्न किस दस्तावेज़ के बारे में है।",
                "डॉकसेज",
                "दस्तावेज़ चुनें",
            )
            .unwrap();
        (store, hindi.id)
    }

    #[test]
    fn test_localized_hit_and_fallback() {
        let (store, hindi_id) = setup();
        let loc = Localizer::new(store, Some(hindi_id));
        assert!(loc.text(phrases::CHOOSE_DOCUMENT_BODY).starts_with("कृपया"));
        // No entry for this phrase: canonical English goes out verbatim.
        assert_eq!(loc.text(phrases::WAS_THIS_HELPFUL), phrases::WAS_THIS_HELPFUL);
        assert_eq!(loc.bot_name(phrases::CHOOSE_DOCUMENT_BODY, "DocSage"), "डॉकसेज");
        assert_eq!(loc.bot_name(phrases::WAS_THIS_HELPFUL, "DocSage"), "DocSage");
        assert_eq!(
            loc.button_label(phrases::CHOOSE_DOCUMENT_BODY, phrases::CHOOSE_DOCUMENT_BUTTON),
            "दस्तावेज़ चुनें"
        );
    }

    #[test]
    fn test_lookup_is_idempotent_within_session() {
        let (store, hindi_id) = setup();
        let loc = Localizer::new(store, Some(hindi_id));
        let first = loc.text(phrases::CHOOSE_DOCUMENT_BODY);
        let second = loc.text(phrases::CHOOSE_DOCUMENT_BODY);
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_language_means_canonical() {
        let (store, _hindi_id) = setup();
        let loc = Localizer::new(store, None);
        assert_eq!(loc.text(phrases::CHOOSE_DOCUMENT_BODY), phrases::CHOOSE_DOCUMENT_BODY);
    }

    #[test]
    fn test_reverse_lookup() {
        let (store, hindi_id) = setup();
        let loc = Localizer::new(store.clone(), Some(hindi_id));
        let localized = loc.text(phrases::CHOOSE_DOCUMENT_BODY);
        assert_eq!(loc.canonical_for(&localized).as_deref(), Some(phrases::CHOOSE_DOCUMENT_BODY));
        assert!(loc.canonical_for("unrelated text").is_none());
    }
}
