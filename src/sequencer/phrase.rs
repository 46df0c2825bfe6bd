//! Spoken phrase templates.

use crate::arrival::event::{ArrivalEvent, CallSource};
use crate::defaults;

/// Per-source phrase templates.
///
/// Placeholders: `{identifier}`, `{name}`, `{code}`.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseBook {
    pub pharmacy: String,
    pub clinic: String,
    /// Read identifiers character by character ("A012" → "A 0 1 2").
    pub spell_identifier: bool,
}

impl Default for PhraseBook {
    fn default() -> Self {
        Self {
            pharmacy: defaults::PHARMACY_TEMPLATE.to_string(),
            clinic: defaults::CLINIC_TEMPLATE.to_string(),
            spell_identifier: true,
        }
    }
}

impl PhraseBook {
    pub fn render(&self, event: &ArrivalEvent) -> String {
        let template = match event.source {
            CallSource::Pharmacy => &self.pharmacy,
            CallSource::Clinic => &self.clinic,
        };

        let identifier = if self.spell_identifier {
            spell_out(&event.identifier)
        } else {
            event.identifier.clone()
        };

        let text = template
            .replace("{identifier}", &identifier)
            .replace("{name}", &event.subject_name)
            .replace("{code}", &event.related_code);

        tidy(&text)
    }
}

/// Separates characters so engines do not read "012" as "twelve".
/// Punctuation inside identifiers is not pronounced.
fn spell_out(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| c.is_alphanumeric())
        .map(String::from)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tidies the gaps empty placeholders leave behind (" ,", ",,", leading ",").
fn tidy(text: &str) -> String {
    let mut tidied = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(" ,", ",")
        .replace(" .", ".");
    while tidied.contains(",,") {
        tidied = tidied.replace(",,", ",");
    }
    tidied = tidied.replace(",.", ".");
    tidied
        .trim_start_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pharmacy_phrase_spells_identifier() {
        let book = PhraseBook::default();
        let event = ArrivalEvent::pharmacy("RX-012", "Alice", "REG-1");
        assert_eq!(
            book.render(&event),
            "Nomor resep R X 0 1 2, atas nama Alice, silakan mengambil obat di loket farmasi."
        );
    }

    #[test]
    fn test_clinic_phrase_uses_code() {
        let book = PhraseBook::default();
        let event = ArrivalEvent::new(CallSource::Clinic, "A7", "", "Poli Anak");
        assert_eq!(
            book.render(&event),
            "Nomor antrian A 7, silakan masuk ke ruang Poli Anak."
        );
    }

    #[test]
    fn test_plain_identifier_when_spelling_disabled() {
        let book = PhraseBook {
            pharmacy: "{identifier} for {name} ({code})".to_string(),
            clinic: String::new(),
            spell_identifier: false,
        };
        let event = ArrivalEvent::pharmacy("RX-012", "Bob", "R9");
        assert_eq!(book.render(&event), "RX-012 for Bob (R9)");
    }

    #[test]
    fn test_empty_placeholder_is_tidied() {
        let book = PhraseBook {
            pharmacy: "Number {identifier}, {name}, please come.".to_string(),
            clinic: String::new(),
            spell_identifier: false,
        };
        let event = ArrivalEvent::new(CallSource::Pharmacy, "5", "", "");
        assert_eq!(book.render(&event), "Number 5, please come.");
    }

    #[test]
    fn test_tidy_placeholder_gaps() {
        assert_eq!(tidy("Number 5, , , please come."), "Number 5, please come.");
        assert_eq!(tidy(", for Alice."), "for Alice.");
        assert_eq!(tidy("Code X, ."), "Code X.");
        assert_eq!(tidy("  plain   text "), "plain text");
    }

    #[test]
    fn test_spell_out() {
        assert_eq!(spell_out("A012"), "A 0 1 2");
        assert_eq!(spell_out("B-3/4"), "B 3 4");
        assert_eq!(spell_out(""), "");
    }
}
