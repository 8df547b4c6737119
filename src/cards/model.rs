//! Card and card-set types.

use serde::{Deserialize, Serialize};

/// One narratable word/example pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    /// Provider-side identifier (row id in the spreadsheet).  Informational
    /// only; the listening controller never looks at it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub word: String,
    pub example: String,
}

impl Card {
    pub fn new(word: impl Into<String>, example: impl Into<String>) -> Self {
        Self {
            id: None,
            word: word.into(),
            example: example.into(),
        }
    }

    /// Trim both fields; returns `None` when either is blank, since such a
    /// card has nothing to narrate.
    pub fn normalized(self) -> Option<Self> {
        let word = self.word.trim();
        let example = self.example.trim();
        if word.is_empty() || example.is_empty() {
            return None;
        }
        Some(Self {
            id: self.id,
            word: word.to_string(),
            example: example.to_string(),
        })
    }
}

/// A named collection of cards as delivered by a
/// [`ContentProvider`](super::ContentProvider).
#[derive(Debug, Clone, PartialEq)]
pub struct CardSet {
    /// Worksheet / tab name.
    pub name: String,
    /// Spreadsheet worksheet gid, when the provider knows it.
    pub sheet_gid: Option<i64>,
    /// Narratable cards, in provider order.
    pub cards: Vec<Card>,
    /// `cards.len()` as reported by the provider.
    pub total_count: usize,
    /// Number of rows in the set before unusable cards were dropped.
    pub original_count: usize,
}

impl CardSet {
    /// Build a set from raw cards, dropping the ones without both a word and
    /// an example.
    pub fn from_raw(name: impl Into<String>, sheet_gid: Option<i64>, raw: Vec<Card>) -> Self {
        let original_count = raw.len();
        let cards: Vec<Card> = raw.into_iter().filter_map(Card::normalized).collect();
        Self {
            name: name.into(),
            sheet_gid,
            total_count: cards.len(),
            cards,
            original_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_trims_fields() {
        let card = Card::new("  casa ", " Eu vivo numa casa\n").normalized().unwrap();
        assert_eq!(card.word, "casa");
        assert_eq!(card.example, "Eu vivo numa casa");
    }

    #[test]
    fn normalized_rejects_blank_example() {
        assert!(Card::new("casa", "   ").normalized().is_none());
        assert!(Card::new("", "O meu carro é azul").normalized().is_none());
    }

    #[test]
    fn from_raw_counts_dropped_cards() {
        let set = CardSet::from_raw(
            "Verbs",
            Some(7),
            vec![
                Card::new("casa", "Eu vivo numa casa"),
                Card::new("carro", ""),
                Card::new("gato", "O gato dorme"),
            ],
        );
        assert_eq!(set.original_count, 3);
        assert_eq!(set.total_count, 2);
        assert_eq!(set.cards[1].word, "gato");
        assert!(!set.is_empty());
    }

    #[test]
    fn card_id_is_optional_in_json() {
        let card: Card =
            serde_json::from_str(r#"{"word":"casa","example":"Eu vivo numa casa"}"#).unwrap();
        assert_eq!(card.id, None);
        assert_eq!(card, Card::new("casa", "Eu vivo numa casa"));
    }
}
