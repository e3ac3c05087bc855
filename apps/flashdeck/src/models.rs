//! Data models for flashcard decks.

use crate::error::{DeckError, DeckResult};
use serde::{Deserialize, Serialize};

/// A flashcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Question side.
    pub question: String,
    /// Answer side.
    pub answer: String,
    /// Whether the user last judged this card as answered correctly.
    #[serde(default, alias = "correct")]
    pub understood: bool,
}

impl Card {
    /// Create a new card that has not been understood yet.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            understood: false,
        }
    }
}

/// A named, ordered collection of cards.
///
/// Cards are addressed by their position; deleting a card shifts every later
/// card down by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    /// Deck name, also its storage key.
    pub name: String,
    /// Cards in insertion order.
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl Deck {
    /// Create an empty deck.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cards: Vec::new(),
        }
    }

    /// Add a card.
    pub fn with_card(mut self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.add_card(question, answer);
        self
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Append a new card and return its index.
    pub fn add_card(&mut self, question: impl Into<String>, answer: impl Into<String>) -> usize {
        self.cards.push(Card::new(question, answer));
        self.cards.len() - 1
    }

    /// Replace the text of the card at `index`. The `understood` flag is kept.
    pub fn edit_card(
        &mut self,
        index: usize,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> DeckResult<()> {
        let len = self.cards.len();
        let card = self.cards.get_mut(index).ok_or(DeckError::Index {
            index: index as i64,
            len,
        })?;
        card.question = question.into();
        card.answer = answer.into();
        Ok(())
    }

    /// Remove and return the card at `index`.
    pub fn delete_card(&mut self, index: usize) -> DeckResult<Card> {
        if index >= self.cards.len() {
            return Err(DeckError::Index {
                index: index as i64,
                len: self.cards.len(),
            });
        }
        Ok(self.cards.remove(index))
    }

    /// Iterate `(index, question, answer)` for display.
    ///
    /// The iterator is `Clone`, so a listing can be replayed without
    /// touching the deck again.
    pub fn cards(&self) -> CardListing<'_> {
        CardListing {
            inner: self.cards.iter().enumerate(),
        }
    }

    /// Clear the `understood` flag on every card.
    pub fn reset(&mut self) {
        for card in &mut self.cards {
            card.understood = false;
        }
    }

    /// Number of cards currently flagged as understood.
    pub fn understood_count(&self) -> usize {
        self.cards.iter().filter(|c| c.understood).count()
    }
}

/// Lazy listing of a deck's cards.
#[derive(Debug, Clone)]
pub struct CardListing<'a> {
    inner: std::iter::Enumerate<std::slice::Iter<'a, Card>>,
}

impl<'a> Iterator for CardListing<'a> {
    type Item = (usize, &'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(i, card)| (i, card.question.as_str(), card.answer.as_str()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for CardListing<'_> {}

/// Parse a card index typed by the user.
///
/// Negative numbers parse but are out of range for every deck.
pub fn parse_index(input: &str, len: usize) -> DeckResult<usize> {
    let trimmed = input.trim();
    let index: i64 = trimmed
        .parse()
        .map_err(|_| DeckError::InvalidInput(format!("'{}' is not a card index", trimmed)))?;
    if index < 0 || index as u64 >= len as u64 {
        return Err(DeckError::Index { index, len });
    }
    Ok(index as usize)
}

/// Check that a deck name is usable as a storage key.
pub fn validate_deck_name(name: &str) -> DeckResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DeckError::InvalidInput("deck name is empty".to_string()));
    }
    if name == "." || name == ".." {
        return Err(DeckError::InvalidInput(format!("'{}' is not a deck name", name)));
    }
    if name.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err(DeckError::InvalidInput(format!(
            "deck name '{}' contains path separators or control characters",
            name
        )));
    }
    Ok(name)
}

/// Require non-blank text for a card side.
pub fn require_text(field: &str, value: &str) -> DeckResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DeckError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn capitals() -> Deck {
        Deck::new("capitals")
            .with_card("France?", "Paris")
            .with_card("Japan?", "Tokyo")
    }

    fn arb_deck() -> impl Strategy<Value = Deck> {
        prop::collection::vec((".*", ".*", any::<bool>()), 0..12).prop_map(|cards| Deck {
            name: "prop".to_string(),
            cards: cards
                .into_iter()
                .map(|(question, answer, understood)| Card {
                    question,
                    answer,
                    understood,
                })
                .collect(),
        })
    }

    #[test]
    fn test_card_creation() {
        let card = Card::new("What is 2+2?", "4");
        assert_eq!(card.question, "What is 2+2?");
        assert_eq!(card.answer, "4");
        assert!(!card.understood);
    }

    #[test]
    fn test_add_card_appends() {
        let mut deck = Deck::new("Test");
        assert!(deck.is_empty());
        assert_eq!(deck.add_card("Q1", "A1"), 0);
        assert_eq!(deck.add_card("Q1", "A2"), 1);
        assert_eq!(deck.len(), 2);
        assert_eq!(deck.cards[1].answer, "A2");
    }

    #[test]
    fn test_edit_card_keeps_flag() {
        let mut deck = capitals();
        deck.cards[0].understood = true;
        deck.edit_card(0, "Italy?", "Rome").unwrap();
        assert_eq!(deck.cards[0].question, "Italy?");
        assert_eq!(deck.cards[0].answer, "Rome");
        assert!(deck.cards[0].understood);
    }

    #[test]
    fn test_delete_card_shifts_indices() {
        let mut deck = capitals().with_card("Peru?", "Lima");
        let removed = deck.delete_card(1).unwrap();
        assert_eq!(removed.answer, "Tokyo");
        assert_eq!(deck.cards[1].question, "Peru?");
    }

    #[test]
    fn test_delete_out_of_range() {
        let mut deck = capitals();
        let err = deck.delete_card(5).unwrap_err();
        assert!(matches!(err, DeckError::Index { index: 5, len: 2 }));
        assert_eq!(deck, capitals());
    }

    #[test]
    fn test_listing_is_restartable() {
        let deck = capitals();
        let listing = deck.cards();
        let first: Vec<_> = listing.clone().collect();
        let second: Vec<_> = listing.collect();
        assert_eq!(first, second);
        assert_eq!(first[1], (1, "Japan?", "Tokyo"));
        assert_eq!(deck.cards().len(), 2);
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index(" 1 ", 2).unwrap(), 1);
        assert!(matches!(parse_index("-1", 2), Err(DeckError::Index { index: -1, len: 2 })));
        assert!(matches!(parse_index("2", 2), Err(DeckError::Index { .. })));
        assert!(matches!(parse_index("one", 2), Err(DeckError::InvalidInput(_))));
        assert!(matches!(parse_index("0", 0), Err(DeckError::Index { .. })));
    }

    #[test]
    fn test_validate_deck_name() {
        assert_eq!(validate_deck_name("  spanish ").unwrap(), "spanish");
        assert!(validate_deck_name("").is_err());
        assert!(validate_deck_name("..").is_err());
        assert!(validate_deck_name("a/b").is_err());
        assert!(validate_deck_name("a\\b").is_err());
        assert!(validate_deck_name("tab\there").is_err());
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("question", " Q ").unwrap(), "Q");
        assert!(matches!(require_text("answer", "   "), Err(DeckError::InvalidInput(_))));
    }

    #[test]
    fn test_legacy_correct_key() {
        let card: Card =
            serde_json::from_str(r#"{"question": "Q", "answer": "A", "correct": true}"#).unwrap();
        assert!(card.understood);
        let card: Card = serde_json::from_str(r#"{"question": "Q", "answer": "A"}"#).unwrap();
        assert!(!card.understood);
    }

    proptest! {
        #[test]
        fn prop_out_of_range_leaves_deck_unchanged(deck in arb_deck(), offset in 0usize..10) {
            let mut edited = deck.clone();
            let index = deck.len() + offset;
            prop_assert!(
                matches!(edited.edit_card(index, "x", "y"), Err(DeckError::Index { .. })),
                "edit_card accepted an out-of-range index"
            );
            prop_assert!(
                matches!(edited.delete_card(index), Err(DeckError::Index { .. })),
                "delete_card accepted an out-of-range index"
            );
            prop_assert_eq!(edited, deck);
        }

        #[test]
        fn prop_negative_index_rejected(deck in arb_deck(), index in i64::MIN..0) {
            let parsed = parse_index(&index.to_string(), deck.len());
            prop_assert!(matches!(parsed, Err(DeckError::Index { .. })), "negative index parsed");
        }

        #[test]
        fn prop_reset_is_idempotent(deck in arb_deck()) {
            let mut once = deck.clone();
            once.reset();
            let mut twice = once.clone();
            twice.reset();
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(once.understood_count(), 0);
            prop_assert_eq!(once.len(), deck.len());
        }
    }
}
