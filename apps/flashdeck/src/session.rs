//! Study session state machine.
//!
//! A session walks the deck in passes. Cards judged correct drop out of the
//! next pass; missed cards come back until every card is understood or the
//! user ends the session. The session only holds card indices, the deck itself
//! is handed to each transition.

use crate::models::Deck;
use rand::seq::SliceRandom;
use rand::Rng;

/// Order in which a pass presents its cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StudyOrder {
    /// Deck order.
    #[default]
    InOrder,
    /// Fresh shuffle at the start of every pass.
    Shuffled,
}

/// Which cards the first pass includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StudyScope {
    /// Every card in the deck.
    #[default]
    AllCards,
    /// Only cards not yet flagged as understood.
    NotUnderstood,
}

/// The user's verdict on their own answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgment {
    Correct,
    Incorrect,
}

/// What to do when a pass ends with cards still missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassChoice {
    /// Review only the missed cards.
    Continue,
    /// Clear all flags and start over with the full card list.
    Reset,
    /// Stop now.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Presenting cards of the current pass.
    Reviewing,
    /// Pass finished with missed cards; waiting for a [`PassChoice`].
    PassComplete,
    /// Every card was judged correct.
    AllUnderstood,
    /// The user ended the session early.
    Ended,
}

impl SessionState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::AllUnderstood | Self::Ended)
    }
}

#[derive(Debug, Clone)]
pub struct StudySession {
    order: StudyOrder,
    /// Card list of the session; a reset widens it to the whole deck.
    all: Vec<usize>,
    /// Cards of the current pass, in presentation order.
    remaining: Vec<usize>,
    /// Cards missed so far in the current pass.
    missed: Vec<usize>,
    position: usize,
    pass: usize,
    state: SessionState,
    reviewed: usize,
    correct: usize,
}

impl StudySession {
    /// Start a session over `deck`.
    ///
    /// With nothing to review the session starts out as `AllUnderstood`.
    pub fn start<R: Rng + ?Sized>(
        deck: &Deck,
        order: StudyOrder,
        scope: StudyScope,
        rng: &mut R,
    ) -> Self {
        let all: Vec<usize> = match scope {
            StudyScope::AllCards => (0..deck.len()).collect(),
            StudyScope::NotUnderstood => deck
                .cards
                .iter()
                .enumerate()
                .filter(|(_, c)| !c.understood)
                .map(|(i, _)| i)
                .collect(),
        };

        let mut session = Self {
            order,
            remaining: Vec::new(),
            missed: Vec::new(),
            all,
            position: 0,
            pass: 0,
            state: SessionState::Reviewing,
            reviewed: 0,
            correct: 0,
        };
        session.begin_pass(session.all.clone(), rng);
        session
    }

    fn begin_pass<R: Rng + ?Sized>(&mut self, mut cards: Vec<usize>, rng: &mut R) {
        if cards.is_empty() {
            self.remaining.clear();
            self.state = SessionState::AllUnderstood;
            return;
        }
        if self.order == StudyOrder::Shuffled {
            cards.shuffle(rng);
        }
        self.remaining = cards;
        self.missed = Vec::new();
        self.position = 0;
        self.pass += 1;
        self.state = SessionState::Reviewing;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Pass number, starting at 1.
    pub fn pass(&self) -> usize {
        self.pass
    }

    /// Cards in the current pass, in presentation order.
    pub fn remaining(&self) -> &[usize] {
        &self.remaining
    }

    /// Cards missed so far in the current pass.
    pub fn missed(&self) -> &[usize] {
        &self.missed
    }

    /// Position of the current card within the pass.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn reviewed(&self) -> usize {
        self.reviewed
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    /// Deck index of the card to present, if reviewing.
    pub fn current(&self) -> Option<usize> {
        match self.state {
            SessionState::Reviewing => self.remaining.get(self.position).copied(),
            _ => None,
        }
    }

    /// Record the judgment for the current card and advance.
    ///
    /// Returns whether the card's `understood` flag changed, i.e. whether the
    /// deck needs saving. Outside of `Reviewing` this does nothing.
    pub fn judge(&mut self, deck: &mut Deck, judgment: Judgment) -> bool {
        let Some(index) = self.current() else {
            return false;
        };
        let understood = judgment == Judgment::Correct;
        let flipped = match deck.cards.get_mut(index) {
            Some(card) => {
                let flipped = card.understood != understood;
                card.understood = understood;
                flipped
            }
            None => false,
        };

        self.reviewed += 1;
        match judgment {
            Judgment::Correct => self.correct += 1,
            Judgment::Incorrect => self.missed.push(index),
        }

        self.position += 1;
        if self.position >= self.remaining.len() {
            self.finish_pass();
        }
        flipped
    }

    fn finish_pass(&mut self) {
        if self.missed.is_empty() {
            self.state = SessionState::AllUnderstood;
        } else {
            self.state = SessionState::PassComplete;
        }
    }

    /// Apply the user's choice after a pass with missed cards.
    ///
    /// Returns whether the deck was modified (only `Reset` modifies it).
    pub fn choose<R: Rng + ?Sized>(
        &mut self,
        deck: &mut Deck,
        choice: PassChoice,
        rng: &mut R,
    ) -> bool {
        if self.state != SessionState::PassComplete {
            return false;
        }
        match choice {
            PassChoice::Continue => {
                let missed = std::mem::take(&mut self.missed);
                self.begin_pass(missed, rng);
                false
            }
            PassChoice::Reset => {
                self.reset(deck, rng);
                true
            }
            PassChoice::End => {
                self.end();
                false
            }
        }
    }

    /// Clear every flag and restart with every card in the deck.
    ///
    /// A resumed session widens to the whole deck here.
    pub fn reset<R: Rng + ?Sized>(&mut self, deck: &mut Deck, rng: &mut R) {
        deck.reset();
        self.all = (0..deck.len()).collect();
        self.begin_pass(self.all.clone(), rng);
    }

    /// End the session immediately. Finished sessions stay as they are.
    pub fn end(&mut self) {
        if !self.state.is_finished() {
            self.state = SessionState::Ended;
        }
    }
}
