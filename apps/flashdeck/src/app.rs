//! Application state and command handlers.
//!
//! Each handler loads one deck, runs one deck or session operation on it and
//! saves it back. Handlers return errors to the caller; nothing here exits the
//! process.

use crate::config::Config;
use crate::console::Console;
use crate::error::{DeckError, DeckResult};
use crate::models::{parse_index, require_text, validate_deck_name, Card, Deck};
use crate::session::{Judgment, PassChoice, SessionState, StudyOrder, StudyScope, StudySession};
use crate::store::{read_deck_file, write_deck_file, DeckStore};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Study options chosen on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct StudyOptions {
    pub randomize: bool,
    pub resume: bool,
}

pub struct App<R, W> {
    pub store: Box<dyn DeckStore>,
    pub config: Config,
    pub console: Console<R, W>,
    rng: StdRng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Add,
    Edit,
    Delete,
    List,
    Reset,
    Quit,
}

impl MenuAction {
    const ALL: [MenuAction; 6] = [
        Self::Add,
        Self::Edit,
        Self::Delete,
        Self::List,
        Self::Reset,
        Self::Quit,
    ];

    fn label(&self) -> &'static str {
        match self {
            Self::Add => "Create a card",
            Self::Edit => "Edit a card",
            Self::Delete => "Delete a card",
            Self::List => "List all cards",
            Self::Reset => "Reset understood flags",
            Self::Quit => "Quit",
        }
    }

    fn parse(input: &str) -> Option<Self> {
        let n: usize = input.trim().parse().ok()?;
        Self::ALL.get(n.checked_sub(1)?).copied()
    }
}

impl<R: BufRead, W: Write> App<R, W> {
    pub fn new(store: Box<dyn DeckStore>, config: Config, console: Console<R, W>) -> Self {
        Self {
            store,
            config,
            console,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed shuffle seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn load(&self, name: &str) -> DeckResult<Deck> {
        let name = validate_deck_name(name)?;
        self.store
            .load(name)?
            .ok_or_else(|| DeckError::NotFound(name.to_string()))
    }

    fn load_or_new(&self, name: &str) -> DeckResult<Deck> {
        let name = validate_deck_name(name)?;
        Ok(self.store.load(name)?.unwrap_or_else(|| {
            debug!(deck = name, "starting new deck");
            Deck::new(name)
        }))
    }

    fn save(&self, deck: &Deck) -> DeckResult<()> {
        self.store.save(deck)?;
        Ok(())
    }

    /// Apply `op` and save. If either step fails the deck is left as it was.
    fn update<T>(
        &self,
        deck: &mut Deck,
        op: impl FnOnce(&mut Deck) -> DeckResult<T>,
    ) -> DeckResult<T> {
        let before = deck.clone();
        let result = op(deck).and_then(|value| self.save(deck).map(|()| value));
        if result.is_err() {
            *deck = before;
        }
        result
    }

    fn ask(&mut self, message: &str) -> DeckResult<Option<String>> {
        self.console.prompt(message)
    }

    /// Ask for a new card's question and answer. `None` if input ended.
    fn prompt_new_card(
        &mut self,
        question: Option<String>,
        answer: Option<String>,
    ) -> DeckResult<Option<(String, String)>> {
        let question = match question {
            Some(q) => q,
            None => match self.ask("Enter the question:")? {
                Some(q) => q,
                None => return Ok(None),
            },
        };
        let question = require_text("question", &question)?;
        let answer = match answer {
            Some(a) => a,
            None => match self.ask("Enter the answer:")? {
                Some(a) => a,
                None => return Ok(None),
            },
        };
        let answer = require_text("answer", &answer)?;
        Ok(Some((question, answer)))
    }

    /// Ask for replacement text; an empty reply keeps the current text.
    fn prompt_edit(
        &mut self,
        card: &Card,
        question: Option<String>,
        answer: Option<String>,
    ) -> DeckResult<Option<(String, String)>> {
        let question = match question {
            Some(q) => require_text("question", &q)?,
            None => {
                self.console.field("Current question", &card.question)?;
                match self.ask("New question (Enter to keep):")? {
                    Some(q) if q.trim().is_empty() => card.question.clone(),
                    Some(q) => q.trim().to_string(),
                    None => return Ok(None),
                }
            }
        };
        let answer = match answer {
            Some(a) => require_text("answer", &a)?,
            None => {
                self.console.field("Current answer", &card.answer)?;
                match self.ask("New answer (Enter to keep):")? {
                    Some(a) if a.trim().is_empty() => card.answer.clone(),
                    Some(a) => a.trim().to_string(),
                    None => return Ok(None),
                }
            }
        };
        Ok(Some((question, answer)))
    }

    fn print_cards(&mut self, deck: &Deck) -> DeckResult<()> {
        self.console.heading(format!("Deck: {}", deck.name))?;
        if deck.is_empty() {
            self.console.say("(no cards)")?;
            return Ok(());
        }
        for (index, question, answer) in deck.cards() {
            let mark = if deck.cards[index].understood { " [understood]" } else { "" };
            self.console.blank()?;
            self.console.field("Index", &format!("{}{}", index, mark))?;
            self.console.field("Question", question)?;
            self.console.field("Answer", answer)?;
        }
        Ok(())
    }

    // Commands

    pub fn new_deck(&mut self, name: &str) -> DeckResult<()> {
        let name = validate_deck_name(name)?;
        if self.store.exists(name)? {
            return Err(DeckError::AlreadyExists(name.to_string()));
        }
        self.save(&Deck::new(name))?;
        info!(deck = name, "created deck");
        self.console.success(format!("Deck '{}' created.", name))
    }

    pub fn add_card(
        &mut self,
        name: &str,
        question: Option<String>,
        answer: Option<String>,
    ) -> DeckResult<()> {
        let mut deck = self.load_or_new(name)?;
        let Some((question, answer)) = self.prompt_new_card(question, answer)? else {
            return self.console.warn("Cancelled.");
        };
        let index = self.update(&mut deck, |d| Ok(d.add_card(question, answer)))?;
        self.console
            .success(format!("Card {} added to '{}'.", index, deck.name))
    }

    pub fn edit_card(
        &mut self,
        name: &str,
        index: &str,
        question: Option<String>,
        answer: Option<String>,
    ) -> DeckResult<()> {
        let mut deck = self.load(name)?;
        let index = parse_index(index, deck.len())?;
        let card = deck.cards[index].clone();
        let Some((question, answer)) = self.prompt_edit(&card, question, answer)? else {
            return self.console.warn("Cancelled.");
        };
        self.update(&mut deck, |d| d.edit_card(index, question, answer))?;
        self.console.success(format!("Card {} updated.", index))
    }

    pub fn delete_card(&mut self, name: &str, index: &str) -> DeckResult<()> {
        let mut deck = self.load(name)?;
        let index = parse_index(index, deck.len())?;
        let removed = self.update(&mut deck, |d| d.delete_card(index))?;
        self.console
            .success(format!("Card {} deleted: {}", index, removed.question))
    }

    pub fn list_cards(&mut self, name: &str) -> DeckResult<()> {
        let deck = self.load(name)?;
        self.print_cards(&deck)
    }

    pub fn reset_deck(&mut self, name: &str) -> DeckResult<()> {
        let mut deck = self.load(name)?;
        self.update(&mut deck, |d| {
            d.reset();
            Ok(())
        })?;
        info!(deck = %deck.name, "reset deck");
        self.console
            .success(format!("All cards in '{}' have been reset.", deck.name))
    }

    pub fn delete_deck(&mut self, name: &str, yes: bool) -> DeckResult<()> {
        let name = validate_deck_name(name)?;
        if !self.store.exists(name)? {
            return Err(DeckError::NotFound(name.to_string()));
        }
        if !yes && !self.console.confirm(&format!("Delete deck '{}'?", name))? {
            return self.console.warn("Deck kept.");
        }
        self.store.delete(name)?;
        info!(deck = name, "deleted deck");
        self.console.success(format!("Deck deleted: {}", name))
    }

    pub fn list_decks(&mut self) -> DeckResult<()> {
        let names = self.store.list()?;
        if names.is_empty() {
            return self.console.say("No decks yet.");
        }
        for name in names {
            match self.store.load(&name) {
                Ok(Some(deck)) => self.console.say(format!(
                    "{} ({} cards, {} understood)",
                    name,
                    deck.len(),
                    deck.understood_count()
                ))?,
                Ok(None) => continue,
                Err(e) => {
                    warn!(deck = %name, error = %e, "unreadable deck");
                    self.console.warn(format!("{} (unreadable: {})", name, e))?
                }
            }
        }
        Ok(())
    }

    pub fn import_deck(&mut self, path: &Path, name: Option<&str>, force: bool) -> DeckResult<()> {
        let mut deck = read_deck_file(path)?;
        if let Some(name) = name {
            deck.name = name.to_string();
        }
        deck.name = validate_deck_name(&deck.name)?.to_string();
        if !force && self.store.exists(&deck.name)? {
            return Err(DeckError::AlreadyExists(deck.name));
        }
        self.save(&deck)?;
        info!(deck = %deck.name, path = %path.display(), "imported deck");
        self.console.success(format!(
            "Deck '{}' imported ({} cards).",
            deck.name,
            deck.len()
        ))
    }

    pub fn export_deck(&mut self, name: &str, path: &Path) -> DeckResult<()> {
        let deck = self.load(name)?;
        write_deck_file(path, &deck)?;
        self.console
            .success(format!("Deck '{}' saved as {}.", deck.name, path.display()))
    }

    /// Print the effective configuration, optionally writing it out.
    pub fn show_config(&mut self, write: bool) -> DeckResult<()> {
        let text = toml::to_string_pretty(&self.config)
            .map_err(|e| DeckError::InvalidInput(e.to_string()))?;
        self.console.say(text.trim_end())?;
        if write {
            self.config
                .save()
                .map_err(|e| DeckError::InvalidInput(format!("cannot write config: {}", e)))?;
            if let Some(path) = Config::config_path() {
                self.console
                    .success(format!("Configuration written to {}.", path.display()))?;
            }
        }
        Ok(())
    }

    // Study

    pub fn study(&mut self, name: &str, options: StudyOptions) -> DeckResult<()> {
        let mut deck = self.load(name)?;
        if deck.is_empty() {
            return self
                .console
                .warn(format!("Deck '{}' has no cards.", deck.name));
        }

        let order = if options.randomize || self.config.study.randomize {
            StudyOrder::Shuffled
        } else {
            StudyOrder::InOrder
        };
        let scope = if options.resume {
            StudyScope::NotUnderstood
        } else {
            StudyScope::AllCards
        };
        let mut session = StudySession::start(&deck, order, scope, &mut self.rng);
        if session.state() == SessionState::AllUnderstood {
            return self
                .console
                .say("Every card is already understood. Run 'reset' to study them again.");
        }
        debug!(deck = %deck.name, ?order, ?scope, "study session started");
        self.console.heading(format!("Studying deck: {}", deck.name))?;

        loop {
            match session.state() {
                SessionState::Reviewing => self.study_card(&mut deck, &mut session)?,
                SessionState::PassComplete => {
                    let missed = session.missed().len();
                    let total = session.remaining().len();
                    self.console
                        .say(format!("{} of {} cards still need review.", missed, total))?;
                    let choice = self.ask_pass_choice()?;
                    if session.choose(&mut deck, choice, &mut self.rng) {
                        self.save(&deck)?;
                    }
                }
                SessionState::AllUnderstood => {
                    self.save(&deck)?;
                    self.console
                        .success("Congratulations! You have understood all the cards.")?;
                    break;
                }
                SessionState::Ended => {
                    self.save(&deck)?;
                    self.console.say(format!(
                        "Session ended: {} of {} cards understood.",
                        deck.understood_count(),
                        deck.len()
                    ))?;
                    break;
                }
            }
        }

        info!(
            deck = %deck.name,
            passes = session.pass(),
            reviewed = session.reviewed(),
            correct = session.correct(),
            "study session finished"
        );
        Ok(())
    }

    fn study_card(&mut self, deck: &mut Deck, session: &mut StudySession) -> DeckResult<()> {
        let Some(index) = session.current() else {
            return Ok(());
        };
        if session.position() == 0 {
            self.console.blank()?;
            self.console.heading(format!(
                "Pass {} ({} cards)",
                session.pass(),
                session.remaining().len()
            ))?;
        }

        let card = deck.cards[index].clone();
        self.console.blank()?;
        self.console.field("Question", &card.question)?;
        match self.ask("Press Enter to show the answer ('q' to quit).")? {
            Some(reply) if !is_quit(&reply) => {}
            _ => {
                session.end();
                return Ok(());
            }
        }
        self.console.field("Answer", &card.answer)?;

        let judgment = loop {
            let Some(reply) = self.ask("Did you answer correctly? (y/n):")? else {
                session.end();
                return Ok(());
            };
            match reply.trim().to_lowercase().as_str() {
                "y" | "yes" => break Judgment::Correct,
                "n" | "no" => break Judgment::Incorrect,
                r if is_quit(r) => {
                    session.end();
                    return Ok(());
                }
                _ => self.console.warn("Please answer 'y' or 'n'.")?,
            }
        };

        if session.judge(deck, judgment) {
            self.save(deck)?;
        }
        Ok(())
    }

    fn ask_pass_choice(&mut self) -> DeckResult<PassChoice> {
        loop {
            let Some(reply) =
                self.ask("Press Enter to continue, 'reset' to start over, or 'end' to stop:")?
            else {
                return Ok(PassChoice::End);
            };
            match reply.trim().to_lowercase().as_str() {
                "" | "c" | "continue" => return Ok(PassChoice::Continue),
                "r" | "reset" => return Ok(PassChoice::Reset),
                "e" | "end" | "q" | "quit" => return Ok(PassChoice::End),
                other => self
                    .console
                    .warn(format!("Unknown choice '{}'.", other))?,
            }
        }
    }

    // Interactive edit menu

    /// Menu loop over one deck. Errors from a menu action are reported and
    /// the menu is shown again.
    pub fn manage(&mut self, name: &str) -> DeckResult<()> {
        let mut deck = self.load_or_new(name)?;
        loop {
            self.console.blank()?;
            self.console.heading(format!("Deck: {}", deck.name))?;
            for (i, action) in MenuAction::ALL.iter().enumerate() {
                self.console.say(format!("{}. {}", i + 1, action.label()))?;
            }
            let Some(reply) = self.ask("Enter your choice (1-6):")? else {
                return Ok(());
            };
            let Some(action) = MenuAction::parse(&reply) else {
                self.console.warn("Invalid choice.")?;
                continue;
            };
            if action == MenuAction::Quit {
                return Ok(());
            }
            match self.run_menu_action(&mut deck, action) {
                Ok(()) => {}
                Err(e @ DeckError::Console(_)) => return Err(e),
                Err(e) => {
                    debug!(error = %e, "menu action failed");
                    self.console.error(&e)?;
                }
            }
        }
    }

    fn run_menu_action(&mut self, deck: &mut Deck, action: MenuAction) -> DeckResult<()> {
        match action {
            MenuAction::Add => {
                let Some((question, answer)) = self.prompt_new_card(None, None)? else {
                    return Ok(());
                };
                self.update(deck, |d| Ok(d.add_card(question, answer)))?;
                self.console.success("Card created.")
            }
            MenuAction::Edit => {
                self.print_cards(deck)?;
                let Some(reply) = self.ask("Enter the index of the card to edit:")? else {
                    return Ok(());
                };
                let index = parse_index(&reply, deck.len())?;
                let card = deck.cards[index].clone();
                let Some((question, answer)) = self.prompt_edit(&card, None, None)? else {
                    return Ok(());
                };
                self.update(deck, |d| d.edit_card(index, question, answer))?;
                self.console.success("Card updated.")
            }
            MenuAction::Delete => {
                self.print_cards(deck)?;
                let Some(reply) = self.ask("Enter the index of the card to delete:")? else {
                    return Ok(());
                };
                let index = parse_index(&reply, deck.len())?;
                self.update(deck, |d| d.delete_card(index))?;
                self.console.success("Card deleted.")
            }
            MenuAction::List => self.print_cards(deck),
            MenuAction::Reset => {
                self.update(deck, |d| {
                    d.reset();
                    Ok(())
                })?;
                self.console.success("All cards have been reset.")
            }
            MenuAction::Quit => Ok(()),
        }
    }
}

fn is_quit(reply: &str) -> bool {
    matches!(reply.trim().to_lowercase().as_str(), "q" | "quit")
}
