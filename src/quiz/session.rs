//! `Unstarted -> Loading -> InProgress -> Finished`, plus `FetchFailed`.

use log::{debug, error, info, warn};

use crate::error::{FetchError, StorageError};
use crate::quiz::history::HistoryLedger;
use crate::quiz::persistence::{PersistedSession, QuizStore};
use crate::quiz::shuffle::shuffle_array;
use crate::quiz::storage::KeyValueStore;
use crate::quiz::{Category, HistoryEntry, Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unstarted,
    Loading,
    InProgress,
    Finished,
    FetchFailed,
}

/// Handed out by `select_category`; must be returned with the fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    pub category: Category,
}

/// The deferred move past an answered question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAdvance {
    generation: u64,
    index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_answer: String,
    pub advance: PendingAdvance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Ready,
    Failed(String),
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    NextQuestion(usize),
    Finished(HistoryEntry),
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMark {
    Unanswered,
    Correct,
    Wrong,
}

/// Everything a view needs to draw the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub category: Option<Category>,
    /// 1-based, 0 when there are no questions.
    pub question_number: usize,
    pub total: usize,
    pub prompt: Option<String>,
    pub options: Vec<String>,
    pub selected: Option<String>,
    pub score: usize,
    pub finished: bool,
    pub marks: Vec<AnswerMark>,
    pub fetch_error: Option<String>,
    pub history: Vec<HistoryEntry>,
}

pub struct QuizSession<S> {
    store: QuizStore<S>,
    history: HistoryLedger,
    phase: Phase,
    category: Option<Category>,
    questions: Vec<Question>,
    current_index: usize,
    answers: Vec<Option<String>>,
    score: usize,
    options: Vec<String>,
    fetch_error: Option<String>,
    generation: u64,
}

impl<S: KeyValueStore> QuizSession<S> {
    /// Builds a session from whatever `store` holds: an in-progress quiz is
    /// picked up where it was left, anything else starts `Unstarted`.
    pub fn resume(store: S) -> Self {
        let mut store = QuizStore::new(store);
        let history = HistoryLedger::load(&store);

        let persisted = match store.load_session() {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!("Discarding persisted session: {}", e);
                None
            }
        };
        if persisted.is_none() {
            // A category left behind by an interrupted fetch, or a broken session
            log_failure("session reset", store.clear_session());
        }

        let mut session = Self {
            store,
            history,
            phase: Phase::Unstarted,
            category: None,
            questions: Vec::new(),
            current_index: 0,
            answers: Vec::new(),
            score: 0,
            options: Vec::new(),
            fetch_error: None,
            generation: 0,
        };
        if let Some(persisted) = persisted {
            session.restore(persisted);
        }
        return session;
    }

    fn restore(&mut self, persisted: PersistedSession) {
        let PersistedSession {
            category,
            questions,
            current_index,
            score,
            answers,
        } = persisted;

        self.category = Some(category);
        self.questions = questions;
        self.current_index = current_index;
        self.answers = answers;
        self.score = self.recount();
        if self.score != score {
            warn!("Stored score {} disagrees with answers, using {}", score, self.score);
            log_failure("score", self.store.save_score(self.score));
        }
        self.phase = Phase::InProgress;
        info!(
            "Resumed {} quiz at question {}/{} with score {}",
            category.slug(),
            self.current_index + 1,
            self.questions.len(),
            self.score
        );

        // Interrupted between an answer and its advance
        if self.answers[self.current_index].is_some() {
            self.step();
        } else {
            self.reshuffle();
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::InProgress => self.questions.get(self.current_index),
            _ => None,
        }
    }

    pub fn answers(&self) -> &[Option<String>] {
        &self.answers
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn shuffled_options(&self) -> &[String] {
        &self.options
    }

    pub fn fetch_error(&self) -> Option<&str> {
        self.fetch_error.as_deref()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.history.load_all()
    }

    pub fn storage(&self) -> &S {
        self.store.inner()
    }

    /// Number of recorded answers matching their question's correct answer.
    pub fn recount(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.answers)
            .filter(|(q, a)| a.as_deref().is_some_and(|a| q.is_correct(a)))
            .count()
    }

    /// Starts loading `category`. Only honoured before a quiz has started or
    /// after a failed fetch; otherwise nothing happens and `None` is returned.
    pub fn select_category(&mut self, category: Category) -> Option<FetchTicket> {
        if !matches!(self.phase, Phase::Unstarted | Phase::FetchFailed) {
            debug!("Ignoring category {} while {:?}", category.slug(), self.phase);
            return None;
        }

        self.generation += 1;
        self.phase = Phase::Loading;
        self.category = Some(category);
        self.fetch_error = None;
        log_failure("category", self.store.save_category(category));
        debug!("Loading {} (generation {})", category.slug(), self.generation);

        Some(FetchTicket {
            generation: self.generation,
            category,
        })
    }

    /// Applies the result of the fetch started with `ticket`.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Question>, FetchError>,
    ) -> FetchOutcome {
        if ticket.generation != self.generation || self.phase != Phase::Loading {
            warn!("Dropping stale {} questions", ticket.category.slug());
            return FetchOutcome::Stale;
        }

        let questions = match result {
            Ok(questions) if !questions.is_empty() => questions,
            Ok(_) => return self.fail_fetch(FetchError::Empty),
            Err(e) => return self.fail_fetch(e),
        };

        self.answers = vec![None; questions.len()];
        self.questions = questions;
        self.current_index = 0;
        self.score = 0;
        self.phase = Phase::InProgress;
        self.reshuffle();

        log_failure("questions", self.store.save_questions(&self.questions));
        log_failure("current index", self.store.save_current_index(0));
        log_failure("score", self.store.save_score(0));
        log_failure("answers", self.store.save_answers(&self.answers));
        info!(
            "Loaded {} {} questions",
            self.questions.len(),
            ticket.category.slug()
        );
        FetchOutcome::Ready
    }

    fn fail_fetch(&mut self, e: FetchError) -> FetchOutcome {
        error!("Fetching questions failed: {}", e);
        let reason = e.to_string();
        self.phase = Phase::FetchFailed;
        self.fetch_error = Some(reason.clone());
        log_failure("session reset", self.store.clear_session());
        FetchOutcome::Failed(reason)
    }

    /// Records `answer` for the current question. Returns `None` without
    /// touching anything when there is no open question, the question is
    /// already answered, or `answer` is not one of its options.
    pub fn submit_answer(&mut self, answer: &str) -> Option<AnswerOutcome> {
        if self.phase != Phase::InProgress {
            debug!("Ignoring answer while {:?}", self.phase);
            return None;
        }
        let index = self.current_index;
        if self.answers[index].is_some() {
            debug!("Question {} already answered", index + 1);
            return None;
        }
        if !self.options.iter().any(|o| o == answer) {
            warn!("'{}' is not an option of question {}", answer, index + 1);
            return None;
        }

        let question = &self.questions[index];
        let correct = question.is_correct(answer);
        let correct_answer = question.correct_answer.clone();

        self.answers[index] = Some(answer.to_string());
        if correct {
            self.score += 1;
        }
        debug_assert_eq!(self.score, self.recount());

        log_failure("answers", self.store.save_answers(&self.answers));
        log_failure("score", self.store.save_score(self.score));
        debug!(
            "Question {} answered {}, score {}",
            index + 1,
            if correct { "correctly" } else { "wrongly" },
            self.score
        );

        Some(AnswerOutcome {
            correct,
            correct_answer,
            advance: PendingAdvance {
                generation: self.generation,
                index,
            },
        })
    }

    /// Fires a deferred advance. Stale when the session restarted or already
    /// moved on since the answer was given.
    pub fn advance(&mut self, pending: PendingAdvance) -> AdvanceOutcome {
        if pending.generation != self.generation
            || self.phase != Phase::InProgress
            || pending.index != self.current_index
            || self.answers[self.current_index].is_none()
        {
            debug!("Dropping stale advance from question {}", pending.index + 1);
            return AdvanceOutcome::Stale;
        }
        self.step()
    }

    fn step(&mut self) -> AdvanceOutcome {
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
            log_failure("current index", self.store.save_current_index(self.current_index));
            self.reshuffle();
            return AdvanceOutcome::NextQuestion(self.current_index);
        }

        self.phase = Phase::Finished;
        self.options.clear();
        let entry = HistoryEntry {
            // InProgress always has a category
            category: self.category.map(|c| c.slug()).unwrap_or_default().to_string(),
            score: self.score,
        };
        log_failure(
            "history",
            self.history.record(&mut self.store, &entry.category, entry.score),
        );
        log_failure("session reset", self.store.clear_session());
        AdvanceOutcome::Finished(entry)
    }

    /// Drops the current session from any state. History is kept.
    pub fn restart(&mut self) {
        self.generation += 1;
        self.phase = Phase::Unstarted;
        self.category = None;
        self.questions.clear();
        self.current_index = 0;
        self.answers.clear();
        self.score = 0;
        self.options.clear();
        self.fetch_error = None;
        log_failure("session reset", self.store.clear_session());
        debug!("Session restarted (generation {})", self.generation);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let marks = self
            .questions
            .iter()
            .zip(&self.answers)
            .map(|(q, a)| match a {
                None => AnswerMark::Unanswered,
                Some(a) if q.is_correct(a) => AnswerMark::Correct,
                Some(_) => AnswerMark::Wrong,
            })
            .collect();

        SessionSnapshot {
            phase: self.phase,
            category: self.category,
            question_number: if self.questions.is_empty() {
                0
            } else {
                self.current_index + 1
            },
            total: self.questions.len(),
            prompt: self.current_question().map(|q| q.text().to_string()),
            options: self.options.clone(),
            selected: self
                .current_question()
                .and_then(|_| self.answers[self.current_index].clone()),
            score: self.score,
            finished: self.is_finished(),
            marks,
            fetch_error: self.fetch_error.clone(),
            history: self.history.load_all().to_vec(),
        }
    }

    fn reshuffle(&mut self) {
        self.options = match self.questions.get(self.current_index) {
            Some(question) => shuffle_array(&question.options()),
            None => Vec::new(),
        };
    }
}

fn log_failure(what: &str, result: Result<(), StorageError>) {
    if let Err(e) = result {
        error!("Failed to persist {}: {}", what, e);
    }
}
