use log::debug;

use crate::error::{PersistError, StorageError};
use crate::quiz::storage::KeyValueStore;
use crate::quiz::{Category, HistoryEntry, Question};

pub const KEY_QUESTIONS: &str = "quiz_questions";
pub const KEY_CURRENT_INDEX: &str = "quiz_currentIndex";
pub const KEY_SCORE: &str = "quiz_score";
pub const KEY_CATEGORY: &str = "quiz_category";
pub const KEY_SELECTED_ANSWERS: &str = "quiz_selectedAnswers";
pub const KEY_HISTORY: &str = "quiz_last_scores";

const SESSION_KEYS: [&str; 5] = [
    KEY_QUESTIONS,
    KEY_CURRENT_INDEX,
    KEY_SCORE,
    KEY_CATEGORY,
    KEY_SELECTED_ANSWERS,
];

/// An in-progress session as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    pub category: Category,
    pub questions: Vec<Question>,
    pub current_index: usize,
    pub score: usize,
    pub answers: Vec<Option<String>>,
}

#[derive(Debug)]
pub struct QuizStore<S> {
    inner: S,
}

impl<S: KeyValueStore> QuizStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn save_category(&mut self, category: Category) -> Result<(), StorageError> {
        self.inner.set(KEY_CATEGORY, category.slug().to_string())
    }

    pub fn save_questions(&mut self, questions: &[Question]) -> Result<(), StorageError> {
        self.inner.set(KEY_QUESTIONS, serde_json::to_string(questions)?)
    }

    pub fn save_current_index(&mut self, index: usize) -> Result<(), StorageError> {
        self.inner.set(KEY_CURRENT_INDEX, index.to_string())
    }

    pub fn save_score(&mut self, score: usize) -> Result<(), StorageError> {
        self.inner.set(KEY_SCORE, score.to_string())
    }

    pub fn save_answers(&mut self, answers: &[Option<String>]) -> Result<(), StorageError> {
        self.inner.set(KEY_SELECTED_ANSWERS, serde_json::to_string(answers)?)
    }

    /// Removes every session key; the history list stays.
    pub fn clear_session(&mut self) -> Result<(), StorageError> {
        for key in SESSION_KEYS {
            self.inner.remove(key)?;
        }
        debug!("Cleared persisted session");
        Ok(())
    }

    /// `Ok(None)` unless both a category and a question list are stored.
    pub fn load_session(&self) -> Result<Option<PersistedSession>, PersistError> {
        let (Some(raw_category), Some(raw_questions)) =
            (self.inner.get(KEY_CATEGORY)?, self.inner.get(KEY_QUESTIONS)?)
        else {
            return Ok(None);
        };

        let category = Category::from_slug(&raw_category).ok_or_else(|| {
            PersistError::malformed(KEY_CATEGORY, format!("unknown category '{raw_category}'"))
        })?;
        let questions: Vec<Question> = serde_json::from_str(&raw_questions)
            .map_err(|e| PersistError::malformed(KEY_QUESTIONS, e))?;
        if questions.is_empty() {
            return Err(PersistError::malformed(KEY_QUESTIONS, "empty question list"));
        }

        let current_index = self.load_number(KEY_CURRENT_INDEX)?.unwrap_or(0);
        if current_index >= questions.len() {
            return Err(PersistError::malformed(
                KEY_CURRENT_INDEX,
                format!("index {current_index} out of {} questions", questions.len()),
            ));
        }

        let score = self.load_number(KEY_SCORE)?.unwrap_or(0);

        let answers: Vec<Option<String>> = match self.inner.get(KEY_SELECTED_ANSWERS)? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| PersistError::malformed(KEY_SELECTED_ANSWERS, e))?,
            None => vec![None; questions.len()],
        };
        if answers.len() != questions.len() {
            return Err(PersistError::malformed(
                KEY_SELECTED_ANSWERS,
                format!("{} answers for {} questions", answers.len(), questions.len()),
            ));
        }
        // Everything before the current question is answered, nothing after it
        for (i, answer) in answers.iter().enumerate() {
            if i < current_index && answer.is_none() {
                return Err(PersistError::malformed(
                    KEY_SELECTED_ANSWERS,
                    format!("question {} is unanswered but already passed", i + 1),
                ));
            }
            if i > current_index && answer.is_some() {
                return Err(PersistError::malformed(
                    KEY_SELECTED_ANSWERS,
                    format!("question {} is answered ahead of the current one", i + 1),
                ));
            }
        }

        Ok(Some(PersistedSession {
            category,
            questions,
            current_index,
            score,
            answers,
        }))
    }

    pub fn load_history(&self) -> Result<Vec<HistoryEntry>, PersistError> {
        match self.inner.get(KEY_HISTORY)? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| PersistError::malformed(KEY_HISTORY, e))
            }
            None => Ok(Vec::new()),
        }
    }

    pub fn save_history(&mut self, entries: &[HistoryEntry]) -> Result<(), StorageError> {
        self.inner.set(KEY_HISTORY, serde_json::to_string(entries)?)
    }

    fn load_number(&self, key: &'static str) -> Result<Option<usize>, PersistError> {
        match self.inner.get(key)? {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| PersistError::malformed(key, e)),
            None => Ok(None),
        }
    }
}
