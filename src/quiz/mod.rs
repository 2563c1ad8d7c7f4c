pub mod history;
pub mod persistence;
pub mod session;
pub mod shuffle;
pub mod source;
pub mod storage;

use std::fmt;

pub const DEFAULT_QUESTION_COUNT: usize = 10;

/// One trivia question, kept in the trivia API's own JSON shape so the
/// persisted list and the wire format stay interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "question")]
    pub prompt: Prompt,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Prompt {
    pub text: String,
}

impl Question {
    pub fn new(
        text: impl Into<String>,
        correct_answer: impl Into<String>,
        incorrect_answers: Vec<String>,
    ) -> Self {
        Self {
            prompt: Prompt { text: text.into() },
            correct_answer: correct_answer.into(),
            incorrect_answers,
        }
    }

    pub fn text(&self) -> &str {
        &self.prompt.text
    }

    /// Incorrect answers followed by the correct one, unshuffled.
    pub fn options(&self) -> Vec<String> {
        let mut options = self.incorrect_answers.clone();
        options.push(self.correct_answer.clone());
        return options;
    }

    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answer == answer
    }
}

/// A finished session as remembered in the history ledger.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HistoryEntry {
    pub category: String,
    pub score: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    GeneralKnowledge,
    Science,
    History,
    Geography,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::GeneralKnowledge,
        Category::Science,
        Category::History,
        Category::Geography,
    ];

    /// Identifier used by the trivia API and in storage.
    pub fn slug(&self) -> &'static str {
        match self {
            Category::GeneralKnowledge => "general_knowledge",
            Category::Science => "science",
            Category::History => "history",
            Category::Geography => "geography",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::GeneralKnowledge => "General Knowledge",
            Category::Science => "Science",
            Category::History => "History",
            Category::Geography => "Geography",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.slug() == slug)
    }

    /// Accepts either the button label or the slug, ignoring case.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        Self::ALL.into_iter().find(|c| {
            c.label().eq_ignore_ascii_case(input) || c.slug().eq_ignore_ascii_case(input)
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
