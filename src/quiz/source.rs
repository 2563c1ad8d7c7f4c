use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use crate::error::FetchError;
use crate::quiz::{Category, Question};

pub const DEFAULT_TRIVIA_API_URL: &str = "https://the-trivia-api.com/v2/questions";

#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn fetch(&self, category: Category) -> Result<Vec<Question>, FetchError>;
}

/// Question source backed by the-trivia-api.com.
pub struct TriviaApi {
    client: reqwest::Client,
    url: String,
    question_count: usize,
}

impl TriviaApi {
    pub fn new(
        url: impl Into<String>,
        question_count: usize,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            question_count,
        })
    }
}

#[async_trait]
impl QuestionSource for TriviaApi {
    async fn fetch(&self, category: Category) -> Result<Vec<Question>, FetchError> {
        debug!("Fetching {} questions from {}", category.slug(), self.url);
        let response = self
            .client
            .get(&self.url)
            .query(&[("categories", category.slug())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await?;
        parse_questions(&body, self.question_count)
    }
}

/// Decodes a trivia API body and keeps the first `limit` questions.
pub fn parse_questions(body: &str, limit: usize) -> Result<Vec<Question>, FetchError> {
    let mut questions: Vec<Question> = serde_json::from_str(body)?;
    questions.truncate(limit);
    if questions.is_empty() {
        return Err(FetchError::Empty);
    }
    Ok(questions)
}
