use teloxide::utils::html::escape;

use crate::quiz::session::{AnswerMark, AnswerOutcome, Phase, SessionSnapshot};
use crate::quiz::{Category, HistoryEntry};

pub const START_QUIZ: &str = "Start Quiz";
pub const RESTART_QUIZ: &str = "Restart Quiz 🔄";
pub const SHOW_HISTORY: &str = "History 📜";

const WELCOME_TEXT: &str = "Welcome to QuizMaster! 🎉\n\n\
    📚 Test your knowledge. Challenge yourself. Have fun!\n\n\
    🎯 Are you ready? Tap \"Start Quiz\" and show what you've got!";

/// Text plus reply keyboard rows. An empty keyboard removes the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub text: String,
    pub keyboard: Vec<Vec<String>>,
}

impl View {
    fn new(text: impl Into<String>, keyboard: Vec<Vec<String>>) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}

pub fn home() -> View {
    View::new(WELCOME_TEXT, vec![vec![START_QUIZ.to_string()]])
}

pub fn render(snapshot: &SessionSnapshot) -> View {
    match snapshot.phase {
        Phase::Unstarted => View::new("Select Quiz Category", category_keyboard()),
        Phase::Loading => View::new("Loading...", Vec::new()),
        Phase::FetchFailed => {
            let reason = snapshot.fetch_error.as_deref().unwrap_or("unknown error");
            View::new(
                format!(
                    "⚠️ Could not load questions: {}\n\nPick a category to try again.",
                    escape(reason)
                ),
                category_keyboard(),
            )
        }
        Phase::InProgress => question(snapshot),
        Phase::Finished => View::new(
            format!(
                "🎉 Congratulations! You completed the quiz.\n\nYour Score: {} / {}\n{}",
                snapshot.score,
                snapshot.total,
                marks(&snapshot.marks)
            ),
            vec![vec![RESTART_QUIZ.to_string(), SHOW_HISTORY.to_string()]],
        ),
    }
}

fn question(snapshot: &SessionSnapshot) -> View {
    let category = snapshot.category.map(|c| c.label()).unwrap_or_default();
    let text = format!(
        "Score: {} / {}\n{}\n\n<b>Question {}</b> · {}\n{}",
        snapshot.score,
        snapshot.total,
        marks(&snapshot.marks),
        snapshot.question_number,
        category,
        escape(snapshot.prompt.as_deref().unwrap_or_default())
    );

    let mut keyboard: Vec<Vec<String>> =
        snapshot.options.iter().map(|o| vec![o.clone()]).collect();
    keyboard.push(vec![RESTART_QUIZ.to_string()]);
    View::new(text, keyboard)
}

pub fn feedback(outcome: &AnswerOutcome) -> String {
    if outcome.correct {
        "✅ Correct! +1 point".to_string()
    } else {
        format!(
            "❌ Wrong Answer! The correct answer was <b>{}</b>.",
            escape(&outcome.correct_answer)
        )
    }
}

pub fn history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No finished quizzes yet.".to_string();
    }
    let lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let category = Category::from_slug(&entry.category)
                .map(|c| c.label().to_string())
                .unwrap_or_else(|| entry.category.clone());
            format!("{}. {} · {}", i + 1, escape(&category), entry.score)
        })
        .collect();
    format!("📜 Past scores\n{}", lines.join("\n"))
}

fn category_keyboard() -> Vec<Vec<String>> {
    Category::ALL
        .chunks(2)
        .map(|row| row.iter().map(|c| c.label().to_string()).collect())
        .chain(std::iter::once(vec![SHOW_HISTORY.to_string()]))
        .collect()
}

fn marks(marks: &[AnswerMark]) -> String {
    marks
        .iter()
        .map(|m| match m {
            AnswerMark::Unanswered => "⬜",
            AnswerMark::Correct => "🟩",
            AnswerMark::Wrong => "🟥",
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::session::QuizSession;
    use crate::quiz::storage::MemoryStore;
    use crate::quiz::Question;

    fn snapshot(phase: Phase) -> SessionSnapshot {
        SessionSnapshot {
            phase,
            category: None,
            question_number: 0,
            total: 0,
            prompt: None,
            options: Vec::new(),
            selected: None,
            score: 0,
            finished: phase == Phase::Finished,
            marks: Vec::new(),
            fetch_error: None,
            history: Vec::new(),
        }
    }

    fn outcome(correct: bool) -> AnswerOutcome {
        // Only a real session hands out advance tokens
        let mut session = QuizSession::resume(MemoryStore::new());
        let ticket = session.select_category(Category::Science).unwrap();
        session.complete_fetch(
            ticket,
            Ok(vec![Question::new("2 < 3?", "Yes & no", vec!["No".to_string()])]),
        );
        let answer = if correct { "Yes & no" } else { "No" };
        session.submit_answer(answer).unwrap()
    }

    #[test]
    fn unstarted_offers_every_category() {
        let view = render(&snapshot(Phase::Unstarted));
        assert_eq!(view.text, "Select Quiz Category");
        let buttons: Vec<&String> = view.keyboard.iter().flatten().collect();
        for category in Category::ALL {
            assert!(buttons.iter().any(|b| b.as_str() == category.label()));
        }
        assert!(buttons.iter().any(|b| b.as_str() == SHOW_HISTORY));
    }

    #[test]
    fn loading_has_no_buttons() {
        let view = render(&snapshot(Phase::Loading));
        assert_eq!(view.text, "Loading...");
        assert!(view.keyboard.is_empty());
    }

    #[test]
    fn fetch_failure_shows_reason_and_retry() {
        let mut failed = snapshot(Phase::FetchFailed);
        failed.fetch_error = Some("trivia API returned no questions".to_string());
        let view = render(&failed);
        assert!(view.text.contains("trivia API returned no questions"));
        assert!(view.keyboard.iter().flatten().any(|b| b == "Science"));
    }

    #[test]
    fn question_view_lists_options_and_progress() {
        let mut s = snapshot(Phase::InProgress);
        s.category = Some(Category::Geography);
        s.question_number = 3;
        s.total = 10;
        s.score = 1;
        s.prompt = Some("Which river is longest?".to_string());
        s.options = vec!["Nile".to_string(), "Amazon".to_string()];
        s.marks = vec![AnswerMark::Correct, AnswerMark::Wrong, AnswerMark::Unanswered];

        let view = render(&s);
        assert!(view.text.starts_with("Score: 1 / 10\n🟩🟥⬜"));
        assert!(view.text.contains("<b>Question 3</b> · Geography"));
        assert!(view.text.ends_with("Which river is longest?"));
        assert_eq!(
            view.keyboard,
            vec![
                vec!["Nile".to_string()],
                vec!["Amazon".to_string()],
                vec![RESTART_QUIZ.to_string()]
            ]
        );
    }

    #[test]
    fn finished_view_shows_score() {
        let mut s = snapshot(Phase::Finished);
        s.score = 9;
        s.total = 10;
        let view = render(&s);
        assert!(view.text.contains("You completed the quiz"));
        assert!(view.text.contains("Your Score: 9 / 10"));
        assert_eq!(view.keyboard[0][0], RESTART_QUIZ);
    }

    #[test]
    fn feedback_messages() {
        assert_eq!(feedback(&outcome(true)), "✅ Correct! +1 point");
        let wrong = feedback(&outcome(false));
        assert!(wrong.starts_with("❌ Wrong Answer!"));
        assert!(wrong.contains("Yes &amp; no"));
    }

    #[test]
    fn api_text_is_escaped() {
        let mut s = snapshot(Phase::InProgress);
        s.total = 1;
        s.question_number = 1;
        s.prompt = Some("Is 2 < 3 && 3 > 2?".to_string());
        let view = render(&s);
        assert!(view.text.ends_with("Is 2 &lt; 3 &amp;&amp; 3 &gt; 2?"));
    }

    #[test]
    fn history_lists_entries_oldest_first() {
        assert_eq!(history(&[]), "No finished quizzes yet.");
        let text = history(&[
            HistoryEntry {
                category: "science".to_string(),
                score: 9,
            },
            HistoryEntry {
                category: "general_knowledge".to_string(),
                score: 4,
            },
        ]);
        assert_eq!(text, "📜 Past scores\n1. Science · 9\n2. General Knowledge · 4");
    }
}
