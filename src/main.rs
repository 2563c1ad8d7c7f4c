use std::collections::{hash_map::Entry, HashMap};
use std::sync::Arc;

use dotenv::dotenv;
use log::{debug, error, info};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatAction, KeyboardButton, KeyboardMarkup, KeyboardRemove, ParseMode},
};
use tokio::sync::Mutex;
use trivia_quiz_bot::{
    config::Config,
    error::StorageError,
    quiz::{
        session::{AdvanceOutcome, FetchOutcome, Phase, QuizSession},
        source::{QuestionSource, TriviaApi},
        storage::SledStore,
        Category,
    },
    schedule::Deferred,
    view::{self, View},
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type DialogueStorage = std::sync::Arc<ErasedStorage<State>>;

/// Which page the chat is on.
#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    Quiz,
}

/// Shared by every handler: one quiz session per chat, each backed by its
/// own tree in the session database.
struct QuizApp {
    config: Config,
    source: Arc<dyn QuestionSource>,
    db: sled::Db,
    /// Every chat seen since start-up keeps its session here. An entry is a
    /// handful of questions at most, and dropping one would lose the
    /// generation that guards its in-flight fetch.
    sessions: Mutex<HashMap<ChatId, QuizSession<SledStore>>>,
    advances: Deferred<ChatId>,
}

impl QuizApp {
    /// Runs `f` on the chat's session, resuming it from disk on first use.
    /// The lock is never held across an await.
    async fn with_session<T>(
        &self,
        chat_id: ChatId,
        f: impl FnOnce(&mut QuizSession<SledStore>) -> T,
    ) -> Result<T, StorageError> {
        let mut sessions = self.sessions.lock().await;
        let session = match sessions.entry(chat_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let store = SledStore::open(&self.db, &format!("chat:{}", chat_id.0))?;
                let session = QuizSession::resume(store);
                debug!("Chat {} resumed in {:?}", chat_id.0, session.phase());
                entry.insert(session)
            }
        };
        Ok(f(session))
    }
}

#[tokio::main]
async fn main() {
    // .env is optional, real environment variables work just as well
    dotenv().ok();

    pretty_env_logger::init();
    log::info!("Starting trivia quiz bot...");

    let config = Config::from_env().expect("Invalid configuration");
    let bot = Bot::from_env();

    info!("Opening dialogue storage at {}", config.dialogue_db);
    let storage: DialogueStorage = SqliteStorage::open(&config.dialogue_db, Json)
        .await
        .expect("Failed to open dialogue storage")
        .erase();

    info!("Opening session database at {}", config.data_dir.display());
    let db = sled::open(&config.data_dir).expect("Failed to open session database");

    let source = TriviaApi::new(
        config.trivia_api_url.clone(),
        config.question_count,
        config.request_timeout,
    )
    .expect("Failed to build the HTTP client");

    info!(
        "Serving {} questions per quiz from {}",
        config.question_count, config.trivia_api_url
    );

    let app = Arc::new(QuizApp {
        config,
        source: Arc::new(source),
        db: db.clone(),
        sessions: Mutex::new(HashMap::new()),
        advances: Deferred::new(),
    });

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::Quiz].endpoint(quiz_page)),
    )
    .dependencies(dptree::deps![storage, app])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;

    if let Err(e) = db.flush_async().await {
        error!("Failed to flush session database: {}", e);
    }
}

async fn start(
    bot: Bot,
    dialogue: QuizDialogue,
    app: Arc<QuizApp>,
    msg: Message,
) -> HandlerResult {
    if msg.text() != Some(view::START_QUIZ) {
        send_view(&bot, msg.chat.id, view::home()).await?;
        return Ok(());
    }

    dialogue.update(State::Quiz).await?;
    let view = app
        .with_session(msg.chat.id, |session| view::render(&session.snapshot()))
        .await?;
    send_view(&bot, msg.chat.id, view).await?;
    Ok(())
}

async fn quiz_page(
    bot: Bot,
    dialogue: QuizDialogue,
    app: Arc<QuizApp>,
    msg: Message,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        bot.send_message(chat_id, "Please use the buttons below").await?;
        return Ok(());
    };

    match text {
        "/start" => {
            dialogue.update(State::Start).await?;
            send_view(&bot, chat_id, view::home()).await?;
        }
        view::RESTART_QUIZ => {
            app.advances.cancel(&chat_id);
            let view = app
                .with_session(chat_id, |session| {
                    session.restart();
                    view::render(&session.snapshot())
                })
                .await?;
            send_view(&bot, chat_id, view).await?;
        }
        view::SHOW_HISTORY => {
            let history = app
                .with_session(chat_id, |session| view::history(session.history()))
                .await?;
            bot.send_message(chat_id, history)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        _ => match app.with_session(chat_id, |session| session.phase()).await? {
            Phase::Unstarted | Phase::FetchFailed => {
                choose_category(bot, app, chat_id, text).await?
            }
            Phase::Loading => {
                bot.send_message(chat_id, "Loading...").await?;
            }
            Phase::InProgress => answer(bot, app, chat_id, text).await?,
            Phase::Finished => {
                let view = app
                    .with_session(chat_id, |session| view::render(&session.snapshot()))
                    .await?;
                send_view(&bot, chat_id, view).await?;
            }
        },
    }
    Ok(())
}

async fn choose_category(
    bot: Bot,
    app: Arc<QuizApp>,
    chat_id: ChatId,
    text: &str,
) -> HandlerResult {
    let Some(category) = Category::parse(text) else {
        bot.send_message(chat_id, "Please choose one of the categories")
            .await?;
        return Ok(());
    };

    let started = app
        .with_session(chat_id, |session| {
            session
                .select_category(category)
                .map(|ticket| (ticket, view::render(&session.snapshot())))
        })
        .await?;
    // Another fetch is already running for this chat
    let Some((ticket, loading)) = started else {
        return Ok(());
    };
    // From here on the session is loading, so the fetch has to start whatever
    // happens to the message
    log_send(chat_id, send_view(&bot, chat_id, loading).await);

    // Purely cosmetic, so a failure here is not worth reporting
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    tokio::spawn(async move {
        let result = app.source.fetch(ticket.category).await;
        let view = app
            .with_session(chat_id, |session| {
                match session.complete_fetch(ticket, result) {
                    FetchOutcome::Stale => None,
                    FetchOutcome::Ready | FetchOutcome::Failed(_) => {
                        Some(view::render(&session.snapshot()))
                    }
                }
            })
            .await;
        deliver(&bot, chat_id, view).await;
    });
    Ok(())
}

async fn answer(bot: Bot, app: Arc<QuizApp>, chat_id: ChatId, text: &str) -> HandlerResult {
    let Some(outcome) = app
        .with_session(chat_id, |session| session.submit_answer(text))
        .await?
    else {
        bot.send_message(chat_id, "Please pick one of the options below")
            .await?;
        return Ok(());
    };

    // The answer is recorded, so the advance has to be scheduled regardless
    let feedback = bot
        .send_message(chat_id, view::feedback(&outcome))
        .parse_mode(ParseMode::Html)
        .reply_markup(KeyboardRemove::new())
        .await;
    log_send(chat_id, feedback.map(|_| ()).map_err(Into::into));

    let pending = outcome.advance;
    let task_app = app.clone();
    app.advances.schedule(chat_id, app.config.feedback_delay, async move {
        let view = task_app
            .with_session(chat_id, |session| match session.advance(pending) {
                AdvanceOutcome::Stale => None,
                AdvanceOutcome::NextQuestion(_) | AdvanceOutcome::Finished(_) => {
                    Some(view::render(&session.snapshot()))
                }
            })
            .await;
        deliver(&bot, chat_id, view).await;
    });
    Ok(())
}

/// Sends the outcome of a background transition; there is no handler left to
/// return an error to, so failures end up in the log.
async fn deliver(bot: &Bot, chat_id: ChatId, view: Result<Option<View>, StorageError>) {
    match view {
        Ok(Some(view)) => {
            if let Err(e) = send_view(bot, chat_id, view).await {
                error!("Failed to update chat {}: {}", chat_id.0, e);
            }
        }
        Ok(None) => debug!("Chat {} moved on, nothing to send", chat_id.0),
        Err(e) => error!("Session of chat {} is unavailable: {}", chat_id.0, e),
    }
}

fn log_send(chat_id: ChatId, result: HandlerResult) {
    if let Err(e) = result {
        error!("Failed to send to chat {}: {}", chat_id.0, e);
    }
}

async fn send_view(bot: &Bot, chat_id: ChatId, view: View) -> HandlerResult {
    let request = bot
        .send_message(chat_id, view.text)
        .parse_mode(ParseMode::Html);

    if view.keyboard.is_empty() {
        request.reply_markup(KeyboardRemove::new()).await?;
        return Ok(());
    }

    let keyboard = KeyboardMarkup::new(
        view.keyboard
            .into_iter()
            .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>())
            .collect::<Vec<_>>(),
    )
    .resize_keyboard(true);
    request.reply_markup(keyboard).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use trivia_quiz_bot::{error::FetchError, quiz::Question};

    struct FixedQuestions;

    #[async_trait]
    impl QuestionSource for FixedQuestions {
        async fn fetch(&self, _category: Category) -> Result<Vec<Question>, FetchError> {
            Ok((0..3)
                .map(|i| {
                    Question::new(format!("Q{i}?"), format!("right {i}"), vec![format!("wrong {i}")])
                })
                .collect())
        }
    }

    /// Every request fails: nothing listens on the discard port.
    fn offline_bot() -> Bot {
        let url = reqwest::Url::parse("http://127.0.0.1:9/").unwrap();
        Bot::new("12345:offline").set_api_url(url)
    }

    fn app() -> Arc<QuizApp> {
        let config = Config {
            feedback_delay: Duration::from_millis(10),
            ..Config::default()
        };
        Arc::new(QuizApp {
            config,
            source: Arc::new(FixedQuestions),
            db: sled::Config::new().temporary(true).open().unwrap(),
            sessions: Mutex::new(HashMap::new()),
            advances: Deferred::new(),
        })
    }

    async fn wait_for(
        app: &QuizApp,
        chat_id: ChatId,
        done: fn(&QuizSession<SledStore>) -> bool,
    ) {
        for _ in 0..100 {
            if app.with_session(chat_id, |s| done(s)).await.unwrap() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("chat {} never reached the expected state", chat_id.0);
    }

    #[tokio::test]
    async fn fetch_starts_even_when_loading_message_fails() {
        let app = app();
        let chat_id = ChatId(1);

        choose_category(offline_bot(), app.clone(), chat_id, "Science")
            .await
            .unwrap();

        wait_for(&app, chat_id, |s| s.phase() == Phase::InProgress).await;
        let category = app.with_session(chat_id, |s| s.category()).await.unwrap();
        assert_eq!(category, Some(Category::Science));
    }

    #[tokio::test]
    async fn advance_is_scheduled_even_when_feedback_fails() {
        let app = app();
        let chat_id = ChatId(2);
        choose_category(offline_bot(), app.clone(), chat_id, "History")
            .await
            .unwrap();
        wait_for(&app, chat_id, |s| s.phase() == Phase::InProgress).await;

        let option = app
            .with_session(chat_id, |s| s.shuffled_options()[0].clone())
            .await
            .unwrap();
        answer(offline_bot(), app.clone(), chat_id, &option).await.unwrap();

        wait_for(&app, chat_id, |s| s.current_index() == 1).await;
        let answered = app.with_session(chat_id, |s| s.answers()[0].clone()).await.unwrap();
        assert_eq!(answered, Some(option));
    }
}
