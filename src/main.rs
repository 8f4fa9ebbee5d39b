mod config;
mod error;
mod knowledge;
mod quiz;

use std::{fs::File, sync::Arc};

use dotenv::dotenv;
use knowledge::{ConceptNode, KnowledgeBase};
use quiz::{
    ai_helper::{ChatGptBackend, ModelChoice, QuizHelper, QuizRequest},
    score_percentage, QuizData, QuizQuestion, ScoreBand,
};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatAction, KeyboardButton, KeyboardMarkup},
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveModelChoice,
    ReceiveConceptChoice {
        model: ModelChoice,
    },
    TakingQuiz {
        model: ModelChoice,
        concept_id: String,
        quiz: QuizData,
        question_number: usize,
        score: usize,
    },
}

type QuizProgress = (ModelChoice, String, QuizData, usize, usize);
type UserInfoStorage = std::sync::Arc<ErasedStorage<State>>;

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting quiz bot...");

    let settings = Arc::new(config::Settings::from_env()?);

    log::info!("Loading concepts from {}", settings.knowledge_file.display());
    let knowledge = Arc::new(KnowledgeBase::from_reader(File::open(
        &settings.knowledge_file,
    )?)?);
    log::info!("{} concepts loaded", knowledge.concepts.len());

    log::info!("Opening dialogue storage at {}", settings.dialogue_db);
    let storage: UserInfoStorage = SqliteStorage::open(&settings.dialogue_db, Json)
        .await?
        .erase();

    let quiz_helper = Arc::new(QuizHelper::new(Arc::new(ChatGptBackend::from_settings(
        &settings,
    ))));

    let bot = Bot::from_env();

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveModelChoice].endpoint(receive_model_choice))
            .branch(
                dptree::case![State::ReceiveConceptChoice { model }]
                    .endpoint(receive_concept_choice),
            )
            .branch(
                dptree::case![State::TakingQuiz {
                    model,
                    concept_id,
                    quiz,
                    question_number,
                    score
                }]
                .endpoint(take_quiz),
            ),
    )
    .dependencies(dptree::deps![storage, settings, knowledge, quiz_helper])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;

    Ok(())
}

const GREETING_TEXT: &str = "Hi! I am a TypeScript tutor bot. Pick a concept and I will quiz you on it.";
const RANDOM_CONCEPT: &str = "Random concept";
const CHANGE_MODEL: &str = "Change model";
const QUIZ_OVER_TEXT: &str = "That quiz is already over. Pick a concept to start a new one.";

fn model_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(
        ModelChoice::ALL
            .iter()
            .map(|m| vec![KeyboardButton::new(m.label())])
            .collect::<Vec<_>>(),
    )
}

fn concept_keyboard(knowledge: &KnowledgeBase) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = knowledge
        .concepts
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|c| KeyboardButton::new(c.title.clone()))
                .collect()
        })
        .collect();
    rows.push(vec![
        KeyboardButton::new(RANDOM_CONCEPT),
        KeyboardButton::new(CHANGE_MODEL),
    ]);
    KeyboardMarkup::new(rows)
}

fn option_letter(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => char::from(b'A' + i).to_string(),
        _ => (index + 1).to_string(),
    }
}

fn option_button_text(index: usize, option: &str) -> String {
    format!("{}. {}", option_letter(index), option)
}

/// Maps a reply back to an option: either the full button text or just its letter.
fn selected_option(question: &QuizQuestion, reply: &str) -> Option<usize> {
    let reply = reply.trim();
    (0..question.options.len()).find(|&i| {
        reply == option_button_text(i, &question.options[i])
            || reply.eq_ignore_ascii_case(&option_letter(i))
    })
}

fn question_keyboard(question: &QuizQuestion) -> KeyboardMarkup {
    KeyboardMarkup::new(
        question
            .options
            .iter()
            .enumerate()
            .map(|(i, option)| vec![KeyboardButton::new(option_button_text(i, option))])
            .collect::<Vec<_>>(),
    )
}

fn question_text(question: &QuizQuestion, number: usize, total: usize) -> String {
    let options = question
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| option_button_text(i, option))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Question {}/{} ({}):\n{}\n\n{}",
        number,
        total,
        question.difficulty,
        question.question,
        options
    )
}

fn concept_detail_text(knowledge: &KnowledgeBase, concept: &ConceptNode) -> String {
    let mut text = format!(
        "{}\nCategory: {}, level {}\n\n{}",
        concept.title, concept.category, concept.level, concept.description
    );
    let prerequisites = knowledge.prerequisite_titles(concept);
    if !prerequisites.is_empty() {
        text.push_str(&format!("\n\nBuilds on: {}", prerequisites.join(", ")));
    }
    if !concept.content.trim().is_empty() {
        text.push_str(&format!("\n\n{}", concept.content.trim()));
    }
    for (i, example) in concept.examples.iter().enumerate() {
        text.push_str(&format!("\n\nExample {}:\n{}", i + 1, example.trim()));
    }
    text
}

async fn start(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    knowledge: Arc<KnowledgeBase>,
    settings: Arc<config::Settings>,
) -> HandlerResult {
    let model = settings.default_model;
    bot.send_message(
        msg.chat.id,
        format!(
            "{}\n\nQuestions are written by {}. Tap \"{}\" to switch.",
            GREETING_TEXT,
            model.label(),
            CHANGE_MODEL
        ),
    )
    .reply_markup(concept_keyboard(&knowledge))
    .await?;

    dialogue.update(State::ReceiveConceptChoice { model }).await?;
    Ok(())
}

async fn receive_model_choice(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    knowledge: Arc<KnowledgeBase>,
) -> HandlerResult {
    let Some(model) = msg.text().and_then(ModelChoice::from_label) else {
        bot.send_message(msg.chat.id, "Please choose one of the models")
            .reply_markup(model_keyboard())
            .await?;
        return Ok(());
    };

    bot.send_message(
        msg.chat.id,
        format!("{} it is! Which concept do you want to practise?", model.label()),
    )
    .reply_markup(concept_keyboard(&knowledge))
    .await?;

    dialogue
        .update(State::ReceiveConceptChoice { model })
        .await?;
    Ok(())
}

async fn receive_concept_choice(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    model: ModelChoice,
    knowledge: Arc<KnowledgeBase>,
    quiz_helper: Arc<QuizHelper>,
    settings: Arc<config::Settings>,
) -> HandlerResult {
    if msg.text() == Some(CHANGE_MODEL) {
        bot.send_message(msg.chat.id, "Which model should write your questions?")
            .reply_markup(model_keyboard())
            .await?;
        dialogue.update(State::ReceiveModelChoice).await?;
        return Ok(());
    }

    let concept = match msg.text() {
        Some(RANDOM_CONCEPT) => {
            let mut rng = rand::thread_rng();
            knowledge.random(&mut rng)
        }
        Some(title) => knowledge.find_by_title(title),
        None => None,
    };
    let Some(concept) = concept else {
        bot.send_message(msg.chat.id, "Please choose one of the concepts")
            .reply_markup(concept_keyboard(&knowledge))
            .await?;
        return Ok(());
    };

    bot.send_message(msg.chat.id, concept_detail_text(&knowledge, concept))
        .await?;

    // Only cosmetic, so a failure here is ignored
    let _ = bot
        .send_chat_action(msg.chat.id, ChatAction::Typing)
        .await;

    let request = QuizRequest {
        model,
        format: settings.response_format,
    };
    let outcome = quiz_helper.generate_quiz(concept, &request).await;

    if settings.debug {
        bot.send_message(
            msg.chat.id,
            format!("Debug info:\n{}", outcome.report.summary()),
        )
        .await?;
    }

    let quiz = outcome.quiz;
    bot.send_message(
        msg.chat.id,
        format!("{}\n{}", quiz.title, quiz.description),
    )
    .await?;

    // The helper never returns an empty quiz, but the first question is checked anyway
    let Some(first) = quiz.questions.first() else {
        bot.send_message(msg.chat.id, "No questions could be prepared, try another concept.")
            .reply_markup(concept_keyboard(&knowledge))
            .await?;
        return Ok(());
    };

    bot.send_message(msg.chat.id, question_text(first, 1, quiz.questions.len()))
        .reply_markup(question_keyboard(first))
        .await?;

    dialogue
        .update(State::TakingQuiz {
            model,
            concept_id: concept.id.clone(),
            quiz,
            question_number: 0,
            score: 0,
        })
        .await?;
    Ok(())
}

async fn take_quiz(
    bot: Bot,
    dialogue: QuizDialogue,
    (model, concept_id, quiz, question_number, score): QuizProgress,
    msg: Message,
    knowledge: Arc<KnowledgeBase>,
) -> HandlerResult {
    let Some(question) = quiz.questions.get(question_number) else {
        log::warn!(
            "Question {} is out of range for '{}', resetting",
            question_number,
            concept_id
        );
        bot.send_message(msg.chat.id, QUIZ_OVER_TEXT)
            .reply_markup(concept_keyboard(&knowledge))
            .await?;
        dialogue
            .update(State::ReceiveConceptChoice { model })
            .await?;
        return Ok(());
    };

    let Some(selected) = msg.text().and_then(|text| selected_option(question, text)) else {
        bot.send_message(msg.chat.id, "Please pick one of the options")
            .reply_markup(question_keyboard(question))
            .await?;
        return Ok(());
    };

    let mut current_score = score;
    if question.is_correct(selected) {
        current_score += 1;
        bot.send_message(msg.chat.id, format!("Correct!\n\n{}", question.explanation))
            .await?;
    } else {
        let correct = question
            .correct_option()
            .map(|option| option_button_text(question.correct_answer, option))
            .unwrap_or_default();
        bot.send_message(
            msg.chat.id,
            format!(
                "Not quite. The correct answer is {}\n\n{}",
                correct, question.explanation
            ),
        )
        .await?;
    }

    let next_number = question_number + 1;
    if next_number >= quiz.questions.len() {
        let percentage = score_percentage(current_score, quiz.questions.len());
        let band = ScoreBand::from_percentage(percentage);
        log::info!(
            "Quiz for '{}' finished with {:.0}% ({:?})",
            concept_id,
            percentage,
            band
        );

        let quiz_score = format!(
            "Quiz finished! You answered {} of {} questions correctly ({:.0}%).\n{}\n\nWhat would you like to practise next?",
            current_score,
            quiz.questions.len(),
            percentage,
            band.message()
        );
        bot.send_message(msg.chat.id, quiz_score)
            .reply_markup(concept_keyboard(&knowledge))
            .await?;

        dialogue
            .update(State::ReceiveConceptChoice { model })
            .await?;
        return Ok(());
    }

    let next = &quiz.questions[next_number];
    bot.send_message(
        msg.chat.id,
        question_text(next, next_number + 1, quiz.questions.len()),
    )
    .reply_markup(question_keyboard(next))
    .await?;

    dialogue
        .update(State::TakingQuiz {
            model,
            concept_id,
            quiz,
            question_number: next_number,
            score: current_score,
        })
        .await?;
    Ok(())
}
