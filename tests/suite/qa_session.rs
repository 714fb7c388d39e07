//! Question-answering session lifecycle driven through the engine.

use folio_engine::SubmitRejected;
use folio_types::{ChatMessage, QaStatus, ThreadId, ViewIndex};

use crate::common::{Harness, QaCall, RecordingQa, RecordingStore, hash, provider_error};

const EXCERPT: &str = "The quick brown fox";
const QUESTION: &str = "What animal is mentioned?";

async fn ready_session(mut h: Harness) -> Harness {
    h.open(ViewIndex::PRIMARY, &hash("fables")).await;
    h.enable_qa().await;
    h.engine.bind_excerpt(EXCERPT);
    assert_eq!(h.engine.qa().status(), QaStatus::Creating);
    h.engine.settle().await;
    assert_eq!(h.engine.qa().status(), QaStatus::Ready);
    h
}

#[tokio::test(start_paused = true)]
async fn question_round_trip() {
    let mut h = ready_session(Harness::new()).await;
    assert_eq!(
        h.engine.qa().thread().map(|t| t.thread_id.clone()),
        Some(ThreadId::new("thread_1"))
    );

    h.engine.submit_question(QUESTION).expect("ready");
    assert_eq!(h.engine.qa().status(), QaStatus::Answering);
    assert_eq!(h.engine.qa().messages(), [ChatMessage::user(QUESTION)]);

    h.engine.settle().await;
    assert_eq!(h.engine.qa().status(), QaStatus::Ready);
    let texts: Vec<&str> = h
        .engine
        .qa()
        .messages()
        .iter()
        .map(|m| m.text.as_str())
        .collect();
    assert_eq!(texts, ["User: What animal is mentioned?", "QABot: A fox."]);

    assert!(h.qa.calls().contains(&QaCall::Answer {
        thread: ThreadId::new("thread_1"),
        excerpt: EXCERPT.to_string(),
        question: QUESTION.to_string(),
    }));
}

#[tokio::test(start_paused = true)]
async fn clearing_excerpt_deletes_thread_once() {
    let mut h = ready_session(Harness::new()).await;
    h.engine.submit_question(QUESTION).expect("ready");
    h.engine.settle().await;

    h.engine.clear_excerpt();
    h.engine.settle().await;

    assert_eq!(h.engine.qa().status(), QaStatus::Closed);
    assert!(h.engine.qa().messages().is_empty());
    assert_eq!(h.qa.deleted_threads(), vec![ThreadId::new("thread_1")]);

    h.engine.clear_excerpt();
    h.engine.settle().await;
    assert_eq!(h.qa.deleted_threads().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rebinding_keeps_thread_and_history() {
    let mut h = ready_session(Harness::new()).await;
    h.engine.submit_question(QUESTION).expect("ready");
    h.engine.settle().await;

    h.engine.bind_excerpt("A lazy dog sleeps");
    h.engine.settle().await;
    assert_eq!(h.engine.qa().status(), QaStatus::Ready);
    assert_eq!(h.engine.qa().messages().len(), 2);
    assert_eq!(h.qa.count(|c| matches!(c, QaCall::CreateThread(_))), 1);

    h.engine.submit_question("Is it asleep?").expect("ready");
    h.engine.settle().await;
    assert!(h.qa.calls().iter().any(|c| matches!(
        c,
        QaCall::Answer { excerpt, .. } if excerpt == "A lazy dog sleeps"
    )));
}

#[tokio::test(start_paused = true)]
async fn submit_while_answering_issues_nothing() {
    let mut h = ready_session(Harness::with(
        RecordingStore::default(),
        RecordingQa::with_held_answers(),
    ))
    .await;

    h.engine.submit_question(QUESTION).expect("ready");
    let before = h.engine.qa().messages().to_vec();
    assert_eq!(
        h.engine.submit_question("And the dog?"),
        Err(SubmitRejected::NotReady(QaStatus::Answering))
    );
    assert_eq!(h.engine.qa().messages(), before.as_slice());

    h.qa.release_answers(1);
    h.engine.settle().await;
    assert_eq!(h.qa.count(|c| matches!(c, QaCall::Answer { .. })), 1);
}

#[tokio::test(start_paused = true)]
async fn submit_before_ready_is_rejected() {
    let mut h = Harness::new();
    assert_eq!(
        h.engine.submit_question(QUESTION),
        Err(SubmitRejected::NotReady(QaStatus::Closed))
    );
    h.engine.settle().await;
    assert!(h.qa.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn excerpt_is_ignored_while_disabled() {
    let mut h = Harness::new();
    h.open(ViewIndex::PRIMARY, &hash("fables")).await;
    h.engine.bind_excerpt(EXCERPT);
    h.engine.settle().await;

    assert_eq!(h.engine.qa().status(), QaStatus::Closed);
    assert!(h.qa.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn blank_excerpt_does_not_open_a_session() {
    let mut h = Harness::new();
    h.open(ViewIndex::PRIMARY, &hash("fables")).await;
    h.enable_qa().await;
    h.engine.bind_excerpt("   \n");
    h.engine.settle().await;

    assert_eq!(h.engine.qa().status(), QaStatus::Closed);
    assert_eq!(h.qa.count(|c| matches!(c, QaCall::CreateThread(_))), 0);
}

#[tokio::test(start_paused = true)]
async fn thread_created_after_teardown_is_deleted() {
    let mut h = Harness::with(RecordingStore::default(), RecordingQa::with_held_threads());
    h.open(ViewIndex::PRIMARY, &hash("fables")).await;
    h.enable_qa().await;

    h.engine.bind_excerpt(EXCERPT);
    h.drain().await;
    assert_eq!(h.engine.qa().status(), QaStatus::Creating);
    h.engine.clear_excerpt();
    assert_eq!(h.engine.qa().status(), QaStatus::Closed);

    h.qa.release_threads(1);
    h.engine.settle().await;

    assert_eq!(h.engine.qa().status(), QaStatus::Closed);
    assert!(h.engine.qa().thread().is_none());
    assert_eq!(h.qa.deleted_threads(), vec![ThreadId::new("thread_1")]);
}

#[tokio::test(start_paused = true)]
async fn failed_answer_offers_retry_of_same_question() {
    let mut h = ready_session(Harness::new()).await;
    h.qa.push_answer(Err(provider_error(503)));
    h.qa.push_answer(Ok("Still a fox.".to_string()));

    h.engine.submit_question(QUESTION).expect("ready");
    h.engine.settle().await;

    assert_eq!(h.engine.qa().status(), QaStatus::Ready);
    assert_eq!(h.engine.qa().messages(), [ChatMessage::user(QUESTION)]);
    let notice = h.engine.qa().notice().expect("notice");
    assert_eq!(notice.question, QUESTION);
    assert!(notice.message.contains("503"));

    assert!(h.engine.retry_qa());
    h.engine.settle().await;
    assert!(h.engine.qa().notice().is_none());
    assert_eq!(
        h.engine.qa().messages(),
        [ChatMessage::user(QUESTION), ChatMessage::bot("Still a fox.")]
    );
    assert_eq!(h.qa.count(|c| matches!(c, QaCall::Answer { .. })), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_creation_recovers_on_retry() {
    let mut h = Harness::new();
    h.open(ViewIndex::PRIMARY, &hash("fables")).await;
    h.enable_qa().await;
    h.qa.fail_next_thread(provider_error(500));

    h.engine.bind_excerpt(EXCERPT);
    h.engine.settle().await;
    assert_eq!(h.engine.qa().status(), QaStatus::Failed);
    assert!(h.engine.qa().last_error().is_some());
    assert!(h.engine.submit_question(QUESTION).is_err());

    assert!(h.engine.retry_qa());
    h.engine.settle().await;
    assert_eq!(h.engine.qa().status(), QaStatus::Ready);
    assert_eq!(h.qa.count(|c| matches!(c, QaCall::CreateThread(_))), 2);
}

#[tokio::test(start_paused = true)]
async fn excerpt_bound_before_load_opens_session_on_completion() {
    let mut h = Harness::new();
    h.enable_qa().await;
    h.engine.bind_excerpt(EXCERPT);
    h.engine.settle().await;
    assert_eq!(h.engine.qa().status(), QaStatus::Closed);

    h.open(ViewIndex::PRIMARY, &hash("fables")).await;
    assert_eq!(h.engine.qa().status(), QaStatus::Ready);
    assert_eq!(
        h.qa.count(|c| *c == QaCall::CreateThread(hash("fables"))),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_live_thread() {
    let mut h = ready_session(Harness::new()).await;
    h.engine.shutdown().await;

    assert_eq!(h.engine.qa().status(), QaStatus::Closed);
    assert_eq!(h.qa.deleted_threads(), vec![ThreadId::new("thread_1")]);
}
