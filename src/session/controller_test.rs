use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Notify;

use super::*;
use crate::auth::StaticToken;
use crate::chat::{Chat, ChatSummary, Role};
use crate::storage::MemoryStorage;
use crate::store::LocalChatStore;

// =========================================================================
// Mocks
// =========================================================================

/// Replies with a fixed string, or fails every call.
struct MockAssistant {
    reply: Option<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockAssistant {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self { reply: Some(reply.to_owned()), calls: Mutex::new(Vec::new()) })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self { reply: None, calls: Mutex::new(Vec::new()) })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Assistant for MockAssistant {
    async fn ask(&self, user_text: &str, system_prompt: &str) -> Result<String, AssistantError> {
        self.calls
            .lock()
            .unwrap()
            .push((user_text.to_owned(), system_prompt.to_owned()));
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(AssistantError::Response { status: 502, body: "bad gateway".into() }),
        }
    }
}

/// Blocks inside `ask` until released, so tests can act mid-send.
struct GatedAssistant {
    started: Notify,
    release: Notify,
    reply: String,
}

impl GatedAssistant {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self { started: Notify::new(), release: Notify::new(), reply: reply.to_owned() })
    }
}

#[async_trait::async_trait]
impl Assistant for GatedAssistant {
    async fn ask(&self, _user_text: &str, _system_prompt: &str) -> Result<String, AssistantError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.reply.clone())
    }
}

/// Never answers.
struct SilentAssistant;

#[async_trait::async_trait]
impl Assistant for SilentAssistant {
    async fn ask(&self, _user_text: &str, _system_prompt: &str) -> Result<String, AssistantError> {
        std::future::pending().await
    }
}

/// Local store whose operations can be switched to fail, and whose next
/// `get` can be held after it has read.
struct FlakyStore {
    inner: LocalChatStore,
    fail_appends: AtomicBool,
    fail_gets: AtomicBool,
    fail_creates: AtomicBool,
    hold_next_get: AtomicBool,
    get_held: Notify,
    get_release: Notify,
    appends: AtomicUsize,
}

impl FlakyStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: LocalChatStore::new(
                Arc::new(MemoryStorage::new()),
                Arc::new(StaticToken::new(Some("tok".into()))),
            ),
            fail_appends: AtomicBool::new(false),
            fail_gets: AtomicBool::new(false),
            fail_creates: AtomicBool::new(false),
            hold_next_get: AtomicBool::new(false),
            get_held: Notify::new(),
            get_release: Notify::new(),
            appends: AtomicUsize::new(0),
        })
    }

    /// A chat with two messages already exchanged.
    async fn seed_history(&self) -> String {
        let chat = self.inner.create("Weather talk").await.unwrap();
        self.inner
            .append_message(&chat.id, &Message::user("will it rain today"))
            .await
            .unwrap();
        self.inner
            .append_message(&chat.id, &Message::assistant("light showers after noon"))
            .await
            .unwrap();
        chat.id
    }
}

#[async_trait::async_trait]
impl ChatStore for FlakyStore {
    fn is_authenticated(&self) -> bool {
        self.inner.is_authenticated()
    }

    async fn list(&self) -> Result<Vec<ChatSummary>, StoreError> {
        self.inner.list().await
    }

    async fn create(&self, title: &str) -> Result<Chat, StoreError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("offline".into()));
        }
        self.inner.create(title).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    async fn get(&self, id: &str) -> Result<Chat, StoreError> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("blip".into()));
        }
        let chat = self.inner.get(id).await;
        if self.hold_next_get.swap(false, Ordering::SeqCst) {
            self.get_held.notify_one();
            self.get_release.notified().await;
        }
        chat
    }

    async fn append_message(&self, id: &str, message: &Message) -> Result<(), StoreError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("disk full".into()));
        }
        self.inner.append_message(id, message).await
    }

    async fn update_title(&self, id: &str, title: &str) -> Result<(), StoreError> {
        self.inner.update_title(id, title).await
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn local_store(token: Option<&str>) -> Arc<LocalChatStore> {
    Arc::new(LocalChatStore::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(StaticToken::new(token.map(str::to_owned))),
    ))
}

fn controller(store: Arc<dyn ChatStore>, assistant: Arc<dyn Assistant>) -> Arc<SessionController> {
    Arc::new(SessionController::new(store, assistant))
}

fn completed(outcome: SendOutcome) -> SendReport {
    match outcome {
        SendOutcome::Completed(report) => report,
        SendOutcome::Rejected(reason) => panic!("expected completed send, got {reason:?}"),
    }
}

fn contents(messages: &[Message]) -> Vec<(Role, &str)> {
    messages.iter().map(|m| (m.role, m.content.as_str())).collect()
}

// =========================================================================
// send: happy path and titles
// =========================================================================

#[tokio::test]
async fn send_without_active_chat_creates_one() {
    let store = local_store(Some("tok"));
    let ctl = controller(store.clone(), MockAssistant::replying("hello!"));

    let report = completed(ctl.send("hi there").await.unwrap());

    let session = ctl.snapshot();
    assert_eq!(session.active.as_deref(), Some(report.chat_id.as_str()));
    assert_eq!(session.chats.len(), 1);
    assert_eq!(session.chats[0].title, "hi there");
    assert_eq!(
        contents(&session.messages),
        vec![(Role::User, "hi there"), (Role::Assistant, "hello!")]
    );
    assert!(report.fully_persisted());
    assert!(!report.fallback);

    let stored = store.get(&report.chat_id).await.unwrap();
    assert_eq!(stored.messages, session.messages);
    assert_eq!(stored.title, "hi there");
}

#[tokio::test]
async fn send_exactly_thirty_chars_keeps_full_title() {
    let store = local_store(Some("tok"));
    let ctl = controller(store.clone(), MockAssistant::replying("ok"));
    let text = "a".repeat(30);

    let report = completed(ctl.send(&text).await.unwrap());

    assert_eq!(store.get(&report.chat_id).await.unwrap().title, text);
}

#[tokio::test]
async fn send_thirty_one_chars_truncates_title() {
    let store = local_store(Some("tok"));
    let ctl = controller(store.clone(), MockAssistant::replying("ok"));
    let text = format!("{}z", "a".repeat(30));

    let report = completed(ctl.send(&text).await.unwrap());

    let expected = format!("{}...", "a".repeat(30));
    assert_eq!(store.get(&report.chat_id).await.unwrap().title, expected);
    assert_eq!(ctl.snapshot().chats[0].title, expected);
    // The message itself is never truncated.
    assert_eq!(ctl.snapshot().messages[0].content, text);
}

#[tokio::test]
async fn send_passes_text_and_system_prompt_through() {
    let assistant = MockAssistant::replying("ok");
    let ctl = controller(local_store(Some("tok")), assistant.clone());

    ctl.send("namaskara, hegiddira?").await.unwrap();

    let calls = assistant.calls.lock().unwrap().clone();
    assert_eq!(calls, vec![("namaskara, hegiddira?".to_owned(), SYSTEM_PROMPT.to_owned())]);
}

#[tokio::test]
async fn first_message_retitles_new_chat() {
    let store = local_store(Some("tok"));
    let ctl = controller(store.clone(), MockAssistant::replying("ok"));
    let id = ctl.new_chat().await.unwrap();
    assert_eq!(ctl.snapshot().chats[0].title, DEFAULT_TITLE);

    ctl.send("how do I say thanks in Kannada").await.unwrap();

    assert_eq!(store.get(&id).await.unwrap().title, "how do I say thanks in Kannada");
    assert_eq!(ctl.snapshot().chats[0].title, "how do I say thanks in Kannada");
}

#[tokio::test]
async fn second_message_does_not_retitle() {
    let store = local_store(Some("tok"));
    let ctl = controller(store.clone(), MockAssistant::replying("ok"));

    let report = completed(ctl.send("first").await.unwrap());
    ctl.send("second").await.unwrap();

    assert_eq!(store.get(&report.chat_id).await.unwrap().title, "first");
    assert_eq!(store.get(&report.chat_id).await.unwrap().messages.len(), 4);
}

#[tokio::test]
async fn explicit_title_survives_first_message() {
    let store = local_store(Some("tok"));
    let ctl = controller(store.clone(), MockAssistant::replying("ok"));
    let id = ctl.new_chat().await.unwrap();
    ctl.rename(&id, "Travel phrases").await.unwrap();

    ctl.send("where is the bus stand").await.unwrap();

    assert_eq!(store.get(&id).await.unwrap().title, "Travel phrases");
    assert_eq!(ctl.snapshot().chats[0].title, "Travel phrases");
}

// =========================================================================
// send: rejection
// =========================================================================

#[tokio::test]
async fn blank_text_is_rejected_without_side_effects() {
    let store = local_store(Some("tok"));
    let assistant = MockAssistant::replying("ok");
    let ctl = controller(store.clone(), assistant.clone());

    for text in ["", "   ", "\n\t"] {
        let outcome = ctl.send(text).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Rejected(RejectReason::Empty)));
    }

    assert!(store.list().await.unwrap().is_empty());
    assert_eq!(ctl.snapshot(), Session::default());
    assert_eq!(assistant.call_count(), 0);
}

#[tokio::test]
async fn send_without_token_is_rejected() {
    let store = local_store(None);
    let assistant = MockAssistant::replying("ok");
    let ctl = controller(store, assistant.clone());

    ctl.load().await.unwrap();
    let outcome = ctl.send("hello").await.unwrap();

    assert!(matches!(outcome, SendOutcome::Rejected(RejectReason::Unauthenticated)));
    assert!(ctl.snapshot().chats.is_empty());
    assert_eq!(assistant.call_count(), 0);
}

#[tokio::test]
async fn send_while_sending_is_dropped() {
    let store = local_store(Some("tok"));
    let gate = GatedAssistant::new("reply");
    let ctl = controller(store.clone(), gate.clone());

    let task = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.send("first").await }
    });
    gate.started.notified().await;
    assert_eq!(ctl.phase(), Phase::Sending);

    let outcome = ctl.send("second").await.unwrap();
    assert!(matches!(outcome, SendOutcome::Rejected(RejectReason::Busy)));
    assert_eq!(contents(&ctl.snapshot().messages), vec![(Role::User, "first")]);

    gate.release.notify_one();
    let report = completed(task.await.unwrap().unwrap());

    assert_eq!(ctl.phase(), Phase::Idle);
    let stored = store.get(&report.chat_id).await.unwrap();
    assert_eq!(contents(&stored.messages), vec![(Role::User, "first"), (Role::Assistant, "reply")]);
}

#[tokio::test]
async fn submit_while_sending_keeps_draft() {
    let gate = GatedAssistant::new("reply");
    let ctl = controller(local_store(Some("tok")), gate.clone());

    ctl.set_draft("first");
    let task = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.submit().await }
    });
    gate.started.notified().await;
    assert_eq!(ctl.snapshot().draft, "");

    ctl.set_draft("second");
    let outcome = ctl.submit().await.unwrap();
    assert!(matches!(outcome, SendOutcome::Rejected(RejectReason::Busy)));
    assert_eq!(ctl.snapshot().draft, "second");

    gate.release.notify_one();
    completed(task.await.unwrap().unwrap());
    assert_eq!(ctl.snapshot().draft, "second");
}

#[tokio::test]
async fn submit_blank_draft_is_rejected() {
    let ctl = controller(local_store(Some("tok")), MockAssistant::replying("ok"));
    ctl.set_draft("  ");
    assert!(matches!(ctl.submit().await.unwrap(), SendOutcome::Rejected(RejectReason::Empty)));
    assert_eq!(ctl.snapshot().draft, "  ");
}

#[tokio::test]
async fn submit_keeps_draft_when_chat_cannot_be_created() {
    let store = FlakyStore::new();
    store.fail_creates.store(true, Ordering::SeqCst);
    let assistant = MockAssistant::replying("ok");
    let ctl = controller(store, assistant.clone());

    ctl.set_draft("hello");
    let err = ctl.submit().await.unwrap_err();

    assert!(matches!(err, SessionError::Store(StoreError::Transport(_))));
    let session = ctl.snapshot();
    assert_eq!(session.draft, "hello");
    assert_eq!(session.phase(), Phase::Idle);
    assert!(session.messages.is_empty());
    assert_eq!(assistant.call_count(), 0);
}

#[tokio::test]
async fn submit_clears_draft_once_chat_exists() {
    let ctl = controller(local_store(Some("tok")), MockAssistant::replying("ok"));
    ctl.set_draft("hello");
    completed(ctl.submit().await.unwrap());
    assert_eq!(ctl.snapshot().draft, "");
}

// =========================================================================
// send: first message of a chat with history
// =========================================================================

#[tokio::test]
async fn send_after_failed_load_keeps_existing_title() {
    let store = FlakyStore::new();
    let id = store.seed_history().await;
    let ctl = controller(store.clone(), MockAssistant::replying("sunny tomorrow"));

    store.fail_gets.store(true, Ordering::SeqCst);
    assert!(ctl.load().await.is_err());
    store.fail_gets.store(false, Ordering::SeqCst);

    let report = completed(ctl.send("and tomorrow?").await.unwrap());

    assert!(report.fully_persisted());
    let stored = store.inner.get(&id).await.unwrap();
    assert_eq!(stored.title, "Weather talk");
    assert_eq!(stored.messages.len(), 4);
    assert_eq!(ctl.snapshot().chats[0].title, "Weather talk");
}

#[tokio::test]
async fn send_to_unreadable_chat_keeps_existing_title() {
    let store = FlakyStore::new();
    let id = store.seed_history().await;
    let ctl = controller(store.clone(), MockAssistant::replying("sunny tomorrow"));
    ctl.load().await.unwrap();
    ctl.new_chat().await.unwrap();

    store.fail_gets.store(true, Ordering::SeqCst);
    assert!(ctl.select(&id).await.is_err());
    completed(ctl.send("and tomorrow?").await.unwrap());
    store.fail_gets.store(false, Ordering::SeqCst);

    let stored = store.inner.get(&id).await.unwrap();
    assert_eq!(stored.title, "Weather talk");
    assert_eq!(stored.messages.len(), 4);
}

#[tokio::test]
async fn load_overlapping_send_is_read_again() {
    let store = FlakyStore::new();
    let id = store.seed_history().await;
    let ctl = controller(store.clone(), MockAssistant::replying("sunny tomorrow"));
    ctl.load().await.unwrap();

    store.hold_next_get.store(true, Ordering::SeqCst);
    let select = tokio::spawn({
        let ctl = ctl.clone();
        let id = id.clone();
        async move { ctl.select(&id).await }
    });
    store.get_held.notified().await;

    completed(ctl.send("and tomorrow?").await.unwrap());
    store.get_release.notify_one();
    select.await.unwrap().unwrap();

    let session = ctl.snapshot();
    assert_eq!(session.chats[0].title, "Weather talk");
    assert_eq!(
        contents(&session.messages),
        vec![
            (Role::User, "will it rain today"),
            (Role::Assistant, "light showers after noon"),
            (Role::User, "and tomorrow?"),
            (Role::Assistant, "sunny tomorrow"),
        ]
    );
}

#[tokio::test]
async fn load_during_send_keeps_unsaved_user_message() {
    let store = FlakyStore::new();
    let gate = GatedAssistant::new("reply");
    let ctl = controller(store.clone(), gate.clone());
    let id = ctl.new_chat().await.unwrap();
    store.fail_appends.store(true, Ordering::SeqCst);

    let task = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.send("hello").await }
    });
    gate.started.notified().await;

    ctl.select(&id).await.unwrap();
    assert_eq!(contents(&ctl.snapshot().messages), vec![(Role::User, "hello")]);

    gate.release.notify_one();
    completed(task.await.unwrap().unwrap());
    assert_eq!(
        contents(&ctl.snapshot().messages),
        vec![(Role::User, "hello"), (Role::Assistant, "reply")]
    );
}

#[test]
fn merge_unsaved_appends_only_missing_tail() {
    let history = vec![Message::user("q1"), Message::assistant("a1")];
    let shown = vec![Message::user("q2"), Message::assistant("a2")];

    let mut none_saved = history.clone();
    merge_unsaved(&mut none_saved, &shown);
    assert_eq!(none_saved.len(), 4);

    let mut user_saved = history.clone();
    user_saved.push(Message::user("q2"));
    merge_unsaved(&mut user_saved, &shown);
    assert_eq!(&contents(&user_saved)[2..], &[(Role::User, "q2"), (Role::Assistant, "a2")]);

    let mut all_saved = history;
    all_saved.extend(shown.clone());
    merge_unsaved(&mut all_saved, &shown);
    assert_eq!(all_saved.len(), 4);
}

// =========================================================================
// send: assistant failure
// =========================================================================

#[tokio::test]
async fn failed_assistant_appends_single_fallback() {
    let store = local_store(Some("tok"));
    let ctl = controller(store.clone(), MockAssistant::failing());

    let report = completed(ctl.send("hello").await.unwrap());

    assert!(report.fallback);
    assert!(matches!(report.assistant_error, Some(AssistantError::Response { status: 502, .. })));
    assert_eq!(ctl.phase(), Phase::Idle);

    let expected = vec![(Role::User, "hello"), (Role::Assistant, FALLBACK_REPLY)];
    assert_eq!(contents(&ctl.snapshot().messages), expected);
    let stored = store.get(&report.chat_id).await.unwrap();
    assert_eq!(contents(&stored.messages), expected);
}

#[tokio::test]
async fn silent_assistant_times_out_into_fallback() {
    let store = local_store(Some("tok"));
    let ctl = Arc::new(
        SessionController::new(store.clone(), Arc::new(SilentAssistant))
            .with_reply_timeout(Duration::from_millis(50)),
    );

    let report = completed(ctl.send("anyone there?").await.unwrap());

    assert!(report.fallback);
    assert!(matches!(report.assistant_error, Some(AssistantError::Timeout(_))));
    assert_eq!(ctl.phase(), Phase::Idle);
    assert_eq!(store.get(&report.chat_id).await.unwrap().messages.len(), 2);
}

#[tokio::test]
async fn controller_accepts_sends_again_after_failure() {
    let ctl = controller(local_store(Some("tok")), MockAssistant::failing());
    completed(ctl.send("one").await.unwrap());
    completed(ctl.send("two").await.unwrap());
    assert_eq!(ctl.snapshot().messages.len(), 4);
}

// =========================================================================
// send: persistence drift
// =========================================================================

#[tokio::test]
async fn failed_appends_leave_memory_ahead_of_store() {
    let store = FlakyStore::new();
    store.fail_appends.store(true, Ordering::SeqCst);
    let ctl = controller(store.clone(), MockAssistant::replying("hi"));

    let report = completed(ctl.send("hello").await.unwrap());

    let steps: Vec<PersistStep> = report.persist_failures.iter().map(|f| f.step).collect();
    assert_eq!(steps, vec![PersistStep::UserMessage, PersistStep::AssistantMessage]);
    assert!(!report.fully_persisted());
    // Attempted once each, never retried.
    assert_eq!(store.appends.load(Ordering::SeqCst), 2);

    assert_eq!(ctl.snapshot().messages.len(), 2);
    assert!(store.get(&report.chat_id).await.unwrap().messages.is_empty());
}

#[tokio::test]
async fn send_to_chat_deleted_elsewhere_reports_not_found() {
    let store = local_store(Some("tok"));
    let ctl = controller(store.clone(), MockAssistant::replying("hi"));
    let id = ctl.new_chat().await.unwrap();
    // Another tab removes the chat behind this controller's back.
    store.delete(&id).await.unwrap();

    let report = completed(ctl.send("hello").await.unwrap());

    assert!(report
        .persist_failures
        .iter()
        .all(|f| matches!(f.error, StoreError::NotFound { .. })));
    assert_eq!(report.persist_failures.len(), 3);
    assert_eq!(ctl.snapshot().messages.len(), 2);
}

// =========================================================================
// switching mid-send
// =========================================================================

#[tokio::test]
async fn reply_lands_in_chat_active_at_send_time() {
    let store = local_store(Some("tok"));
    let gate = GatedAssistant::new("late reply");
    let ctl = controller(store.clone(), gate.clone());

    let chat_a = ctl.new_chat().await.unwrap();
    let chat_b = ctl.new_chat().await.unwrap();
    ctl.select(&chat_a).await.unwrap();

    let task = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.send("question for A").await }
    });
    gate.started.notified().await;

    ctl.select(&chat_b).await.unwrap();
    gate.release.notify_one();
    let report = completed(task.await.unwrap().unwrap());

    assert_eq!(report.chat_id, chat_a);
    let a = store.get(&chat_a).await.unwrap();
    assert_eq!(
        contents(&a.messages),
        vec![(Role::User, "question for A"), (Role::Assistant, "late reply")]
    );
    assert!(store.get(&chat_b).await.unwrap().messages.is_empty());

    let session = ctl.snapshot();
    assert_eq!(session.active.as_deref(), Some(chat_b.as_str()));
    assert!(session.messages.is_empty());

    ctl.select(&chat_a).await.unwrap();
    assert_eq!(ctl.snapshot().messages, a.messages);
}

#[tokio::test]
async fn deleting_other_chat_mid_send_keeps_reply_target() {
    let store = local_store(Some("tok"));
    let gate = GatedAssistant::new("done");
    let ctl = controller(store.clone(), gate.clone());

    let other = ctl.new_chat().await.unwrap();
    let target = ctl.new_chat().await.unwrap();

    let task = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.send("hello").await }
    });
    gate.started.notified().await;
    ctl.delete(&other).await.unwrap();
    gate.release.notify_one();
    completed(task.await.unwrap().unwrap());

    let session = ctl.snapshot();
    assert_eq!(session.active.as_deref(), Some(target.as_str()));
    assert_eq!(contents(&session.messages), vec![(Role::User, "hello"), (Role::Assistant, "done")]);
}

// =========================================================================
// list, select, delete
// =========================================================================

#[tokio::test]
async fn new_chat_goes_to_front_and_becomes_active() {
    let store = local_store(Some("tok"));
    let ctl = controller(store.clone(), MockAssistant::replying("ok"));
    ctl.send("older").await.unwrap();

    let id = ctl.new_chat().await.unwrap();

    let session = ctl.snapshot();
    assert_eq!(session.chats[0].id, id);
    assert_eq!(session.active.as_deref(), Some(id.as_str()));
    assert!(session.messages.is_empty());
    assert_eq!(store.list().await.unwrap()[0].id, id);
}

#[tokio::test]
async fn load_selects_front_chat_and_its_messages() {
    let store = local_store(Some("tok"));
    let older = store.create("older").await.unwrap();
    let newer = store.create("newer").await.unwrap();
    store.append_message(&newer.id, &Message::user("hey")).await.unwrap();
    store.append_message(&older.id, &Message::user("old")).await.unwrap();

    let ctl = controller(store, MockAssistant::replying("ok"));
    ctl.load().await.unwrap();

    let session = ctl.snapshot();
    assert_eq!(session.chats.len(), 2);
    assert_eq!(session.active.as_deref(), Some(newer.id.as_str()));
    assert_eq!(contents(&session.messages), vec![(Role::User, "hey")]);
}

#[tokio::test]
async fn load_keeps_existing_selection() {
    let store = local_store(Some("tok"));
    let older = store.create("older").await.unwrap();
    store.create("newer").await.unwrap();
    let ctl = controller(store, MockAssistant::replying("ok"));
    ctl.load().await.unwrap();
    ctl.select(&older.id).await.unwrap();

    ctl.load().await.unwrap();

    assert_eq!(ctl.snapshot().active.as_deref(), Some(older.id.as_str()));
}

#[tokio::test]
async fn load_with_empty_store_has_no_selection() {
    let ctl = controller(local_store(Some("tok")), MockAssistant::replying("ok"));
    ctl.load().await.unwrap();
    assert_eq!(ctl.snapshot(), Session::default());
}

#[tokio::test]
async fn select_unknown_chat_is_not_found() {
    let ctl = controller(local_store(Some("tok")), MockAssistant::replying("ok"));
    ctl.new_chat().await.unwrap();
    let err = ctl.select("missing").await.unwrap_err();
    assert!(matches!(err, SessionError::NotFound(id) if id == "missing"));
}

#[tokio::test]
async fn select_replaces_working_copy() {
    let ctl = controller(local_store(Some("tok")), MockAssistant::replying("pong"));
    let report = completed(ctl.send("ping").await.unwrap());
    let empty = ctl.new_chat().await.unwrap();
    assert!(ctl.snapshot().messages.is_empty());

    ctl.select(&report.chat_id).await.unwrap();
    assert_eq!(ctl.snapshot().messages.len(), 2);

    ctl.select(&empty).await.unwrap();
    assert!(ctl.snapshot().messages.is_empty());
}

#[tokio::test]
async fn deleting_active_chat_selects_new_front() {
    let store = local_store(Some("tok"));
    let ctl = controller(store.clone(), MockAssistant::replying("ok"));
    let first = completed(ctl.send("first chat").await.unwrap()).chat_id;
    let second = ctl.new_chat().await.unwrap();
    let third = ctl.new_chat().await.unwrap();

    ctl.delete(&third).await.unwrap();

    let session = ctl.snapshot();
    assert_eq!(session.active.as_deref(), Some(second.as_str()));
    assert_eq!(session.chats.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec![
        second.as_str(),
        first.as_str()
    ]);

    ctl.delete(&second).await.unwrap();
    let session = ctl.snapshot();
    assert_eq!(session.active.as_deref(), Some(first.as_str()));
    assert_eq!(session.messages.len(), 2);
}

#[tokio::test]
async fn deleting_last_chat_clears_selection() {
    let store = local_store(Some("tok"));
    let ctl = controller(store.clone(), MockAssistant::replying("ok"));
    let id = completed(ctl.send("only").await.unwrap()).chat_id;

    ctl.delete(&id).await.unwrap();

    let session = ctl.snapshot();
    assert!(session.active.is_none());
    assert!(session.messages.is_empty());
    assert!(session.chats.is_empty());
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_inactive_chat_keeps_selection() {
    let ctl = controller(local_store(Some("tok")), MockAssistant::replying("ok"));
    let old = ctl.new_chat().await.unwrap();
    let current = ctl.new_chat().await.unwrap();
    completed(ctl.send("keep me").await.unwrap());
    assert_ne!(old, current);

    ctl.delete(&old).await.unwrap();

    let session = ctl.snapshot();
    assert_eq!(session.active.as_deref(), Some(current.as_str()));
    assert_eq!(session.messages.len(), 2);
}

#[tokio::test]
async fn deleting_unknown_chat_is_noop() {
    let ctl = controller(local_store(Some("tok")), MockAssistant::replying("ok"));
    let id = ctl.new_chat().await.unwrap();
    ctl.delete("never-existed").await.unwrap();
    assert_eq!(ctl.snapshot().active.as_deref(), Some(id.as_str()));
}
