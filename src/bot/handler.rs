use std::sync::Arc;
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};

use super::callback::CallbackData;
use super::commands::Command;
use super::gate::AdmissionGate;
use super::keyboard::{Keyboard, MenuCommand, Reply};
use super::machine::{self, Reaction, SelectionAction, SKIP};
use super::messenger::Messenger;
use super::metrics::{Metrics, MetricsSnapshot};
use crate::config::SearchConfig;
use crate::search::ExpenseSearch;
use crate::session::{SessionStore, UserState};
use crate::storage::{Expense, NewUser, Storage, StorageError, User};

pub const RATE_LIMITED: &str = "Too many requests. Please try again later.";
pub const UNKNOWN_COMMAND: &str = "Unknown command. Use /help to see available commands.";
pub const GENERIC_ERROR: &str =
    "❌ An error occurred. Please try again, or send /cancel to start over.";
pub const NOT_YOUR_EXPENSE: &str = "You can only modify your own expenses.";
pub const NO_USER_RECORD: &str = "Could not find your user record.";
pub const EXPENSE_NOT_FOUND: &str = "Expense not found.";
pub const CATEGORY_NOT_FOUND: &str = "Category not found. Please try again.";

/// Telegram user behind an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub sender: Sender,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct IncomingCallback {
    pub chat_id: i64,
    /// Message carrying the pressed button.
    pub message_id: Option<i32>,
    pub sender: Sender,
    pub data: String,
}

/// Where replies go and who they are for.
#[derive(Debug, Clone)]
pub(crate) struct Ctx {
    pub chat_id: i64,
    pub origin: Option<i32>,
    pub sender: Sender,
    pub payload: Option<String>,
}

impl Ctx {
    pub fn user_id(&self) -> i64 {
        self.sender.id
    }
}

/// The conversation engine. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct BotHandler {
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) search: Arc<dyn ExpenseSearch>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    messenger: Arc<dyn Messenger>,
    gate: Arc<AdmissionGate>,
    pub(crate) metrics: Arc<Metrics>,
    bot_name: String,
    pub(crate) search_config: SearchConfig,
}

impl BotHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn Storage>,
        search: Arc<dyn ExpenseSearch>,
        sessions: Arc<dyn SessionStore>,
        messenger: Arc<dyn Messenger>,
        gate: AdmissionGate,
        bot_name: String,
        search_config: SearchConfig,
    ) -> Self {
        Self {
            storage,
            search,
            sessions,
            messenger,
            gate: Arc::new(gate),
            metrics: Arc::new(Metrics::new()),
            bot_name,
            search_config,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn handle_message(&self, msg: IncomingMessage) {
        self.metrics.record_message();
        let ctx = Ctx {
            chat_id: msg.chat_id,
            origin: None,
            sender: msg.sender,
            payload: None,
        };
        let user_id = ctx.user_id();

        if !self.admit(&ctx).await {
            return;
        }

        let state = self.load_state(user_id).await;
        let text = msg.text.trim();

        if let Some(command) = MenuCommand::from_label(text) {
            self.metrics.record_command();
            info!("User {} pressed menu button {:?}", user_id, command);
            self.handle_command(&ctx, command.into()).await;
            return;
        }

        if text.starts_with('/') && !(text == SKIP && state.step.accepts_skip()) {
            self.metrics.record_command();
            match Command::parse(text, &self.bot_name) {
                Ok(command) => {
                    info!(
                        "Received command from user {} in chat {}: {:?}",
                        user_id, ctx.chat_id, command
                    );
                    self.handle_command(&ctx, command).await;
                }
                Err(_) => {
                    debug!("Unknown command from user {}: {}", user_id, text);
                    self.deliver(&ctx, Reply::text(UNKNOWN_COMMAND)).await;
                }
            }
            return;
        }

        let reaction = self
            .transition(user_id, |state| machine::on_text(state, &msg.text))
            .await;
        self.react(&ctx, reaction).await;
    }

    pub async fn handle_callback(&self, callback: IncomingCallback) {
        let ctx = Ctx {
            chat_id: callback.chat_id,
            origin: callback.message_id,
            sender: callback.sender,
            payload: Some(callback.data.clone()),
        };

        if !self.admit(&ctx).await {
            return;
        }

        self.load_state(ctx.user_id()).await;

        match callback.data.parse::<CallbackData>() {
            Ok(data) => {
                debug!("Callback from user {}: {:?}", ctx.user_id(), data);
                self.route_callback(&ctx, data).await;
            }
            Err(e) => {
                warn!("Rejected callback from user {}: {}", ctx.user_id(), e);
                self.deliver(&ctx, Reply::text(e.user_message())).await;
            }
        }
    }

    /// Consult the rate limiter; reply and count an error when the update is dropped.
    async fn admit(&self, ctx: &Ctx) -> bool {
        if self.gate.allow() {
            return true;
        }
        self.metrics.record_error();
        warn!("Rate limit exceeded, dropping update from user {}", ctx.user_id());
        self.deliver(ctx, Reply::text(RATE_LIMITED)).await;
        false
    }

    async fn load_state(&self, user_id: i64) -> UserState {
        let (state, created) = self.sessions.get_or_create(user_id).await;
        if created {
            self.metrics.record_active_user();
            debug!("Started conversation for user {}", user_id);
        }
        state
    }

    /// Run a pure transition against the user's state under the store lock.
    pub(crate) async fn transition<F>(&self, user_id: i64, f: F) -> Reaction
    where
        F: FnOnce(&mut UserState) -> Reaction + Send,
    {
        let mut outcome = None;
        let created = self
            .sessions
            .update(
                user_id,
                Box::new(|state: &mut UserState| outcome = Some(f(state))),
            )
            .await;
        if created {
            self.metrics.record_active_user();
        }
        outcome.unwrap_or_else(|| Reaction::Reply(Reply::text(machine::USE_BUTTONS)))
    }

    pub(crate) async fn react(&self, ctx: &Ctx, reaction: Reaction) {
        match reaction {
            Reaction::Reply(reply) => self.deliver(ctx, reply).await,
            Reaction::Welcome => self.send_welcome(ctx).await,
            Reaction::Persist(draft) => self.finalize_expense(ctx, draft).await,
            Reaction::SaveEdit(draft) => self.save_expense(ctx, draft).await,
            Reaction::Remove(expense) => self.remove_expense(ctx, expense).await,
            Reaction::Search(query) => self.run_search(ctx, query).await,
        }
    }

    pub(crate) async fn handle_command(&self, ctx: &Ctx, command: Command) {
        let user_id = ctx.user_id();
        match command {
            Command::Start => self.send_welcome(ctx).await,
            Command::Help => self.handle_help(ctx).await,
            Command::Add => {
                let reaction = self
                    .transition(user_id, |state| machine::begin_add(state, user_id))
                    .await;
                self.react(ctx, reaction).await;
            }
            Command::List => self.handle_list(ctx).await,
            Command::Edit => self.handle_selection(ctx, SelectionAction::Edit).await,
            Command::Delete => self.handle_selection(ctx, SelectionAction::Delete).await,
            Command::Report => self.handle_report(ctx).await,
            Command::Dashboard => self.handle_dashboard(ctx).await,
            Command::Search => self.handle_search_command(ctx).await,
            Command::Cancel => self.handle_cancel(ctx).await,
        }
    }

    /// Send a reply, editing the originating message when asked to.
    /// Failures are logged and counted, never retried.
    pub(crate) async fn deliver(&self, ctx: &Ctx, reply: Reply) {
        let editable = reply.keyboard.as_ref().is_none_or(Keyboard::is_inline);
        if let (true, true, Some(message_id)) = (reply.edit, editable, ctx.origin) {
            match self.messenger.edit(ctx.chat_id, message_id, &reply).await {
                Ok(()) => return,
                Err(e) => warn!(
                    "Failed to edit message {} in chat {}, sending a new one: {:#}",
                    message_id, ctx.chat_id, e
                ),
            }
        }

        if let Err(e) = self.messenger.send(ctx.chat_id, &reply).await {
            self.metrics.record_error();
            error!("Failed to send message to chat {}: {:#}", ctx.chat_id, e);
        }
    }

    /// Log a storage failure with context and tell the user something went wrong.
    /// The conversation state is left untouched so the user can retry.
    pub(crate) async fn report_failure(&self, ctx: &Ctx, action: &str, err: StorageError) {
        self.metrics.record_error();
        let step = self
            .sessions
            .get(ctx.user_id())
            .await
            .map(|state| state.step.name())
            .unwrap_or("none");
        error!(
            "Failed to {} for user {} (step: {}, payload: {:?}): {:#}",
            action,
            ctx.user_id(),
            step,
            ctx.payload,
            err
        );
        self.deliver(ctx, Reply::text(GENERIC_ERROR)).await;
    }

    /// Create the user on first write, refreshing their profile otherwise.
    pub(crate) async fn ensure_user(&self, sender: &Sender) -> Result<User, StorageError> {
        self.storage
            .create_user(NewUser {
                telegram_id: sender.id,
                username: sender.username.clone(),
                first_name: sender.first_name.clone(),
                last_name: sender.last_name.clone(),
            })
            .await
    }

    /// Resolve the caller and check they own `expense`. Replies and returns
    /// `None` when they do not.
    pub(crate) async fn authorize(&self, ctx: &Ctx, expense: &Expense) -> Option<User> {
        match self.storage.get_user_by_telegram_id(ctx.user_id()).await {
            Ok(user) if user.id == expense.user_id => Some(user),
            Ok(user) => {
                warn!(
                    "User {} (id {}) tried to modify expense {} owned by {}",
                    ctx.user_id(),
                    user.id,
                    expense.id,
                    expense.user_id
                );
                self.deliver(ctx, Reply::text(NOT_YOUR_EXPENSE)).await;
                None
            }
            Err(e) if e.is_not_found() => {
                self.deliver(ctx, Reply::text(NO_USER_RECORD)).await;
                None
            }
            Err(e) => {
                self.report_failure(ctx, "load user", e).await;
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::keyboard::MENU_LIST;
    use crate::bot::machine::{PROMPT_GROUP, PROMPT_NOTES, PROMPT_ODOMETER, PROMPT_TOTAL};
    use crate::bot::messenger::recording::RecordingMessenger;
    use crate::search::{HashEmbedder, SimilaritySearch};
    use crate::session::{AddStep, EditStep, MemorySessionStore, Step};
    use crate::storage::memory::MemoryStorage;
    use crate::storage::VehicleType;
    use std::time::Duration;

    struct Harness {
        handler: BotHandler,
        storage: Arc<MemoryStorage>,
        messenger: Arc<RecordingMessenger>,
        sessions: Arc<MemorySessionStore>,
    }

    fn sender(id: i64) -> Sender {
        Sender {
            id,
            username: Some(format!("user{id}")),
            first_name: format!("User {id}"),
            last_name: None,
        }
    }

    fn harness_with_gate(gate: AdmissionGate) -> Harness {
        let storage = Arc::new(MemoryStorage::with_default_categories());
        let messenger = Arc::new(RecordingMessenger::default());
        let sessions = Arc::new(MemorySessionStore::new());
        let search = Arc::new(SimilaritySearch::new(
            storage.clone(),
            Box::new(HashEmbedder::default()),
        ));
        let handler = BotHandler::new(
            storage.clone(),
            search,
            sessions.clone(),
            messenger.clone(),
            gate,
            "testbot".to_string(),
            SearchConfig::default(),
        );
        Harness {
            handler,
            storage,
            messenger,
            sessions,
        }
    }

    fn harness() -> Harness {
        harness_with_gate(AdmissionGate::new(10_000, Duration::from_millis(1)))
    }

    impl Harness {
        async fn text(&self, user: i64, text: &str) {
            self.handler
                .handle_message(IncomingMessage {
                    chat_id: user,
                    sender: sender(user),
                    text: text.to_string(),
                })
                .await;
        }

        async fn press(&self, user: i64, data: &str) {
            self.handler
                .handle_callback(IncomingCallback {
                    chat_id: user,
                    message_id: Some(42),
                    sender: sender(user),
                    data: data.to_string(),
                })
                .await;
        }

        async fn step(&self, user: i64) -> Option<Step> {
            self.sessions.get(user).await.map(|state| state.step)
        }
    }

    #[tokio::test]
    async fn test_first_message_gets_welcome_and_menu() {
        let h = harness();
        h.text(1, "hello").await;

        let sent = h.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].reply.text.contains("Welcome to the Expense Tracker Bot"));
        assert_eq!(sent[0].reply.keyboard, Some(Keyboard::MainMenu));
        assert_eq!(h.step(1).await, Some(Step::Start));
        assert_eq!(h.handler.metrics().active_users, 1);
        assert_eq!(h.handler.metrics().message_count, 1);
    }

    #[tokio::test]
    async fn test_add_plain_expense() {
        let h = harness();
        h.text(1, "/add").await;
        assert_eq!(h.messenger.last_text(), PROMPT_GROUP);

        h.press(1, "group_Daily Living").await;
        assert_eq!(
            h.messenger.last_text(),
            "Select a category from Daily Living:"
        );
        // Category buttons replace the group picker in place
        assert_eq!(h.messenger.sent().last().unwrap().message_id, Some(42));

        h.press(1, "category_Grocery").await;
        assert!(h.messenger.last_text().ends_with(PROMPT_TOTAL));

        h.text(1, "250").await;
        assert_eq!(h.messenger.last_text(), PROMPT_NOTES);

        h.text(1, "weekly veggies").await;
        assert_eq!(h.messenger.last_text(), "✅ Expense added successfully!");

        let expenses = h.storage.expenses();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].category.name, "Grocery");
        assert_eq!(expenses[0].total_price, 250.0);
        assert_eq!(expenses[0].notes, "weekly veggies");
        assert_eq!(expenses[0].vehicle_type, None);
        assert_eq!(h.step(1).await, None);

        let metrics = h.handler.metrics();
        assert_eq!(metrics.expense_count, 1);
        assert_eq!(metrics.command_count, 1);
    }

    #[tokio::test]
    async fn test_add_petrol_expense() {
        let h = harness();
        h.text(5, "/add").await;
        h.press(5, "group_Vehicle").await;
        h.press(5, "category_Petrol").await;
        assert!(h.messenger.last_text().ends_with("Select vehicle type:"));

        h.press(5, "vehicle_CAR").await;
        assert!(h.messenger.last_text().ends_with(PROMPT_ODOMETER));

        h.text(5, "50000").await;
        h.text(5, "96.72").await;
        h.text(5, "1000").await;
        assert_eq!(h.messenger.last_text(), PROMPT_NOTES);

        h.text(5, "fuel").await;
        assert_eq!(h.messenger.last_text(), "✅ Expense added successfully!");

        let expenses = h.storage.expenses();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].vehicle_type, Some(VehicleType::Car));
        assert_eq!(expenses[0].odometer, 50000.0);
        assert_eq!(expenses[0].petrol_price, 96.72);
        assert_eq!(expenses[0].total_price, 1000.0);
        assert_eq!(expenses[0].notes, "fuel");
        assert_eq!(h.step(5).await, None);
    }

    #[tokio::test]
    async fn test_invalid_number_keeps_step() {
        let h = harness();
        h.text(1, "/add").await;
        h.press(1, "group_Daily Living").await;
        h.press(1, "category_Dining").await;

        h.text(1, "abc").await;
        assert_eq!(
            h.messenger.last_text(),
            "Please enter a valid number for the total price."
        );
        h.text(1, "0").await;
        assert_eq!(
            h.messenger.last_text(),
            "The total price must be greater than zero."
        );

        assert!(matches!(
            h.step(1).await,
            Some(Step::Add {
                step: AddStep::TotalPrice,
                ..
            })
        ));
        assert!(h.storage.expenses().is_empty());
    }

    #[tokio::test]
    async fn test_menu_label_escapes_numeric_step() {
        let h = harness();
        h.text(1, "/add").await;
        h.press(1, "group_Daily Living").await;
        h.press(1, "category_Grocery").await;

        h.text(1, MENU_LIST).await;
        assert_eq!(h.messenger.last_text(), "No expenses found.");
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let h = harness();
        h.text(1, "/frobnicate").await;
        assert_eq!(h.messenger.last_text(), UNKNOWN_COMMAND);
    }

    #[tokio::test]
    async fn test_cancel_clears_conversation() {
        let h = harness();
        h.text(1, "/add").await;
        h.press(1, "group_Vehicle").await;

        h.text(1, "/cancel").await;
        let last = h.messenger.sent().pop().unwrap();
        assert_eq!(last.reply.text, "Operation cancelled.");
        assert_eq!(last.reply.keyboard, Some(Keyboard::MainMenu));
        assert_eq!(h.step(1).await, None);
    }

    #[tokio::test]
    async fn test_edit_total_and_save() {
        let h = harness();
        let expense = h.storage.seed_expense(7, "Grocery", 100.0, "milk");

        h.text(7, "/edit").await;
        assert_eq!(h.messenger.last_text(), "Select an expense to edit:");

        h.press(7, &format!("edit_{}", expense.id)).await;
        assert!(h.messenger.last_text().starts_with("Editing expense:"));

        h.press(7, "edit_field_total").await;
        h.text(7, "150").await;
        assert!(matches!(
            h.step(7).await,
            Some(Step::Edit {
                step: EditStep::Menu,
                ..
            })
        ));

        h.press(7, "edit_save").await;
        assert_eq!(h.messenger.last_text(), "✅ Expense updated successfully!");

        let stored = h.storage.expenses();
        assert_eq!(stored[0].total_price, 150.0);
        assert_eq!(stored[0].notes, "milk");
        assert_eq!(h.step(7).await, None);
    }

    #[tokio::test]
    async fn test_delete_after_confirmation() {
        let h = harness();
        let expense = h.storage.seed_expense(3, "Dining", 80.0, "");

        h.text(3, "/delete").await;
        h.press(3, &format!("delete_{}", expense.id)).await;
        assert!(h
            .messenger
            .last_text()
            .starts_with("Are you sure you want to delete this expense?"));

        h.press(3, "confirm_delete").await;
        assert_eq!(h.messenger.last_text(), "✅ Expense deleted successfully!");
        assert!(h.storage.expenses().is_empty());
    }

    #[tokio::test]
    async fn test_delete_declined() {
        let h = harness();
        let expense = h.storage.seed_expense(3, "Dining", 80.0, "");

        h.press(3, &format!("delete_{}", expense.id)).await;
        h.press(3, "confirm_no").await;
        assert_eq!(h.messenger.last_text(), "Operation cancelled.");
        assert_eq!(h.storage.expenses().len(), 1);
    }

    #[tokio::test]
    async fn test_cannot_touch_other_users_expense() {
        let h = harness();
        let theirs = h.storage.seed_expense(1, "Grocery", 10.0, "");
        h.storage.seed_expense(2, "Dining", 20.0, "");

        h.press(2, &format!("delete_{}", theirs.id)).await;
        assert_eq!(h.messenger.last_text(), NOT_YOUR_EXPENSE);

        h.press(2, &format!("edit_{}", theirs.id)).await;
        assert_eq!(h.messenger.last_text(), NOT_YOUR_EXPENSE);
        assert_eq!(h.storage.expenses().len(), 2);
    }

    #[tokio::test]
    async fn test_unregistered_user_cannot_open_expense() {
        let h = harness();
        let theirs = h.storage.seed_expense(1, "Grocery", 10.0, "");

        h.press(9, &format!("edit_{}", theirs.id)).await;
        assert_eq!(h.messenger.last_text(), NO_USER_RECORD);
    }

    #[tokio::test]
    async fn test_missing_expense() {
        let h = harness();
        h.press(1, "edit_999").await;
        assert_eq!(h.messenger.last_text(), EXPENSE_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_callbacks() {
        let h = harness();
        h.press(1, "bogus").await;
        assert_eq!(h.messenger.last_text(), "Invalid selection. Please try again.");

        h.press(1, "edit_field_colour").await;
        assert_eq!(h.messenger.last_text(), "Invalid edit field selection.");

        h.press(1, "vehicle_TRUCK").await;
        assert_eq!(h.messenger.last_text(), "Invalid vehicle type.");
    }

    #[tokio::test]
    async fn test_unknown_category() {
        let h = harness();
        h.text(1, "/add").await;
        h.press(1, "category_Spaceship").await;
        assert_eq!(h.messenger.last_text(), CATEGORY_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_group() {
        let h = harness();
        h.press(1, "group_Travel").await;
        assert_eq!(
            h.messenger.last_text(),
            "No categories found in this group."
        );
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_draft() {
        let h = harness();
        h.text(1, "/add").await;
        h.press(1, "group_Daily Living").await;
        h.press(1, "category_Grocery").await;
        h.text(1, "99").await;

        h.storage.set_fail_writes(true);
        h.text(1, "rice").await;
        assert_eq!(h.messenger.last_text(), GENERIC_ERROR);
        assert!(matches!(
            h.step(1).await,
            Some(Step::Add {
                step: AddStep::Notes,
                ..
            })
        ));
        assert_eq!(h.handler.metrics().error_count, 1);

        h.storage.set_fail_writes(false);
        h.text(1, "rice").await;
        assert_eq!(h.messenger.last_text(), "✅ Expense added successfully!");
        assert_eq!(h.storage.expenses().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_can_be_confirmed_again() {
        let h = harness();
        let expense = h.storage.seed_expense(3, "Dining", 80.0, "");
        h.text(3, "/delete").await;
        h.press(3, &format!("delete_{}", expense.id)).await;

        h.storage.set_fail_writes(true);
        h.press(3, "confirm_delete").await;
        assert_eq!(h.messenger.last_text(), GENERIC_ERROR);
        assert!(matches!(h.step(3).await, Some(Step::Delete { .. })));

        h.storage.set_fail_writes(false);
        h.press(3, "confirm_delete").await;
        assert_eq!(h.messenger.last_text(), "✅ Expense deleted successfully!");
        assert!(h.storage.expenses().is_empty());
    }

    #[tokio::test]
    async fn test_failed_edit_save_returns_to_menu() {
        let h = harness();
        let expense = h.storage.seed_expense(7, "Grocery", 100.0, "milk");
        h.text(7, "/edit").await;
        h.press(7, &format!("edit_{}", expense.id)).await;
        h.press(7, "edit_field_total").await;
        h.text(7, "150").await;

        h.storage.set_fail_writes(true);
        h.press(7, "edit_save").await;
        assert_eq!(h.messenger.last_text(), GENERIC_ERROR);
        match h.step(7).await {
            Some(Step::Edit { step, draft }) => {
                assert_eq!(step, EditStep::Menu);
                assert_eq!(draft.total_price, 150.0);
            }
            other => panic!("expected edit menu, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_user_double_submit_saves_once() {
        let h = harness();
        h.text(5, "/add").await;
        h.press(5, "group_Daily Living").await;
        h.press(5, "category_Grocery").await;
        h.text(5, "99").await;

        h.storage.set_write_delay(Duration::from_millis(20));
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let handler = h.handler.clone();
                tokio::spawn(async move {
                    handler
                        .handle_message(IncomingMessage {
                            chat_id: 5,
                            sender: sender(5),
                            text: "rice".to_string(),
                        })
                        .await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(h.storage.expenses().len(), 1);
        assert_eq!(h.handler.metrics().expense_count, 1);
        assert_eq!(h.step(5).await, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_double_delete_confirmation_deletes_once() {
        let h = harness();
        let expense = h.storage.seed_expense(3, "Dining", 80.0, "");
        h.text(3, "/delete").await;
        h.press(3, &format!("delete_{}", expense.id)).await;

        h.storage.set_write_delay(Duration::from_millis(20));
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let handler = h.handler.clone();
                tokio::spawn(async move {
                    handler
                        .handle_callback(IncomingCallback {
                            chat_id: 3,
                            message_id: Some(42),
                            sender: sender(3),
                            data: "confirm_delete".to_string(),
                        })
                        .await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let texts = h.messenger.texts();
        let deleted = texts
            .iter()
            .filter(|t| *t == "✅ Expense deleted successfully!")
            .count();
        assert_eq!(deleted, 1);
        assert!(!texts.iter().any(|t| t == EXPENSE_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_search_needs_expenses() {
        let h = harness();
        h.text(1, "/search").await;
        assert!(h
            .messenger
            .last_text()
            .starts_with("You don't have any expenses yet."));
    }

    #[tokio::test]
    async fn test_search_flow() {
        let h = harness();
        h.storage.seed_expense(4, "Petrol", 1500.0, "fuel refill on highway");
        h.storage.seed_expense(4, "Dining", 300.0, "birthday dinner");

        h.text(4, "/search").await;
        assert_eq!(h.step(4).await, Some(Step::Search));

        h.text(4, "   ").await;
        assert_eq!(h.messenger.last_text(), "Please enter a search query.");

        // Single letters carry no searchable tokens
        h.text(4, "a b").await;
        assert!(h.messenger.last_text().starts_with("No expenses found matching"));
        assert_eq!(h.step(4).await, Some(Step::Search));

        h.text(4, "fuel").await;
        let text = h.messenger.last_text();
        assert!(text.starts_with("🔍 Search Results for"));
        assert!(text.contains("fuel refill on highway"));
        assert_eq!(h.step(4).await, Some(Step::Idle));
    }

    #[tokio::test]
    async fn test_list_and_report() {
        let h = harness();
        h.storage.seed_expense(1, "Grocery", 120.0, "");
        h.storage.seed_expense(1, "Dining", 80.0, "");

        h.text(1, "/list").await;
        assert!(h.messenger.last_text().starts_with("Your expenses:"));

        h.text(1, "📊 Reports").await;
        assert!(h.messenger.last_text().contains("₹200.00"));
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_burst() {
        let h = harness_with_gate(AdmissionGate::new(10, Duration::from_secs(3600)));
        for _ in 0..11 {
            h.text(1, "hello").await;
        }

        let texts = h.messenger.texts();
        assert_eq!(texts.len(), 11);
        assert_eq!(texts[10], RATE_LIMITED);
        assert!(texts[..10].iter().all(|t| t != RATE_LIMITED));

        let metrics = h.handler.metrics();
        assert_eq!(metrics.message_count, 11);
        assert_eq!(metrics.error_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_users_keep_separate_drafts() {
        let h = harness();
        let mut tasks = Vec::new();
        for user in 100..120i64 {
            let handler = h.handler.clone();
            tasks.push(tokio::spawn(async move {
                let text = |t: &str| IncomingMessage {
                    chat_id: user,
                    sender: sender(user),
                    text: t.to_string(),
                };
                let press = |d: &str| IncomingCallback {
                    chat_id: user,
                    message_id: Some(1),
                    sender: sender(user),
                    data: d.to_string(),
                };
                handler.handle_message(text("/add")).await;
                handler.handle_callback(press("group_Daily Living")).await;
                handler.handle_callback(press("category_Grocery")).await;
                handler.handle_message(text(&user.to_string())).await;
                handler.handle_message(text(&format!("note {user}"))).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let expenses = h.storage.expenses();
        assert_eq!(expenses.len(), 20);
        for expense in &expenses {
            let owner = expense.total_price as i64;
            assert_eq!(expense.notes, format!("note {owner}"));
        }
        assert_eq!(h.handler.metrics().active_users, 20);
    }
}
