use tracing::{info, warn};

use crate::bot::handler::{BotHandler, Ctx, CATEGORY_NOT_FOUND, EXPENSE_NOT_FOUND, NO_USER_RECORD};
use crate::bot::keyboard::Reply;
use crate::bot::machine::{self, SelectionAction, MAX_SELECTION};
use crate::session::{AddStep, EditStep, ExpenseDraft, Step, UserState};
use crate::storage::{Category, Expense};

pub(crate) const CANCELLED: &str = "Operation cancelled.";
const EXPENSE_ADDED: &str = "✅ Expense added successfully!";
const EXPENSE_UPDATED: &str = "✅ Expense updated successfully!";
const EXPENSE_DELETED: &str = "✅ Expense deleted successfully!";

impl BotHandler {
    // ------------------------------------------------------------------------
    // Add
    // ------------------------------------------------------------------------

    /// Store a finished draft. On failure the draft goes back into the session
    /// so the user can resend the last value.
    pub(crate) async fn finalize_expense(&self, ctx: &Ctx, draft: ExpenseDraft) {
        if !self.create_from_draft(ctx, &draft).await {
            let step = Step::Add {
                step: AddStep::Notes,
                draft,
            };
            self.restore_step(ctx.user_id(), step).await;
        }
    }

    async fn create_from_draft(&self, ctx: &Ctx, draft: &ExpenseDraft) -> bool {
        let user = match self.ensure_user(&ctx.sender).await {
            Ok(user) => user,
            Err(e) => {
                self.report_failure(ctx, "create user", e).await;
                return false;
            }
        };
        let Some(category) = self.resolve_category(ctx, &draft.category_name).await else {
            return false;
        };

        match self
            .storage
            .create_expense(draft.to_record(user.id, category.id))
            .await
        {
            Ok(expense) => {
                self.sessions.delete(ctx.user_id()).await;
                self.metrics.record_expense();
                info!(
                    "User {} added expense {} ({}: {:.2})",
                    ctx.user_id(),
                    expense.id,
                    category.name,
                    expense.total_price
                );
                self.deliver(ctx, Reply::main_menu(EXPENSE_ADDED)).await;
                true
            }
            Err(e) => {
                self.report_failure(ctx, "create expense", e).await;
                false
            }
        }
    }

    /// Undo the claim a save transition put on the session.
    async fn restore_step(&self, user_id: i64, step: Step) {
        let restore = move |state: &mut UserState| machine::restore(state, step);
        self.sessions.update(user_id, Box::new(restore)).await;
    }

    pub(crate) async fn resolve_category(&self, ctx: &Ctx, name: &str) -> Option<Category> {
        match self.storage.get_category_by_name(name).await {
            Ok(category) => Some(category),
            Err(e) if e.is_not_found() => {
                warn!("User {} picked unknown category {:?}", ctx.user_id(), name);
                self.deliver(ctx, Reply::text(CATEGORY_NOT_FOUND)).await;
                None
            }
            Err(e) => {
                self.report_failure(ctx, "load category", e).await;
                None
            }
        }
    }

    // ------------------------------------------------------------------------
    // Edit / Delete
    // ------------------------------------------------------------------------

    pub(crate) async fn handle_selection(&self, ctx: &Ctx, action: SelectionAction) {
        let expenses = match self
            .storage
            .get_expenses_by_telegram_id(ctx.user_id(), MAX_SELECTION as u64, 0)
            .await
        {
            Ok(expenses) => expenses,
            Err(e) => return self.report_failure(ctx, "load expenses", e).await,
        };

        let reaction = self
            .transition(ctx.user_id(), move |state| {
                machine::present_selection(state, expenses, action)
            })
            .await;
        self.react(ctx, reaction).await;
    }

    /// A pressed `edit_<id>` or `delete_<id>` button.
    pub(crate) async fn open_expense(&self, ctx: &Ctx, id: i64, action: SelectionAction) {
        let expense = match self.storage.get_expense_by_id(id).await {
            Ok(expense) => expense,
            Err(e) if e.is_not_found() => {
                return self.deliver(ctx, Reply::text(EXPENSE_NOT_FOUND)).await;
            }
            Err(e) => return self.report_failure(ctx, "load expense", e).await,
        };
        if self.authorize(ctx, &expense).await.is_none() {
            return;
        }

        let user_id = ctx.user_id();
        let reaction = self
            .transition(user_id, |state| match action {
                SelectionAction::Edit => machine::begin_edit(state, &expense, user_id),
                SelectionAction::Delete => machine::begin_delete(state, &expense),
            })
            .await;
        self.react(ctx, reaction).await;
    }

    pub(crate) async fn save_expense(&self, ctx: &Ctx, draft: ExpenseDraft) {
        if !self.update_from_draft(ctx, &draft).await {
            let step = Step::Edit {
                step: EditStep::Menu,
                draft,
            };
            self.restore_step(ctx.user_id(), step).await;
        }
    }

    async fn update_from_draft(&self, ctx: &Ctx, draft: &ExpenseDraft) -> bool {
        let Some(expense_id) = draft.expense_id else {
            self.deliver(ctx, Reply::text(EXPENSE_NOT_FOUND)).await;
            return false;
        };
        let user = match self.storage.get_user_by_telegram_id(ctx.user_id()).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                self.deliver(ctx, Reply::text(NO_USER_RECORD)).await;
                return false;
            }
            Err(e) => {
                self.report_failure(ctx, "load user", e).await;
                return false;
            }
        };
        let Some(category) = self.resolve_category(ctx, &draft.category_name).await else {
            return false;
        };

        // The owner id in the record scopes the update to the caller's rows.
        match self
            .storage
            .update_expense(expense_id, draft.to_record(user.id, category.id))
            .await
        {
            Ok(_) => {
                self.sessions.delete(ctx.user_id()).await;
                info!("User {} updated expense {}", ctx.user_id(), expense_id);
                self.deliver(ctx, Reply::main_menu(EXPENSE_UPDATED)).await;
                true
            }
            Err(e) if e.is_not_found() => {
                self.deliver(ctx, Reply::text(EXPENSE_NOT_FOUND)).await;
                false
            }
            Err(e) => {
                self.report_failure(ctx, "update expense", e).await;
                false
            }
        }
    }

    pub(crate) async fn remove_expense(&self, ctx: &Ctx, expense: Expense) {
        if !self.delete_confirmed(ctx, &expense).await {
            self.restore_step(ctx.user_id(), Step::Delete { expense }).await;
        }
    }

    async fn delete_confirmed(&self, ctx: &Ctx, expense: &Expense) -> bool {
        let Some(user) = self.authorize(ctx, expense).await else {
            return false;
        };

        match self.storage.delete_expense(expense.id, user.id).await {
            Ok(()) => {
                self.sessions.delete(ctx.user_id()).await;
                info!("User {} deleted expense {}", ctx.user_id(), expense.id);
                self.deliver(ctx, Reply::edit(EXPENSE_DELETED, None)).await;
                true
            }
            Err(e) if e.is_not_found() => {
                self.deliver(ctx, Reply::text(EXPENSE_NOT_FOUND)).await;
                false
            }
            Err(e) => {
                self.report_failure(ctx, "delete expense", e).await;
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Cancel
    // ------------------------------------------------------------------------

    pub(crate) async fn handle_cancel(&self, ctx: &Ctx) {
        self.sessions.delete(ctx.user_id()).await;
        self.deliver(ctx, Reply::main_menu(CANCELLED)).await;
    }
}
