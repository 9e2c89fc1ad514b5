use teloxide::utils::command::BotCommands;
use tracing::info;

use crate::bot::commands::Command;
use crate::bot::handler::{BotHandler, Ctx};
use crate::bot::keyboard::Reply;
use crate::storage::Expense;
use crate::utils::report::{build_dashboard, build_expense_list, build_report};

pub(crate) const WELCOME: &str = "Welcome to the Expense Tracker Bot! 🚗💰\n\n\
    I can help you track your expenses. Here's what you can do:\n\n\
    📝 Add Expense - Add a new expense\n\
    📋 List Expenses - View all expenses\n\
    ✏️ Edit Expense - Modify existing expenses\n\
    🗑️ Delete Expense - Remove expenses\n\
    📊 Reports - Generate expense reports\n\
    📈 Dashboard - View expense dashboard\n\n\
    You can also use commands like /add, /list, /report, etc.\n\n\
    Let's get started! Use the buttons below or type /add to record your first expense.";

const GUIDE: &str = "To add an expense:\n\
    1. Use /add\n\
    2. Select a category group and category\n\
    3. For vehicle categories, pick the vehicle type\n\
    4. For petrol, enter the odometer reading and price per liter\n\
    5. Enter the total price\n\
    6. Add optional notes\n\n\
    To edit or delete an expense:\n\
    1. Use /edit or /delete\n\
    2. Select the expense from the list\n\
    3. Follow the prompts\n\n\
    To search expenses:\n\
    1. Use /search\n\
    2. Enter a natural language query\n\
    3. View matching expenses";

/// Expenses loaded for the list and report views.
const HISTORY_LIMIT: u64 = 100;
/// Expenses loaded for the dashboard.
const DASHBOARD_LIMIT: u64 = 10;

impl BotHandler {
    pub(crate) async fn send_welcome(&self, ctx: &Ctx) {
        self.deliver(ctx, Reply::main_menu(WELCOME)).await;
    }

    pub(crate) async fn handle_help(&self, ctx: &Ctx) {
        let text = format!("{}\n\n{}", Command::descriptions(), GUIDE);
        self.deliver(ctx, Reply::text(text)).await;
    }

    pub(crate) async fn handle_list(&self, ctx: &Ctx) {
        if let Some(text) = self.render_history(ctx, HISTORY_LIMIT, build_expense_list).await {
            self.deliver(ctx, Reply::text(text)).await;
        }
    }

    pub(crate) async fn handle_report(&self, ctx: &Ctx) {
        if let Some(text) = self.render_history(ctx, HISTORY_LIMIT, build_report).await {
            self.deliver(ctx, Reply::text(text)).await;
        }
    }

    pub(crate) async fn handle_dashboard(&self, ctx: &Ctx) {
        if let Some(text) = self.render_history(ctx, DASHBOARD_LIMIT, build_dashboard).await {
            self.deliver(ctx, Reply::text(text)).await;
        }
    }

    /// Load the user's most recent expenses and render them.
    /// Returns `None` after reporting a storage failure.
    async fn render_history(
        &self,
        ctx: &Ctx,
        limit: u64,
        render: fn(&[Expense]) -> String,
    ) -> Option<String> {
        match self
            .storage
            .get_expenses_by_telegram_id(ctx.user_id(), limit, 0)
            .await
        {
            Ok(expenses) => {
                info!(
                    "Rendering {} expenses for user {}",
                    expenses.len(),
                    ctx.user_id()
                );
                Some(render(&expenses))
            }
            Err(e) => {
                self.report_failure(ctx, "load expenses", e).await;
                None
            }
        }
    }
}
