use tracing::info;

use crate::bot::handler::{BotHandler, Ctx};
use crate::bot::keyboard::Reply;
use crate::bot::machine;
use crate::utils::report::build_search_results;

const NOTHING_TO_SEARCH: &str =
    "You don't have any expenses yet. Add some expenses first to use semantic search.";

impl BotHandler {
    pub(crate) async fn handle_search_command(&self, ctx: &Ctx) {
        match self
            .storage
            .get_expenses_by_telegram_id(ctx.user_id(), 1, 0)
            .await
        {
            Ok(expenses) if expenses.is_empty() => {
                self.deliver(ctx, Reply::text(NOTHING_TO_SEARCH)).await;
            }
            Ok(_) => {
                let reaction = self.transition(ctx.user_id(), machine::begin_search).await;
                self.react(ctx, reaction).await;
            }
            Err(e) => self.report_failure(ctx, "check expenses", e).await,
        }
    }

    /// Run a query typed in the search step. The step is left only once
    /// something matched, so the user can rephrase.
    pub(crate) async fn run_search(&self, ctx: &Ctx, query: String) {
        let hits = match self
            .search
            .search_by_query(
                ctx.user_id(),
                &query,
                self.search_config.threshold,
                self.search_config.limit,
            )
            .await
        {
            Ok(hits) => hits,
            Err(e) => return self.report_failure(ctx, "search expenses", e).await,
        };

        info!(
            "Search by user {} for {:?} returned {} hits",
            ctx.user_id(),
            query,
            hits.len()
        );
        if !hits.is_empty() {
            self.sessions
                .update(ctx.user_id(), Box::new(machine::finish_search))
                .await;
        }
        self.deliver(ctx, Reply::text(build_search_results(&query, &hits)))
            .await;
    }
}
