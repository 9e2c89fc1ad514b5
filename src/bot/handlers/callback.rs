use tracing::debug;

use crate::bot::callback::CallbackData;
use crate::bot::handler::{BotHandler, Ctx};
use crate::bot::keyboard::{Keyboard, Reply};
use crate::bot::machine::{self, SelectionAction, PROMPT_GROUP};

use super::expense::CANCELLED;

const NO_CATEGORIES: &str = "No categories found in this group.";
const EDIT_CANCELLED: &str = "❌ Edit cancelled.";

impl BotHandler {
    pub(crate) async fn route_callback(&self, ctx: &Ctx, data: CallbackData) {
        let user_id = ctx.user_id();
        match data {
            CallbackData::Group(group) => self.show_group(ctx, &group).await,
            CallbackData::Category(name) => {
                let Some(category) = self.resolve_category(ctx, &name).await else {
                    return;
                };
                let reaction = self
                    .transition(user_id, |state| {
                        machine::select_category(state, user_id, &category)
                    })
                    .await;
                self.react(ctx, reaction).await;
            }
            CallbackData::Vehicle(vehicle) => {
                let reaction = self
                    .transition(user_id, |state| machine::select_vehicle(state, vehicle))
                    .await;
                self.react(ctx, reaction).await;
            }
            CallbackData::BackToGroups => {
                self.deliver(
                    ctx,
                    Reply::edit(PROMPT_GROUP, Some(Keyboard::category_groups())),
                )
                .await;
            }
            CallbackData::BackToMain => {
                self.deliver(ctx, Reply::main_menu("Main menu:")).await;
            }
            CallbackData::Edit(id) => self.open_expense(ctx, id, SelectionAction::Edit).await,
            CallbackData::Delete(id) => {
                self.open_expense(ctx, id, SelectionAction::Delete).await
            }
            CallbackData::EditField(field) => {
                let reaction = self
                    .transition(user_id, |state| machine::choose_edit_field(state, field))
                    .await;
                self.react(ctx, reaction).await;
            }
            CallbackData::EditVehicle(vehicle) => {
                let reaction = self
                    .transition(user_id, |state| machine::edit_vehicle(state, vehicle))
                    .await;
                self.react(ctx, reaction).await;
            }
            CallbackData::EditSave => {
                let reaction = self.transition(user_id, machine::save_edit).await;
                self.react(ctx, reaction).await;
            }
            CallbackData::EditCancel => {
                self.sessions.delete(user_id).await;
                self.deliver(ctx, Reply::edit(EDIT_CANCELLED, None)).await;
            }
            CallbackData::ConfirmDelete => {
                let reaction = self.transition(user_id, machine::confirm_delete).await;
                self.react(ctx, reaction).await;
            }
            CallbackData::ConfirmNo => {
                self.sessions.delete(user_id).await;
                self.deliver(ctx, Reply::edit(CANCELLED, None)).await;
            }
        }
    }

    async fn show_group(&self, ctx: &Ctx, group: &str) {
        let categories = match self.storage.get_categories_by_group(group).await {
            Ok(categories) => categories,
            Err(e) => return self.report_failure(ctx, "load categories", e).await,
        };
        if categories.is_empty() {
            debug!("Group {:?} has no categories", group);
            return self.deliver(ctx, Reply::text(NO_CATEGORIES)).await;
        }

        let text = format!("Select a category from {group}:");
        self.deliver(ctx, Reply::edit(text, Some(Keyboard::categories(&categories))))
            .await;
    }
}
