//! Conversation transitions.
//!
//! Every function here takes the user's state by `&mut`, changes it in place
//! and says what the engine should do next. Nothing in this module performs
//! I/O, so each call runs under the session store's lock.

use chrono::Utc;
use std::fmt::Write;

use super::callback::EditField;
use super::keyboard::{Keyboard, Reply};
use crate::session::{AddStep, EditStep, ExpenseDraft, Step, UserState};
use crate::storage::{Category, Expense, VehicleType};
use crate::utils::format::{format_amount, format_date};
use crate::utils::validation::{parse_number, validate_notes, NumericField};

/// Typed instead of a note to leave the notes empty.
pub const SKIP: &str = "/skip";
/// Expenses offered for edit or delete.
pub const MAX_SELECTION: usize = 10;

pub const PROMPT_GROUP: &str = "Select a category group:";
pub const PROMPT_ODOMETER: &str = "🔢 Please enter the odometer reading (in km):";
pub const PROMPT_PETROL: &str = "⛽ Please enter the petrol price per liter:";
pub const PROMPT_TOTAL: &str = "💰 Please enter the total price:";
pub const PROMPT_NOTES: &str = "📝 Add any notes (or send /skip to skip):";
pub const USE_BUTTONS: &str = "Please use one of the available commands or buttons.";
pub const SEARCH_EMPTY_QUERY: &str = "Please enter a search query.";
pub const SEARCH_INSTRUCTIONS: &str = "🔍 Semantic Search\n\n\
    You can search for expenses using natural language. Examples:\n\
    • Find all fuel expenses from last month\n\
    • Show me expensive car repairs\n\
    • Find expenses related to maintenance\n\n\
    Type your search query:";
const NOT_EDITING: &str = "No expense is being edited. Use /edit to pick one.";
const NOT_ADDING: &str = "Please select a category first. Use /add to start.";
const NO_VEHICLE_FIELD: &str = "This category has no vehicle type.";
pub const STILL_SAVING: &str = "⏳ Still saving your last change, please wait.";

/// What the engine does after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    Reply(Reply),
    /// Greet the user and show the main menu.
    Welcome,
    /// Save a finished add draft.
    Persist(ExpenseDraft),
    /// Write an edited draft back over the stored expense.
    SaveEdit(ExpenseDraft),
    /// Soft-delete the confirmed expense.
    Remove(Expense),
    /// Run a search for the query.
    Search(String),
}

fn reply(text: impl Into<String>) -> Reaction {
    Reaction::Reply(Reply::text(text))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionAction {
    Edit,
    Delete,
}

impl SelectionAction {
    fn prefix(&self) -> &'static str {
        match self {
            SelectionAction::Edit => "edit",
            SelectionAction::Delete => "delete",
        }
    }

    fn prompt(&self) -> &'static str {
        match self {
            SelectionAction::Edit => "Select an expense to edit:",
            SelectionAction::Delete => "Select an expense to delete:",
        }
    }

    pub fn empty_message(&self) -> &'static str {
        match self {
            SelectionAction::Edit => "No expenses found to edit.",
            SelectionAction::Delete => "No expenses found to delete.",
        }
    }
}

pub fn vehicle_label(vehicle: VehicleType) -> &'static str {
    match vehicle {
        VehicleType::Car => "🚗 Car",
        VehicleType::Bike => "🏍️ Bike",
    }
}

/// Multi-line summary of a draft followed by the edit prompt.
pub fn describe_draft(title: &str, draft: &ExpenseDraft) -> String {
    let mut text = format!(
        "{}:\n{} - {} {}: {}\n",
        title,
        format_date(&draft.timestamp),
        draft.category_emoji,
        draft.category_name,
        format_amount(draft.total_price)
    );
    if let (true, Some(vehicle)) = (draft.is_vehicle, draft.vehicle_type) {
        let _ = writeln!(text, "Vehicle: {}", vehicle_label(vehicle));
    }
    if draft.odometer > 0.0 {
        let _ = writeln!(text, "Odometer: {:.1} km", draft.odometer);
    }
    if draft.petrol_price > 0.0 {
        let _ = writeln!(text, "Petrol price: {}/L", format_amount(draft.petrol_price));
    }
    if !draft.notes.is_empty() {
        let _ = writeln!(text, "Notes: {}", draft.notes);
    }
    text.push_str("\nSelect what to edit:");
    text
}

/// Free text (and `/skip` in the notes steps). Menu labels never get here.
pub fn on_text(state: &mut UserState, text: &str) -> Reaction {
    if matches!(state.step, Step::Start | Step::Idle) {
        state.step = Step::Start;
        return Reaction::Welcome;
    }

    match &mut state.step {
        Step::Search => {
            let query = text.trim();
            if query.is_empty() {
                reply(SEARCH_EMPTY_QUERY)
            } else {
                Reaction::Search(query.to_string())
            }
        }
        Step::Add { step, draft } => {
            let reaction = add_text(step, draft, text);
            if matches!(reaction, Reaction::Persist(_)) {
                state.step = Step::Saving;
            }
            reaction
        }
        Step::Edit { step, draft } => edit_text(step, draft, text),
        Step::Saving => reply(STILL_SAVING),
        Step::Delete { .. } | Step::Start | Step::Idle => reply(USE_BUTTONS),
    }
}

fn read_notes(text: &str) -> Result<String, Reaction> {
    if text.trim() == SKIP {
        return Ok(String::new());
    }
    validate_notes(text).map_err(|e| reply(e.to_string()))
}

fn add_text(step: &mut AddStep, draft: &mut ExpenseDraft, text: &str) -> Reaction {
    match *step {
        AddStep::Odometer => match parse_number(NumericField::Odometer, text) {
            Ok(value) => {
                draft.odometer = value;
                *step = AddStep::PetrolPrice;
                reply(PROMPT_PETROL)
            }
            Err(e) => reply(e.to_string()),
        },
        AddStep::PetrolPrice => match parse_number(NumericField::PetrolPrice, text) {
            Ok(value) => {
                draft.petrol_price = value;
                *step = AddStep::TotalPrice;
                reply(PROMPT_TOTAL)
            }
            Err(e) => reply(e.to_string()),
        },
        AddStep::TotalPrice => match parse_number(NumericField::TotalPrice, text) {
            Ok(value) => {
                draft.total_price = value;
                *step = AddStep::Notes;
                reply(PROMPT_NOTES)
            }
            Err(e) => reply(e.to_string()),
        },
        AddStep::Notes => match read_notes(text) {
            Ok(notes) => {
                draft.notes = notes;
                draft.timestamp = Utc::now();
                Reaction::Persist(draft.clone())
            }
            Err(reaction) => reaction,
        },
        AddStep::Category | AddStep::VehicleType => reply(USE_BUTTONS),
    }
}

fn edit_text(step: &mut EditStep, draft: &mut ExpenseDraft, text: &str) -> Reaction {
    let result = match *step {
        EditStep::Odometer => parse_number(NumericField::Odometer, text)
            .map(|v| draft.odometer = v)
            .map_err(|e| reply(e.to_string())),
        EditStep::PetrolPrice => parse_number(NumericField::PetrolPrice, text)
            .map(|v| draft.petrol_price = v)
            .map_err(|e| reply(e.to_string())),
        EditStep::TotalPrice => parse_number(NumericField::TotalPrice, text)
            .map(|v| draft.total_price = v)
            .map_err(|e| reply(e.to_string())),
        EditStep::Notes => read_notes(text).map(|notes| draft.notes = notes),
        EditStep::Menu | EditStep::Category | EditStep::VehicleType => {
            return reply(USE_BUTTONS)
        }
    };

    match result {
        Ok(()) => {
            *step = EditStep::Menu;
            Reaction::Reply(Reply::with_keyboard(
                describe_draft("Updated expense", draft),
                Keyboard::edit_fields(),
            ))
        }
        Err(reaction) => reaction,
    }
}

pub fn begin_add(state: &mut UserState, user_id: i64) -> Reaction {
    state.step = Step::Add {
        step: AddStep::Category,
        draft: ExpenseDraft::new(user_id),
    };
    Reaction::Reply(Reply::with_keyboard(PROMPT_GROUP, Keyboard::category_groups()))
}

/// In the edit flow this replaces the category; otherwise it starts a new draft.
pub fn select_category(state: &mut UserState, user_id: i64, category: &Category) -> Reaction {
    if let Step::Edit { step, draft } = &mut state.step {
        draft.category_name = category.name.clone();
        draft.category_emoji = category.emoji.clone();
        draft.is_vehicle = category.is_vehicle();
        if !draft.is_vehicle {
            draft.vehicle_type = None;
        }
        *step = EditStep::Menu;
        return Reaction::Reply(Reply::edit(
            describe_draft("Updated expense", draft),
            Some(Keyboard::edit_fields()),
        ));
    }

    let mut draft = ExpenseDraft::new(user_id);
    draft.category_name = category.name.clone();
    draft.category_emoji = category.emoji.clone();
    draft.is_vehicle = category.is_vehicle();

    let selected = format!("Selected category: {}", category.label());
    if draft.is_vehicle {
        state.step = Step::Add {
            step: AddStep::VehicleType,
            draft,
        };
        Reaction::Reply(Reply::edit(
            format!("{selected}\nSelect vehicle type:"),
            Some(Keyboard::vehicle_types("vehicle_")),
        ))
    } else {
        state.step = Step::Add {
            step: AddStep::TotalPrice,
            draft,
        };
        Reaction::Reply(Reply::edit(format!("{selected}\n{PROMPT_TOTAL}"), None))
    }
}

pub fn select_vehicle(state: &mut UserState, vehicle: VehicleType) -> Reaction {
    let Step::Add { step, draft } = &mut state.step else {
        return reply(NOT_ADDING);
    };
    if *step != AddStep::VehicleType {
        return reply(USE_BUTTONS);
    }

    draft.vehicle_type = Some(vehicle);
    let (next, prompt) = if draft.is_petrol() {
        (AddStep::Odometer, PROMPT_ODOMETER)
    } else {
        (AddStep::TotalPrice, PROMPT_TOTAL)
    };
    *step = next;
    Reaction::Reply(Reply::edit(
        format!("Selected vehicle: {}\n{}", vehicle_label(vehicle), prompt),
        None,
    ))
}

pub fn begin_edit(state: &mut UserState, expense: &Expense, user_id: i64) -> Reaction {
    let draft = ExpenseDraft::from_expense(expense, user_id);
    let text = describe_draft("Editing expense", &draft);
    state.step = Step::Edit {
        step: EditStep::Menu,
        draft,
    };
    Reaction::Reply(Reply::edit(text, Some(Keyboard::edit_fields())))
}

pub fn choose_edit_field(state: &mut UserState, field: EditField) -> Reaction {
    let Step::Edit { step, draft } = &mut state.step else {
        return reply(NOT_EDITING);
    };

    let (next, response) = match field {
        EditField::Category => (
            EditStep::Category,
            Reply::edit("Select new category group:", Some(Keyboard::category_groups())),
        ),
        EditField::Vehicle => {
            if !draft.is_vehicle {
                return reply(NO_VEHICLE_FIELD);
            }
            (
                EditStep::VehicleType,
                Reply::edit(
                    "Select new vehicle type:",
                    Some(Keyboard::vehicle_types("edit_vehicle_")),
                ),
            )
        }
        EditField::Odometer => (
            EditStep::Odometer,
            Reply::text("🔢 Enter new odometer reading (in km):"),
        ),
        EditField::PetrolPrice => (
            EditStep::PetrolPrice,
            Reply::text("⛽ Enter new petrol price per liter:"),
        ),
        EditField::TotalPrice => (EditStep::TotalPrice, Reply::text("💰 Enter new total price:")),
        EditField::Notes => (
            EditStep::Notes,
            Reply::text("📝 Enter new notes (or send /skip to clear):"),
        ),
    };

    *step = next;
    Reaction::Reply(response)
}

pub fn edit_vehicle(state: &mut UserState, vehicle: VehicleType) -> Reaction {
    let Step::Edit { step, draft } = &mut state.step else {
        return reply(NOT_EDITING);
    };
    draft.vehicle_type = Some(vehicle);
    *step = EditStep::Menu;
    Reaction::Reply(Reply::edit(
        describe_draft("Updated expense", draft),
        Some(Keyboard::edit_fields()),
    ))
}

/// Claims the draft: the step moves to [`Step::Saving`] until the write settles.
pub fn save_edit(state: &mut UserState) -> Reaction {
    match std::mem::take(&mut state.step) {
        Step::Edit { draft, .. } => {
            state.step = Step::Saving;
            Reaction::SaveEdit(draft)
        }
        other => {
            state.step = other;
            reply("No expense to save.")
        }
    }
}

/// Keep a copy of at most [`MAX_SELECTION`] expenses and offer them as buttons.
pub fn present_selection(
    state: &mut UserState,
    expenses: Vec<Expense>,
    action: SelectionAction,
) -> Reaction {
    if expenses.is_empty() {
        return reply(action.empty_message());
    }

    state.expense_selection = expenses.into_iter().take(MAX_SELECTION).collect();
    Reaction::Reply(Reply::with_keyboard(
        action.prompt(),
        Keyboard::expense_selection(&state.expense_selection, action.prefix()),
    ))
}

pub fn begin_delete(state: &mut UserState, expense: &Expense) -> Reaction {
    let text = format!(
        "Are you sure you want to delete this expense?\n\n{} - {}: {}",
        format_date(&expense.timestamp),
        expense.category.label(),
        format_amount(expense.total_price)
    );
    state.step = Step::Delete {
        expense: expense.clone(),
    };
    Reaction::Reply(Reply::edit(text, Some(Keyboard::confirmation())))
}

pub fn confirm_delete(state: &mut UserState) -> Reaction {
    match std::mem::take(&mut state.step) {
        Step::Delete { expense } => {
            state.step = Step::Saving;
            Reaction::Remove(expense)
        }
        other => {
            state.step = other;
            reply("No expense selected for deletion.")
        }
    }
}

/// Puts a claimed step back after a failed write. A no-op once the user has
/// moved on to something else.
pub fn restore(state: &mut UserState, step: Step) {
    if state.step == Step::Saving {
        state.step = step;
    }
}

pub fn begin_search(state: &mut UserState) -> Reaction {
    state.step = Step::Search;
    reply(SEARCH_INSTRUCTIONS)
}

pub fn finish_search(state: &mut UserState) {
    if state.step == Step::Search {
        state.step = Step::Idle;
    }
}
