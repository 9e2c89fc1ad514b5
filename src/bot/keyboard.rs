//! Transport-neutral replies and keyboards.
//!
//! Conversation logic builds these values; [`super::messenger`] turns them
//! into Telegram markup.

use crate::storage::{Category, Expense};
use crate::utils::format::{format_amount, format_short_date};

pub const MENU_ADD: &str = "📝 Add Expense";
pub const MENU_LIST: &str = "📋 List Expenses";
pub const MENU_EDIT: &str = "✏️ Edit Expense";
pub const MENU_DELETE: &str = "🗑️ Delete Expense";
pub const MENU_REPORT: &str = "📊 Reports";
pub const MENU_DASHBOARD: &str = "📈 Dashboard";

/// Category groups with the emoji shown on their button.
pub const CATEGORY_GROUPS: &[(&str, &str)] = &[
    ("🚗", "Vehicle"),
    ("🏠", "Home"),
    ("🏪", "Daily Living"),
    ("🎬", "Entertainment"),
    ("🏥", "Health"),
    ("📚", "Education"),
    ("✈️", "Travel"),
    ("💰", "Investments"),
    ("🎁", "Gifts"),
    ("📌", "Other"),
];

/// Text of a main-menu button, sent back verbatim when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    Add,
    List,
    Edit,
    Delete,
    Report,
    Dashboard,
}

impl MenuCommand {
    pub fn from_label(text: &str) -> Option<Self> {
        match text.trim() {
            MENU_ADD => Some(Self::Add),
            MENU_LIST => Some(Self::List),
            MENU_EDIT => Some(Self::Edit),
            MENU_DELETE => Some(Self::Delete),
            MENU_REPORT => Some(Self::Report),
            MENU_DASHBOARD => Some(Self::Dashboard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub data: String,
}

impl Button {
    pub fn new(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Persistent reply keyboard with the menu labels.
    MainMenu,
    /// Buttons attached to the message.
    Inline(Vec<Vec<Button>>),
}

impl Keyboard {
    pub fn is_inline(&self) -> bool {
        matches!(self, Keyboard::Inline(_))
    }

    pub fn main_menu_rows() -> [[&'static str; 2]; 3] {
        [
            [MENU_ADD, MENU_LIST],
            [MENU_EDIT, MENU_DELETE],
            [MENU_REPORT, MENU_DASHBOARD],
        ]
    }

    pub fn category_groups() -> Self {
        let rows = CATEGORY_GROUPS
            .chunks(2)
            .map(|pair| {
                pair.iter()
                    .map(|(emoji, group)| {
                        Button::new(format!("{emoji} {group}"), format!("group_{group}"))
                    })
                    .collect()
            })
            .collect();
        Keyboard::Inline(rows)
    }

    pub fn categories(categories: &[Category]) -> Self {
        let mut rows: Vec<Vec<Button>> = categories
            .chunks(2)
            .map(|pair| {
                pair.iter()
                    .map(|c| Button::new(c.label(), format!("category_{}", c.name)))
                    .collect()
            })
            .collect();
        rows.push(vec![Button::new("⬅️ Back to Groups", "back_to_groups")]);
        Keyboard::Inline(rows)
    }

    /// `prefix` is `vehicle_` while adding and `edit_vehicle_` while editing.
    pub fn vehicle_types(prefix: &str) -> Self {
        Keyboard::Inline(vec![vec![
            Button::new("🚗 Car", format!("{prefix}CAR")),
            Button::new("🏍️ Bike", format!("{prefix}BIKE")),
        ]])
    }

    pub fn confirmation() -> Self {
        Keyboard::Inline(vec![vec![
            Button::new("✅ Yes", "confirm_delete"),
            Button::new("❌ No", "confirm_no"),
        ]])
    }

    /// One button per expense; `action` is `edit` or `delete`.
    pub fn expense_selection(expenses: &[Expense], action: &str) -> Self {
        let mut rows: Vec<Vec<Button>> = expenses
            .iter()
            .map(|e| {
                vec![Button::new(
                    format!(
                        "{} - {}: {}",
                        format_short_date(&e.timestamp),
                        e.category.name,
                        format_amount(e.total_price)
                    ),
                    format!("{action}_{}", e.id),
                )]
            })
            .collect();
        rows.push(vec![Button::new("⬅️ Back to Main Menu", "back_to_main")]);
        Keyboard::Inline(rows)
    }

    pub fn edit_fields() -> Self {
        Keyboard::Inline(vec![
            vec![
                Button::new("🏷️ Category", "edit_field_category"),
                Button::new("🚗 Vehicle Type", "edit_field_vehicle"),
            ],
            vec![
                Button::new("🔢 Odometer", "edit_field_odometer"),
                Button::new("⛽ Petrol Price", "edit_field_petrol"),
            ],
            vec![
                Button::new("💰 Total Price", "edit_field_total"),
                Button::new("📝 Notes", "edit_field_notes"),
            ],
            vec![
                Button::new("✅ Save Changes", "edit_save"),
                Button::new("❌ Cancel", "edit_cancel"),
            ],
        ])
    }
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    /// Replace the message whose button was pressed instead of sending a new one.
    pub edit: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            edit: false,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
            edit: false,
        }
    }

    /// Only plain text and inline keyboards can be edited in place.
    pub fn edit(text: impl Into<String>, keyboard: Option<Keyboard>) -> Self {
        Self {
            text: text.into(),
            keyboard,
            edit: true,
        }
    }

    pub fn main_menu(text: impl Into<String>) -> Self {
        Self::with_keyboard(text, Keyboard::MainMenu)
    }
}
