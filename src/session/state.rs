use chrono::{DateTime, Utc};

use crate::storage::{Expense, ExpenseRecord, VehicleType, PETROL_CATEGORY};

/// Expense fields gathered across several messages.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseDraft {
    /// Set when the draft edits a stored expense.
    pub expense_id: Option<i64>,
    /// Telegram id of the author.
    pub user_id: i64,
    pub category_name: String,
    pub category_emoji: String,
    pub is_vehicle: bool,
    pub vehicle_type: Option<VehicleType>,
    pub odometer: f64,
    pub petrol_price: f64,
    pub total_price: f64,
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

impl ExpenseDraft {
    pub fn new(user_id: i64) -> Self {
        Self {
            expense_id: None,
            user_id,
            category_name: String::new(),
            category_emoji: String::new(),
            is_vehicle: false,
            vehicle_type: None,
            odometer: 0.0,
            petrol_price: 0.0,
            total_price: 0.0,
            notes: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn from_expense(expense: &Expense, user_id: i64) -> Self {
        Self {
            expense_id: Some(expense.id),
            user_id,
            category_name: expense.category.name.clone(),
            category_emoji: expense.category.emoji.clone(),
            is_vehicle: expense.category.is_vehicle(),
            vehicle_type: expense.vehicle_type,
            odometer: expense.odometer,
            petrol_price: expense.petrol_price,
            total_price: expense.total_price,
            notes: expense.notes.clone(),
            timestamp: expense.timestamp,
        }
    }

    pub fn is_petrol(&self) -> bool {
        self.category_name == PETROL_CATEGORY
    }

    /// Values to write, resolved against the storage ids of owner and category.
    /// Non-vehicle categories never carry a vehicle type.
    pub fn to_record(&self, owner_id: i64, category_id: i64) -> ExpenseRecord {
        ExpenseRecord {
            user_id: owner_id,
            category_id,
            vehicle_type: if self.is_vehicle {
                self.vehicle_type
            } else {
                None
            },
            odometer: self.odometer,
            petrol_price: self.petrol_price,
            total_price: self.total_price,
            notes: self.notes.clone(),
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddStep {
    Category,
    VehicleType,
    Odometer,
    PetrolPrice,
    TotalPrice,
    Notes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStep {
    Menu,
    Category,
    VehicleType,
    Odometer,
    PetrolPrice,
    TotalPrice,
    Notes,
}

/// Where the user is in a conversation. Flow data lives inside the variant
/// that needs it, so a delete can never see a half-built add draft.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Step {
    #[default]
    Start,
    Idle,
    Add {
        step: AddStep,
        draft: ExpenseDraft,
    },
    Edit {
        step: EditStep,
        draft: ExpenseDraft,
    },
    Delete {
        expense: Expense,
    },
    Search,
    /// A save, update or delete is in flight. Holds off duplicate submits.
    Saving,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Start => "start",
            Step::Idle => "idle",
            Step::Add { step, .. } => match step {
                AddStep::Category => "add_category",
                AddStep::VehicleType => "add_vehicle_type",
                AddStep::Odometer => "add_odometer",
                AddStep::PetrolPrice => "add_petrol_price",
                AddStep::TotalPrice => "add_total_price",
                AddStep::Notes => "add_notes",
            },
            Step::Edit { step, .. } => match step {
                EditStep::Menu => "edit_menu",
                EditStep::Category => "edit_category",
                EditStep::VehicleType => "edit_vehicle_type",
                EditStep::Odometer => "edit_odometer",
                EditStep::PetrolPrice => "edit_petrol_price",
                EditStep::TotalPrice => "edit_total_price",
                EditStep::Notes => "edit_notes",
            },
            Step::Delete { .. } => "delete_confirm",
            Step::Search => "search",
            Step::Saving => "saving",
        }
    }

    /// Steps where `/skip` is an answer rather than a command.
    pub fn accepts_skip(&self) -> bool {
        matches!(
            self,
            Step::Add {
                step: AddStep::Notes,
                ..
            } | Step::Edit {
                step: EditStep::Notes,
                ..
            }
        )
    }

    pub fn draft(&self) -> Option<&ExpenseDraft> {
        match self {
            Step::Add { draft, .. } | Step::Edit { draft, .. } => Some(draft),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserState {
    pub step: Step,
    /// Copy of the list last offered for edit or delete.
    pub expense_selection: Vec<Expense>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            step: Step::Start,
            expense_selection: Vec::new(),
            last_activity: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        let now = Utc::now();
        self.last_activity = now;
        self.updated_at = now;
    }

    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_activity < cutoff
    }
}

impl Default for UserState {
    fn default() -> Self {
        Self::new()
    }
}
