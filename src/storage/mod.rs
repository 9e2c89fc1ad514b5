//! Persistence boundary for users, categories and expenses.
//!
//! The conversation engine only talks to [`Storage`]; the SQL implementation
//! lives in [`crate::db::repo::Repo`].

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Group name whose categories ask for a vehicle type.
pub const VEHICLE_GROUP: &str = "Vehicle";
/// Category that collects odometer and petrol price readings.
pub const PETROL_CATEGORY: &str = "Petrol";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleType {
    Car,
    Bike,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "CAR",
            VehicleType::Bike => "BIKE",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CAR" => Ok(VehicleType::Car),
            "BIKE" => Ok(VehicleType::Bike),
            other => Err(format!("unknown vehicle type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub emoji: String,
    pub group: String,
}

impl Category {
    pub fn is_vehicle(&self) -> bool {
        self.group == VEHICLE_GROUP
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.emoji, self.name)
    }
}

/// A stored expense joined with its category.
#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    pub id: i64,
    pub user_id: i64,
    pub category: Category,
    pub vehicle_type: Option<VehicleType>,
    pub odometer: f64,
    pub petrol_price: f64,
    pub total_price: f64,
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

/// Field values written by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseRecord {
    pub user_id: i64,
    pub category_id: i64,
    pub vehicle_type: Option<VehicleType>,
    pub odometer: f64,
    pub petrol_price: f64,
    pub total_price: f64,
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Cheap liveness check used at startup and by the health endpoint.
    async fn ping(&self) -> StorageResult<()>;

    async fn get_user_by_telegram_id(&self, telegram_id: i64) -> StorageResult<User>;

    /// Insert the user, or refresh the profile fields if the telegram id is known.
    async fn create_user(&self, user: NewUser) -> StorageResult<User>;

    async fn get_category_by_name(&self, name: &str) -> StorageResult<Category>;

    async fn get_categories_by_group(&self, group: &str) -> StorageResult<Vec<Category>>;

    async fn create_expense(&self, expense: ExpenseRecord) -> StorageResult<Expense>;

    async fn get_expense_by_id(&self, id: i64) -> StorageResult<Expense>;

    /// Overwrite an expense owned by `record.user_id`.
    async fn update_expense(&self, id: i64, record: ExpenseRecord) -> StorageResult<Expense>;

    /// Soft-delete an expense owned by `user_id`.
    async fn delete_expense(&self, id: i64, user_id: i64) -> StorageResult<()>;

    /// Newest first. Unknown users simply have no expenses.
    async fn get_expenses_by_telegram_id(
        &self,
        telegram_id: i64,
        limit: u64,
        offset: u64,
    ) -> StorageResult<Vec<Expense>>;
}
