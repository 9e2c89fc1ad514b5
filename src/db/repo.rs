use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use super::entities::{categories, expenses, users};
use crate::storage::{
    Category, Expense, ExpenseRecord, NewUser, Storage, StorageError, StorageResult, User,
    VehicleType,
};

pub struct Repo {
    db: DatabaseConnection,
}

impl Repo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_expense(&self, id: i64) -> StorageResult<Expense> {
        let (expense, category) = expenses::Entity::find_by_id(id)
            .filter(expenses::Column::DeletedAt.is_null())
            .find_also_related(categories::Entity)
            .one(&self.db)
            .await
            .context("Failed to get expense")?
            .ok_or_else(|| StorageError::NotFound(format!("expense {id}")))?;

        to_expense(expense, category)
    }
}

fn to_user(model: users::Model) -> User {
    User {
        id: model.id,
        telegram_id: model.telegram_id,
        username: model.username,
        first_name: model.first_name,
        last_name: model.last_name,
    }
}

fn to_category(model: categories::Model) -> Category {
    Category {
        id: model.id,
        name: model.name,
        emoji: model.emoji,
        group: model.group,
    }
}

fn to_expense(
    model: expenses::Model,
    category: Option<categories::Model>,
) -> StorageResult<Expense> {
    let category = category
        .map(to_category)
        .ok_or_else(|| anyhow::anyhow!("Expense {} has no category", model.id))?;

    // Unknown values only come from manual edits; treat them as "no vehicle"
    let vehicle_type = model
        .vehicle_type
        .as_deref()
        .and_then(|v| v.parse::<VehicleType>().ok());

    Ok(Expense {
        id: model.id,
        user_id: model.user_id,
        category,
        vehicle_type,
        odometer: model.odometer,
        petrol_price: model.petrol_price,
        total_price: model.total_price,
        notes: model.notes,
        timestamp: model.timestamp.and_utc(),
    })
}

#[async_trait]
impl Storage for Repo {
    async fn ping(&self) -> StorageResult<()> {
        self.db.ping().await.context("Database ping failed")?;
        Ok(())
    }

    // ==================== Users ====================

    async fn get_user_by_telegram_id(&self, telegram_id: i64) -> StorageResult<User> {
        users::Entity::find()
            .filter(users::Column::TelegramId.eq(telegram_id))
            .one(&self.db)
            .await
            .context("Failed to get user")?
            .map(to_user)
            .ok_or_else(|| StorageError::NotFound(format!("user {telegram_id}")))
    }

    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        let now = Utc::now().naive_utc();

        let new_user = users::ActiveModel {
            telegram_id: Set(user.telegram_id),
            username: Set(user.username),
            first_name: Set(user.first_name),
            last_name: Set(user.last_name),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        // INSERT ... ON CONFLICT(telegram_id) DO UPDATE keeps the surrogate id stable
        users::Entity::insert(new_user)
            .on_conflict(
                OnConflict::column(users::Column::TelegramId)
                    .update_columns([
                        users::Column::Username,
                        users::Column::FirstName,
                        users::Column::LastName,
                        users::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .context("Failed to upsert user")?;

        self.get_user_by_telegram_id(user.telegram_id).await
    }

    // ==================== Categories ====================

    async fn get_category_by_name(&self, name: &str) -> StorageResult<Category> {
        categories::Entity::find()
            .filter(categories::Column::Name.eq(name))
            .one(&self.db)
            .await
            .context("Failed to get category")?
            .map(to_category)
            .ok_or_else(|| StorageError::NotFound(format!("category {name}")))
    }

    async fn get_categories_by_group(&self, group: &str) -> StorageResult<Vec<Category>> {
        let categories = categories::Entity::find()
            .filter(categories::Column::Group.eq(group))
            .order_by_asc(categories::Column::Id)
            .all(&self.db)
            .await
            .context("Failed to get categories by group")?;

        Ok(categories.into_iter().map(to_category).collect())
    }

    // ==================== Expenses ====================

    async fn create_expense(&self, record: ExpenseRecord) -> StorageResult<Expense> {
        let now = Utc::now().naive_utc();

        let new_expense = expenses::ActiveModel {
            user_id: Set(record.user_id),
            category_id: Set(record.category_id),
            vehicle_type: Set(record.vehicle_type.map(|v| v.as_str().to_string())),
            odometer: Set(record.odometer),
            petrol_price: Set(record.petrol_price),
            total_price: Set(record.total_price),
            notes: Set(record.notes),
            timestamp: Set(record.timestamp.naive_utc()),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        };

        let model = new_expense
            .insert(&self.db)
            .await
            .context("Failed to create expense")?;

        self.find_expense(model.id).await
    }

    async fn get_expense_by_id(&self, id: i64) -> StorageResult<Expense> {
        self.find_expense(id).await
    }

    async fn update_expense(&self, id: i64, record: ExpenseRecord) -> StorageResult<Expense> {
        let existing = expenses::Entity::find_by_id(id)
            .filter(expenses::Column::UserId.eq(record.user_id))
            .filter(expenses::Column::DeletedAt.is_null())
            .one(&self.db)
            .await
            .context("Failed to load expense for update")?
            .ok_or_else(|| StorageError::NotFound(format!("expense {id}")))?;

        let mut active = existing.into_active_model();
        active.category_id = Set(record.category_id);
        active.vehicle_type = Set(record.vehicle_type.map(|v| v.as_str().to_string()));
        active.odometer = Set(record.odometer);
        active.petrol_price = Set(record.petrol_price);
        active.total_price = Set(record.total_price);
        active.notes = Set(record.notes);
        active.timestamp = Set(record.timestamp.naive_utc());
        active.updated_at = Set(Utc::now().naive_utc());

        active
            .update(&self.db)
            .await
            .context("Failed to update expense")?;

        self.find_expense(id).await
    }

    async fn delete_expense(&self, id: i64, user_id: i64) -> StorageResult<()> {
        let result = expenses::Entity::update_many()
            .col_expr(
                expenses::Column::DeletedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(expenses::Column::Id.eq(id))
            .filter(expenses::Column::UserId.eq(user_id))
            .filter(expenses::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await
            .context("Failed to delete expense")?;

        if result.rows_affected == 0 {
            return Err(StorageError::NotFound(format!("expense {id}")));
        }
        Ok(())
    }

    async fn get_expenses_by_telegram_id(
        &self,
        telegram_id: i64,
        limit: u64,
        offset: u64,
    ) -> StorageResult<Vec<Expense>> {
        let user = match self.get_user_by_telegram_id(telegram_id).await {
            Ok(user) => user,
            Err(StorageError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let rows = expenses::Entity::find()
            .filter(expenses::Column::UserId.eq(user.id))
            .filter(expenses::Column::DeletedAt.is_null())
            .order_by_desc(expenses::Column::Timestamp)
            .order_by_desc(expenses::Column::Id)
            .limit(limit)
            .offset(offset)
            .find_also_related(categories::Entity)
            .all(&self.db)
            .await
            .context("Failed to list expenses")?;

        rows.into_iter()
            .map(|(expense, category)| to_expense(expense, category))
            .collect()
    }
}
