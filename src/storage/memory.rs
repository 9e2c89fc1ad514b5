//! In-memory [`Storage`] used by the conversation tests.

use super::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use std::sync::Mutex;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    categories: Vec<Category>,
    expenses: Vec<(Expense, bool)>,
}

#[derive(Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
    write_delay_ms: AtomicU64,
}

impl MemoryStorage {
    /// A small slice of the real taxonomy: two vehicle categories and one plain one.
    pub fn with_default_categories() -> Self {
        let storage = Self::default();
        {
            let mut tables = storage.tables.lock().unwrap();
            for (id, (group, emoji, name)) in [
                ("Vehicle", "⛽", "Petrol"),
                ("Vehicle", "🔧", "Service"),
                ("Daily Living", "🛒", "Grocery"),
                ("Daily Living", "🍽️", "Dining"),
            ]
            .into_iter()
            .enumerate()
            {
                tables.categories.push(Category {
                    id: id as i64 + 1,
                    name: name.to_string(),
                    emoji: emoji.to_string(),
                    group: group.to_string(),
                });
            }
        }
        storage
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every write wait this long first, like a slow disk would.
    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Live (not soft-deleted) expenses.
    pub fn expenses(&self) -> Vec<Expense> {
        let tables = self.tables.lock().unwrap();
        tables
            .expenses
            .iter()
            .filter(|(_, deleted)| !deleted)
            .map(|(e, _)| e.clone())
            .collect()
    }

    /// Store an expense directly, creating the owner if needed.
    pub fn seed_expense(
        &self,
        telegram_id: i64,
        category: &str,
        total_price: f64,
        notes: &str,
    ) -> Expense {
        let mut tables = self.tables.lock().unwrap();
        let user_id = match tables.users.iter().find(|u| u.telegram_id == telegram_id) {
            Some(u) => u.id,
            None => {
                let id = tables.users.len() as i64 + 1;
                tables.users.push(User {
                    id,
                    telegram_id,
                    username: None,
                    first_name: format!("user{telegram_id}"),
                    last_name: None,
                });
                id
            }
        };
        let category = tables
            .categories
            .iter()
            .find(|c| c.name == category)
            .cloned()
            .unwrap();
        let expense = Expense {
            id: tables.expenses.len() as i64 + 1,
            user_id,
            category,
            vehicle_type: None,
            odometer: 0.0,
            petrol_price: 0.0,
            total_price,
            notes: notes.to_string(),
            timestamp: Utc::now(),
        };
        tables.expenses.push((expense.clone(), false));
        expense
    }

    async fn check_writes(&self) -> StorageResult<()> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(anyhow::anyhow!("database is locked")));
        }
        Ok(())
    }

    fn build(tables: &Tables, id: i64, record: ExpenseRecord) -> StorageResult<Expense> {
        let category = tables
            .categories
            .iter()
            .find(|c| c.id == record.category_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("category {}", record.category_id)))?;
        Ok(Expense {
            id,
            user_id: record.user_id,
            category,
            vehicle_type: record.vehicle_type,
            odometer: record.odometer,
            petrol_price: record.petrol_price,
            total_price: record.total_price,
            notes: record.notes,
            timestamp: record.timestamp,
        })
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn ping(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(anyhow::anyhow!("database is locked")));
        }
        Ok(())
    }

    async fn get_user_by_telegram_id(&self, telegram_id: i64) -> StorageResult<User> {
        let tables = self.tables.lock().unwrap();
        tables
            .users
            .iter()
            .find(|u| u.telegram_id == telegram_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("user {telegram_id}")))
    }

    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        self.check_writes().await?;
        let mut tables = self.tables.lock().unwrap();
        let next_id = tables.users.len() as i64 + 1;
        if let Some(existing) = tables
            .users
            .iter_mut()
            .find(|u| u.telegram_id == user.telegram_id)
        {
            existing.username = user.username;
            existing.first_name = user.first_name;
            existing.last_name = user.last_name;
            return Ok(existing.clone());
        }
        let created = User {
            id: next_id,
            telegram_id: user.telegram_id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn get_category_by_name(&self, name: &str) -> StorageResult<Category> {
        let tables = self.tables.lock().unwrap();
        tables
            .categories
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("category {name}")))
    }

    async fn get_categories_by_group(&self, group: &str) -> StorageResult<Vec<Category>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .categories
            .iter()
            .filter(|c| c.group == group)
            .cloned()
            .collect())
    }

    async fn create_expense(&self, record: ExpenseRecord) -> StorageResult<Expense> {
        self.check_writes().await?;
        let mut tables = self.tables.lock().unwrap();
        let id = tables.expenses.len() as i64 + 1;
        let expense = Self::build(&tables, id, record)?;
        tables.expenses.push((expense.clone(), false));
        Ok(expense)
    }

    async fn get_expense_by_id(&self, id: i64) -> StorageResult<Expense> {
        let tables = self.tables.lock().unwrap();
        tables
            .expenses
            .iter()
            .find(|(e, deleted)| e.id == id && !deleted)
            .map(|(e, _)| e.clone())
            .ok_or_else(|| StorageError::NotFound(format!("expense {id}")))
    }

    async fn update_expense(&self, id: i64, record: ExpenseRecord) -> StorageResult<Expense> {
        self.check_writes().await?;
        let mut tables = self.tables.lock().unwrap();
        let updated = Self::build(&tables, id, record)?;
        let slot = tables
            .expenses
            .iter_mut()
            .find(|(e, deleted)| e.id == id && e.user_id == updated.user_id && !deleted)
            .ok_or_else(|| StorageError::NotFound(format!("expense {id}")))?;
        slot.0 = updated.clone();
        Ok(updated)
    }

    async fn delete_expense(&self, id: i64, user_id: i64) -> StorageResult<()> {
        self.check_writes().await?;
        let mut tables = self.tables.lock().unwrap();
        let slot = tables
            .expenses
            .iter_mut()
            .find(|(e, deleted)| e.id == id && e.user_id == user_id && !deleted)
            .ok_or_else(|| StorageError::NotFound(format!("expense {id}")))?;
        slot.1 = true;
        Ok(())
    }

    async fn get_expenses_by_telegram_id(
        &self,
        telegram_id: i64,
        limit: u64,
        offset: u64,
    ) -> StorageResult<Vec<Expense>> {
        let tables = self.tables.lock().unwrap();
        let Some(user) = tables.users.iter().find(|u| u.telegram_id == telegram_id) else {
            return Ok(Vec::new());
        };
        let mut expenses: Vec<Expense> = tables
            .expenses
            .iter()
            .filter(|(e, deleted)| e.user_id == user.id && !deleted)
            .map(|(e, _)| e.clone())
            .collect();
        expenses.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(expenses
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}
