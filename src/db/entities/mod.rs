pub mod categories;
pub mod expenses;
pub mod users;
