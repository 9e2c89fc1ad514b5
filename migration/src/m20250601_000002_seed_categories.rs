use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// (group, emoji, name)
const CATEGORIES: &[(&str, &str, &str)] = &[
    ("Vehicle", "⛽", "Petrol"),
    ("Vehicle", "🔧", "Service"),
    ("Vehicle", "🛠️", "Repairs"),
    ("Vehicle", "🚗", "Insurance"),
    ("Vehicle", "🅿️", "Parking"),
    ("Vehicle", "🛣️", "Toll"),
    ("Vehicle", "🚘", "Car Loan EMI"),
    ("Home", "🏠", "Home Loan EMI"),
    ("Home", "💡", "Electricity"),
    ("Home", "💧", "Water"),
    ("Home", "🔥", "Gas"),
    ("Home", "📶", "Internet"),
    ("Home", "📱", "Mobile"),
    ("Home", "📺", "Cable/DTH"),
    ("Daily Living", "🛒", "Grocery"),
    ("Daily Living", "🍽️", "Dining"),
    ("Daily Living", "☕", "Coffee/Tea"),
    ("Daily Living", "🚕", "Transportation"),
    ("Daily Living", "👕", "Shopping"),
    ("Daily Living", "💇", "Personal Care"),
    ("Entertainment", "🎬", "Movies"),
    ("Entertainment", "🎮", "Gaming"),
    ("Entertainment", "🎵", "Music"),
    ("Entertainment", "📚", "Books"),
    ("Entertainment", "🎨", "Hobbies"),
    ("Entertainment", "🏋️", "Fitness"),
    ("Health", "💊", "Medicines"),
    ("Health", "👨‍⚕️", "Doctor"),
    ("Health", "🏥", "Hospital"),
    ("Health", "🧘", "Wellness"),
    ("Education", "📖", "Courses"),
    ("Education", "📝", "Stationery"),
    ("Education", "💻", "Online Learning"),
    ("Travel", "✈️", "Flights"),
    ("Travel", "🏨", "Hotels"),
    ("Travel", "🚂", "Trains"),
    ("Travel", "🚌", "Buses"),
    ("Investments", "💰", "Savings"),
    ("Investments", "📈", "Investments"),
    ("Investments", "🏦", "Bank Charges"),
    ("Gifts", "🎁", "Gifts"),
    ("Gifts", "🤝", "Donations"),
    ("Gifts", "🎉", "Celebrations"),
    ("Other", "📌", "Other"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut insert = Query::insert();
        insert
            .into_table(Categories::Table)
            .columns([Categories::Name, Categories::Emoji, Categories::Group]);

        for (group, emoji, name) in CATEGORIES {
            insert
                .values([(*name).into(), (*emoji).into(), (*group).into()])
                .map_err(|e| DbErr::Custom(format!("Invalid category seed {name}: {e}")))?;
        }

        manager.exec_stmt(insert.to_owned()).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let names: Vec<&str> = CATEGORIES.iter().map(|(_, _, name)| *name).collect();
        manager
            .exec_stmt(
                Query::delete()
                    .from_table(Categories::Table)
                    .and_where(Expr::col(Categories::Name).is_in(names))
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Name,
    Emoji,
    Group,
}
