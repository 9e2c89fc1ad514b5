use teloxide::utils::command::BotCommands;

use super::keyboard::MenuCommand;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Show the welcome message and main menu")]
    Start,
    #[command(description = "Show this help message")]
    Help,
    #[command(description = "Add a new expense")]
    Add,
    #[command(description = "List your expenses")]
    List,
    #[command(description = "Edit an existing expense")]
    Edit,
    #[command(description = "Delete an expense")]
    Delete,
    #[command(description = "Expense report by category and month")]
    Report,
    #[command(description = "Totals, fuel efficiency and recent expenses")]
    Dashboard,
    #[command(description = "Search expenses using natural language")]
    Search,
    #[command(description = "Cancel the current operation")]
    Cancel,
}

impl From<MenuCommand> for Command {
    fn from(command: MenuCommand) -> Self {
        match command {
            MenuCommand::Add => Command::Add,
            MenuCommand::List => Command::List,
            MenuCommand::Edit => Command::Edit,
            MenuCommand::Delete => Command::Delete,
            MenuCommand::Report => Command::Report,
            MenuCommand::Dashboard => Command::Dashboard,
        }
    }
}
