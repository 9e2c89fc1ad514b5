mod callback;
pub mod commands;
mod gate;
mod handler;
mod handlers;
mod keyboard;
mod machine;
mod messenger;
mod metrics;

use anyhow::Result;
use teloxide::adaptors::Throttle;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{MaybeInaccessibleMessage, User};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

pub use commands::Command;
pub use gate::AdmissionGate;
pub use handler::{BotHandler, IncomingCallback, IncomingMessage, Sender};
pub use messenger::TelegramMessenger;
pub use metrics::MetricsSnapshot;

/// Bot wrapped in Telegram's send-rate limits.
pub type ThrottledBot = Throttle<Bot>;

/// Handler 返回类型
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub async fn run(bot: ThrottledBot, handler: BotHandler) -> Result<()> {
    info!("Starting Telegram Bot...");

    setup_commands(&bot).await;

    let handler_tree = build_handler_tree();

    // A constant distribution key drains every update through one worker, in order.
    Dispatcher::builder(bot, handler_tree)
        .dependencies(dptree::deps![handler])
        .distribution_function(|_| Some(()))
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn build_handler_tree(
) -> teloxide::dispatching::UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback))
}

fn sender_from(user: &User) -> Sender {
    Sender {
        id: user.id.0 as i64,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}

/// 处理文本消息与命令
async fn handle_message(msg: Message, handler: BotHandler) -> HandlerResult {
    let (Some(user), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        return Ok(());
    };

    handler
        .handle_message(IncomingMessage {
            chat_id: msg.chat.id.0,
            sender: sender_from(user),
            text: text.to_string(),
        })
        .await;
    Ok(())
}

/// 处理内联按钮回调
async fn handle_callback(
    bot: ThrottledBot,
    q: CallbackQuery,
    handler: BotHandler,
) -> HandlerResult {
    // Stop the client's loading spinner whatever happens next
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!("Failed to answer callback query: {:#}", e);
    }

    let (Some(message), Some(data)) = (q.message.as_ref(), q.data.clone()) else {
        return Ok(());
    };

    handler
        .handle_callback(IncomingCallback {
            chat_id: message.chat().id.0,
            message_id: match message {
                MaybeInaccessibleMessage::Regular(m) => Some(m.id.0),
                MaybeInaccessibleMessage::Inaccessible(_) => None,
            },
            sender: sender_from(&q.from),
            data,
        })
        .await;
    Ok(())
}

async fn setup_commands(bot: &ThrottledBot) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to set bot commands: {:#}", e);
    } else {
        info!("✅ Set bot commands");
    }
}
