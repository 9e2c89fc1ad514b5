//! Outbound messages.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, MessageId,
    ReplyMarkup,
};

use super::keyboard::{Button, Keyboard, Reply};
use super::ThrottledBot;

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, chat_id: i64, reply: &Reply) -> anyhow::Result<()>;

    /// Replace the text (and inline keyboard) of an earlier message.
    async fn edit(&self, chat_id: i64, message_id: i32, reply: &Reply) -> anyhow::Result<()>;
}

pub struct TelegramMessenger {
    bot: ThrottledBot,
}

impl TelegramMessenger {
    pub fn new(bot: ThrottledBot) -> Self {
        Self { bot }
    }
}

fn inline_markup(rows: &[Vec<Button>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.text.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

fn reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::MainMenu => ReplyMarkup::Keyboard(
            KeyboardMarkup::new(
                Keyboard::main_menu_rows()
                    .map(|row| row.map(KeyboardButton::new).to_vec())
                    .to_vec(),
            )
            .resize_keyboard(),
        ),
        Keyboard::Inline(rows) => ReplyMarkup::InlineKeyboard(inline_markup(rows)),
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(&self, chat_id: i64, reply: &Reply) -> anyhow::Result<()> {
        let request = self.bot.send_message(ChatId(chat_id), reply.text.clone());
        match &reply.keyboard {
            Some(keyboard) => request.reply_markup(reply_markup(keyboard)).await?,
            None => request.await?,
        };
        Ok(())
    }

    async fn edit(&self, chat_id: i64, message_id: i32, reply: &Reply) -> anyhow::Result<()> {
        let request =
            self.bot
                .edit_message_text(ChatId(chat_id), MessageId(message_id), reply.text.clone());
        match &reply.keyboard {
            Some(Keyboard::Inline(rows)) => request.reply_markup(inline_markup(rows)).await?,
            _ => request.await?,
        };
        Ok(())
    }
}
