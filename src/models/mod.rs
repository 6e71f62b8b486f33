// Wire models for the chat-completion API

pub mod openai;
