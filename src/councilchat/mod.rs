// src/councilchat/mod.rs

pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod error;
pub mod event;
pub mod group_chat;
pub mod history;
pub mod interrupt;
pub mod json_repair;
pub mod message;
pub mod participant;
pub mod persona;
pub mod prompts;
pub mod selector;

// Re-export the runner so it can be reached as councilchat::councilchat::GroupChat
// as well as councilchat::GroupChat.
pub use group_chat::GroupChat;
