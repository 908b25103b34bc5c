pub mod interview;
pub mod provider;
pub mod question_bank;
pub mod settings;
