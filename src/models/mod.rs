pub mod attempt;
pub mod module;
pub mod question;
pub mod quiz;
pub mod user;
pub mod user_answer;
