pub mod comments;
pub mod faqs;
pub mod health;
pub mod recipes;
pub mod templates;
pub mod users;
