pub mod comment_repo;
pub mod error;
pub mod faq_repo;
pub mod like_repo;
pub mod recipe_repo;
pub mod template_repo;
pub mod user_repo;
