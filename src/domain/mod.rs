/*
 * Responsibility
 * - repo / service / dto が共有する小さな値型
 * - DB や HTTP の都合を持ち込まない
 */
pub mod category;
pub mod recipe;

pub use category::Category;
