pub mod cache;
pub mod id_codec;
pub mod invalidation;
pub mod likes;
