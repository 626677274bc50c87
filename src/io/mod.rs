pub(crate) mod arena;
pub mod stream;
