pub mod base;

pub use base::{BaseDao, DaoError, DaoResult};
