pub mod factory;

pub use factory::{AppFactory, AppIngestion, AppSearch};
