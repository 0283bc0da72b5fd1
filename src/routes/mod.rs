pub mod health;
pub mod interviews;
