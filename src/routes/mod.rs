pub mod champions;
pub mod health;
