pub mod auth;
pub mod cart;
pub mod images;
pub mod products;
pub mod users;
