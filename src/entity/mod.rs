pub mod cart_items;
pub mod products;
pub mod users;

pub use cart_items::Entity as CartItems;
pub use products::Entity as Products;
pub use users::Entity as Users;
