//! Shopping cart module.
//!
//! Contains the per-user cart and the book that holds every user's cart.

mod book;
mod cart;

pub use book::CartBook;
pub use cart::{fingerprint_lines, Cart, CartItem, CartLimits};
