pub mod carts;
pub mod checkout;
pub mod orders;

pub use carts::{CartService, CartWithItems};
pub use checkout::{CheckoutService, PlaceOrderInput, VerifyPaymentInput};
pub use orders::{AdminOrderUpdate, OrderFilter, OrderService, OrderWithItems};
