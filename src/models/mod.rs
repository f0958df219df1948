pub mod record;
pub mod request;

pub use record::{Cell, Record};
pub use request::DeliveryRequest;
