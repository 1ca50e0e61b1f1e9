mod handler;
mod model;

pub use handler::{callback, emails, index, login, logout};
