mod handler;

pub use handler::list_by_priority;
