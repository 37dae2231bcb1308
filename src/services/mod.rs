pub mod error;
pub mod inspector;
pub mod invoker;
pub mod pipeline;
pub mod resolver;
pub mod worker;
