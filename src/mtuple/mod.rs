pub mod builder;
pub mod record;
mod replay;

pub use builder::MTupleBuilder;
pub use record::MTuple;

#[cfg(test)]
mod tests;
