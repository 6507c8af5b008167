pub mod cli;
pub mod publish;

pub use publish::{Outcome, publish_file};
