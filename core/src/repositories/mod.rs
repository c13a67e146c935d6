pub mod directory;

pub use directory::{Directory, InMemoryDirectory};
