pub mod mock_authority;
pub mod strategies;

pub use mock_authority::*;
