pub mod fuzz_config;
pub mod generate;
pub mod inspect;
pub mod slot;
pub mod util;

pub use fuzz_config::*;
pub use generate::*;
pub use inspect::*;
pub use slot::*;
pub use util::*;
