pub mod build;
pub mod dictionary;
pub mod extractors;
pub mod inspect;
pub mod util;

pub use build::*;
pub use dictionary::*;
pub use extractors::*;
pub use inspect::*;
pub use util::*;
