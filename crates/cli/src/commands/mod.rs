pub mod resolve;
pub mod settings;
pub mod signatures;
pub mod simulate;

pub use resolve::*;
pub use settings::*;
pub use signatures::*;
pub use simulate::*;
