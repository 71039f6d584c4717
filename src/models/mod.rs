pub mod batch;
pub mod conversion;
pub mod statement;

pub use batch::*;
pub use conversion::*;
pub use statement::*;
