mod core;
pub mod raw_mode;

pub use self::core::LineEditor;
