pub mod convert;
pub mod detect;
pub mod extract;
pub mod merge;
pub mod select;
pub mod status;
