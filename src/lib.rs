//! Conversion front end shared by the `rsnd` binary and its tests.

pub mod decode;
pub mod extract;
pub mod list;
pub mod wav;
