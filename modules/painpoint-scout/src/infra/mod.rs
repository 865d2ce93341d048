pub mod parse;
pub mod util;
