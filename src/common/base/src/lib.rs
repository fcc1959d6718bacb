#[macro_use]
extern crate anyhow;

pub mod codec;
pub mod reader;
pub mod record;
pub mod time;
pub mod writer;
