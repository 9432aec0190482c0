pub mod pipeline;
pub mod svtk_commands;
#[macro_use]
extern crate log;
