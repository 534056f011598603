#![forbid(unsafe_code)]

mod lifecycle;
mod undo_record;
mod undo_request;

pub use undo_record::*;
pub use undo_request::*;

#[cfg(test)]
mod tests;
