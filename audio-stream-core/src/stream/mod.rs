pub mod driver;
mod handle;
pub mod instream;
pub mod negotiate;
pub mod outstream;
pub mod protocol;
pub mod shared;

#[cfg(test)]
mod tests;

pub use instream::InStream;
pub use outstream::OutStream;
