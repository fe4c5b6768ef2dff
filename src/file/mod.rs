//! Raw byte access shared by the signature decoder and the control protocol codec.

pub mod parser;
