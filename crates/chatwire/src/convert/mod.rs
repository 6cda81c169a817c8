//! Conversion between internal canonical types and the vendor wire format

pub mod openai;
