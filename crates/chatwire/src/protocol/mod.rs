//! Wire format types for `OpenAI`-compatible chat APIs
//!
//! Pure serde structs used only at the boundary. They accept the union of
//! what known vendors send; structural checks live in [`crate::schema`].

pub mod openai;
