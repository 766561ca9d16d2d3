//! Statement-format parsers. Each takes decoded file text and returns
//! `StatementTransaction`s in document order.

pub mod ofx;

pub use ofx::parse_ofx_text;
