//! Input side of the pipeline.
//!
//! ```text
//! stream.tsv → load_stream → parser::parse_line → UrlEvent → Processor
//!                                    ↓
//!                              ParseError (dropped, counted)
//! ```

pub mod parser;
pub mod stream;

pub use parser::{parse_line, parse_url};
pub use stream::{load_stream, parse_stream, ParsedStream};
