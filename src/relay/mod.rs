mod filter;
mod pipeline;
mod sse;

pub use pipeline::relay_completion_stream;
