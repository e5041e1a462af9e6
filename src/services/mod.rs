pub mod exclusion;
pub mod m3u_parser;
pub mod metrics;
pub mod rewriter;
pub mod serializer;
pub mod store;
pub mod xtream;
