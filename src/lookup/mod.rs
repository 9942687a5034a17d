mod http;

pub use http::HttpOwnerLookup;
