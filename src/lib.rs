pub mod aggregate;
pub mod archive;
pub mod catalog;
pub mod cnpj;
pub mod config;
pub mod consolidate;
pub mod detect;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod http;
pub mod logging;
pub mod numeric;
pub mod paths;
pub mod period;
pub mod pipeline;
pub mod registry;
pub mod staging;
pub mod text;
pub mod welford;
