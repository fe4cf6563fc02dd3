pub mod checkpoint;
pub mod cleaning;
pub mod crawler;
pub mod extractor;
pub mod fetcher;
pub mod logging;
pub mod models;
pub mod parser;
pub mod registry;
pub mod report;
pub mod snapshot;
pub mod storage;
