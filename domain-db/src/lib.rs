pub mod checkpoint;
pub mod cve_sources;
pub mod db;
pub mod pipeline;
