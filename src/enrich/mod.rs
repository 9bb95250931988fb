//! Beacon enrichment: IP anonymization, user-agent parsing, referrer
//! normalization. Enrichment never fails ingestion - bad input degrades to
//! defaults and is logged by the caller.

pub mod ip;
pub mod referrer;
pub mod ua;
