pub mod cleanup;
pub mod download_service;
pub mod extractor;
pub mod storage;
