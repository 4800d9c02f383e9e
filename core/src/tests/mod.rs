mod common;
mod decoder;
mod storage;
