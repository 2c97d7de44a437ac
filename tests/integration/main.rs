//! Integration tests

mod common;
mod e2e_test;
mod feed_test;
mod store_test;
mod ws_test;
