mod build_tests;
mod common;
mod devfs_tests;
mod filestore_tests;
mod source_tests;
