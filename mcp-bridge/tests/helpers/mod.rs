pub mod raw_upstream;
