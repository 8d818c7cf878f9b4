/// Local filesystem helpers used by the partition store.
pub mod fs;
