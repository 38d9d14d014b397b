pub mod writer;
pub mod xyz;
