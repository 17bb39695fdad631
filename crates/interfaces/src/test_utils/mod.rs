mod node;

pub use node::{test_block, TestNodeClient};
