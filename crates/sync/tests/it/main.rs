mod pipeline;

fn main() {}
