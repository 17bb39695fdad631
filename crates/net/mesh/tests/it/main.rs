mod selection;

fn main() {}
