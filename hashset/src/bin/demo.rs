//! A scripted demonstration of [`hashset::SplitOrderedHashSet`], single
//! threaded and with a fixed sequence of operations — no arguments, no
//! interactive input.

use hashset::SplitOrderedHashSet;

fn main() {
    tracing_subscriber::fmt::init();

    let set = SplitOrderedHashSet::new();

    println!("contains(0)  = {}", set.contains(0));
    println!("contains(10) = {}", set.contains(10));

    println!("insert(0)  = {}", set.insert(0));
    println!("insert(26) = {}", set.insert(26));

    println!("contains(0)  = {}", set.contains(0));
    println!("contains(10) = {}", set.contains(10));

    println!("remove(0) = {}", set.remove(0));
    println!("contains(0) = {}", set.contains(0));

    println!("insert(5) = {}", set.insert(5));
    println!("insert(5) = {}", set.insert(5));
    println!("insert(5) = {}", set.insert(5));
    println!("len() = {}", set.len());

    println!();
    println!("-- growth demonstration --");
    let grown = SplitOrderedHashSet::new();
    for key in 0..50u32 {
        grown.insert(key);
    }
    for key in 0..50u32 {
        println!("contains({key}) = {}", grown.contains(key));
    }
    println!("len() = {}", grown.len());
}
