//! Utility types shared by the index implementations.

pub mod heap;

pub use heap::{HeapEntry, MaxHeap, MinHeap};
