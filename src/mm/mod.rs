//! Memory Management.
//!
//! The monitor inspects memory but never manages it. [`memory`] provides
//! bounds-checked views over stacks and physical memory, and [`page_table`]
//! walks x86_64 page tables through such a view.
pub mod memory;
pub mod page_table;
