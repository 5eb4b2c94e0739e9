pub mod bucket_queue;
pub mod closed_list;
pub mod intrusive_heap;
pub mod open_list;
pub mod pool;
