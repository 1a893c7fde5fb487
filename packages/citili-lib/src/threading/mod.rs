pub mod slot_pool;
