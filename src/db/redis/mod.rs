pub mod redis_pool;
