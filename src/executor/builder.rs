use std::thread;

use super::Executor;

pub struct ExecutorBuilder {
    pool_size: usize,
    queue_capacity: usize,
}

impl ExecutorBuilder {
    pub fn new() -> Self {
        let pool_size = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            pool_size,
            queue_capacity: 0,
        }
    }

    pub fn pool_size(mut self, n: usize) -> Self {
        assert!(n > 0, "pool_size must be > 0");

        self.pool_size = n;
        self
    }

    /// Queue capacity; 0 means unbounded, which is the default.
    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    pub fn build(self) -> Executor {
        Executor::start(self.pool_size, self.queue_capacity)
    }
}

impl Default for ExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
