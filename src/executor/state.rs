pub(crate) const RUNNING: usize = 0;
pub(crate) const DRAINING: usize = 1;
pub(crate) const TERMINATED: usize = 2;
