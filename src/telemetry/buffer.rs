use std::collections::VecDeque;

/// Lines kept per worker log feed.
pub const LOG_BUFFER_CAPACITY: usize = 1000;

/// Append-only line buffer that evicts from the front once full.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    worker_id: String,
    lines: VecDeque<String>,
    capacity: usize,
    appended: u64,
}

impl LogBuffer {
    #[must_use]
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self::with_capacity(worker_id, LOG_BUFFER_CAPACITY)
    }

    /// A zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(worker_id: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            worker_id: worker_id.into(),
            lines: VecDeque::with_capacity(capacity.min(LOG_BUFFER_CAPACITY)),
            capacity,
            appended: 0,
        }
    }

    /// Appends a line and returns how many old lines were evicted.
    pub fn push(&mut self, line: String) -> usize {
        self.lines.push_back(line);
        self.appended = self.appended.saturating_add(1);
        let mut evicted = 0usize;
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
            evicted = evicted.saturating_add(1);
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.appended = 0;
    }

    #[must_use]
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines appended since the last reset, including evicted ones.
    #[must_use]
    pub const fn appended(&self) -> u64 {
        self.appended
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_lines_in_arrival_order() -> Result<(), String> {
        let mut buffer = LogBuffer::with_capacity("w1", 3);
        let mut evicted_total = 0usize;
        for idx in 1..=5 {
            evicted_total = evicted_total.saturating_add(buffer.push(format!("L{}", idx)));
        }
        if buffer.to_vec() != vec!["L3".to_owned(), "L4".to_owned(), "L5".to_owned()] {
            return Err(format!("Unexpected lines: {:?}", buffer.to_vec()));
        }
        if evicted_total != 2 || buffer.appended() != 5 {
            return Err(format!(
                "Unexpected counters: evicted={} appended={}",
                evicted_total,
                buffer.appended()
            ));
        }
        Ok(())
    }

    #[test]
    fn below_capacity_nothing_is_evicted() -> Result<(), String> {
        let mut buffer = LogBuffer::new("w1");
        for idx in 0..LOG_BUFFER_CAPACITY {
            if buffer.push(format!("line {}", idx)) != 0 {
                return Err(format!("Evicted early at {}", idx));
            }
        }
        if buffer.len() != LOG_BUFFER_CAPACITY {
            return Err(format!("Unexpected len: {}", buffer.len()));
        }
        if buffer.push("overflow".to_owned()) != 1 {
            return Err("Expected exactly one eviction past capacity".to_owned());
        }
        if buffer.lines().next() != Some("line 1") || buffer.last() != Some("overflow") {
            return Err("Eviction must drop the oldest line".to_owned());
        }
        Ok(())
    }

    #[test]
    fn clear_resets_history() -> Result<(), String> {
        let mut buffer = LogBuffer::new("w2");
        buffer.push("a".to_owned());
        buffer.clear();
        if !buffer.is_empty() || buffer.appended() != 0 {
            return Err("Buffer should be empty after clear".to_owned());
        }
        if buffer.worker_id() != "w2" {
            return Err("Worker id must survive clear".to_owned());
        }
        Ok(())
    }

    #[test]
    fn zero_capacity_is_raised_to_one() -> Result<(), String> {
        let mut buffer = LogBuffer::with_capacity("w3", 0);
        buffer.push("a".to_owned());
        buffer.push("b".to_owned());
        if buffer.capacity() != 1 || buffer.to_vec() != vec!["b".to_owned()] {
            return Err(format!("Unexpected state: {:?}", buffer.to_vec()));
        }
        Ok(())
    }
}
