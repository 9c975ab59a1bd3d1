use std::collections::VecDeque;

use crate::device::Facing;

/// Ordered facing directions to try for one acquisition
///
/// The requested direction comes first; the opposite direction is appended
/// once when fallback is enabled. Attempts are consumed front to back.
#[derive(Debug, Clone)]
pub struct AcquisitionPlan {
    attempts: VecDeque<Facing>,
}

impl AcquisitionPlan {
    pub fn new(requested: Facing, fallback: bool) -> Self {
        let mut attempts = VecDeque::with_capacity(2);
        attempts.push_back(requested);
        if fallback {
            attempts.push_back(requested.opposite());
        }
        Self { attempts }
    }

    pub fn remaining(&self) -> usize {
        self.attempts.len()
    }
}

impl Iterator for AcquisitionPlan {
    type Item = Facing;

    fn next(&mut self) -> Option<Facing> {
        self.attempts.pop_front()
    }
}
