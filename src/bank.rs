//! Neutron banking for one history: the source neutron plus any fission
//! neutrons it produces, transported first in, first out.

use crate::neutron::Neutron;
use std::collections::VecDeque;

#[derive(Debug, Clone, Default)]
pub struct ParticleBank {
    queue: VecDeque<Neutron>,
}

impl ParticleBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ParticleBank {
            queue: VecDeque::with_capacity(capacity),
        }
    }

    pub fn add_source_neutron(&mut self, neutron: Neutron) {
        self.queue.push_back(neutron);
    }

    /// Bank a neutron born in a fission event.
    pub fn bank_secondary(&mut self, neutron: Neutron) {
        self.queue.push_back(neutron);
    }

    pub fn pop_neutron(&mut self) -> Option<Neutron> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
