/// State of one neutron while its history is being simulated.
///
/// `position` and `direction` only carry meaning in heterogeneous geometries;
/// infinite-medium and equivalence histories leave them untouched.
#[derive(Debug, Clone)]
pub struct Neutron {
    pub position: [f64; 3],
    pub direction: [f64; 3],
    /// Current energy (eV)
    pub energy: f64,
    /// Energy before the most recent collision (eV)
    pub old_energy: f64,
    pub weight: f64,
    pub alive: bool,
    /// Index of the batch this history belongs to
    pub batch: usize,
    /// Number of collisions and surface crossings so far
    pub events: u64,
}

impl Neutron {
    pub fn new(position: [f64; 3], direction: [f64; 3], energy: f64) -> Self {
        Self {
            position,
            direction,
            energy,
            old_energy: energy,
            weight: 1.0,
            alive: true,
            batch: 0,
            events: 0,
        }
    }

    /// Neutron without spatial state, for infinite-medium and equivalence runs.
    pub fn at_energy(energy: f64) -> Self {
        Self::new([0.0; 3], [1.0, 0.0, 0.0], energy)
    }

    /// Move the neutron `distance` along its direction of flight.
    #[inline]
    pub fn advance(&mut self, distance: f64) {
        self.position[0] += distance * self.direction[0];
        self.position[1] += distance * self.direction[1];
        self.position[2] += distance * self.direction[2];
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }
}
