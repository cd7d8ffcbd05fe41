pub mod bitseq; // Packed binary sequences over one machine word
pub mod error; // Crate-wide error type
pub mod index; // Sampled-substring -> positions index
pub mod mcs; // Forms, combinations, and the greedy covering set
pub mod search; // Search orchestration (filtered + naive oracle)
pub mod utils; // File openers, loaders, and timers
pub mod verify; // SIMD-accelerated Hamming verification
