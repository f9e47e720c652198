//! # CHISWEEP Core Library
//!
//! A library for generating ranked side-chain rotamer libraries by sweeping
//! dihedral angles of protein residues under a physics-inspired potential.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a
//! clear separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains the stateless atom store, pure
//!   geometry and symbolic-algebra helpers, the covalent-graph builder, the
//!   potential functions, the immutable parameter registry, and columnar I/O.
//!
//! - **[`engine`]: The Logic Core.** The stateful sweep layer: validated
//!   configuration, the per-residue dihedral sampler, cooperative
//!   cancellation, and progress reporting.
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer.
//!   It ties `engine` and `core` together into the complete procedure: parsed
//!   structure in, ranked pseudo-atom rotamers out.

pub mod core;
pub mod engine;
pub mod workflows;
