pub mod build_info;
pub mod cli;
pub mod comm;
pub mod config;
pub mod convergence;
pub mod csv;
pub mod error;
pub mod grid;
pub mod halo;
pub mod report;
pub mod solver;
pub mod stencil;
pub mod topology;
