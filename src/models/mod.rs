//! Core data models for shellmux
//!
//! Data structures shared across the session components; today that is the
//! output block delivered per completed command.

pub mod output_block;

// Re-exports for convenience
pub use output_block::OutputBlock;
