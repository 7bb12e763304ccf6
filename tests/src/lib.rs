//! Behaviour tests for the TDL tree builder, across the workspace crates

mod orchestration;
