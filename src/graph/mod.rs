pub mod builder;
pub mod ops;
pub mod viz;

pub use builder::{
    build_application_graph, ApplicationTierPolicy, BuildOptions, GraphBuilder,
};
pub use ops::{check_tiers, TierReport};
