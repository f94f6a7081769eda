pub mod proposal_router;

pub use proposal_router::*;
