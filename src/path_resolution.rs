//! Remote path discovery.
//!
//! Game servers do not agree on where they keep their files. The resolver
//! walks an ordered list of strategies, each one a small type implementing
//! [`strategies::ResolveStrategy`], and stops at the first that finds
//! something. Every path it looks at is recorded so that a miss can be
//! reported with the full list of attempts.
//!
//! All constructed and discovered paths stay under the source's canonical
//! root `/{host}_{id}`.

pub mod resolver;
pub mod strategies;
pub mod types;

pub use resolver::PathResolver;
pub use strategies::ResolveStrategy;
pub use types::{CanonicalRoot, RemoteLayout, Resolution, ResolutionContext, TimeWindow};
