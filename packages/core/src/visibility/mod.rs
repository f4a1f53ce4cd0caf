//! Visibility
//!
//! Decides which menu items a public reader sees at a given instant. An item
//! is shown only when it and every one of its ancestors is shown; the current
//! time is always passed in as `as_of`.

mod filter;
mod resolver;

pub use filter::{filter, self_hidden};
pub use resolver::{
    ResolvedResource, Resolution, Resolutions, ResourceRef, ResourceResolver,
    StaticResourceResolver,
};
