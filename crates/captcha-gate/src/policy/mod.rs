//! Per-action CAPTCHA policies.
//!
//! The document on disk declares a provider, a `global` policy, and
//! per-action overrides; [`PolicyStore`] keeps the merged result cached.

mod document;
mod store;

pub use document::PolicySet;
pub use store::PolicyStore;
