//! # Imagemill
//!
//! An image-processing service in CLI form. A request names a source
//! object (bucket + file) and what to do with it: either one operation,
//! or an ordered chain of operations executed as a pipeline over a
//! single fetch.
//!
//! # Architecture: One Fetch, Pure Steps, One Persist
//!
//! Every invocation moves through the same phases:
//!
//! ```text
//! 1. Validate   request JSON     → bucket, file, operation list
//! 2. Fetch      storage          → decoded image (timed)
//! 3. Run        steps in order   → image threaded through pure transforms
//! 4. Finalize   storage          → one persisted artifact + report
//! ```
//!
//! This separation exists for three reasons:
//!
//! - **Testability**: every operation is a pure function from a decoded
//!   image and a JSON args object to a replacement + metrics. Unit tests
//!   exercise the transforms without touching storage.
//! - **One contract**: the pipeline executor and the standalone wrappers
//!   drive the same functions, so chained and one-shot behavior cannot
//!   drift apart.
//! - **Accountability**: the report carries exactly one record per
//!   requested step, including steps that were skipped or failed, so a
//!   response always accounts for the whole request.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`request`] | Wire-level request parsing: required keys, extension gate, lenient step entries |
//! | [`ops`] | The operation registry — six transforms behind one calling convention, plus the standalone wrapper |
//! | [`pipeline`] | The chained executor: fetch once, thread the image, persist the `batch_` artifact |
//! | [`response`] | Response bodies: error objects, the pipeline success shape, runtime metrics |
//! | [`storage`] | The `Storage` trait, the directory-backed store, signed download URLs |
//! | [`naming`] | Derived artifact names: prefixes, extension extraction and rewriting |
//! | [`config`] | `imagemill.toml` loading, defaults, merging, validation |
//! | [`types`] | The per-invocation context (runtime clock, cold-start flag) |
//!
//! # Design Decisions
//!
//! ## A Closed Operation Registry
//!
//! Operations are a plain enum ([`ops::Operation`]), looked up by wire
//! name exactly once at the edge. Inside the library there is no
//! stringly-typed dispatch: adding an operation means the compiler
//! points at every match that must learn about it. An unknown name in a
//! pipeline is not a crash and not a silent no-op: it leaves a
//! diagnostic record in that step's slot and the chain moves on.
//!
//! ## Errors Are Part of the Contract
//!
//! Callers of the service match on response keys and message strings,
//! so messages live next to the error types that produce them
//! ([`ops::StepError`], [`request::RequestError`]) and tests assert the
//! exact text. A structured step failure is recorded and the pipeline
//! continues; only a malformed request or a storage fault at the edges
//! aborts a whole invocation.
//!
//! ## Storage Behind a Trait
//!
//! The executor only knows [`storage::Storage`]: fetch, store, signed
//! URL. The CLI binds it to [`storage::DirStore`], which lays buckets
//! out as directories under a configured root and signs download URLs
//! with an optional secret. Tests bind it to an in-memory recording
//! store and assert on the exact storage traffic.
//!
//! ## Reports Never Carry Pixels
//!
//! Step records and responses are pure JSON metrics. The carried image
//! travels through a typed channel ([`ops::StepOutput`]), never through
//! the report, so a response cannot accidentally serialize pixel data no
//! matter how operations are chained.

pub mod config;
pub mod naming;
pub mod ops;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
