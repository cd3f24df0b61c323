//! Dataset upload and fine-tuned model provisioning.
//!
//! The workflow uploads a labeled-example file to the hosted provider, waits
//! for the dataset to pass validation, asks for a fine-tuned model built from
//! it, and waits for that model to become ready. Only then is the model id
//! handed to the chat bridge, so no chat request ever targets a model whose
//! inputs are still being validated or trained.
//!
//! Waiting is a small state machine ([`poll::poll_until_terminal`]) with a
//! fixed interval, a deadline and an explicit failure branch. A
//! [`ValidationWatches`] registry keeps at most one validation watch per
//! dataset id.

pub mod cohere;
pub mod error;
pub mod poll;
pub mod provision;
pub mod service;
pub mod watch;

pub use cohere::CohereDatasetClient;
pub use error::FinetuneError;
pub use poll::{poll_until_terminal, PollOutcome, PollPolicy};
pub use provision::{provision, wait_for_validation, ProvisionSettings, ValidationOutcome};
pub use service::{BaseType, DatasetKind, DatasetService, DatasetUpload, FineTuneRequest};
pub use watch::{ValidationWatches, WatchGuard};
