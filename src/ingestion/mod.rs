//! Ingestion: fetching remote listings and normalizing them into documents.
//!
//! Two stages live here:
//!
//! * [`fetch`] — one HTTP GET returning a JSON array of listing objects,
//!   with an optional filesystem cache of the raw body.
//! * [`normalize`] — lenient extraction of the four listing fields into a
//!   canonical document text. Normalization never fails.

pub mod fetch;
pub mod normalize;

pub use fetch::{FetchOutcome, ListingCache, fetch_listings};
pub use normalize::{Document, RawListing, ServiceRecord, normalize_listings};
