//! Ad+ bid adapter.
//!
//! Translates host bid requests into one POST per bid against the Ad+
//! header-bidding endpoint and maps the endpoint's bid list back. Stateless:
//! every operation is a pure function of its inputs plus the page
//! environment.

pub mod adapter;
pub mod environment;
pub mod types;

pub use adapter::{parse_bid_request, AdplusBidAdapter, BIDDER_CODE};
pub use environment::{primary_language, PageContext, PageEnvironment};
pub use types::{
    AdMeta, AdResponse, AdplusBidRequest, BidParams, BidRequest, BidderRequest, MediaType,
};
