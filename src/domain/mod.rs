pub mod display;
pub mod post;
pub mod source;
pub mod web3;

pub use display::{DisplayItem, Rect};
pub use post::Post;
pub use source::{resolve_sources, SourceCategory, SourceSpec};
pub use web3::{extract_addresses, trading_url, Chain, CryptoAddress};
