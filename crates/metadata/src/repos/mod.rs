//! Repository traits for metadata operations.

pub mod grants;
pub mod recipients;
pub mod service_account;
pub mod shares;
pub mod tokens;

pub use grants::GrantRepo;
pub use recipients::RecipientRepo;
pub use service_account::ServiceAccountRepo;
pub use shares::ShareRepo;
pub use tokens::TokenRepo;
