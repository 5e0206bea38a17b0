pub mod headers;
pub mod wordpress;

pub use headers::{SiteMetadata, extract};
pub use wordpress::extract_wordpress_version;
