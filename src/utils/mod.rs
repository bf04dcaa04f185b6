pub mod url;
pub mod validation;

pub use url::create_url;
