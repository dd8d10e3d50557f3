/// Image decode/encode helpers.
pub mod decode;
/// Product and logo assets.
pub mod store;
