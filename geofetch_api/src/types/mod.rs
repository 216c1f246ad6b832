mod reverse;
pub use self::reverse::{AddressParts, ReverseResponse};
