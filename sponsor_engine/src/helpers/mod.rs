mod email;
mod identifiers;

pub use email::is_plausible_email;
pub use identifiers::{new_download_token, new_order_no, refund_reference, ORDER_NO_PREFIX};
pub use sponsor_common::helpers::normalize_email;
