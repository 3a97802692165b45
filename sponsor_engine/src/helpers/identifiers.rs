use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};

pub const ORDER_NO_PREFIX: &str = "ORD";
const DOWNLOAD_TOKEN_LENGTH: usize = 48;

/// `ORD` + the UTC time as `YYYYMMDDHHMMSS` + 6 random lowercase hex digits
pub fn new_order_no(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x100_0000);
    format!("{ORDER_NO_PREFIX}{}{suffix:06x}", now.format("%Y%m%d%H%M%S"))
}

/// An unguessable bearer token for the download endpoint
pub fn new_download_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(DOWNLOAD_TOKEN_LENGTH).map(char::from).collect()
}

/// The refund number sent to the gateway for an order
pub fn refund_reference(order_no: &str) -> String {
    format!("{order_no}-R")
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn order_number_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let no = new_order_no(now);
        assert_eq!(no.len(), 3 + 14 + 6);
        assert!(no.starts_with("ORD20240309070501"));
        assert!(no[17..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn tokens_are_unique() {
        let a = new_download_token();
        let b = new_download_token();
        assert_eq!(a.len(), DOWNLOAD_TOKEN_LENGTH);
        assert_ne!(a, b);
    }

    #[test]
    fn refund_numbers() {
        assert_eq!(refund_reference("ORD20240309070501abcdef"), "ORD20240309070501abcdef-R");
    }
}
