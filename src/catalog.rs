//! Certificate catalog and pricing.
//!
//! Every certificate costs the same flat fee. The server recomputes the
//! order total from the validated selection and never trusts a client-sent
//! amount.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Flat price per certificate in whole KRW.
pub const CERT_PRICE_KRW: i64 = 100_000;

/// Certificates offered for application.
pub static CERTIFICATE_CATALOG: &[&str] = &[
    "노인심리상담사1급",
    "심리상담사1급",
    "병원동행매니저1급",
    "독서지도사1급",
    "미술심리상담사1급",
    "음악심리상담사1급",
    "아동심리상담사1급",
    "진로적성상담사1급",
    "방과후지도사1급",
    "안전교육지도사1급",
];

static CATALOG_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| CERTIFICATE_CATALOG.iter().copied().collect());

/// Whether the given name is an offered certificate.
pub fn contains(name: &str) -> bool {
    CATALOG_SET.contains(name)
}

/// Total order amount for a selection of `count` certificates.
pub fn amount_for(count: usize) -> i64 {
    count as i64 * CERT_PRICE_KRW
}

/// Item label shown on the payment page, e.g. "자격증 취득 신청 (2개)".
pub fn goods_name(count: usize) -> String {
    format!("자격증 취득 신청 ({}개)", count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_scales_with_count() {
        assert_eq!(amount_for(1), 100_000);
        assert_eq!(amount_for(2), 200_000);
        assert_eq!(amount_for(0), 0);
    }

    #[test]
    fn catalog_lookup() {
        assert!(contains("노인심리상담사1급"));
        assert!(!contains("존재하지않는자격증"));
    }

    #[test]
    fn goods_name_includes_count() {
        assert_eq!(goods_name(3), "자격증 취득 신청 (3개)");
    }
}
